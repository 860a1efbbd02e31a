//! Error types shared across the engine.

use std::fmt::{Display, Formatter};

/// Shared engine result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Engine error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A call across the backend boundary failed (start, stop, analyze,
    /// context build, memory extraction).
    Backend(String),
    /// Stream framing or raw record parsing failure.
    Protocol(String),
    /// An operation was invoked without its required context
    /// (no active project, no pending plan, no active session).
    Precondition(String),
    /// A status change that the session or agent state machine forbids.
    InvalidTransition(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// The backend event subscription could not be established.
    Subscription(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Backend(msg) => write!(f, "backend: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Precondition(msg) => write!(f, "precondition: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Subscription(msg) => write!(f, "subscription: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
