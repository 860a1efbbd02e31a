#![forbid(unsafe_code)]

//! Agent session event pipeline and team orchestration engine.

pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod protocol;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
