//! Global configuration parsing and validation.
//!
//! Every field carries a serde default so an empty TOML document yields the
//! stock timings: 1500 ms ramp-up, 500 ms team stagger, 3000 ms cancellation
//! observation delay, and a 15 s stall threshold polled every 3000 ms.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Delays applied to scheduled status transitions and working-memory teardown.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimingConfig {
    /// Delay before a freshly spawned solo agent (or team index 0) starts working.
    #[serde(default = "default_ramp_up_ms")]
    pub ramp_up_ms: u64,
    /// Additional delay per team index for staggered activation.
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    /// How long a cancelled session stays visible before it is cleared.
    #[serde(default = "default_cancel_clear_delay_ms")]
    pub cancel_clear_delay_ms: u64,
    /// How long a completed session stays visible after its terminal notice.
    #[serde(default)]
    pub complete_clear_delay_ms: u64,
}

fn default_ramp_up_ms() -> u64 {
    1500
}

fn default_stagger_ms() -> u64 {
    500
}

fn default_cancel_clear_delay_ms() -> u64 {
    3000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ramp_up_ms: default_ramp_up_ms(),
            stagger_ms: default_stagger_ms(),
            cancel_clear_delay_ms: default_cancel_clear_delay_ms(),
            complete_clear_delay_ms: 0,
        }
    }
}

impl TimingConfig {
    /// Activation delay for the agent at `index` in deployment order.
    #[must_use]
    pub fn activation_delay(&self, index: usize) -> Duration {
        let index = u64::try_from(index).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.ramp_up_ms
                .saturating_add(self.stagger_ms.saturating_mul(index)),
        )
    }
}

/// Stall detection configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StallConfig {
    /// Whether stall monitoring is started for active sessions.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval between liveness evaluations.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Idle time after which an active session counts as stalled.
    #[serde(default = "default_threshold_seconds")]
    pub threshold_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_threshold_seconds() -> u64 {
    15
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            threshold_seconds: default_threshold_seconds(),
        }
    }
}

impl StallConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Stall threshold as a [`Duration`].
    #[must_use]
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_seconds)
    }
}

/// Initial values for the user preferences read by the orchestrator.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PreferencesConfig {
    /// Extract session memories after a completed session.
    #[serde(default)]
    pub auto_learn: bool,
    /// Route every plan through the approval flow, even solo ones.
    #[serde(default)]
    pub force_team_mode: bool,
}

/// Preference flags read by the orchestrator, adjustable at runtime.
#[derive(Debug, Default)]
pub struct Preferences {
    auto_learn: AtomicBool,
    force_team_mode: AtomicBool,
}

impl Preferences {
    /// Seed runtime preferences from configuration.
    #[must_use]
    pub fn from_config(config: &PreferencesConfig) -> Self {
        Self {
            auto_learn: AtomicBool::new(config.auto_learn),
            force_team_mode: AtomicBool::new(config.force_team_mode),
        }
    }

    /// Whether completed sessions trigger memory extraction.
    #[must_use]
    pub fn auto_learn(&self) -> bool {
        self.auto_learn.load(Ordering::SeqCst)
    }

    /// Enable or disable memory extraction.
    pub fn set_auto_learn(&self, enabled: bool) {
        self.auto_learn.store(enabled, Ordering::SeqCst);
    }

    /// Whether solo plans go through approval as teams.
    #[must_use]
    pub fn force_team_mode(&self) -> bool {
        self.force_team_mode.load(Ordering::SeqCst)
    }

    /// Enable or disable forced team mode.
    pub fn set_force_team_mode(&self, enabled: bool) {
        self.force_team_mode.store(enabled, Ordering::SeqCst);
    }
}

fn default_runtime() -> String {
    "claude-code".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Runtime used when a plan role does not name one.
    #[serde(default = "default_runtime")]
    pub default_runtime: String,
    /// Scheduled transition delays.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Stall monitor thresholds.
    #[serde(default)]
    pub stall: StallConfig,
    /// Initial preference values.
    #[serde(default)]
    pub preferences: PreferencesConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_runtime: default_runtime(),
            timing: TimingConfig::default(),
            stall: StallConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_runtime.trim().is_empty() {
            return Err(AppError::Config("default_runtime must not be empty".into()));
        }

        if self.stall.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "stall.poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.stall.threshold_seconds == 0 {
            return Err(AppError::Config(
                "stall.threshold_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
