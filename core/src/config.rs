//! Engine Configuration
//!
//! Configuration values are resolved with the following priority (highest
//! first): environment variables, TOML configuration file, defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! protocol_version = 762
//! tick_interval_ms = 1000
//! line_spacing = 0.26
//! growth_policy = "spawn_immediately"
//! teardown_on_shutdown = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::ProtocolVersion;

/// Vertical spacing between hologram lines, in world units.
pub const DEFAULT_LINE_SPACING: f64 = 0.26;

/// Default reconciliation period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML payload.
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its valid range.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// What happens to newly added lines while viewers are already subscribed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Spawn new lines to current viewers immediately, avoiding a visible
    /// pop-in gap until the next tick.
    #[default]
    SpawnImmediately,
    /// Allocate only; current viewers receive new lines on the next
    /// reconciliation tick.
    DeferToTick,
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Negotiated wire protocol version, fixed for the process lifetime.
    pub protocol_version: ProtocolVersion,
    /// Period of the visibility reconciliation tick.
    pub tick_interval: Duration,
    /// Vertical spacing between lines, in world units.
    pub line_spacing: f64,
    /// Delivery policy for lines added while viewers are subscribed.
    pub growth_policy: GrowthPolicy,
    /// Send removal packets for every hologram to every viewer on shutdown.
    pub teardown_on_shutdown: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion(762),
            tick_interval: DEFAULT_TICK_INTERVAL,
            line_spacing: DEFAULT_LINE_SPACING,
            growth_policy: GrowthPolicy::default(),
            teardown_on_shutdown: true,
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config suitable for tests (fast ticks).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }

    /// Set the negotiated protocol version.
    #[must_use]
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set the reconciliation tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the vertical line spacing.
    #[must_use]
    pub fn with_line_spacing(mut self, spacing: f64) -> Self {
        self.line_spacing = spacing;
        self
    }

    /// Set the growth delivery policy.
    #[must_use]
    pub fn with_growth_policy(mut self, policy: GrowthPolicy) -> Self {
        self.growth_policy = policy;
        self
    }

    /// Set whether shutdown sends best-effort removals for everything.
    #[must_use]
    pub fn with_teardown_on_shutdown(mut self, teardown: bool) -> Self {
        self.teardown_on_shutdown = teardown;
        self
    }

    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `HOLO_PROTOCOL_VERSION`,
    /// `HOLO_TICK_INTERVAL_MS`, `HOLO_LINE_SPACING`, `HOLO_GROWTH_POLICY`
    /// (`immediate` or `defer`), `HOLO_TEARDOWN_ON_SHUTDOWN`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            protocol_version: std::env::var("HOLO_PROTOCOL_VERSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.protocol_version, ProtocolVersion),
            tick_interval: std::env::var("HOLO_TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.tick_interval, Duration::from_millis),
            line_spacing: std::env::var("HOLO_LINE_SPACING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.line_spacing),
            growth_policy: std::env::var("HOLO_GROWTH_POLICY")
                .ok()
                .and_then(|v| match v.to_lowercase().as_str() {
                    "immediate" => Some(GrowthPolicy::SpawnImmediately),
                    "defer" => Some(GrowthPolicy::DeferToTick),
                    _ => None,
                })
                .unwrap_or(defaults.growth_policy),
            teardown_on_shutdown: std::env::var("HOLO_TEARDOWN_ON_SHUTDOWN")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(defaults.teardown_on_shutdown),
        }
    }

    /// Check that every value is in its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_spacing < 0.0 {
            return Err(ConfigError::Validation(format!(
                "line_spacing must be non-negative, got {}",
                self.line_spacing
            )));
        }
        if self.tick_interval < Duration::from_millis(10) {
            return Err(ConfigError::Validation(format!(
                "tick_interval must be at least 10ms, got {:?}",
                self.tick_interval
            )));
        }
        Ok(())
    }
}

/// Engine section of the TOML configuration file.
///
/// Every field is optional; unset fields keep their current value when the
/// section is applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineToml {
    /// Negotiated wire protocol version.
    pub protocol_version: Option<u32>,
    /// Reconciliation period in milliseconds.
    pub tick_interval_ms: Option<u64>,
    /// Vertical line spacing in world units.
    pub line_spacing: Option<f64>,
    /// Growth delivery policy: `spawn_immediately` or `defer_to_tick`.
    pub growth_policy: Option<GrowthPolicy>,
    /// Whether shutdown sends best-effort removals.
    pub teardown_on_shutdown: Option<bool>,
}

/// Top-level TOML configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// The `[engine]` section.
    pub engine: EngineToml,
}

impl EngineToml {
    /// Overlay the set fields onto `config`.
    #[must_use]
    pub fn apply(self, mut config: EngineConfig) -> EngineConfig {
        if let Some(version) = self.protocol_version {
            config.protocol_version = ProtocolVersion(version);
        }
        if let Some(ms) = self.tick_interval_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(spacing) = self.line_spacing {
            config.line_spacing = spacing;
        }
        if let Some(policy) = self.growth_policy {
            config.growth_policy = policy;
        }
        if let Some(teardown) = self.teardown_on_shutdown {
            config.teardown_on_shutdown = teardown;
        }
        config
    }
}

/// Load and validate an [`EngineConfig`] from a TOML file.
///
/// The file's `[engine]` section is overlaid onto the defaults.
pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&raw)?;
    let config = file.engine.apply(EngineConfig::default());
    config.validate()?;
    tracing::info!(path = %path.display(), "Loaded engine config");
    Ok(config)
}
