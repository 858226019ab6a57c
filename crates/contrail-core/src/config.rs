//! Configuration loading and typed config structures for Contrail.
//!
//! The canonical configuration lives in `contrail-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads and validates the file once at startup.
//!
//! The `particles` and `messages` sections are required: a document
//! without them fails to load and the service refuses to start. Every
//! field inside a section has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use contrail_types::{EffectKind, Variant};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content, including missing required sections.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The document parsed but holds values the service cannot run with.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `contrail-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContrailConfig {
    /// Trail emission settings. Required.
    pub particles: ParticleConfig,

    /// Player-facing command replies. Required.
    pub messages: MessagesConfig,

    /// Scheduler clock settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Preference persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ContrailConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CONTRAIL_PLAYERS_FILE` overrides `storage.players_file` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML or lacks a
    /// required section, or [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// lacks a required section, or [`ConfigError::Invalid`] if
    /// validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.storage.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the scheduler relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particles.frequency == 0 {
            return Err(ConfigError::Invalid {
                reason: "particles.frequency must be at least 1".to_owned(),
            });
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if !self.particles.speed.is_finite() || self.particles.speed < 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "particles.speed must be a finite non-negative number, got {}",
                    self.particles.speed
                ),
            });
        }
        Ok(())
    }

    /// Real-time period between two firings of one emitter.
    pub fn firing_period(&self) -> Duration {
        self.scheduler.period_of(self.particles.frequency)
    }
}

/// Trail emission settings (the `particles` section).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticleConfig {
    /// Master switch. When false no emitter is ever activated by movement.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scheduler ticks between two firings of the same emitter.
    #[serde(default = "default_frequency")]
    pub frequency: u32,

    /// Host particle type spawned by every firing.
    #[serde(default, rename = "type")]
    pub effect: EffectKind,

    /// Iterations per firing.
    #[serde(default = "default_amount")]
    pub amount: u32,

    /// Host speed parameter forwarded with each particle.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Variant used when a player never named one.
    #[serde(default = "default_variant")]
    pub default_variant: Variant,

    /// Display gating.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: default_frequency(),
            effect: EffectKind::default(),
            amount: default_amount(),
            speed: default_speed(),
            default_variant: default_variant(),
            display: DisplayConfig::default(),
        }
    }
}

/// Display gating (the `particles.display` section).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayConfig {
    /// Emit while the player is flying. A firing produces output only when
    /// this flag is set and the host reports the player as flying.
    #[serde(default = "default_true")]
    pub when_flying: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { when_flying: true }
    }
}

/// Player-facing replies (the `messages` section).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagesConfig {
    /// Sent after a toggle turns the trail on.
    #[serde(default = "default_particles_enabled")]
    pub particles_enabled: String,

    /// Sent after a toggle turns the trail off.
    #[serde(default = "default_particles_disabled")]
    pub particles_disabled: String,

    /// Sent when the requested variant is already running.
    #[serde(default = "default_particles_already_enabled")]
    pub particles_already_enabled: String,

    /// Sent when the command argument is not a known variant.
    #[serde(default = "default_invalid_type")]
    pub invalid_type: String,

    /// Sent when the player lacks the show permission.
    #[serde(default = "default_no_permission")]
    pub no_permission: String,

    /// Sent when a non-player runs the command.
    #[serde(default = "default_command_only_for_players")]
    pub command_only_for_players: String,

    /// Sent when a toggle arrives after shutdown has begun.
    #[serde(default = "default_particles_unavailable")]
    pub particles_unavailable: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            particles_enabled: default_particles_enabled(),
            particles_disabled: default_particles_disabled(),
            particles_already_enabled: default_particles_already_enabled(),
            invalid_type: default_invalid_type(),
            no_permission: default_no_permission(),
            command_only_for_players: default_command_only_for_players(),
            particles_unavailable: default_particles_unavailable(),
        }
    }
}

/// Scheduler clock settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Real-time milliseconds per scheduler tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl SchedulerConfig {
    /// Duration of `ticks` scheduler ticks, saturating on overflow.
    pub fn period_of(&self, ticks: u32) -> Duration {
        Duration::from_millis(self.tick_interval_ms.saturating_mul(u64::from(ticks)))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Preference persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// YAML file holding per-player preferences.
    #[serde(default = "default_players_file")]
    pub players_file: PathBuf,
}

impl StorageConfig {
    /// Override the players file with `CONTRAIL_PLAYERS_FILE` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONTRAIL_PLAYERS_FILE") {
            self.players_file = PathBuf::from(val);
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            players_file: default_players_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_frequency() -> u32 {
    1
}

const fn default_amount() -> u32 {
    10
}

const fn default_speed() -> f64 {
    1.0
}

const fn default_variant() -> Variant {
    Variant::Rainbow
}

const fn default_tick_interval_ms() -> u64 {
    50
}

fn default_players_file() -> PathBuf {
    PathBuf::from("players.yml")
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_particles_enabled() -> String {
    "Particles enabled.".to_owned()
}

fn default_particles_disabled() -> String {
    "Particles disabled.".to_owned()
}

fn default_particles_already_enabled() -> String {
    "Particles are already enabled with this type!".to_owned()
}

fn default_invalid_type() -> String {
    "Invalid particle type! Use 'rainbow' or 'cloud'.".to_owned()
}

fn default_no_permission() -> String {
    "You don't have permission to use this command!".to_owned()
}

fn default_particles_unavailable() -> String {
    "Particles are unavailable right now.".to_owned()
}

fn default_command_only_for_players() -> String {
    "This command can only be used by players!".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ContrailConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.particles.enabled);
        assert_eq!(config.particles.frequency, 1);
        assert_eq!(config.particles.amount, 10);
        assert_eq!(config.particles.effect.as_str(), "REDSTONE");
        assert_eq!(config.particles.default_variant, Variant::Rainbow);
        assert!(config.particles.display.when_flying);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
particles:
  enabled: false
  frequency: 4
  type: FLAME
  amount: 3
  speed: 0.5
  default_variant: cloud
  display:
    when_flying: false

messages:
  particles_enabled: "On!"
  particles_disabled: "Off!"
  particles_already_enabled: "Already!"
  invalid_type: "Nope"
  no_permission: "Denied"
  command_only_for_players: "Players only"

scheduler:
  tick_interval_ms: 100

logging:
  level: "debug"
"#;

        let config = ContrailConfig::parse(yaml).unwrap();

        assert!(!config.particles.enabled);
        assert_eq!(config.particles.frequency, 4);
        assert_eq!(config.particles.effect.as_str(), "FLAME");
        assert_eq!(config.particles.amount, 3);
        assert_eq!(config.particles.default_variant, Variant::Cloud);
        assert!(!config.particles.display.when_flying);
        assert_eq!(config.messages.particles_enabled, "On!");
        assert_eq!(config.messages.command_only_for_players, "Players only");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.firing_period(), Duration::from_millis(400));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "particles:\n  amount: 7\nmessages: {}\n";
        let config = ContrailConfig::parse(yaml).unwrap();

        // Amount is overridden
        assert_eq!(config.particles.amount, 7);
        // Everything else uses defaults
        assert_eq!(config.particles.frequency, 1);
        assert_eq!(config.messages, MessagesConfig::default());
        assert_eq!(config.firing_period(), Duration::from_millis(50));
    }

    #[test]
    fn missing_particles_section_is_fatal() {
        let result = ContrailConfig::parse("messages: {}\n");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_messages_section_is_fatal() {
        let result = ContrailConfig::parse("particles: {}\n");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let result = ContrailConfig::parse("particles:\n  frequency: 0\nmessages: {}\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let yaml = "particles: {}\nmessages: {}\nscheduler:\n  tick_interval_ms: 0\n";
        let result = ContrailConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn negative_speed_is_rejected() {
        let result = ContrailConfig::parse("particles:\n  speed: -1.0\nmessages: {}\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn unknown_default_variant_is_rejected() {
        let result =
            ContrailConfig::parse("particles:\n  default_variant: sparkle\nmessages: {}\n");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn period_saturates() {
        let scheduler = SchedulerConfig {
            tick_interval_ms: u64::MAX,
        };
        assert_eq!(scheduler.period_of(2), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("contrail-config.yaml");
        if path.exists() {
            let config = ContrailConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
