//! Bridge configuration file
//!
//! A single TOML document. Every section and field is optional; missing
//! entries fall back to the defaults below. A missing file is created with
//! the defaults on first start.

use crate::modifiers::{
    event_override::{DEFAULT_QUEUE_SIZE, DEFAULT_STEP},
    Deadzone, EventOverride, HairTrigger, OverrideSender, RecoilCompensation,
};
use crate::pipeline::{Modifier, PipelineSettings};
use crate::transport::{self, DEFAULT_BAUD};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Level};

pub const CONFIG_ENV: &str = "XSERIALONE_CONFIG";
const CONFIG_DIR: &str = "xserialone";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown log level: {0}")]
    InvalidLogLevel(String),

    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub log_level: String,
    /// Log every generated and transformed frame at debug level
    pub trace_frames: bool,
    pub serial: SerialConfig,
    pub pipeline: PipelineConfig,
    pub deadzone: DeadzoneConfig,
    pub recoil: RecoilConfig,
    pub hair_trigger: HairTriggerConfig,
    pub event_override: EventOverrideConfig,
    pub gamepad: GamepadConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trace_frames: false,
            serial: SerialConfig::default(),
            pipeline: PipelineConfig::default(),
            deadzone: DeadzoneConfig::default(),
            recoil: RecoilConfig::default(),
            hair_trigger: HairTriggerConfig::default(),
            event_override: EventOverrideConfig::default(),
            gamepad: GamepadConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name; `mock` or empty runs without hardware
    pub port: String,
    pub baud: u32,
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "mock".to_string(),
            baud: DEFAULT_BAUD,
            write_timeout_ms: transport::DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SerialConfig {
    pub fn is_mock(&self) -> bool {
        transport::is_mock_identifier(&self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum time between two transport writes
    pub send_interval_ms: u64,
    pub loop_yield_ms: u64,
    pub stats_interval_secs: u64,
    pub observer_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            send_interval_ms: settings.send_interval.as_millis() as u64,
            loop_yield_ms: settings.loop_yield.as_millis() as u64,
            stats_interval_secs: settings.stats_interval.as_secs(),
            observer_capacity: crate::observer::DEFAULT_TAP_CAPACITY,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeadzoneConfig {
    pub enabled: bool,
    pub left: f32,
    pub right: f32,
}

impl Default for DeadzoneConfig {
    fn default() -> Self {
        let deadzone = Deadzone::default();
        Self {
            enabled: true,
            left: deadzone.left,
            right: deadzone.right,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RecoilConfig {
    pub enabled: bool,
    pub strength: f32,
    pub threshold: f32,
}

impl Default for RecoilConfig {
    fn default() -> Self {
        let recoil = RecoilCompensation::default();
        Self {
            enabled: false,
            strength: recoil.strength,
            threshold: recoil.threshold,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HairTriggerConfig {
    pub enabled: bool,
    pub threshold: f32,
}

impl Default for HairTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: HairTrigger::default().threshold,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EventOverrideConfig {
    pub enabled: bool,
    pub step: f32,
    pub queue_size: usize,
    /// Read `left` / `right` lines from stdin
    pub stdin: bool,
}

impl Default for EventOverrideConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            step: DEFAULT_STEP,
            queue_size: DEFAULT_QUEUE_SIZE,
            stdin: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct GamepadConfig {
    /// Index into the connected pads; first pad when unset
    pub index: Option<usize>,
}

impl BridgeConfig {
    /// `$XSERIALONE_CONFIG`, otherwise the per-user config directory
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut base = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        base.push(CONFIG_DIR);
        base.push(CONFIG_FILE);
        base
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Writes the defaults if nothing exists at `path` yet
    pub async fn ensure_default(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }
        info!("Creating default configuration at {}", path.display());
        Self::default().save(path).await
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;

        if self.serial.baud == 0 {
            return Err(ConfigError::Zero("serial.baud"));
        }
        if self.serial.write_timeout_ms == 0 {
            return Err(ConfigError::Zero("serial.write_timeout_ms"));
        }
        if self.pipeline.stats_interval_secs == 0 {
            return Err(ConfigError::Zero("pipeline.stats_interval_secs"));
        }
        if self.pipeline.observer_capacity == 0 {
            return Err(ConfigError::Zero("pipeline.observer_capacity"));
        }
        if self.event_override.queue_size == 0 {
            return Err(ConfigError::Zero("event_override.queue_size"));
        }

        check_range("deadzone.left", self.deadzone.left, 0.0, 1.0)?;
        check_range("deadzone.right", self.deadzone.right, 0.0, 1.0)?;
        check_range("recoil.strength", self.recoil.strength, -1.0, 1.0)?;
        check_range("recoil.threshold", self.recoil.threshold, -1.0, 1.0)?;
        check_range("hair_trigger.threshold", self.hair_trigger.threshold, -1.0, 1.0)?;
        check_range("event_override.step", self.event_override.step, 0.0, 2.0)?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .trim()
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            send_interval: Duration::from_millis(self.pipeline.send_interval_ms),
            loop_yield: Duration::from_millis(self.pipeline.loop_yield_ms),
            stats_interval: Duration::from_secs(self.pipeline.stats_interval_secs),
        }
    }

    /// Enabled modifiers in application order: deadzone, recoil, hair
    /// trigger, event override. The sender is returned when the override is
    /// enabled so an event source can be wired to it.
    pub fn build_modifiers(&self) -> (Vec<Box<dyn Modifier>>, Option<OverrideSender>) {
        let mut modifiers: Vec<Box<dyn Modifier>> = Vec::new();
        let mut sender = None;

        if self.deadzone.enabled {
            modifiers.push(Box::new(Deadzone::new(self.deadzone.left, self.deadzone.right)));
        }
        if self.recoil.enabled {
            modifiers.push(Box::new(RecoilCompensation::new(
                self.recoil.strength,
                self.recoil.threshold,
            )));
        }
        if self.hair_trigger.enabled {
            modifiers.push(Box::new(HairTrigger::new(self.hair_trigger.threshold)));
        }
        if self.event_override.enabled {
            let (tx, modifier) =
                EventOverride::channel(self.event_override.step, self.event_override.queue_size);
            modifiers.push(Box::new(modifier));
            sender = Some(tx);
        }

        (modifiers, sender)
    }
}

fn check_range(field: &'static str, value: f32, min: f64, max: f64) -> Result<(), ConfigError> {
    let value = f64::from(value);
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
