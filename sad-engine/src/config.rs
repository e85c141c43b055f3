use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::segmenter::OutputMode;
use crate::signal::WindowKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub splice: SpliceConfig,
}

/// Detection options: signal selection, framing, model fit and segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 1-based channel index
    #[serde(default = "default_channel")]
    pub channel: u16,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,

    #[serde(default = "default_frame_length_ms")]
    pub frame_length_ms: f64,
    #[serde(default = "default_frame_shift_ms")]
    pub frame_shift_ms: f64,
    #[serde(default)]
    pub window: WindowKind,
    #[serde(default = "default_true")]
    pub log_energy: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_min_silence")]
    pub min_silence: f64,
    #[serde(default)]
    pub output: OutputMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpliceConfig {
    /// Silence appended after every spliced segment
    #[serde(default = "default_pad_ms")]
    pub pad_ms: u32,
}

fn default_channel() -> u16 { 1 }
fn default_frame_length_ms() -> f64 { 20.0 }
fn default_frame_shift_ms() -> f64 { 10.0 }
fn default_true() -> bool { true }
fn default_max_iterations() -> usize { 20 }
fn default_epsilon() -> f64 { 0.0001 }
fn default_min_silence() -> f64 { 0.5 }
fn default_pad_ms() -> u32 { 150 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            start_time: 0.0,
            end_time: None,
            frame_length_ms: default_frame_length_ms(),
            frame_shift_ms: default_frame_shift_ms(),
            window: WindowKind::None,
            log_energy: default_true(),
            max_iterations: default_max_iterations(),
            epsilon: default_epsilon(),
            threshold: 0.0,
            min_silence: default_min_silence(),
            output: OutputMode::Speech,
        }
    }
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            pad_ms: default_pad_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            splice: SpliceConfig::default(),
        }
    }
}

impl Config {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// `$XDG_CONFIG_HOME/mergewav/config.toml`, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mergewav").join("config.toml"))
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Read and parse a config file, failing on any error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config file at {}", path.display()))?;
    let config = toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    Ok(config)
}

/// Load `path`, or the default location when `None`. Missing or invalid files
/// fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("No config directory available, using default config");
            return Config::default();
        }
    };

    if path.is_none() && !config_path.exists() {
        return Config::default();
    }

    match load_config_from(&config_path) {
        Ok(config) => {
            info!("Loaded config from {}", config_path.display());
            config
        }
        Err(e) => {
            warn!("{:#}, using defaults", e);
            Config::default()
        }
    }
}
