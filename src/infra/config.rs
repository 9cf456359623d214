//! Configuration loading from TOML files
//!
//! Config file is selected via `--config <path>` (default: config/dev.toml).
//! Every section and field is optional; missing values take the defaults below.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the listing/image backend
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_api_base_url(), timeout_ms: default_api_timeout_ms() }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TourConfig {
    /// Delay between applying a texture and clearing the loading flag
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Upper bound on waiting for the scene readiness signal
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
    /// Per-probe download timeout (0 disables)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Memoize probe results per image id
    #[serde(default = "default_probe_cache")]
    pub probe_cache: bool,
    #[serde(default = "default_panorama_ratio")]
    pub panorama_ratio: f64,
    /// Flat image plane placement, in scene units
    #[serde(default = "default_plane_position")]
    pub plane_position: [f32; 3],
    #[serde(default = "default_plane_width")]
    pub plane_width: f32,
    #[serde(default = "default_plane_height")]
    pub plane_height: f32,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_cache: default_probe_cache(),
            panorama_ratio: default_panorama_ratio(),
            plane_position: default_plane_position(),
            plane_width: default_plane_width(),
            plane_height: default_plane_height(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    750
}

fn default_readiness_timeout_ms() -> u64 {
    500
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_probe_cache() -> bool {
    true
}

fn default_panorama_ratio() -> f64 {
    crate::domain::types::PANORAMA_MIN_RATIO
}

fn default_plane_position() -> [f32; 3] {
    [0.0, 2.0, -5.0]
}

fn default_plane_width() -> f32 {
    8.0
}

fn default_plane_height() -> f32 {
    6.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_lang")]
    pub lang: String,
    /// Auto-stop after this long without a recognition event
    #[serde(default = "default_voice_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Final transcripts must exceed this recognizer confidence to be used
    #[serde(default = "default_forward_confidence")]
    pub forward_confidence: f32,
    /// Classified commands below this confidence are discarded
    #[serde(default = "default_command_threshold")]
    pub command_threshold: f32,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            lang: default_voice_lang(),
            idle_timeout_ms: default_voice_idle_timeout_ms(),
            forward_confidence: default_forward_confidence(),
            command_threshold: default_command_threshold(),
            history_len: default_history_len(),
        }
    }
}

fn default_voice_lang() -> String {
    "en-US".to_string()
}

fn default_voice_idle_timeout_ms() -> u64 {
    3000
}

fn default_forward_confidence() -> f32 {
    0.5
}

fn default_command_threshold() -> f32 {
    0.3
}

fn default_history_len() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs(), prometheus_port: 0 }
    }
}

fn default_metrics_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tour: TourConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_timeout_ms: u64,
    settle_delay_ms: u64,
    readiness_timeout_ms: u64,
    probe_timeout_ms: u64,
    probe_cache: bool,
    panorama_ratio: f64,
    plane_position: [f32; 3],
    plane_width: f32,
    plane_height: f32,
    voice_lang: String,
    voice_idle_timeout_ms: u64,
    forward_confidence: f32,
    command_threshold: f32,
    history_len: usize,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            api_base_url: toml_config.api.base_url.trim_end_matches('/').to_string(),
            api_timeout_ms: toml_config.api.timeout_ms,
            settle_delay_ms: toml_config.tour.settle_delay_ms,
            readiness_timeout_ms: toml_config.tour.readiness_timeout_ms,
            probe_timeout_ms: toml_config.tour.probe_timeout_ms,
            probe_cache: toml_config.tour.probe_cache,
            panorama_ratio: toml_config.tour.panorama_ratio,
            plane_position: toml_config.tour.plane_position,
            plane_width: toml_config.tour.plane_width,
            plane_height: toml_config.tour.plane_height,
            voice_lang: toml_config.voice.lang,
            voice_idle_timeout_ms: toml_config.voice.idle_timeout_ms,
            forward_confidence: toml_config.voice.forward_confidence,
            command_threshold: toml_config.voice.command_threshold,
            history_len: toml_config.voice.history_len.max(1),
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Per-probe timeout, `None` when disabled
    pub fn probe_timeout(&self) -> Option<Duration> {
        (self.probe_timeout_ms > 0).then(|| Duration::from_millis(self.probe_timeout_ms))
    }

    pub fn probe_cache(&self) -> bool {
        self.probe_cache
    }

    pub fn panorama_ratio(&self) -> f64 {
        self.panorama_ratio
    }

    pub fn plane_position(&self) -> [f32; 3] {
        self.plane_position
    }

    pub fn plane_width(&self) -> f32 {
        self.plane_width
    }

    pub fn plane_height(&self) -> f32 {
        self.plane_height
    }

    pub fn voice_lang(&self) -> &str {
        &self.voice_lang
    }

    pub fn voice_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.voice_idle_timeout_ms)
    }

    pub fn forward_confidence(&self) -> f32 {
        self.forward_confidence
    }

    pub fn command_threshold(&self) -> f32 {
        self.command_threshold
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to shorten the settle delay
    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Builder method for tests to shorten the scene readiness wait
    pub fn with_readiness_timeout_ms(mut self, ms: u64) -> Self {
        self.readiness_timeout_ms = ms;
        self
    }

    /// Builder method for tests to shorten the voice idle timeout
    pub fn with_voice_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.voice_idle_timeout_ms = ms;
        self
    }

    /// Builder method for tests to point at a local backend
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Builder method for tests to toggle probe memoization
    pub fn with_probe_cache(mut self, enabled: bool) -> Self {
        self.probe_cache = enabled;
        self
    }
}
