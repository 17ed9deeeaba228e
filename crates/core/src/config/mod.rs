use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, VisualizerError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub display: DisplayConfig,
    /// Identifier of the visualization selected on startup.
    pub visualization: String,
    pub options: Options,
    /// Seed for every random source handed to renderers and the classifier.
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            display: DisplayConfig::default(),
            visualization: "spectrum".to_string(),
            options: Options::default(),
            seed: 0x5EED,
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        if self.display.width == 0 || self.display.height == 0 {
            return Err(VisualizerError::msg(format!(
                "display size {}x{} must be non-zero",
                self.display.width, self.display.height
            )));
        }
        if self.display.fps == 0 {
            return Err(VisualizerError::msg("display fps must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration of the analysis tap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Transform window; the tap yields `fft_size / 2` bins.
    pub fft_size: usize,
    /// Smoothing constant applied across captures, in [0, 1].
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl AudioConfig {
    /// Checks the transform size, smoothing constant and decibel range.
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(VisualizerError::msg(format!(
                "fft size {} must be a power of two between 32 and 32768",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(VisualizerError::msg(format!(
                "smoothing {} must lie in [0, 1]",
                self.smoothing
            )));
        }
        if self.max_decibels <= self.min_decibels {
            return Err(VisualizerError::msg(
                "max_decibels must be greater than min_decibels",
            ));
        }
        Ok(())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 60,
        }
    }
}

/// Single value in a renderer options record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(f64),
    Text(String),
    /// Anything else; kept so unknown keys never fail parsing.
    Other(serde_json::Value),
}

/// Flat per-renderer options record. Renderers read the keys they know and
/// ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: OptionValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.set(key, value);
        self
    }

    /// Layers `other` on top of `self`.
    pub fn merge(&mut self, other: &Options) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(OptionValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    /// Reads a 0–2 slider, clamping out-of-range values.
    pub fn slider(&self, key: &str) -> Option<f32> {
        self.number(key).map(|value| value.clamp(0.0, 2.0) as f32)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(OptionValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(OptionValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "visualization": "cosmic", "audio": { "fft_size": 1024 } }"#)
                .unwrap();
        assert_eq!(config.visualization, "cosmic");
        assert_eq!(config.audio.fft_size, 1024);
        assert_eq!(config.audio.smoothing, 0.8);
        assert_eq!(config.display.fps, 60);
    }

    #[test]
    fn load_rejects_invalid_audio_settings() {
        let path = std::env::temp_dir().join("pulse-visualiser-bad-config.json");
        std::fs::write(&path, r#"{ "audio": { "fft_size": 1000 } }"#).unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(err, VisualizerError::Message(ref m) if m.contains("1000")));
    }

    #[test]
    fn validate_checks_every_section() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.audio.max_decibels = config.audio.min_decibels;
        assert!(matches!(config.validate(), Err(VisualizerError::Message(_))));

        let mut config = AppConfig::default();
        config.audio.smoothing = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.display.fps = 0;
        assert!(matches!(config.validate(), Err(VisualizerError::Message(_))));
    }

    #[test]
    fn options_parse_mixed_values() {
        let options: Options = serde_json::from_str(
            r#"{ "brightness": 3.5, "snow": true, "theme": "warm", "mystery": [1, 2] }"#,
        )
        .unwrap();

        assert_eq!(options.slider("brightness"), Some(2.0));
        assert_eq!(options.flag("snow"), Some(true));
        assert_eq!(options.text("theme"), Some("warm"));
        assert_eq!(options.number("snow"), None);
        assert_eq!(options.flag("missing"), None);
    }

    #[test]
    fn merge_overrides_existing_keys() {
        let mut base = Options::new().with("reactivity", OptionValue::Number(1.0));
        base.merge(&Options::new().with("reactivity", OptionValue::Number(0.5)));
        assert_eq!(base.slider("reactivity"), Some(0.5));
    }
}
