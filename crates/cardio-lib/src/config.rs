use crate::conditioning::ConditioningConfig;
use crate::error::{ConfigError, Result};
use crate::labeler::LabelerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything the conditioning and auto-labeling stages need, owned by the caller.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// window_seconds = 10.0
///
/// [conditioning]
/// high_hz = 35.0
///
/// [[labeler.rules]]
/// label = "tachy"
/// kind = "rate_above"
/// bpm = 110.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds per labeled window
    pub window_seconds: f64,
    pub conditioning: ConditioningConfig,
    pub labeler: LabelerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_seconds: 5.0,
            conditioning: ConditioningConfig::default(),
            labeler: LabelerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validated()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    /// Check ranges and pin the filter backend to one this build provides.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.conditioning.validate()?;
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(ConfigError::InvalidWindow {
                seconds: self.window_seconds,
                sampling_rate: f64::NAN,
            });
        }
        self.conditioning.backend = self.conditioning.backend.resolve();
        Ok(self)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioning::FilterBackend;
    use crate::labeler::Criterion;
    use crate::signal::Label;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let cfg = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.window_seconds, 5.0);
        assert_eq!(cfg.conditioning.low_hz, 0.5);
        assert_eq!(cfg.conditioning.high_hz, 40.0);
        assert_eq!(cfg.labeler.rules.rules.len(), 3);
        assert_eq!(cfg.labeler.peaks.min_distance_s, 0.35);
    }

    #[test]
    fn partial_override() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            window_seconds = 10.0

            [conditioning]
            high_hz = 35.0
            backend = "spectral"

            [[labeler.rules]]
            label = "afib"
            kind = "rr_variability"
            max_cv = 0.3

            [[labeler.rules]]
            label = "st_elevation"
            kind = "st_offset"
            ratio = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window_seconds, 10.0);
        assert_eq!(cfg.conditioning.low_hz, 0.5);
        assert_eq!(cfg.conditioning.high_hz, 35.0);
        assert_eq!(cfg.conditioning.backend, FilterBackend::Spectral);
        let rules = &cfg.labeler.rules.rules;
        assert_eq!(rules[0].label, Label::Afib);
        assert_eq!(rules[1].criterion, Criterion::StOffset { ratio: 0.8 });
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            PipelineConfig::from_toml_str("window_seconds = 0.0"),
            Err(ConfigError::InvalidWindow { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[conditioning]\nlow_hz = 50.0"),
            Err(ConfigError::InvalidBand { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("window_seconds = \"five\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_round_trip_and_file_loading() {
        let text = PipelineConfig::default().to_toml_string().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let loaded = PipelineConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded, PipelineConfig::default().validated().unwrap());
    }
}
