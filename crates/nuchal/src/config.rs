//! Pipeline configuration.
//!
//! Every section falls back to its defaults when absent from the JSON file,
//! so a config only needs to name what it changes.

use std::fmt;
use std::path::Path;

use crate::denoise::DenoiseConfig;
use crate::detection::DetectionConfig;
use crate::mask::MaskConfig;
use crate::nt::{CalibrationError, PixelCalibration};

/// Segmentation-path parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Model working width in pixels.
    pub input_width: u32,
    /// Model working height in pixels.
    pub input_height: u32,
    pub mask: MaskConfig,
    /// Frequency-domain denoising before inference; `None` skips it.
    pub denoise: Option<DenoiseConfig>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            input_width: 600,
            input_height: 400,
            mask: MaskConfig::default(),
            denoise: None,
        }
    }
}

impl SegmentationConfig {
    pub fn working_size(&self) -> [u32; 2] {
        [self.input_width, self.input_height]
    }
}

/// Top-level configuration for both service paths and the measurement.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub detection: DetectionConfig,
    pub calibration: PixelCalibration,
}

/// Failure to load a [`PipelineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Calibration(CalibrationError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "invalid config JSON: {e}"),
            Self::Calibration(e) => write!(f, "invalid calibration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Calibration(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<CalibrationError> for ConfigError {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

impl PipelineConfig {
    /// Parse from a JSON string and validate the calibration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.calibration.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoise::DenoiseMode;

    #[test]
    fn empty_object_is_all_defaults() {
        let cfg = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.segmentation.working_size(), [600, 400]);
        assert_eq!(cfg.segmentation.mask.threshold, 0.5);
        assert!(cfg.segmentation.denoise.is_none());
        assert_eq!(cfg.detection.score_threshold, 0.3);
        assert_eq!(cfg.calibration.pixel_size_mm, 0.18);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let json = r#"{
            "segmentation": {"mask": {"threshold": 0.7}, "denoise": {"mode": "noise"}},
            "calibration": {"pixel_size_mm": 0.1}
        }"#;
        let cfg = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.segmentation.mask.threshold, 0.7);
        assert_eq!(cfg.segmentation.input_width, 600);
        let dn = cfg.segmentation.denoise.unwrap();
        assert_eq!(dn.mode, DenoiseMode::Noise);
        assert_eq!(dn.alpha, 0.5);
        assert_eq!(cfg.calibration.pixel_size_mm, 0.1);
        assert_eq!(cfg.detection.labels.len(), 9);
    }

    #[test]
    fn serialized_defaults_round_trip() {
        let json = serde_json::to_string_pretty(&PipelineConfig::default()).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn bad_inputs_are_typed_errors() {
        assert!(matches!(
            PipelineConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"calibration": {"pixel_size_mm": -1.0}}"#),
            Err(ConfigError::Calibration(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_file(Path::new("/nonexistent/nuchal.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
