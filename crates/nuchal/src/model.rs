//! Inference seam.
//!
//! Network execution lives outside this crate. Hosts implement these traits
//! over whatever runtime holds the loaded model; the pipelines only borrow the
//! model, so one instance can serve concurrent requests when it is `Sync`.

use std::error::Error;
use std::fmt;

use crate::mask::ProbabilityMap;
use crate::preprocess::InputTensor;

/// Segmentation network: input tensor → per-pixel foreground probability.
pub trait SegmentationModel {
    fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError>;
}

/// Box-regression network: input tensor → per-class scores and relative boxes.
pub trait DetectionModel {
    fn detect(&self, input: &InputTensor) -> Result<DetectionOutput, InferenceError>;
}

/// Raw detection-head output, one entry per class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionOutput {
    pub class_scores: Vec<f32>,
    /// `[x_center, y_center, width, height]`, relative to the frame.
    pub boxes: Vec<[f32; 4]>,
}

/// Failure reported by the inference runtime. Passed through unchanged.
#[derive(Debug)]
pub struct InferenceError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inference failed: {}", self.message)?;
        if let Some(src) = &self.source {
            write!(f, " ({src})")?;
        }
        Ok(())
    }
}

impl Error for InferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "session closed");
        let err = InferenceError::with_source("segmentation", io);
        assert_eq!(err.message(), "segmentation");
        assert!(err.to_string().contains("session closed"));
        assert!(err.source().is_some());
        assert!(InferenceError::new("no model loaded").source().is_none());
    }
}
