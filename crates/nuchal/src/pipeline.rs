//! End-to-end segmentation and detection paths around an external model.

use std::fmt;

use image::GrayImage;

use crate::config::SegmentationConfig;
use crate::denoise::denoise;
use crate::detection::{decode_detections, BoundingBoxDetection, DetectionConfig, DetectionError};
use crate::ellipse::{fit_mask_ellipse, FittedEllipse};
use crate::mask::{binarize_probabilities, BinaryMask, ProbabilityMap};
use crate::model::{DetectionModel, InferenceError, SegmentationModel};
use crate::nt::{nt_endpoints, NtEndpointPair, NtMeasurement, PixelCalibration};
use crate::preprocess::{prepare_input, InputNormalization};
use crate::SegPrediction;

/// Failure of a pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    /// The frame has zero width or height.
    EmptyImage,
    /// The model runtime failed; surfaced unchanged.
    Inference(InferenceError),
    /// The detection head output did not match the label table.
    Detection(DetectionError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyImage => write!(f, "image has no pixels"),
            Self::Inference(e) => write!(f, "{e}"),
            Self::Detection(e) => write!(f, "cannot decode detections: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EmptyImage => None,
            Self::Inference(e) => Some(e),
            Self::Detection(e) => Some(e),
        }
    }
}

impl From<InferenceError> for PipelineError {
    fn from(e: InferenceError) -> Self {
        Self::Inference(e)
    }
}

impl From<DetectionError> for PipelineError {
    fn from(e: DetectionError) -> Self {
        Self::Detection(e)
    }
}

/// Mask, ellipse and NT endpoints for one frame.
///
/// `ellipse` and `endpoints` are `None` when the mask has no foreground.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    pub mask: BinaryMask,
    pub ellipse: Option<FittedEllipse>,
    pub endpoints: Option<NtEndpointPair>,
}

impl SegmentationResult {
    /// Wire form returned to the annotation front end.
    pub fn to_prediction(&self) -> SegPrediction {
        SegPrediction {
            seg_mask: self.mask.to_rows(),
            tn_endpoints: self.endpoints.map(|p| p.to_wire()),
        }
    }

    /// Millimetre measurement, when endpoints exist.
    pub fn measurement(&self, calibration: &PixelCalibration) -> Option<NtMeasurement> {
        self.endpoints.as_ref().map(|p| calibration.measure(p))
    }
}

/// Segmentation path: denoise → model → mask → ellipse → NT endpoints.
#[derive(Debug, Clone, Default)]
pub struct NtMeasurer {
    config: SegmentationConfig,
}

impl NtMeasurer {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Run the full path on a frame with `model`.
    pub fn measure<M>(
        &self,
        img: &GrayImage,
        model: &M,
    ) -> Result<SegmentationResult, PipelineError>
    where
        M: SegmentationModel + ?Sized,
    {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(PipelineError::EmptyImage);
        }

        let denoised;
        let frame = match &self.config.denoise {
            Some(dn) => {
                denoised = denoise(img, dn);
                &denoised
            }
            None => img,
        };

        let input = prepare_input(
            frame,
            self.config.working_size(),
            InputNormalization::UnitRange,
        );
        let probs = model.segment(&input)?;
        Ok(self.measure_probabilities(&probs, [w, h]))
    }

    /// Post-process a probability map for a frame of `original_size = [w, h]`.
    pub fn measure_probabilities(
        &self,
        probs: &ProbabilityMap,
        original_size: [u32; 2],
    ) -> SegmentationResult {
        let mask = binarize_probabilities(probs, original_size, &self.config.mask);
        let ellipse = fit_mask_ellipse(&mask);
        let endpoints = ellipse.as_ref().map(nt_endpoints);
        match (&ellipse, &endpoints) {
            (Some(e), Some(p)) => tracing::debug!(
                "ellipse center=({:.1}, {:.1}) axes={:.1}/{:.1} angle={:.1}; NT {:.2} px",
                e.center_x,
                e.center_y,
                e.major_axis,
                e.minor_axis,
                e.angle,
                p.distance_px()
            ),
            _ => tracing::debug!("no foreground in segmentation mask; no NT measurement"),
        }
        SegmentationResult {
            mask,
            ellipse,
            endpoints,
        }
    }
}

/// Detection path: model → per-class gating → pixel boxes.
#[derive(Debug, Clone, Default)]
pub struct AnatomyDetector {
    config: DetectionConfig,
}

impl AnatomyDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn detect<M>(
        &self,
        img: &GrayImage,
        model: &M,
    ) -> Result<Vec<BoundingBoxDetection>, PipelineError>
    where
        M: DetectionModel + ?Sized,
    {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(PipelineError::EmptyImage);
        }
        let working = [self.config.input_width, self.config.input_height];
        let input = prepare_input(img, working, InputNormalization::Symmetric);
        let out = model.detect(&input)?;
        Ok(decode_detections(&out.class_scores, &out.boxes, [w, h], &self.config)?)
    }
}
