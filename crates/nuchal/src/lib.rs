//! nuchal — post-inference core for first-trimester fetal ultrasound screening.
//!
//! The crate turns raw model outputs into clinical measurements. It never runs
//! a network itself: inference is reached through the [`SegmentationModel`]
//! and [`DetectionModel`] traits, and everything around them is pure,
//! synchronous image processing and geometry.
//!
//! Stages:
//!
//! 1. **Denoise** – optional frequency-domain band masking of the frame.
//! 2. **Preprocess** – Lanczos resize to the model working size + normalisation.
//! 3. **Mask** – probability map → binary mask at the original resolution.
//! 4. **Ellipse** – largest external contour → direct least-squares ellipse.
//! 5. **NT** – minor-axis endpoints and the pixel → millimetre conversion.
//! 6. **Detection** – per-class score gating and relative → absolute boxes.
//!
//! # Public API
//! - [`NtMeasurer`] and [`AnatomyDetector`] run the two service paths.
//! - The stage functions ([`denoise`], [`binarize_probabilities`],
//!   [`fit_mask_ellipse`], [`nt_endpoints`], [`decode_detections`]) are
//!   exposed for callers that already hold intermediate results.
//! - Request/response structures below mirror the JSON bodies exchanged with
//!   the annotation front end.

mod config;
mod denoise;
mod detection;
mod ellipse;
mod mask;
mod model;
mod nt;
mod pipeline;
mod preprocess;
mod raster;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{ConfigError, PipelineConfig, SegmentationConfig};
pub use denoise::{
    band_thresholds, denoise, frequency_mask, BandThresholds, DenoiseConfig, DenoiseMode,
    FrequencySpectrum,
};
pub use detection::{
    decode_detections, BoundingBoxDetection, DetectionConfig, DetectionError, LabelTable,
    ANATOMY_LABELS,
};
pub use ellipse::{
    find_external_contours, fit_ellipse_to_points, fit_mask_ellipse, largest_contour, Contour,
    FittedEllipse,
};
pub use mask::{binarize_probabilities, BinaryMask, MaskConfig, ProbabilityMap};
pub use model::{DetectionModel, DetectionOutput, InferenceError, SegmentationModel};
pub use nt::{nt_endpoints, CalibrationError, NtEndpointPair, NtMeasurement, PixelCalibration};
pub use pipeline::{AnatomyDetector, NtMeasurer, PipelineError, SegmentationResult};
pub use preprocess::{prepare_input, InputNormalization, InputTensor};
pub use raster::{gray_from_rows, rows_from_gray, RasterError};

/// Request body shared by both services: a grayscale frame as row-major rows.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageRequest {
    /// Pixel rows, top to bottom, each value in 0..=255.
    pub data: Vec<Vec<u8>>,
}

impl ImageRequest {
    /// Convert to an owned grayscale image, rejecting empty or ragged input.
    pub fn to_gray(&self) -> Result<image::GrayImage, RasterError> {
        gray_from_rows(&self.data)
    }
}

/// Segmentation service payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegPrediction {
    /// Binary mask rows at the original image resolution (0 or 1).
    pub seg_mask: Vec<Vec<u8>>,
    /// NT minor-axis endpoints `[[x, y], [x, y]]`, or null when the mask is empty.
    pub tn_endpoints: Option<[[f64; 2]; 2]>,
}

/// Segmentation service response envelope.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegPredictionResponse {
    /// Prediction for the submitted frame.
    pub prediction: SegPrediction,
}

/// One box emitted by the detection service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxPrediction {
    /// Anatomical structure name from the active label table.
    pub class_name: String,
    /// Left edge in original-image pixels.
    pub x_min: f64,
    /// Top edge in original-image pixels.
    pub y_min: f64,
    /// Box width in original-image pixels.
    pub width: f64,
    /// Box height in original-image pixels.
    pub height: f64,
}

impl From<&BoundingBoxDetection> for BoxPrediction {
    fn from(d: &BoundingBoxDetection) -> Self {
        Self {
            class_name: d.class_name.clone(),
            x_min: d.x_min,
            y_min: d.y_min,
            width: d.width,
            height: d.height,
        }
    }
}

/// Detection service response envelope.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxPredictionResponse {
    /// Detections in label-table order.
    pub predictions: Vec<BoxPrediction>,
}

impl BoxPredictionResponse {
    /// Build the response body from decoded detections.
    pub fn from_detections(detections: &[BoundingBoxDetection]) -> Self {
        Self {
            predictions: detections.iter().map(BoxPrediction::from).collect(),
        }
    }
}

/// Raw detection-head output captured offline, paired with the frame size.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawDetectionInput {
    /// Per-class confidence, in label-table order.
    pub class_scores: Vec<f32>,
    /// Per-class `[x_center, y_center, width, height]`, relative to the frame.
    pub boxes: Vec<[f32; 4]>,
    /// Original frame width in pixels.
    pub image_width: u32,
    /// Original frame height in pixels.
    pub image_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seg_prediction_serializes_null_endpoints() {
        let p = SegPrediction {
            seg_mask: vec![vec![0, 1], vec![1, 0]],
            tn_endpoints: None,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["tn_endpoints"], serde_json::Value::Null);
        assert_eq!(json["seg_mask"][0][1], 1);
    }

    #[test]
    fn image_request_rejects_out_of_range_pixels() {
        let bad = r#"{"data": [[0, 256]]}"#;
        assert!(serde_json::from_str::<ImageRequest>(bad).is_err());

        let ok: ImageRequest = serde_json::from_str(r#"{"data": [[0, 255], [7, 9]]}"#).unwrap();
        let img = ok.to_gray().unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 1)[0], 7);
    }

    #[test]
    fn box_response_keeps_detection_order() {
        let dets = vec![
            BoundingBoxDetection {
                class_index: 1,
                class_name: "Intracranial Translucency".into(),
                confidence: 0.4,
                x_min: 1.0,
                y_min: 2.0,
                width: 3.0,
                height: 4.0,
            },
            BoundingBoxDetection {
                class_index: 2,
                class_name: "Nuchal Translucency".into(),
                confidence: 0.9,
                x_min: 5.0,
                y_min: 6.0,
                width: 7.0,
                height: 8.0,
            },
        ];
        let resp = BoxPredictionResponse::from_detections(&dets);
        assert_eq!(resp.predictions.len(), 2);
        assert_eq!(resp.predictions[0].class_name, "Intracranial Translucency");
        assert_eq!(resp.predictions[1].height, 8.0);
    }
}
