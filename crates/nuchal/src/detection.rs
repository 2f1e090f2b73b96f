//! Anatomy detection head decoding.
//!
//! The regression model emits one confidence and one relative box per
//! anatomical class. Decoding gates each class independently on its score and
//! scales the box to the original frame; there is no suppression or ranking
//! across classes, so each class appears at most once.

use std::fmt;

/// Anatomical structures in model output-channel order.
pub const ANATOMY_LABELS: [&str; 9] = [
    "Cisternae Magna",
    "Intracranial Translucency",
    "Nuchal Translucency",
    "Midbrain",
    "Nasal Bone",
    "Nasal Skin",
    "Nasal Tip",
    "Palate",
    "Thalami",
];

/// Ordered class names, index = model output channel.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LabelTable(Vec<String>);

impl Default for LabelTable {
    fn default() -> Self {
        Self(ANATOMY_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self, class_index: usize) -> Option<&str> {
        self.0.get(class_index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// Detection-path parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Model working width in pixels.
    pub input_width: u32,
    /// Model working height in pixels.
    pub input_height: u32,
    /// A class is reported when its score is at least this value.
    pub score_threshold: f32,
    pub labels: LabelTable,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_width: 600,
            input_height: 400,
            score_threshold: 0.3,
            labels: LabelTable::default(),
        }
    }
}

/// One detected structure, in original-image pixels.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBoxDetection {
    pub class_index: usize,
    pub class_name: String,
    pub confidence: f32,
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

/// Model output that does not line up with the label table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// `class_scores` and `boxes` differ in length.
    BoxCountMismatch { scores: usize, boxes: usize },
    /// `class_scores` length differs from the label table.
    LabelCountMismatch { scores: usize, labels: usize },
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoxCountMismatch { scores, boxes } => {
                write!(f, "{scores} class scores but {boxes} boxes")
            }
            Self::LabelCountMismatch { scores, labels } => {
                write!(f, "{scores} class scores but {labels} labels")
            }
        }
    }
}

impl std::error::Error for DetectionError {}

/// Gate each class on its score and convert `[xc, yc, w, h]` (relative) to
/// `x_min, y_min, width, height` in pixels of a frame of `original_size = [w, h]`.
///
/// Detections are returned in class-index order. NaN scores never pass.
pub fn decode_detections(
    class_scores: &[f32],
    boxes: &[[f32; 4]],
    original_size: [u32; 2],
    config: &DetectionConfig,
) -> Result<Vec<BoundingBoxDetection>, DetectionError> {
    if class_scores.len() != boxes.len() {
        return Err(DetectionError::BoxCountMismatch {
            scores: class_scores.len(),
            boxes: boxes.len(),
        });
    }
    if class_scores.len() != config.labels.len() {
        return Err(DetectionError::LabelCountMismatch {
            scores: class_scores.len(),
            labels: config.labels.len(),
        });
    }

    let (img_w, img_h) = (f64::from(original_size[0]), f64::from(original_size[1]));
    let detections: Vec<BoundingBoxDetection> = class_scores
        .iter()
        .zip(boxes)
        .enumerate()
        .filter(|(_, (&score, _))| score >= config.score_threshold)
        .filter_map(|(i, (&score, b))| {
            let [xc, yc, w, h] = b.map(f64::from);
            Some(BoundingBoxDetection {
                class_index: i,
                class_name: config.labels.name(i)?.to_string(),
                confidence: score,
                x_min: (xc - w / 2.0) * img_w,
                y_min: (yc - h / 2.0) * img_h,
                width: w * img_w,
                height: h * img_h,
            })
        })
        .collect();

    tracing::debug!(
        "{} of {} classes at or above {:.2}",
        detections.len(),
        class_scores.len(),
        config.score_threshold
    );
    Ok(detections)
}
