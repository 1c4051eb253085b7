pub mod image_codec;
pub mod object_detector;
pub mod overlay_compositor;
pub mod pipeline;
pub mod plate_locator;

use std::fmt;

use opencv::core::Rect;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// Axis-aligned plate rectangle in source pixel coordinates, corners inclusive-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clamps a detector box to a `cols` x `rows` frame and truncates it to whole pixels.
    pub fn from_detection(detection: &RawDetection, cols: i32, rows: i32) -> Self {
        let x_a = detection.x1.clamp(0.0, cols as f32) as i32;
        let x_b = detection.x2.clamp(0.0, cols as f32) as i32;
        let y_a = detection.y1.clamp(0.0, rows as f32) as i32;
        let y_b = detection.y2.clamp(0.0, rows as f32) as i32;
        Self {
            x1: x_a.min(x_b),
            y1: y_a.min(y_b),
            x2: x_a.max(x_b),
            y2: y_a.max(y_b),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn fits_within(&self, cols: i32, rows: i32) -> bool {
        self.x1 >= 0 && self.y1 >= 0 && self.x2 <= cols && self.y2 <= rows
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x1, self.y1, self.width(), self.height())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A box as the network reports it, already scaled to source pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

/// Plate boxes in detector order. The first one is the primary plate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<BoundingBox>,
}

impl DetectionResult {
    pub fn new(detections: Vec<BoundingBox>) -> Self {
        Self { detections }
    }

    pub fn primary(&self) -> Option<&BoundingBox> {
        self.detections.first()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundingBox> {
        self.detections.iter()
    }
}

/// What gets painted over the plate.
pub enum ReplacementSpec {
    Image(Mat),
    Text(String),
    None,
}

impl ReplacementSpec {
    /// Picks the replacement source for a request. An image wins over text; empty uploads and
    /// empty strings count as not supplied.
    pub fn resolve(image_bytes: Option<&[u8]>, text: Option<&str>) -> Result<Self> {
        if let Some(bytes) = image_bytes.filter(|bytes| !bytes.is_empty()) {
            return Ok(Self::Image(image_codec::decode_replacement(bytes)?));
        }
        match text.filter(|text| !text.is_empty()) {
            // The text renderer takes C strings.
            Some(text) if text.contains('\0') => Err(Error::InvalidReplacementText {
                reason: "contains a NUL character".to_string(),
            }),
            Some(text) => Ok(Self::Text(text.to_string())),
            None => Ok(Self::None),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Text(_) => "text",
            Self::None => "none",
        }
    }
}

impl fmt::Debug for ReplacementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(image) => write!(f, "Image({}x{})", image.cols(), image.rows()),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::None => f.write_str("None"),
        }
    }
}
