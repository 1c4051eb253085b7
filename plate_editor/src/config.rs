//! Configuration for the detector, the overlay and the HTTP surface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::ValueEnum;
use opencv::core::Scalar;

use crate::error::Error;
use crate::error::Result;

/// Layout of the network output, which differs between YOLO generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YoloVersion {
    /// `[1, N, 5 + classes]`: `cx, cy, w, h, objectness, scores...` per row.
    V5,
    /// `[1, 4 + classes, N]`: channel-major, no objectness.
    V8,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// ONNX export of the plate detector.
    pub model_path: PathBuf,
    pub yolo_version: YoloVersion,
    /// Square network input side, in pixels.
    pub input_size: i32,
    /// Minimum objectness for a row to be considered (V5 only).
    pub objectness_threshold: f32,
    /// Minimum plate class score.
    pub score_threshold: f32,
    /// IoU above which overlapping boxes are suppressed.
    pub nms_threshold: f32,
    pub num_classes: usize,
    pub plate_class: usize,
    pub use_gpu: bool,
    /// Number of networks loaded into the locator pool.
    pub workers: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/plate_best.onnx"),
            yolo_version: YoloVersion::V8,
            input_size: 640,
            objectness_threshold: 0.4,
            score_threshold: 0.25,
            nms_threshold: 0.7,
            num_classes: 1,
            plate_class: 0,
            use_gpu: false,
            workers: 1,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_size <= 0 || self.input_size % 32 != 0 {
            return Err(invalid(
                "input_size",
                format!("must be a positive multiple of 32, got {}", self.input_size),
            ));
        }
        for (name, value) in [
            ("objectness_threshold", self.objectness_threshold),
            ("score_threshold", self.score_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(name, format!("must be within [0, 1], got {value}")));
            }
        }
        if self.num_classes == 0 {
            return Err(invalid("num_classes", "must be at least 1".to_string()));
        }
        if self.plate_class >= self.num_classes {
            return Err(invalid(
                "plate_class",
                format!(
                    "{} is not a class of a {}-class model",
                    self.plate_class, self.num_classes
                ),
            ));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: String) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        reason,
    }
}

/// Colour presets for text replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlateStyle {
    /// White plate, black lettering.
    Light,
    /// Black plate, white lettering.
    Dark,
}

/// How replacement text is drawn on the plate. Colours are RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub background: [u8; 3],
    pub foreground: [u8; 3],
    pub thickness: i32,
    /// Font scale is `min(w, h) / scale_divisor`.
    pub scale_divisor: f64,
}

impl OverlayStyle {
    pub fn from_preset(style: PlateStyle) -> Self {
        let (background, foreground) = match style {
            PlateStyle::Light => ([255, 255, 255], [0, 0, 0]),
            PlateStyle::Dark => ([0, 0, 0], [255, 255, 255]),
        };
        Self {
            background,
            foreground,
            thickness: 2,
            scale_divisor: 50.0,
        }
    }

    pub(crate) fn background_bgr(&self) -> Scalar {
        to_bgr(self.background)
    }

    pub(crate) fn foreground_bgr(&self) -> Scalar {
        to_bgr(self.foreground)
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::from_preset(PlateStyle::Light)
    }
}

fn to_bgr([r, g, b]: [u8; 3]) -> Scalar {
    Scalar::from((f64::from(b), f64::from(g), f64::from(r)))
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}
