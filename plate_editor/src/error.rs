//! Error types for plate_editor.

use std::path::PathBuf;

use thiserror::Error;

use crate::plate_editing::BoundingBox;

/// How a caller should react to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong; try different input.
    BadInput,
    /// The input was fine but holds no usable plate; try a different image.
    NotFound,
    /// Fault on our side, not correctable by the caller.
    Internal,
}

/// Main error type for the plate_editor library.
#[derive(Error, Debug)]
pub enum Error {
    /// The car image bytes do not decode to a raster.
    #[error("invalid image: input bytes do not decode to an image")]
    InvalidImage,

    /// The replacement image bytes do not decode to a raster.
    #[error("invalid replacement image: input bytes do not decode to an image")]
    InvalidReplacementImage,

    /// The replacement text cannot be drawn, e.g. it holds a NUL character.
    #[error("invalid replacement text: {reason}")]
    InvalidReplacementText { reason: String },

    /// The detector returned no boxes.
    #[error("no license plate detected in the image")]
    PlateNotFound,

    /// The selected box has zero or negative area.
    #[error("detected plate {plate} has no area")]
    DegenerateBox { plate: BoundingBox },

    /// The box does not fit inside the image it should be painted on.
    #[error("plate {plate} lies outside the {width}x{height} image")]
    BoxOutOfBounds {
        plate: BoundingBox,
        width: i32,
        height: i32,
    },

    /// An edit was requested without a replacement image or text.
    #[error("no replacement image or text was provided")]
    NoReplacementProvided,

    /// The detection network failed while running.
    #[error("plate detection failed: {source}")]
    DetectionFailure {
        #[source]
        source: opencv::Error,
    },

    /// Rasters handed to the compositor must be 8-bit BGR.
    #[error("unsupported pixel format: expected 8-bit 3-channel image, got type {typ}")]
    UnsupportedPixelFormat { typ: i32 },

    #[error("model file not found: {path}")]
    ModelNotFound { path: PathBuf },

    /// Only ONNX graphs are loaded, they carry no executable payload.
    #[error("unsupported model format {path}: only .onnx graphs are accepted")]
    UnsupportedModelFormat { path: PathBuf },

    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: opencv::Error,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("failed to encode image as {format}")]
    Encode { format: &'static str },

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidImage
            | Self::InvalidReplacementImage
            | Self::InvalidReplacementText { .. }
            | Self::NoReplacementProvided
            | Self::InvalidParameter { .. } => ErrorClass::BadInput,
            Self::PlateNotFound | Self::DegenerateBox { .. } => ErrorClass::NotFound,
            Self::BoxOutOfBounds { .. }
            | Self::DetectionFailure { .. }
            | Self::UnsupportedPixelFormat { .. }
            | Self::ModelNotFound { .. }
            | Self::UnsupportedModelFormat { .. }
            | Self::ModelLoad { .. }
            | Self::Encode { .. }
            | Self::OpenCv(_)
            | Self::Metrics(_)
            | Self::Io(_) => ErrorClass::Internal,
        }
    }

    /// A degenerate box is reported to callers the same way as a missing plate.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Stable identifier used in metric labels and HTTP error bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidImage => "invalid_image",
            Self::InvalidReplacementImage => "invalid_replacement_image",
            Self::InvalidReplacementText { .. } => "invalid_replacement_text",
            Self::PlateNotFound => "plate_not_found",
            Self::DegenerateBox { .. } => "degenerate_box",
            Self::BoxOutOfBounds { .. } => "box_out_of_bounds",
            Self::NoReplacementProvided => "no_replacement_provided",
            Self::DetectionFailure { .. } => "detection_failure",
            Self::UnsupportedPixelFormat { .. } => "unsupported_pixel_format",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::UnsupportedModelFormat { .. } => "unsupported_model_format",
            Self::ModelLoad { .. } => "model_load",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Encode { .. } => "encode",
            Self::OpenCv(_) => "opencv",
            Self::Metrics(_) => "metrics",
            Self::Io(_) => "io",
        }
    }
}

/// Result type alias for plate_editor operations.
pub type Result<T> = std::result::Result<T, Error>;
