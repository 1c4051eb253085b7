use std::sync::Arc;

use opencv::prelude::Mat;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::image_codec;
use super::overlay_compositor::OverlayCompositor;
use super::plate_locator::PlateLocator;
use super::DetectionResult;
use super::ReplacementSpec;
use crate::config::OverlayStyle;
use crate::error::Error;
use crate::error::ErrorClass;
use crate::error::Result;
use crate::metrics;

/// Detect-then-paint pipeline shared by every request path.
///
/// Holds no per-request state. The locator is shared, each call decodes its own frame.
pub struct PlateEditor {
    locator: Arc<PlateLocator>,
    compositor: OverlayCompositor,
    jpeg_quality: i32,
}

impl PlateEditor {
    pub fn new(locator: Arc<PlateLocator>, style: OverlayStyle, jpeg_quality: i32) -> Self {
        Self {
            locator,
            compositor: OverlayCompositor::new(style),
            jpeg_quality,
        }
    }

    /// Another editor over the same detector pool, painting text with `style`.
    pub fn with_style(&self, style: OverlayStyle) -> Self {
        Self {
            locator: self.locator.clone(),
            compositor: OverlayCompositor::new(style),
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn locator(&self) -> &PlateLocator {
        &self.locator
    }

    /// Plate boxes on an encoded image. No plate is an empty result, not an error.
    pub fn detect(&self, image_bytes: &[u8]) -> Result<DetectionResult> {
        let result = image_codec::decode_image(image_bytes)
            .and_then(|image| self.locator.locate(&image));
        log_outcome("detect", &result);
        result
    }

    /// Replaces the first detected plate and returns the edited picture as JPEG.
    pub fn edit(
        &self,
        image_bytes: &[u8],
        replacement_image: Option<&[u8]>,
        replacement_text: Option<&str>,
    ) -> Result<Vec<u8>> {
        let result = image_codec::decode_image(image_bytes)
            .and_then(|image| self.edit_image(image, replacement_image, replacement_text))
            .and_then(|edited| image_codec::encode_jpeg(&edited, self.jpeg_quality));
        log_outcome("edit", &result);
        result
    }

    /// [`edit`](Self::edit) on an already decoded frame.
    ///
    /// The replacement is only decoded once a usable plate is known, so a picture without
    /// a plate reports that first.
    pub fn edit_image(
        &self,
        image: Mat,
        replacement_image: Option<&[u8]>,
        replacement_text: Option<&str>,
    ) -> Result<Mat> {
        let detections = self.locator.locate(&image)?;
        let plate = *detections.primary().ok_or(Error::PlateNotFound)?;
        if detections.len() > 1 {
            debug!("{} plates detected, editing the first one", detections.len());
        }
        if plate.is_degenerate() {
            return Err(Error::DegenerateBox { plate });
        }

        let replacement = ReplacementSpec::resolve(replacement_image, replacement_text)?;
        self.compositor.composite(image, &plate, &replacement)
    }
}

fn log_outcome<T>(operation: &str, result: &Result<T>) {
    metrics::record_outcome(operation, result);
    match result {
        Ok(_) => info!("{operation} succeeded"),
        Err(err) if err.class() == ErrorClass::Internal => {
            error!("{operation} failed: {err}")
        }
        Err(err) => warn!("{operation} rejected: {err}"),
    }
}
