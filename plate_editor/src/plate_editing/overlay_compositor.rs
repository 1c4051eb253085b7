use opencv::core::Point;
use opencv::core::Size;
use opencv::core::CV_8UC3;
use opencv::imgproc::get_text_size;
use opencv::imgproc::put_text;
use opencv::imgproc::resize;
use opencv::imgproc::FONT_HERSHEY_SIMPLEX;
use opencv::imgproc::INTER_LINEAR;
use opencv::imgproc::LINE_AA;
use opencv::prelude::*;
use tracing::debug;

use super::BoundingBox;
use super::ReplacementSpec;
use crate::config::OverlayStyle;
use crate::error::Error;
use crate::error::Result;

/// Paints replacement content over a plate.
///
/// The replacement is first rendered on a plate-sized patch and the patch is then copied over
/// the box, so nothing outside the box is ever written. Text that does not fit is cut at the
/// plate border.
pub struct OverlayCompositor {
    style: OverlayStyle,
}

impl OverlayCompositor {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn composite(
        &self,
        mut image: Mat,
        plate: &BoundingBox,
        replacement: &ReplacementSpec,
    ) -> Result<Mat> {
        check_bgr8(&image)?;
        if plate.is_degenerate() {
            return Err(Error::DegenerateBox { plate: *plate });
        }
        if !plate.fits_within(image.cols(), image.rows()) {
            return Err(Error::BoxOutOfBounds {
                plate: *plate,
                width: image.cols(),
                height: image.rows(),
            });
        }

        let patch = match replacement {
            ReplacementSpec::Image(custom) => self.scaled_patch(custom, plate)?,
            ReplacementSpec::Text(text) => self.text_patch(text, plate)?,
            ReplacementSpec::None => return Err(Error::NoReplacementProvided),
        };
        debug!("Painting {} replacement over plate {}", replacement.kind(), plate);

        paste(&mut image, &patch, plate)?;
        Ok(image)
    }

    fn scaled_patch(&self, custom: &Mat, plate: &BoundingBox) -> Result<Mat> {
        if custom.empty() {
            return Err(Error::InvalidReplacementImage);
        }
        check_bgr8(custom)?;

        let mut patch = Mat::default();
        resize(
            custom,
            &mut patch,
            Size::new(plate.width(), plate.height()),
            0.0,
            0.0,
            INTER_LINEAR,
        )?;
        Ok(patch)
    }

    fn text_patch(&self, text: &str, plate: &BoundingBox) -> Result<Mat> {
        let (w, h) = (plate.width(), plate.height());
        let mut patch =
            Mat::new_rows_cols_with_default(h, w, CV_8UC3, self.style.background_bgr())?;

        let font_scale = f64::from(w.min(h)) / self.style.scale_divisor;
        let mut baseline = 0;
        let text_size = get_text_size(
            text,
            FONT_HERSHEY_SIMPLEX,
            font_scale,
            self.style.thickness,
            &mut baseline,
        )?;
        // Baseline-left origin that centres the text box; floor division keeps overflowing
        // text centred too.
        let origin = Point::new(
            (w - text_size.width).div_euclid(2),
            (h + text_size.height).div_euclid(2),
        );

        put_text(
            &mut patch,
            text,
            origin,
            FONT_HERSHEY_SIMPLEX,
            font_scale,
            self.style.foreground_bgr(),
            self.style.thickness,
            LINE_AA,
            false,
        )?;
        Ok(patch)
    }
}

fn check_bgr8(image: &Mat) -> Result<()> {
    let typ = image.typ();
    if typ != CV_8UC3 {
        return Err(Error::UnsupportedPixelFormat { typ });
    }
    Ok(())
}

fn paste(image: &mut Mat, patch: &Mat, plate: &BoundingBox) -> Result<()> {
    let mut region = Mat::roi_mut(image, plate.rect())?;
    patch.copy_to(&mut *region)?;
    Ok(())
}
