use opencv::core::Vector;
use opencv::imgcodecs::imdecode;
use opencv::imgcodecs::imencode;
use opencv::imgcodecs::IMREAD_COLOR;
use opencv::imgcodecs::IMWRITE_JPEG_QUALITY;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;

pub const DEFAULT_JPEG_QUALITY: i32 = 95;

// Always three channel BGR, whatever the source format carries.
fn decode_color(bytes: &[u8]) -> Option<Mat> {
    if bytes.is_empty() {
        return None;
    }
    let buffer = Vector::<u8>::from_slice(bytes);
    match imdecode(&buffer, IMREAD_COLOR) {
        Ok(image) if !image.empty() => {
            debug!("Decoded {}x{} image from {} bytes", image.cols(), image.rows(), bytes.len());
            Some(image)
        }
        Ok(_) => None,
        Err(err) => {
            debug!("Image decoder rejected {} bytes: {}", bytes.len(), err);
            None
        }
    }
}

/// Decodes the car picture.
pub fn decode_image(bytes: &[u8]) -> Result<Mat> {
    decode_color(bytes).ok_or(Error::InvalidImage)
}

/// Decodes a picture meant to cover the plate.
pub fn decode_replacement(bytes: &[u8]) -> Result<Mat> {
    decode_color(bytes).ok_or(Error::InvalidReplacementImage)
}

/// Encodes to JPEG. `quality` is clamped to 1..=100.
pub fn encode_jpeg(image: &Mat, quality: i32) -> Result<Vec<u8>> {
    let mut buffer = Vector::<u8>::new();
    let params = Vector::<i32>::from_slice(&[IMWRITE_JPEG_QUALITY, quality.clamp(1, 100)]);
    if !imencode(".jpg", image, &mut buffer, &params)? {
        return Err(Error::Encode { format: "jpeg" });
    }
    Ok(buffer.to_vec())
}
