#![allow(dead_code)]

use std::sync::Arc;

use opencv::core::{Scalar, Vec3b, Vector, CV_8UC3};
use opencv::imgcodecs::{imencode, imdecode, IMREAD_COLOR};
use opencv::prelude::*;

use plate_editor::config::OverlayStyle;
use plate_editor::plate_editing::object_detector::Detector;
use plate_editor::plate_editing::pipeline::PlateEditor;
use plate_editor::plate_editing::plate_locator::PlateLocator;
use plate_editor::plate_editing::RawDetection;
use plate_editor::{Error, Result};

/// Reports the same boxes for every frame.
pub struct StubDetector(pub Vec<RawDetection>);

impl Detector for StubDetector {
    fn infer(&mut self, _image: &Mat) -> Result<Vec<RawDetection>> {
        Ok(self.0.clone())
    }
}

pub struct BrokenDetector;

impl Detector for BrokenDetector {
    fn infer(&mut self, _image: &Mat) -> Result<Vec<RawDetection>> {
        Err(Error::DetectionFailure {
            source: opencv::Error::new(opencv::core::StsError, "forward failed".to_string()),
        })
    }
}

pub fn plate(x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
    RawDetection {
        x1,
        y1,
        x2,
        y2,
        confidence: 0.9,
    }
}

pub fn editor_with(detector: impl Detector + 'static) -> PlateEditor {
    let locator = PlateLocator::new(vec![Box::new(detector)]).unwrap();
    PlateEditor::new(Arc::new(locator), OverlayStyle::default(), 95)
}

pub fn editor_detecting(plates: Vec<RawDetection>) -> PlateEditor {
    editor_with(StubDetector(plates))
}

pub fn solid(rows: i32, cols: i32, bgr: (f64, f64, f64)) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::from(bgr)).unwrap()
}

pub fn gradient(rows: i32, cols: i32) -> Mat {
    let mut image = solid(rows, cols, (0.0, 0.0, 0.0));
    for y in 0..rows {
        for x in 0..cols {
            *image.at_2d_mut::<Vec3b>(y, x).unwrap() =
                Vec3b::from([(x % 256) as u8, (y % 256) as u8, 128]);
        }
    }
    image
}

/// Lossless encoding so pixel checks on the input side stay exact.
pub fn png(image: &Mat) -> Vec<u8> {
    let mut buffer = Vector::<u8>::new();
    assert!(imencode(".png", image, &mut buffer, &Vector::new()).unwrap());
    buffer.to_vec()
}

pub fn decode(bytes: &[u8]) -> Mat {
    let image = imdecode(&Vector::<u8>::from_slice(bytes), IMREAD_COLOR).unwrap();
    assert!(!image.empty());
    image
}

pub fn pixel(image: &Mat, x: i32, y: i32) -> Vec3b {
    *image.at_2d::<Vec3b>(y, x).unwrap()
}
