//! # plate_editor
//!
//! Finds the license plate on a car picture with a YOLO network running on OpenCV DNN and
//! paints over it, either with another picture scaled to the plate or with a line of text.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use plate_editor::config::{DetectorConfig, OverlayStyle};
//! use plate_editor::plate_editing::pipeline::PlateEditor;
//! use plate_editor::plate_editing::plate_locator::PlateLocator;
//!
//! # fn main() -> plate_editor::Result<()> {
//! let locator = PlateLocator::from_config(&DetectorConfig::default())?;
//! let editor = PlateEditor::new(Arc::new(locator), OverlayStyle::default(), 95);
//!
//! let car = std::fs::read("car.jpg")?;
//! let jpeg = editor.edit(&car, None, Some("XYZ123"))?;
//! std::fs::write("car_edited.jpg", jpeg)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod plate_editing;
pub mod server;

pub use error::{Error, ErrorClass, Result};
