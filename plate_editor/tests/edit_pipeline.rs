mod common;

use opencv::core::Vec3b;
use opencv::prelude::*;

use common::*;
use plate_editor::config::OverlayStyle;
use plate_editor::config::PlateStyle;
use plate_editor::plate_editing::BoundingBox;
use plate_editor::Error;
use plate_editor::ErrorClass;

#[test]
fn detect_reports_boxes_in_detector_order() {
    let editor = editor_detecting(vec![
        plate(10.0, 10.0, 20.0, 20.0),
        plate(30.0, 30.0, 40.0, 40.0),
    ]);
    let result = editor.detect(&png(&gradient(100, 100))).unwrap();

    assert_eq!(
        result.detections,
        vec![BoundingBox::new(10, 10, 20, 20), BoundingBox::new(30, 30, 40, 40)]
    );
}

#[test]
fn detect_without_plate_is_empty_not_an_error() {
    let editor = editor_detecting(Vec::new());
    let result = editor.detect(&png(&gradient(60, 80))).unwrap();
    assert!(result.is_empty());
    assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"detections":[]}"#);
}

#[test]
fn detect_rejects_undecodable_bytes() {
    let editor = editor_detecting(vec![plate(1.0, 1.0, 5.0, 5.0)]);
    assert!(matches!(editor.detect(b"definitely not a picture"), Err(Error::InvalidImage)));
    assert!(matches!(editor.detect(&[]), Err(Error::InvalidImage)));
}

#[test]
fn edit_paints_only_the_first_plate() {
    let editor = editor_detecting(vec![
        plate(10.0, 10.0, 20.0, 20.0),
        plate(30.0, 30.0, 40.0, 40.0),
    ]);
    let input = gradient(100, 100);
    let custom = png(&solid(4, 4, (0.0, 255.0, 0.0)));

    let output = editor.edit_image(input.clone(), Some(custom.as_slice()), None).unwrap();

    let green = Vec3b::from([0, 255, 0]);
    assert_eq!(pixel(&output, 10, 10), green);
    assert_eq!(pixel(&output, 19, 19), green);
    for y in 30..40 {
        for x in 30..40 {
            assert_eq!(pixel(&output, x, y), pixel(&input, x, y));
        }
    }
}

#[test]
fn edit_without_plate_is_not_found() {
    let editor = editor_detecting(Vec::new());
    let err = editor
        .edit(&png(&gradient(50, 50)), None, Some("ABC"))
        .unwrap_err();
    assert!(matches!(err, Error::PlateNotFound));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn degenerate_plate_is_reported_as_not_found() {
    // Collapses to zero width once clamped to the 50 px wide frame.
    let editor = editor_detecting(vec![plate(60.0, 10.0, 80.0, 20.0)]);
    let err = editor
        .edit(&png(&gradient(50, 50)), None, Some("ABC"))
        .unwrap_err();
    assert!(matches!(err, Error::DegenerateBox { .. }));
    assert!(err.is_not_found());
}

#[test]
fn detection_failure_propagates() {
    let editor = editor_with(BrokenDetector);
    let err = editor
        .edit(&png(&gradient(50, 50)), None, Some("ABC"))
        .unwrap_err();
    assert!(matches!(err, Error::DetectionFailure { .. }));
    assert_eq!(err.class(), ErrorClass::Internal);
}

#[test]
fn image_takes_precedence_over_text() {
    let editor = editor_detecting(vec![plate(20.0, 20.0, 60.0, 40.0)]);
    let input = gradient(80, 100);
    let custom = png(&solid(10, 20, (255.0, 0.0, 0.0)));

    let both = editor
        .edit_image(input.clone(), Some(custom.as_slice()), Some("IGNORED"))
        .unwrap();
    let image_only = editor.edit_image(input, Some(custom.as_slice()), None).unwrap();

    assert_eq!(both.data_bytes().unwrap(), image_only.data_bytes().unwrap());
}

#[test]
fn empty_inputs_count_as_absent() {
    let editor = editor_detecting(vec![plate(20.0, 20.0, 60.0, 40.0)]);
    let input = gradient(80, 100);

    let err = editor
        .edit_image(input.clone(), Some(&[][..]), Some(""))
        .unwrap_err();
    assert!(matches!(err, Error::NoReplacementProvided));

    let text = editor.edit_image(input, Some(&[][..]), Some("AB12")).unwrap();
    assert_eq!(pixel(&text, 20, 20), Vec3b::from([255, 255, 255]));
}

#[test]
fn bad_replacement_image_is_rejected() {
    let editor = editor_detecting(vec![plate(20.0, 20.0, 60.0, 40.0)]);
    let err = editor
        .edit(&png(&gradient(80, 100)), Some(&b"garbage"[..]), Some("AB12"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReplacementImage));
}

#[test]
fn edit_returns_jpeg_of_the_same_size() {
    let editor = editor_detecting(vec![plate(50.0, 200.0, 150.0, 230.0)]);
    let jpeg = editor
        .edit(&png(&gradient(300, 400)), None, Some("XYZ123"))
        .unwrap();

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let output = decode(&jpeg);
    assert_eq!((output.cols(), output.rows()), (400, 300));
}

#[test]
fn edit_without_car_image_is_invalid_image() {
    let editor = editor_detecting(vec![plate(1.0, 1.0, 5.0, 5.0)]);
    let err = editor.edit(&[], None, Some("X")).unwrap_err();
    assert!(matches!(err, Error::InvalidImage));
    assert_eq!(err.class(), ErrorClass::BadInput);
}

#[test]
fn text_with_nul_is_bad_input() {
    let editor = editor_detecting(vec![plate(20.0, 20.0, 60.0, 40.0)]);
    let err = editor
        .edit_image(gradient(80, 100), None, Some("AB\0C"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReplacementText { .. }));
    assert_eq!(err.class(), ErrorClass::BadInput);
}

#[test]
fn restyled_editor_paints_a_dark_plate() {
    let light = editor_detecting(vec![plate(20.0, 20.0, 60.0, 40.0)]);
    let dark = light.with_style(OverlayStyle::from_preset(PlateStyle::Dark));
    let input = gradient(80, 100);

    let output = dark.edit_image(input.clone(), None, Some("AB12")).unwrap();
    assert_eq!(pixel(&output, 20, 20), Vec3b::from([0, 0, 0]));

    let output = light.edit_image(input, None, Some("AB12")).unwrap();
    assert_eq!(pixel(&output, 20, 20), Vec3b::from([255, 255, 255]));
}
