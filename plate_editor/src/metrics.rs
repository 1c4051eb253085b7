//! Process-wide Prometheus metrics.

use lazy_static::lazy_static;
use prometheus::register_histogram;
use prometheus::register_int_counter_vec;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::IntCounterVec;
use prometheus::TextEncoder;

use crate::error::Error;
use crate::error::Result;

lazy_static! {
    pub static ref REQUESTS: IntCounterVec = register_int_counter_vec!(
        "plate_editor_requests_total",
        "Pipeline operations by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("plate_editor_requests_total registers once");
    pub static ref DETECTION_SECONDS: Histogram = register_histogram!(
        "plate_editor_detection_seconds",
        "Time spent running the plate detector"
    )
    .expect("plate_editor_detection_seconds registers once");
}

pub fn record_outcome<T>(operation: &str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.label(),
    };
    REQUESTS.with_label_values(&[operation, outcome]).inc();
}

/// Renders the default registry in the text exposition format.
pub fn render() -> Result<String> {
    lazy_static::initialize(&REQUESTS);
    lazy_static::initialize(&DETECTION_SECONDS);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(Error::Metrics)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
