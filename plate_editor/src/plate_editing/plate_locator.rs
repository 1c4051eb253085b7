use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use tracing::debug;
use tracing::info;

use super::object_detector::Detector;
use super::object_detector::YoloDetector;
use super::BoundingBox;
use super::DetectionResult;
use crate::config::DetectorConfig;
use crate::error::Error;
use crate::error::Result;
use crate::metrics::DETECTION_SECONDS;

/// Runs plate detection for any number of concurrent callers.
///
/// The detectors are loaded once and then circulate on a channel: a caller takes an idle one,
/// runs it on its own frame and hands it back. When every detector is busy, `locate` blocks
/// until one is returned, so callers on an async runtime should call it from a blocking task.
pub struct PlateLocator {
    idle: Receiver<Box<dyn Detector>>,
    release: Sender<Box<dyn Detector>>,
    size: usize,
}

impl PlateLocator {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Result<Self> {
        if detectors.is_empty() {
            return Err(Error::InvalidParameter {
                name: "detectors".to_string(),
                reason: "a locator needs at least one detector".to_string(),
            });
        }

        let (release, idle) = unbounded();
        let size = detectors.len();
        for detector in detectors {
            // Both ends live in `self`, the channel cannot be disconnected here.
            let _ = release.send(detector);
        }
        Ok(Self {
            idle,
            release,
            size,
        })
    }

    /// Loads `config.workers` copies of the configured network.
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        config.validate()?;
        let detectors = (0..config.workers)
            .map(|_| YoloDetector::plate_detector(config).map(|d| Box::new(d) as Box<dyn Detector>))
            .collect::<Result<Vec<_>>>()?;
        info!("Plate locator ready with {} detector(s)", detectors.len());
        Self::new(detectors)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Detects plates on `image` and returns their boxes in whole source pixels, in the
    /// detector's order. An empty result means no plate.
    pub fn locate(&self, image: &Mat) -> Result<DetectionResult> {
        let mut checkout = Checkout {
            detector: self.idle.recv().ok(),
            release: &self.release,
        };
        let detector = checkout.detector.as_mut().ok_or_else(|| Error::DetectionFailure {
            source: opencv::Error::new(
                opencv::core::StsError,
                "detector pool is closed".to_string(),
            ),
        })?;

        let timer = DETECTION_SECONDS.start_timer();
        let raw = detector.infer(image);
        timer.observe_duration();

        let (cols, rows) = (image.cols(), image.rows());
        let detections: Vec<BoundingBox> = raw?
            .iter()
            .map(|detection| BoundingBox::from_detection(detection, cols, rows))
            .collect();
        debug!("Located {} plate(s) on {}x{} image", detections.len(), cols, rows);

        Ok(DetectionResult::new(detections))
    }
}

/// Returns the borrowed detector to the pool on every exit path, unwinding included.
struct Checkout<'a> {
    detector: Option<Box<dyn Detector>>,
    release: &'a Sender<Box<dyn Detector>>,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(detector) = self.detector.take() {
            let _ = self.release.send(detector);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate_editing::RawDetection;
    use opencv::core::Scalar;
    use opencv::core::CV_8UC3;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;

    struct FixedDetector {
        detections: Vec<RawDetection>,
        calls: Arc<AtomicUsize>,
    }

    impl Detector for FixedDetector {
        fn infer(&mut self, _image: &Mat) -> Result<Vec<RawDetection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn infer(&mut self, _image: &Mat) -> Result<Vec<RawDetection>> {
            Err(Error::DetectionFailure {
                source: opencv::Error::new(opencv::core::StsError, "out of memory".to_string()),
            })
        }
    }

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(300, 400, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn raw(x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.5,
        }
    }

    fn fixed(detections: Vec<RawDetection>) -> (Box<dyn Detector>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FixedDetector {
            detections,
            calls: calls.clone(),
        };
        (Box::new(detector), calls)
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(matches!(
            PlateLocator::new(Vec::new()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_locate_normalizes_and_keeps_order() {
        let (detector, _) = fixed(vec![raw(50.7, 200.2, 150.9, 230.8), raw(-3.0, 1.0, 20.0, 500.0)]);
        let locator = PlateLocator::new(vec![detector]).unwrap();

        let result = locator.locate(&frame()).unwrap();
        assert_eq!(
            result.detections,
            vec![BoundingBox::new(50, 200, 150, 230), BoundingBox::new(0, 1, 20, 300)]
        );
        assert!(result.iter().all(|plate| plate.fits_within(400, 300)));
    }

    #[test]
    fn test_no_plate_is_an_empty_result() {
        let (detector, _) = fixed(Vec::new());
        let locator = PlateLocator::new(vec![detector]).unwrap();
        assert!(locator.locate(&frame()).unwrap().is_empty());
    }

    #[test]
    fn test_failed_detector_goes_back_to_the_pool() {
        let locator = PlateLocator::new(vec![Box::new(FailingDetector)]).unwrap();
        for _ in 0..3 {
            assert!(matches!(
                locator.locate(&frame()),
                Err(Error::DetectionFailure { .. })
            ));
        }
    }

    #[test]
    fn test_concurrent_callers_share_the_pool() {
        let (first, first_calls) = fixed(vec![raw(1.0, 1.0, 5.0, 5.0)]);
        let (second, second_calls) = fixed(vec![raw(1.0, 1.0, 5.0, 5.0)]);
        let locator = Arc::new(PlateLocator::new(vec![first, second]).unwrap());
        assert_eq!(locator.size(), 2);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locator = locator.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let result = locator.locate(&frame()).unwrap();
                        assert_eq!(result.primary(), Some(&BoundingBox::new(1, 1, 5, 5)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = first_calls.load(Ordering::SeqCst) + second_calls.load(Ordering::SeqCst);
        assert_eq!(total, 80);
    }
}
