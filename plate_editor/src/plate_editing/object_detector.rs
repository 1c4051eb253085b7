use std::path::Path;

use opencv::core::Rect;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::core::Vector;
use opencv::core::CV_32F;
use opencv::dnn;
use opencv::dnn::blob_from_image;
use opencv::dnn::nms_boxes;
use opencv::dnn::Net;
use opencv::dnn::DNN_BACKEND_CUDA;
use opencv::dnn::DNN_BACKEND_OPENCV;
use opencv::dnn::DNN_TARGET_CPU;
use opencv::dnn::DNN_TARGET_CUDA;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use opencv::prelude::NetTrait;
use opencv::prelude::NetTraitConst;
use tracing::debug;
use tracing::info;

use super::RawDetection;
use crate::config::DetectorConfig;
use crate::config::YoloVersion;
use crate::error::Error;
use crate::error::Result;

/// The external plate detector: one frame in, candidate boxes out, best first.
///
/// Implementations own their network and may keep scratch state between calls, hence
/// `&mut self`. Sharing across requests is handled by
/// [`PlateLocator`](super::plate_locator::PlateLocator).
pub trait Detector: Send {
    fn infer(&mut self, image: &Mat) -> Result<Vec<RawDetection>>;
}

trait YoloProcessor: Send + Sync {
    fn post_process(
        &self,
        img_rows: i32,
        img_cols: i32,
        output: &[f32],
    ) -> opencv::Result<Vec<RawDetection>>;
}

struct YoloProcessorV5 {
    input_size: i32,
    num_classes: usize,
    plate_class: usize,
    objectness_threshold: f32,
    score_threshold: f32,
}

impl YoloProcessor for YoloProcessorV5 {
    fn post_process(
        &self,
        img_rows: i32,
        img_cols: i32,
        output: &[f32],
    ) -> opencv::Result<Vec<RawDetection>> {
        let stride = 5 + self.num_classes;
        if output.len() % stride != 0 {
            return Err(shape_error(output.len(), stride));
        }

        let x_factor = img_cols as f32 / self.input_size as f32;
        let y_factor = img_rows as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for row in output.chunks_exact(stride) {
            let confidence = row[4];
            if confidence <= self.objectness_threshold {
                continue;
            }
            let class_score = row[5 + self.plate_class];
            if class_score <= self.score_threshold {
                continue;
            }
            candidates.push(corners(
                (row[0], row[1], row[2], row[3]),
                (x_factor, y_factor),
                confidence,
            ));
        }
        Ok(candidates)
    }
}

struct YoloProcessorV8 {
    input_size: i32,
    num_classes: usize,
    plate_class: usize,
    score_threshold: f32,
}

impl YoloProcessor for YoloProcessorV8 {
    fn post_process(
        &self,
        img_rows: i32,
        img_cols: i32,
        output: &[f32],
    ) -> opencv::Result<Vec<RawDetection>> {
        let channels = 4 + self.num_classes;
        if output.len() % channels != 0 {
            return Err(shape_error(output.len(), channels));
        }

        let x_factor = img_cols as f32 / self.input_size as f32;
        let y_factor = img_rows as f32 / self.input_size as f32;

        // Channel-major: every attribute is a contiguous run of `anchors` values.
        let anchors = output.len() / channels;
        let at = |channel: usize, anchor: usize| output[channel * anchors + anchor];

        let mut candidates = Vec::new();
        for j in 0..anchors {
            let score = at(4 + self.plate_class, j);
            if score <= self.score_threshold {
                continue;
            }
            candidates.push(corners(
                (at(0, j), at(1, j), at(2, j), at(3, j)),
                (x_factor, y_factor),
                score,
            ));
        }
        Ok(candidates)
    }
}

fn corners(
    (cx, cy, w, h): (f32, f32, f32, f32),
    (x_factor, y_factor): (f32, f32),
    confidence: f32,
) -> RawDetection {
    RawDetection {
        x1: (cx - 0.5 * w) * x_factor,
        y1: (cy - 0.5 * h) * y_factor,
        x2: (cx + 0.5 * w) * x_factor,
        y2: (cy + 0.5 * h) * y_factor,
        confidence,
    }
}

fn shape_error(len: usize, stride: usize) -> opencv::Error {
    opencv::Error::new(
        opencv::core::StsError,
        format!("network output of {len} values is not a multiple of {stride}"),
    )
}

/// Non-maximum suppression. Survivors come back highest confidence first.
fn suppress(candidates: Vec<RawDetection>, nms_threshold: f32) -> opencv::Result<Vec<RawDetection>> {
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let boxes: Vector<Rect> = candidates
        .iter()
        .map(|c| {
            Rect::new(
                c.x1 as i32,
                c.y1 as i32,
                (c.x2 - c.x1) as i32,
                (c.y2 - c.y1) as i32,
            )
        })
        .collect();
    let confidences: Vector<f32> = candidates.iter().map(|c| c.confidence).collect();

    let mut indices = Vector::<i32>::default();
    nms_boxes(&boxes, &confidences, 0.0, nms_threshold, &mut indices, 1.0, 0)?;

    let mut output: Vec<RawDetection> = indices
        .iter()
        .map(|i| candidates[i as usize])
        .collect();
    output.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(output)
}

/// YOLO plate detector running on OpenCV DNN.
pub struct YoloDetector {
    classifier: Net,
    input_size: i32,
    nms_threshold: f32,
    post_processor: Box<dyn YoloProcessor>,
}

impl YoloDetector {
    /// Loads the ONNX export named by `config.model_path`.
    ///
    /// Only ONNX graphs are accepted: they describe operators and tensors and cannot carry
    /// code to run at load time.
    pub fn plate_detector(config: &DetectorConfig) -> Result<Self> {
        config.validate()?;
        let path = config.model_path.as_path();
        check_model_path(path)?;

        let path_str = path.to_str().ok_or_else(|| Error::InvalidParameter {
            name: "model_path".to_string(),
            reason: format!("{} is not valid UTF-8", path.display()),
        })?;
        let mut classifier = dnn::read_net_from_onnx(path_str).map_err(|source| Error::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let backend = if config.use_gpu {
            classifier
                .set_preferable_backend(DNN_BACKEND_CUDA)
                .and_then(|_| classifier.set_preferable_target(DNN_TARGET_CUDA))
        } else {
            classifier
                .set_preferable_backend(DNN_BACKEND_OPENCV)
                .and_then(|_| classifier.set_preferable_target(DNN_TARGET_CPU))
        };
        backend.map_err(|source| Error::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            "Loaded {:?} plate detector from {} ({})",
            config.yolo_version,
            path.display(),
            if config.use_gpu { "cuda" } else { "cpu" }
        );

        Ok(Self {
            classifier,
            input_size: config.input_size,
            nms_threshold: config.nms_threshold,
            post_processor: post_processor_for(config),
        })
    }

    fn run(&mut self, image: &Mat) -> opencv::Result<Vec<RawDetection>> {
        let blob = blob_from_image(
            image,
            1.0 / 255.0,
            Size::new(self.input_size, self.input_size),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;

        self.classifier.set_input(&blob, "", 1.0, Scalar::default())?;

        let output_names = self.classifier.get_unconnected_out_layers_names()?;
        let mut output_values = Vector::<Mat>::default();
        self.classifier.forward(&mut output_values, &output_names)?;

        let mut candidates = Vec::new();
        for data in &output_values {
            candidates.extend(self.post_processor.post_process(
                image.rows(),
                image.cols(),
                data.data_typed::<f32>()?,
            )?);
        }
        debug!("{} plate candidates before suppression", candidates.len());

        suppress(candidates, self.nms_threshold)
    }
}

unsafe impl Send for YoloDetector {}

impl Detector for YoloDetector {
    fn infer(&mut self, image: &Mat) -> Result<Vec<RawDetection>> {
        self.run(image)
            .map_err(|source| Error::DetectionFailure { source })
    }
}

fn check_model_path(path: &Path) -> Result<()> {
    let is_onnx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("onnx"));
    if !is_onnx {
        return Err(Error::UnsupportedModelFormat {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(Error::ModelNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn post_processor_for(config: &DetectorConfig) -> Box<dyn YoloProcessor> {
    match config.yolo_version {
        YoloVersion::V5 => Box::new(YoloProcessorV5 {
            input_size: config.input_size,
            num_classes: config.num_classes,
            plate_class: config.plate_class,
            objectness_threshold: config.objectness_threshold,
            score_threshold: config.score_threshold,
        }),
        YoloVersion::V8 => Box::new(YoloProcessorV8 {
            input_size: config.input_size,
            num_classes: config.num_classes,
            plate_class: config.plate_class,
            score_threshold: config.score_threshold,
        }),
    }
}
