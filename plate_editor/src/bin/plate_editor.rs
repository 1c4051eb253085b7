//! `plate_editor` CLI - find license plates and paint over them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plate_editor::config::{DetectorConfig, OverlayStyle, PlateStyle, ServerConfig, YoloVersion};
use plate_editor::plate_editing::image_codec::DEFAULT_JPEG_QUALITY;
use plate_editor::plate_editing::pipeline::PlateEditor;
use plate_editor::plate_editing::plate_locator::PlateLocator;
use plate_editor::server;

/// Detect license plates and replace them with a picture or a line of text.
#[derive(Parser, Debug)]
#[command(name = "plate_editor")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    detector: DetectorArgs,

    /// Colour preset for text replacement.
    #[arg(long, value_enum, default_value = "light", env = "PLATE_EDITOR_STYLE", global = true)]
    plate_style: PlateStyle,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PLATE_EDITOR_JPEG_QUALITY", global = true)]
    quality: i32,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DetectorArgs {
    /// ONNX plate detection model.
    #[arg(long, default_value = "models/plate_best.onnx", env = "PLATE_EDITOR_MODEL", global = true)]
    model: PathBuf,

    /// Output layout of the model.
    #[arg(long, value_enum, default_value = "v8", env = "PLATE_EDITOR_YOLO_VERSION", global = true)]
    yolo_version: YoloVersion,

    /// Square network input side.
    #[arg(long, default_value = "640", env = "PLATE_EDITOR_INPUT_SIZE", global = true)]
    input_size: i32,

    /// Minimum objectness (v5 models only).
    #[arg(long, default_value = "0.4", env = "PLATE_EDITOR_OBJECTNESS_THRESHOLD", global = true)]
    objectness_threshold: f32,

    /// Minimum plate class score.
    #[arg(long, default_value = "0.25", env = "PLATE_EDITOR_SCORE_THRESHOLD", global = true)]
    score_threshold: f32,

    /// IoU threshold for non-maximum suppression.
    #[arg(long, default_value = "0.7", env = "PLATE_EDITOR_NMS_THRESHOLD", global = true)]
    nms_threshold: f32,

    #[arg(long, default_value = "1", env = "PLATE_EDITOR_NUM_CLASSES", global = true)]
    num_classes: usize,

    #[arg(long, default_value = "0", env = "PLATE_EDITOR_PLATE_CLASS", global = true)]
    plate_class: usize,

    /// Run inference on CUDA.
    #[arg(long, env = "PLATE_EDITOR_USE_GPU", global = true)]
    use_gpu: bool,

    /// Number of networks loaded for concurrent requests.
    #[arg(long, default_value = "1", env = "PLATE_EDITOR_WORKERS", global = true)]
    workers: usize,
}

impl From<&DetectorArgs> for DetectorConfig {
    fn from(args: &DetectorArgs) -> Self {
        Self {
            model_path: args.model.clone(),
            yolo_version: args.yolo_version,
            input_size: args.input_size,
            objectness_threshold: args.objectness_threshold,
            score_threshold: args.score_threshold,
            nms_threshold: args.nms_threshold,
            num_classes: args.num_classes,
            plate_class: args.plate_class,
            use_gpu: args.use_gpu,
            workers: args.workers,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the plate boxes found on an image as JSON.
    Detect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Replace the first plate on an image and write the result as JPEG.
    Process {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Picture scaled over the plate. Wins over --text.
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,

        /// Text drawn on a blank plate.
        #[arg(long)]
        text: Option<String>,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000", env = "PLATE_EDITOR_BIND")]
        bind: std::net::SocketAddr,

        /// Largest accepted upload, in bytes.
        #[arg(long, default_value = "10485760", env = "PLATE_EDITOR_MAX_UPLOAD")]
        max_upload_bytes: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("plate_editor={log_level},tower_http={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&cli) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(cli: &Cli) -> Result<()> {
    let config = DetectorConfig::from(&cli.detector);
    let locator = PlateLocator::from_config(&config).context("Failed to load the plate detector")?;
    let editor = PlateEditor::new(
        Arc::new(locator),
        OverlayStyle::from_preset(cli.plate_style),
        cli.quality,
    );

    match &cli.command {
        Command::Detect { input } => {
            let bytes = read_input(input)?;
            let detections = editor.detect(&bytes).context("Detection failed")?;
            println!("{}", serde_json::to_string_pretty(&detections)?);
        }
        Command::Process {
            input,
            output,
            image,
            text,
        } => {
            let bytes = read_input(input)?;
            let replacement = image.as_deref().map(read_input).transpose()?;

            let jpeg = editor
                .edit(&bytes, replacement.as_deref(), text.as_deref())
                .context("Failed to replace the plate")?;
            std::fs::write(output, jpeg)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Successfully processed {} -> {}",
                input.display(),
                output.display()
            );
        }
        Command::Serve {
            bind,
            max_upload_bytes,
        } => {
            let server_config = ServerConfig {
                bind: *bind,
                max_upload_bytes: *max_upload_bytes,
            };
            let runtime = tokio::runtime::Runtime::new().context("Failed to start the runtime")?;
            info!("Serving with {} detector(s)", editor.locator().size());
            runtime
                .block_on(server::serve(Arc::new(editor), server_config))
                .context("API server stopped")?;
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file does not exist: {}", path.display());
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}
