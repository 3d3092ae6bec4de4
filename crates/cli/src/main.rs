use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use visionloop_core::detection::domain::inference_service::InferenceService;
use visionloop_core::detection::infrastructure::box_renderer::BoxRenderer;
use visionloop_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use visionloop_core::detection::infrastructure::yolo_annotation_service::YoloAnnotationService;
use visionloop_core::pipeline::display_sink::DisplaySink;
use visionloop_core::pipeline::inference_adapter::InferenceAdapter;
use visionloop_core::pipeline::infrastructure::log_display_sink::LogDisplaySink;
use visionloop_core::pipeline::infrastructure::snapshot_display_sink::SnapshotDisplaySink;
use visionloop_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use visionloop_core::pipeline::process_video_use_case::{
    EndOfStreamPolicy, ProcessVideoUseCase, RunOutcome, VideoPipelineConfig,
};
use visionloop_core::pipeline::webcam_session::{SessionEvent, WebcamConfig, WebcamSession};
use visionloop_core::shared::constants::{
    DEFAULT_CONFIDENCE, OUTPUT_FILE_NAME, UPLOAD_EXTENSIONS, YOLO_MODEL_NAME,
};
use visionloop_core::shared::model_resolver::{self, ModelSource};
use visionloop_core::video::infrastructure::ffmpeg_source::FfmpegSource;
use visionloop_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use visionloop_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Longest side of preview snapshots, in pixels.
const PREVIEW_MAX_SIDE: u32 = 640;
const PREVIEW_FILE_NAME: &str = "preview.jpg";

/// Object detection overlays for uploaded videos and live camera feeds.
#[derive(Parser)]
#[command(name = "visionloop")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// YOLOv8 ONNX model file. Defaults to the cached yolov8n.onnx.
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Where to download the model from when it is not cached.
    #[arg(long, global = true)]
    model_url: Option<String>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, global = true, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Annotate a video file (mp4, avi, mov).
    Video {
        /// Input video file.
        input: PathBuf,

        /// Annotated output file.
        #[arg(long, short, default_value = OUTPUT_FILE_NAME)]
        output: PathBuf,

        /// Keep the latest preview frame as a JPEG in this directory.
        #[arg(long)]
        preview_dir: Option<PathBuf>,

        /// Publish every Nth frame as a preview.
        #[arg(long, default_value = "10")]
        preview_interval: usize,

        /// Fail instead of finishing early when the input can't be read to the end.
        #[arg(long)]
        strict_eos: bool,
    },
    /// Annotate a live camera feed until Enter is pressed.
    Webcam {
        /// Camera index.
        #[arg(long, default_value = "0")]
        device: u32,

        /// Annotate every Nth captured frame (1 = every frame).
        #[arg(long, default_value = "2")]
        frame_skip: usize,

        /// Delay between captured frames, in milliseconds.
        #[arg(long, default_value = "30")]
        pacing_ms: u64,

        /// Keep the latest annotated frame as a JPEG in this directory.
        #[arg(long)]
        preview_dir: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let service = build_inference(&cli)?;

    match cli.command {
        Command::Video {
            input,
            output,
            preview_dir,
            preview_interval,
            strict_eos,
        } => {
            let config = VideoPipelineConfig {
                preview_interval,
                end_of_stream: if strict_eos {
                    EndOfStreamPolicy::FailOnReadError
                } else {
                    EndOfStreamPolicy::TreatAsEnd
                },
                ..VideoPipelineConfig::default()
            };
            run_video(&input, &output, preview_dir.as_deref(), service, config)
        }
        Command::Webcam {
            device,
            frame_skip,
            pacing_ms,
            preview_dir,
        } => {
            let config = WebcamConfig {
                device_index: device,
                frame_skip,
                pacing: Duration::from_millis(pacing_ms),
            };
            run_webcam(preview_dir.as_deref(), service, config)
        }
    }
}

fn run_video(
    input: &Path,
    output: &Path,
    preview_dir: Option<&Path>,
    service: Box<dyn InferenceService>,
    config: VideoPipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let mut use_case = ProcessVideoUseCase::new(
        Box::new(FfmpegSource::new()),
        Box::new(FfmpegWriter::new()),
        build_adapter(service),
        build_sink(preview_dir)?,
        Box::new(StdoutPipelineLogger::default()),
        config,
    );

    let mut upload = File::open(input)?;
    let summary = use_case.execute(&mut upload)?;

    match summary.outcome {
        RunOutcome::Delivered(delivered) => {
            let bytes = delivered.write_to(BufWriter::new(File::create(output)?))?;
            println!(
                "Video processed successfully! Total frames: {}",
                summary.processed
            );
            if summary.degraded > 0 {
                println!(
                    "{} frames could not be annotated and were kept as-is",
                    summary.degraded
                );
            }
            log::info!("Output written to {} ({bytes} bytes)", output.display());
        }
        RunOutcome::NothingToProcess => {
            println!("No frames found in {}, nothing written", input.display());
        }
    }
    Ok(())
}

fn run_webcam(
    preview_dir: Option<&Path>,
    service: Box<dyn InferenceService>,
    config: WebcamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let device = config.device_index;

    let mut session = WebcamSession::new(
        Box::new(FfmpegSource::new()),
        build_adapter(service),
        build_sink(preview_dir)?,
        config,
    );
    let events = session.events();
    session.start()?;
    eprintln!("Webcam running on device {device}. Press Enter to stop.");

    let (enter_tx, enter_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = enter_tx.send(());
    });

    crossbeam_channel::select! {
        recv(enter_rx) -> _ => {
            if let Some(summary) = session.stop() {
                println!(
                    "Webcam stopped: {} frames captured, {} annotated",
                    summary.acquired, summary.processed
                );
            }
            Ok(())
        }
        recv(events) -> event => {
            session.stop();
            match event {
                Ok(SessionEvent::Failed { error, summary }) => {
                    log::info!("Session ended after {} frames", summary.acquired);
                    Err(error.into())
                }
                Ok(SessionEvent::Stopped(summary)) => {
                    println!("Webcam stopped: {} frames captured", summary.acquired);
                    Ok(())
                }
                Err(_) => Err("webcam session ended unexpectedly".into()),
            }
        }
    }
}

fn build_inference(cli: &Cli) -> Result<Box<dyn InferenceService>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let bundled_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")));
    let source = ModelSource {
        explicit: cli.model.as_deref(),
        bundled_dir: bundled_dir.as_deref(),
        url: cli.model_url.as_deref(),
    };
    let model_path =
        model_resolver::resolve(YOLO_MODEL_NAME, &source, Some(Box::new(download_progress)))?;
    eprintln!();

    let detector = OnnxYoloDetector::new(&model_path, cli.confidence)?;
    Ok(Box::new(YoloAnnotationService::new(
        Box::new(detector),
        BoxRenderer::default(),
    )))
}

fn build_adapter(service: Box<dyn InferenceService>) -> InferenceAdapter {
    InferenceAdapter::new(service).with_error_callback(Box::new(|e| eprintln!("{e}")))
}

fn build_sink(
    preview_dir: Option<&Path>,
) -> Result<Box<dyn DisplaySink>, Box<dyn std::error::Error>> {
    match preview_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(PREVIEW_FILE_NAME);
            log::info!("Writing previews to {}", path.display());
            Ok(Box::new(SnapshotDisplaySink::new(
                Box::new(ImageFileWriter::new()),
                &path,
                Some(PREVIEW_MAX_SIDE),
            )))
        }
        None => Ok(Box::new(LogDisplaySink::new())),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if let Some(model) = &cli.model {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    match &cli.command {
        Command::Video {
            input,
            output,
            preview_interval,
            ..
        } => {
            if !input.exists() {
                return Err(format!("Input file not found: {}", input.display()).into());
            }
            if !is_supported_video(input) {
                return Err(format!(
                    "Unsupported video type: {} (expected one of: {})",
                    input.display(),
                    UPLOAD_EXTENSIONS.join(", ")
                )
                .into());
            }
            if same_file(input, output) {
                return Err(format!(
                    "Output file {} would overwrite the input file",
                    output.display()
                )
                .into());
            }
            if *preview_interval == 0 {
                return Err("Preview interval must be at least 1".into());
            }
        }
        Command::Webcam { frame_skip, .. } => {
            if *frame_skip == 0 {
                return Err("Frame skip must be at least 1".into());
            }
        }
    }
    Ok(())
}

/// Compares paths after resolving `.`/`..` and symlinks. The output usually
/// doesn't exist yet, so its parent directory is resolved instead.
fn same_file(a: &Path, b: &Path) -> bool {
    match (resolve_path(a), resolve_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn resolve_path(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(path.file_name()?))
}

fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| UPLOAD_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_args(input: &Path, extra: &[&str]) -> Cli {
        let mut args = vec!["visionloop", "video", input.to_str().unwrap()];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_output_name() {
        let cli = video_args(Path::new("clip.mp4"), &[]);
        match cli.command {
            Command::Video { output, .. } => assert_eq!(output, PathBuf::from(OUTPUT_FILE_NAME)),
            Command::Webcam { .. } => panic!("expected video command"),
        }
    }

    #[test]
    fn test_output_aliasing_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"mp4").unwrap();
        let dotted = dir.path().join(".").join("clip.mp4");

        let cli = video_args(&input, &["-o", dotted.to_str().unwrap()]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("would overwrite the input file"));

        let other = dir.path().join("out.mp4");
        let cli = video_args(&input, &["-o", other.to_str().unwrap()]);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_same_file_resolves_missing_output_through_parent() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let input = dir.path().join("annotated_video.mp4");
        std::fs::write(&input, b"mp4").unwrap();

        assert!(same_file(&input, &sub.join("..").join("annotated_video.mp4")));
        assert!(!same_file(&input, &sub.join("annotated_video.mp4")));
    }
}
