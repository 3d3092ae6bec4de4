use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::lifecycle::resource_guard::ResourceGuard;
use crate::lifecycle::scratch::{ScratchDir, ScratchFile};
use crate::shared::constants::{
    DEFAULT_PREVIEW_INTERVAL, OUTPUT_FILE_NAME, OUTPUT_MIME_TYPE, UPLOAD_SUFFIX,
};
use crate::shared::error::PipelineError;
use crate::video::domain::frame_source::{FrameSource, SourceOrigin};
use crate::video::domain::video_writer::VideoWriter;

use super::display_sink::{DisplaySink, DisplayUpdate};
use super::inference_adapter::InferenceAdapter;
use super::output_delivery::DeliverableOutput;
use super::pipeline_logger::{PipelineLogger, Stage};
use super::pipeline_run::{PipelineRun, RunStatus};

const OUTPUT_DIR_PREFIX: &str = "visionloop-output-";

/// What to do when the source stops because of a read failure rather than
/// a clean end of stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndOfStreamPolicy {
    /// Log a warning and finish with the frames read so far.
    #[default]
    TreatAsEnd,
    /// Fail the run with an I/O error.
    FailOnReadError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoPipelineConfig {
    /// Every N-th frame (0, N, 2N, ...) goes to the display sink.
    pub preview_interval: usize,
    pub end_of_stream: EndOfStreamPolicy,
    pub output_file_name: String,
}

impl Default for VideoPipelineConfig {
    fn default() -> Self {
        Self {
            preview_interval: DEFAULT_PREVIEW_INTERVAL,
            end_of_stream: EndOfStreamPolicy::default(),
            output_file_name: OUTPUT_FILE_NAME.to_string(),
        }
    }
}

impl VideoPipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.preview_interval == 0 {
            return Err("preview interval must be at least 1".into());
        }
        let name = self.output_file_name.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(format!("invalid output file name: {name:?}"));
        }
        Ok(())
    }
}

/// How a completed run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The annotated video, ready for download.
    Delivered(DeliverableOutput),
    /// The upload decoded to zero frames; no output was produced.
    NothingToProcess,
}

#[derive(Debug)]
pub struct RunSummary {
    pub processed: usize,
    pub degraded: usize,
    pub total_frames: Option<usize>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn into_output(self) -> Option<DeliverableOutput> {
        match self.outcome {
            RunOutcome::Delivered(output) => Some(output),
            RunOutcome::NothingToProcess => None,
        }
    }
}

/// Annotates an uploaded video frame by frame and encodes the result.
///
/// Runs on the caller's thread. This is a single-use struct: `execute`
/// consumes the owned components, so calling it twice will fail.
pub struct ProcessVideoUseCase {
    source: Option<Box<dyn FrameSource>>,
    writer: Option<Box<dyn VideoWriter>>,
    adapter: Option<InferenceAdapter>,
    sink: Option<Box<dyn DisplaySink>>,
    logger: Box<dyn PipelineLogger>,
    config: VideoPipelineConfig,
    cancelled: Arc<AtomicBool>,
    run: PipelineRun,
}

impl ProcessVideoUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        writer: Box<dyn VideoWriter>,
        adapter: InferenceAdapter,
        sink: Box<dyn DisplaySink>,
        logger: Box<dyn PipelineLogger>,
        config: VideoPipelineConfig,
    ) -> Self {
        Self {
            source: Some(source),
            writer: Some(writer),
            adapter: Some(adapter),
            sink: Some(sink),
            logger,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
            run: PipelineRun::new(),
        }
    }

    /// Shares a cancellation flag with the caller. Raising it ends the run
    /// before the next frame.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    /// Runs the pipeline over an uploaded byte stream.
    ///
    /// Every resource acquired here (upload scratch file, source, writer,
    /// output storage on failure) is released before this returns.
    pub fn execute(&mut self, upload: &mut dyn Read) -> Result<RunSummary, PipelineError> {
        if self.run.status() != RunStatus::Created {
            return Err(PipelineError::AlreadyExecuted);
        }
        if let Err(e) = self.config.validate() {
            self.run.fail();
            log::error!("Video pipeline not started: {e}");
            return Err(PipelineError::Config(e));
        }
        let (source, writer, adapter, sink) = match (
            self.source.take(),
            self.writer.take(),
            self.adapter.take(),
            self.sink.take(),
        ) {
            (Some(source), Some(writer), Some(adapter), Some(sink)) => {
                (source, writer, adapter, sink)
            }
            _ => return Err(PipelineError::AlreadyExecuted),
        };

        let result = self.run_pipeline(upload, source, writer, adapter, sink);
        if let Err(e) = &result {
            self.run.fail();
            log::error!("Video pipeline failed: {e}");
        }
        result
    }

    fn run_pipeline(
        &mut self,
        upload: &mut dyn Read,
        source: Box<dyn FrameSource>,
        writer: Box<dyn VideoWriter>,
        mut adapter: InferenceAdapter,
        mut sink: Box<dyn DisplaySink>,
    ) -> Result<RunSummary, PipelineError> {
        let scratch = ScratchFile::from_reader(upload, UPLOAD_SUFFIX)
            .map_err(|e| PipelineError::resource("upload scratch file", e))?;
        let mut upload_file = ResourceGuard::new("upload scratch file", scratch);

        let mut source = ResourceGuard::new("frame source", source);
        let metadata = source.open(&SourceOrigin::File(upload_file.path().to_path_buf()))?;
        self.logger.info(&format!(
            "Opened {}x{} {} video ({} frames @ {} fps)",
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata
                .known_total()
                .map_or_else(|| "?".to_string(), |n| n.to_string()),
            metadata
                .fps
                .map_or_else(|| "?".to_string(), |f| format!("{f:.2}")),
        ));
        self.run.start(metadata.known_total());

        let storage = ScratchDir::new(OUTPUT_DIR_PREFIX)
            .map_err(|e| PipelineError::resource("output storage", e))?;
        let storage = ResourceGuard::new("output storage", storage);
        let output_path = storage.join(&self.config.output_file_name);
        self.run.set_output_path(&output_path);

        let mut writer = ResourceGuard::new("output writer", writer);
        writer
            .open(&output_path, &metadata)
            .map_err(|e| PipelineError::resource("output writer", e))?;

        let loop_result =
            self.process_frames(&mut **source, &mut **writer, &mut adapter, &mut *sink);

        // Writer first so the container is finalized before anything else
        // is torn down.
        let finalize = writer.release();
        if let Err(e) = source.release() {
            log::warn!("Failed to close frame source: {e}");
        }
        if let Err(e) = upload_file.release() {
            log::warn!("Failed to remove upload scratch file: {e}");
        }
        loop_result?;
        finalize.map_err(|e| PipelineError::io("finalize", e))?;

        let processed = self.run.processed();
        if processed == 0 {
            self.run.complete();
            self.logger
                .info("No frames found in the uploaded video, nothing to annotate.");
            return Ok(self.summary(RunOutcome::NothingToProcess));
        }

        let output = DeliverableOutput::new(
            OUTPUT_MIME_TYPE,
            &self.config.output_file_name,
            output_path,
            storage,
        );
        // A missing file reads as empty too.
        if output.is_empty().unwrap_or(true) {
            return Err(PipelineError::resource(
                "output file",
                "Failed to save annotated video",
            ));
        }

        self.run.complete();
        if self.run.degraded() > 0 {
            self.logger.info(&format!(
                "{} of {processed} frames were written without annotations",
                self.run.degraded()
            ));
        }
        self.logger.info(&format!(
            "Video processed successfully! Total frames: {processed}"
        ));
        self.logger.summary();

        Ok(self.summary(RunOutcome::Delivered(output)))
    }

    /// Pulls, annotates, writes and publishes frames until the source ends.
    fn process_frames(
        &mut self,
        source: &mut dyn FrameSource,
        writer: &mut dyn VideoWriter,
        adapter: &mut InferenceAdapter,
        sink: &mut dyn DisplaySink,
    ) -> Result<(), PipelineError> {
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                self.logger
                    .info(&format!("Cancelled after {} frames", self.run.processed()));
                return Err(PipelineError::Cancelled);
            }

            let t = Instant::now();
            let Some(frame) = source.next_frame() else {
                break;
            };
            self.logger.timing(Stage::Acquire, elapsed_ms(t));

            let position = self.run.processed();

            let t = Instant::now();
            let annotated = adapter.annotate(frame);
            self.logger.timing(Stage::Annotate, elapsed_ms(t));
            self.logger
                .metric("detections", annotated.detections().len() as f64);

            let t = Instant::now();
            writer
                .write(annotated.frame())
                .map_err(|e| PipelineError::io("write", e))?;
            self.logger.timing(Stage::Write, elapsed_ms(t));

            self.run.record_frame(!annotated.is_annotated());

            if position % self.config.preview_interval == 0 {
                let t = Instant::now();
                let update = DisplayUpdate {
                    progress: progress_fraction(position, self.run.total_frames()),
                    caption: Some(format!("Frame {}", position + 1)),
                };
                sink.show(&annotated, &update);
                self.logger.timing(Stage::Publish, elapsed_ms(t));
            }

            self.logger
                .progress(self.run.processed(), self.run.total_frames());
        }

        if !source.is_healthy() {
            let processed = self.run.processed();
            match self.config.end_of_stream {
                EndOfStreamPolicy::TreatAsEnd => {
                    log::warn!(
                        "Source stopped on a read error after {processed} frames, treating as end of stream"
                    );
                }
                EndOfStreamPolicy::FailOnReadError => {
                    return Err(PipelineError::io(
                        "read",
                        format!("source failed after {processed} frames"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn summary(&self, outcome: RunOutcome) -> RunSummary {
        RunSummary {
            processed: self.run.processed(),
            degraded: self.run.degraded(),
            total_frames: self.run.total_frames(),
            outcome,
        }
    }
}

/// `(position + 1) / total` clamped to `[0, 1]`; `None` when the total is
/// unknown or zero.
fn progress_fraction(position: usize, total: Option<usize>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some(((position + 1) as f64 / total as f64).clamp(0.0, 1.0)),
        _ => None,
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
