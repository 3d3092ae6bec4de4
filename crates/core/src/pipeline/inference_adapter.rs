use crate::detection::domain::inference_service::InferenceService;
use crate::shared::error::InferenceError;
use crate::shared::frame::{AnnotatedFrame, Frame};

/// Callback invoked once per frame whose inference failed.
pub type InferenceErrorFn = Box<dyn Fn(&InferenceError) + Send>;

/// Wraps an `InferenceService` so a failing frame degrades to passthrough
/// instead of ending the stream.
pub struct InferenceAdapter {
    service: Box<dyn InferenceService>,
    on_error: Option<InferenceErrorFn>,
    annotated: usize,
    degraded: usize,
}

impl InferenceAdapter {
    pub fn new(service: Box<dyn InferenceService>) -> Self {
        Self {
            service,
            on_error: None,
            annotated: 0,
            degraded: 0,
        }
    }

    pub fn with_error_callback(mut self, on_error: InferenceErrorFn) -> Self {
        self.on_error = Some(on_error);
        self
    }

    /// Annotates `frame`. On failure the original frame comes back
    /// unannotated and the error is reported once.
    pub fn annotate(&mut self, frame: Frame) -> AnnotatedFrame {
        match self.service.annotate(&frame) {
            Ok(annotated) => {
                self.annotated += 1;
                annotated
            }
            Err(e) => {
                self.degraded += 1;
                let err = InferenceError {
                    frame_index: frame.index(),
                    message: e.to_string(),
                };
                log::warn!("{err}");
                if let Some(cb) = &self.on_error {
                    cb(&err);
                }
                AnnotatedFrame::passthrough(frame)
            }
        }
    }

    /// Frames that went through inference successfully.
    pub fn annotated_count(&self) -> usize {
        self.annotated
    }

    /// Frames returned without overlay because inference failed.
    pub fn degraded_count(&self) -> usize {
        self.degraded
    }
}
