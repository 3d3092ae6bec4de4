use crate::shared::frame::{AnnotatedFrame, Frame};

/// Turns a raw frame into an annotated one: detections plus the overlay
/// drawn into the pixels.
///
/// The input frame is borrowed so a caller can fall back to it unchanged
/// when annotation fails.
pub trait InferenceService: Send {
    fn annotate(&mut self, frame: &Frame) -> Result<AnnotatedFrame, Box<dyn std::error::Error>>;
}
