use crate::shared::frame::AnnotatedFrame;

/// What accompanies a published frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayUpdate {
    /// Completion fraction in `[0, 1]`, when the total is known.
    pub progress: Option<f64>,
    pub caption: Option<String>,
}

/// Receives annotated frames for a viewer.
///
/// Implementations must not hold on to the frame past the call.
pub trait DisplaySink: Send {
    fn show(&mut self, frame: &AnnotatedFrame, update: &DisplayUpdate);
}

/// Sink that discards everything. Used by tests and headless runs.
pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {
    fn show(&mut self, _frame: &AnnotatedFrame, _update: &DisplayUpdate) {}
}
