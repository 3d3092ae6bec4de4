use std::path::Path;

use crate::lifecycle::resource_guard::Release;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Abstracts video encoding so the pipeline can write output without
/// depending on a specific codec library.
pub trait VideoWriter: Send {
    /// Creates the output file sized to the source's dimensions and rate.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Appends one frame. Frames are encoded in call order.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes and finalizes the container. Idempotent.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

impl Release for Box<dyn VideoWriter> {
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.close()
    }
}
