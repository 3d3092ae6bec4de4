use std::fmt;
use std::path::PathBuf;

use crate::lifecycle::resource_guard::Release;
use crate::shared::error::OpenError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Where frames come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceOrigin {
    /// A container file on disk (mp4, avi, mov, ...).
    File(PathBuf),
    /// A system camera, identified by its index.
    Device { index: u32 },
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::File(path) => write!(f, "{}", path.display()),
            SourceOrigin::Device { index } => write!(f, "camera #{index}"),
        }
    }
}

/// Pull-based frame acquisition over a decoded file or a live device.
///
/// `next_frame` returning `None` means either end of stream or an I/O
/// failure; `is_healthy` tells the two apart.
pub trait FrameSource: Send {
    /// Acquires the underlying file or device and reports its metadata.
    fn open(&mut self, origin: &SourceOrigin) -> Result<VideoMetadata, OpenError>;

    /// Decodes the next frame in stream order.
    fn next_frame(&mut self) -> Option<Frame>;

    /// False once a read or decode failure ended the stream early.
    fn is_healthy(&self) -> bool;

    /// Releases the file or device. Safe to call repeatedly and after a
    /// failed `open`.
    fn close(&mut self);
}

impl Release for Box<dyn FrameSource> {
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.close();
        Ok(())
    }
}
