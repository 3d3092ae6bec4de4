use std::path::{Path, PathBuf};

use crate::pipeline::display_sink::{DisplaySink, DisplayUpdate};
use crate::shared::frame::AnnotatedFrame;
use crate::video::domain::image_writer::ImageWriter;

/// Keeps the latest published frame on disk as an image, overwriting it on
/// every update. A viewer can poll the file.
pub struct SnapshotDisplaySink {
    writer: Box<dyn ImageWriter>,
    path: PathBuf,
    max_side: Option<u32>,
    failures: usize,
}

impl SnapshotDisplaySink {
    pub fn new(writer: Box<dyn ImageWriter>, path: &Path, max_side: Option<u32>) -> Self {
        Self {
            writer,
            path: path.to_path_buf(),
            max_side,
            failures: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl DisplaySink for SnapshotDisplaySink {
    fn show(&mut self, frame: &AnnotatedFrame, update: &DisplayUpdate) {
        // A failed preview never stops the pipeline.
        if let Err(e) = self.writer.write(&self.path, frame.frame(), self.max_side) {
            self.failures += 1;
            log::warn!("Failed to write preview {}: {e}", self.path.display());
            return;
        }
        if let Some(caption) = &update.caption {
            log::debug!("Preview {} updated ({caption})", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use crate::video::infrastructure::image_file_writer::ImageFileWriter;

    fn annotated(index: usize, value: u8) -> AnnotatedFrame {
        AnnotatedFrame::new(Frame::new(vec![value; 64 * 48 * 3], 64, 48, 3, index), vec![])
    }

    #[test]
    fn test_snapshot_overwritten_with_latest_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let mut sink = SnapshotDisplaySink::new(Box::new(ImageFileWriter::new()), &path, None);

        sink.show(&annotated(0, 10), &DisplayUpdate::default());
        sink.show(&annotated(10, 240), &DisplayUpdate::default());

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [240, 240, 240]);
        assert_eq!(sink.failures(), 0);
    }

    #[test]
    fn test_write_failure_is_counted_not_raised() {
        let mut sink = SnapshotDisplaySink::new(
            Box::new(ImageFileWriter::new()),
            Path::new("/nonexistent/dir/preview.jpg"),
            Some(32),
        );
        sink.show(&annotated(0, 10), &DisplayUpdate::default());
        assert_eq!(sink.failures(), 1);
    }
}
