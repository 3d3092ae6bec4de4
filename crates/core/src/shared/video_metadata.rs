use crate::video::domain::frame_source::SourceOrigin;

/// Stream properties reported by a frame source when it opens.
///
/// `fps` and `total_frames` are best-effort: containers that do not expose
/// them, and live devices, report `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub total_frames: Option<usize>,
    pub codec: String,
    pub origin: SourceOrigin,
}

impl VideoMetadata {
    /// Frame rate to encode with, falling back to `default_fps` when the
    /// source did not report a usable one.
    pub fn fps_or(&self, default_fps: f64) -> f64 {
        match self.fps {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => default_fps,
        }
    }

    /// Known, non-zero total frame count.
    pub fn known_total(&self) -> Option<usize> {
        self.total_frames.filter(|&n| n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(fps: Option<f64>, total_frames: Option<usize>) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            origin: SourceOrigin::File(PathBuf::from("/tmp/in.mp4")),
        }
    }

    #[test]
    fn test_fps_or_uses_reported_rate() {
        assert_eq!(meta(Some(24.0), None).fps_or(30.0), 24.0);
    }

    #[test]
    fn test_fps_or_falls_back_when_missing_or_invalid() {
        assert_eq!(meta(None, None).fps_or(30.0), 30.0);
        assert_eq!(meta(Some(0.0), None).fps_or(30.0), 30.0);
        assert_eq!(meta(Some(f64::NAN), None).fps_or(30.0), 30.0);
    }

    #[test]
    fn test_known_total_ignores_zero() {
        assert_eq!(meta(None, Some(0)).known_total(), None);
        assert_eq!(meta(None, None).known_total(), None);
        assert_eq!(meta(None, Some(90)).known_total(), Some(90));
    }
}
