use crate::pipeline::display_sink::{DisplaySink, DisplayUpdate};
use crate::shared::frame::AnnotatedFrame;

/// Reports each published frame through the `log` facade.
pub struct LogDisplaySink {
    shown: usize,
}

impl LogDisplaySink {
    pub fn new() -> Self {
        Self { shown: 0 }
    }

    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl Default for LogDisplaySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for LogDisplaySink {
    fn show(&mut self, frame: &AnnotatedFrame, update: &DisplayUpdate) {
        self.shown += 1;

        let mut counts: Vec<(&str, usize)> = Vec::new();
        for det in frame.detections() {
            match counts.iter_mut().find(|(label, _)| *label == det.label()) {
                Some((_, n)) => *n += 1,
                None => counts.push((det.label(), 1)),
            }
        }
        let summary = if !frame.is_annotated() {
            "shown without overlay".to_string()
        } else if counts.is_empty() {
            "no detections".to_string()
        } else {
            counts
                .iter()
                .map(|(label, n)| format!("{n} {label}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let caption = update
            .caption
            .clone()
            .unwrap_or_else(|| format!("Frame {}", frame.index() + 1));
        match update.progress {
            Some(p) => log::info!("{caption} [{:.0}%]: {summary}", p * 100.0),
            None => log::info!("{caption}: {summary}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detection::Detection;
    use crate::shared::frame::Frame;

    #[test]
    fn test_counts_published_frames() {
        let mut sink = LogDisplaySink::new();
        let frame = AnnotatedFrame::new(
            Frame::new(vec![0; 12], 2, 2, 3, 0),
            vec![
                Detection::new([0.0, 0.0, 1.0, 1.0], 0, 0.9),
                Detection::new([0.0, 0.0, 1.0, 1.0], 0, 0.8),
            ],
        );
        sink.show(&frame, &DisplayUpdate::default());
        sink.show(
            &AnnotatedFrame::passthrough(Frame::new(vec![0; 12], 2, 2, 3, 1)),
            &DisplayUpdate {
                progress: Some(0.5),
                caption: Some("Frame 2".into()),
            },
        );
        assert_eq!(sink.shown(), 2);
    }
}
