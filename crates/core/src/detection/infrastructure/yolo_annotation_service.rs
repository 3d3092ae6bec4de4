use crate::detection::domain::inference_service::InferenceService;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::frame::{AnnotatedFrame, Frame};

use super::box_renderer::BoxRenderer;

/// Default inference service: run the detector, then outline every
/// detection on a copy of the frame.
pub struct YoloAnnotationService {
    detector: Box<dyn ObjectDetector>,
    renderer: BoxRenderer,
}

impl YoloAnnotationService {
    pub fn new(detector: Box<dyn ObjectDetector>, renderer: BoxRenderer) -> Self {
        Self { detector, renderer }
    }
}

impl InferenceService for YoloAnnotationService {
    fn annotate(&mut self, frame: &Frame) -> Result<AnnotatedFrame, Box<dyn std::error::Error>> {
        let detections = self.detector.detect(frame)?;
        let mut annotated = frame.clone();
        self.renderer.render(&mut annotated, &detections);
        Ok(AnnotatedFrame::new(annotated, detections))
    }
}
