pub mod box_renderer;
pub mod onnx_yolo_detector;
pub mod yolo_annotation_service;
