use std::time::Duration;

pub const YOLO_MODEL_NAME: &str = "yolov8n.onnx";

/// Detection confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// IoU above which a lower-scoring box of the same class is suppressed.
pub const DEFAULT_NMS_IOU: f64 = 0.7;

/// Publish every Nth frame to the display sink in video mode.
pub const DEFAULT_PREVIEW_INTERVAL: usize = 10;

/// Annotate every Kth acquired frame in webcam mode.
pub const DEFAULT_FRAME_SKIP: usize = 2;

/// Delay after each webcam loop iteration.
pub const DEFAULT_WEBCAM_PACING: Duration = Duration::from_millis(30);

/// Encoder frame rate when the source does not report one.
pub const FALLBACK_FPS: f64 = 30.0;

pub const DEFAULT_DEVICE_INDEX: u32 = 0;

pub const OUTPUT_FILE_NAME: &str = "annotated_video.mp4";
pub const OUTPUT_MIME_TYPE: &str = "video/mp4";
pub const UPLOAD_SUFFIX: &str = ".mp4";

pub const UPLOAD_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Class labels in YOLOv8 output order.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];
