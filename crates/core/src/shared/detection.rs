use crate::shared::constants::COCO_CLASSES;

/// One detected object in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// `[x1, y1, x2, y2]`, top-left and bottom-right corners.
    pub bbox: [f64; 4],
    pub class_id: usize,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: [f64; 4], class_id: usize, confidence: f64) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }

    /// COCO label for the class, or `"unknown"` for ids outside the table.
    pub fn label(&self) -> &'static str {
        COCO_CLASSES.get(self.class_id).copied().unwrap_or("unknown")
    }

    pub fn width(&self) -> f64 {
        (self.bbox[2] - self.bbox[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f64 {
        let a = &self.bbox;
        let b = &other.bbox;
        let x1 = a[0].max(b[0]);
        let y1 = a[1].max(b[1]);
        let x2 = a[2].min(b[2]);
        let y2 = a[3].min(b[3]);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let area_a = self.width() * self.height();
        let area_b = other.width() * other.height();
        inter / (area_a + area_b - inter)
    }
}
