use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Default outline thickness in pixels.
const DEFAULT_THICKNESS: u32 = 2;

/// Per-class outline colours (RGB), cycled by class id.
const PALETTE: [[u8; 3]; 20] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [146, 204, 23],
    [61, 219, 134],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
    [52, 69, 147],
    [100, 115, 255],
    [0, 24, 236],
    [132, 56, 255],
    [82, 0, 133],
    [203, 56, 255],
    [255, 149, 200],
    [255, 55, 199],
];

/// Draws detection outlines into RGB frames in place.
pub struct BoxRenderer {
    thickness: u32,
}

impl BoxRenderer {
    pub fn new(thickness: u32) -> Self {
        Self {
            thickness: thickness.max(1),
        }
    }

    pub fn color_for(class_id: usize) -> [u8; 3] {
        PALETTE[class_id % PALETTE.len()]
    }

    /// Outline every detection. Boxes are clamped to the frame; boxes that
    /// fall entirely outside it are skipped.
    pub fn render(&self, frame: &mut Frame, detections: &[Detection]) {
        let fw = frame.width() as i64;
        let fh = frame.height() as i64;
        if fw == 0 || fh == 0 || frame.channels() < 3 {
            return;
        }
        let channels = frame.channels() as usize;
        let stride = fw as usize * channels;
        let data = frame.data_mut();

        for det in detections {
            if det.bbox[2] <= 0.0
                || det.bbox[3] <= 0.0
                || det.bbox[0] >= fw as f64
                || det.bbox[1] >= fh as f64
            {
                continue;
            }
            let x1 = (det.bbox[0].floor() as i64).clamp(0, fw - 1);
            let y1 = (det.bbox[1].floor() as i64).clamp(0, fh - 1);
            let x2 = (det.bbox[2].ceil() as i64 - 1).clamp(0, fw - 1);
            let y2 = (det.bbox[3].ceil() as i64 - 1).clamp(0, fh - 1);
            if x2 < x1 || y2 < y1 {
                continue;
            }

            let color = Self::color_for(det.class_id);
            let t = self.thickness as i64 - 1;
            let mut fill = |ax: i64, ay: i64, bx: i64, by: i64| {
                let (ax, bx) = (ax.max(x1), bx.min(x2));
                let (ay, by) = (ay.max(y1), by.min(y2));
                for y in ay..=by {
                    let row = y as usize * stride;
                    for x in ax..=bx {
                        let p = row + x as usize * channels;
                        data[p..p + 3].copy_from_slice(&color);
                    }
                }
            };

            fill(x1, y1, x2, y1 + t);
            fill(x1, y2 - t, x2, y2);
            fill(x1, y1, x1 + t, y2);
            fill(x2 - t, y1, x2, y2);
        }
    }
}

impl Default for BoxRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_THICKNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let p = (y * frame.width() as usize + x) * 3;
        [frame.data()[p], frame.data()[p + 1], frame.data()[p + 2]]
    }

    #[test]
    fn test_outline_drawn_interior_untouched() {
        let mut frame = make_frame(50, 50);
        let det = Detection::new([10.0, 10.0, 30.0, 30.0], 0, 0.9);
        BoxRenderer::default().render(&mut frame, &[det]);

        let color = BoxRenderer::color_for(0);
        assert_eq!(pixel(&frame, 10, 10), color);
        assert_eq!(pixel(&frame, 20, 11), color);
        assert_eq!(pixel(&frame, 29, 29), color);
        assert_eq!(pixel(&frame, 20, 20), [0, 0, 0]);
        assert_eq!(pixel(&frame, 5, 5), [0, 0, 0]);
        assert_eq!(pixel(&frame, 31, 31), [0, 0, 0]);
    }

    #[test]
    fn test_box_clamped_to_frame() {
        let mut frame = make_frame(20, 20);
        let det = Detection::new([-10.0, -10.0, 100.0, 100.0], 3, 0.9);
        BoxRenderer::default().render(&mut frame, &[det]);

        let color = BoxRenderer::color_for(3);
        assert_eq!(pixel(&frame, 0, 0), color);
        assert_eq!(pixel(&frame, 19, 19), color);
        assert_eq!(pixel(&frame, 10, 10), [0, 0, 0]);
    }

    #[test]
    fn test_box_outside_frame_skipped() {
        let mut frame = make_frame(20, 20);
        let before = frame.clone();
        let dets = [
            Detection::new([-30.0, -30.0, -10.0, -10.0], 0, 0.9),
            Detection::new([30.0, 30.0, 40.0, 40.0], 0, 0.9),
        ];
        BoxRenderer::default().render(&mut frame, &dets);
        assert_eq!(frame, before);
    }

    #[test]
    fn test_palette_differs_by_class() {
        assert_ne!(BoxRenderer::color_for(0), BoxRenderer::color_for(1));
        assert_eq!(BoxRenderer::color_for(0), BoxRenderer::color_for(PALETTE.len()));
    }

    #[test]
    fn test_no_detections_leaves_frame_unchanged() {
        let mut frame = make_frame(8, 8);
        let before = frame.clone();
        BoxRenderer::new(3).render(&mut frame, &[]);
        assert_eq!(frame, before);
    }
}
