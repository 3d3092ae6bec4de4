use ndarray::ArrayView3;

use crate::shared::detection::Detection;

/// A single decoded frame: contiguous RGB bytes in row-major order.
///
/// `index` is the frame's position in its stream. Pixel format conversion
/// happens at I/O boundaries only.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// A frame after the inference step.
///
/// `annotated` is false when inference failed and the frame passed through
/// untouched; `detections` is then empty.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedFrame {
    frame: Frame,
    detections: Vec<Detection>,
    annotated: bool,
}

impl AnnotatedFrame {
    pub fn new(frame: Frame, detections: Vec<Detection>) -> Self {
        Self {
            frame,
            detections,
            annotated: true,
        }
    }

    /// Wraps an original frame that carries no overlay.
    pub fn passthrough(frame: Frame) -> Self {
        Self {
            frame,
            detections: Vec::new(),
            annotated: false,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn is_annotated(&self) -> bool {
        self.annotated
    }

    pub fn index(&self) -> usize {
        self.frame.index()
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }
}
