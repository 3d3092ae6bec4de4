use std::path::Path;
use std::time::Duration;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::error::OpenError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{FrameSource, SourceOrigin};

/// Back-off when a live device has no packet ready yet.
const DEVICE_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Decodes frames from a container file or a camera via ffmpeg-next
/// (libavformat + libavdevice + libavcodec).
///
/// Every decoded frame is converted to RGB24 at the source's native size.
pub struct FfmpegSource {
    input_ctx: Option<Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    video_stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
    flushing: bool,
    done: bool,
    healthy: bool,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            decoder: None,
            scaler: None,
            video_stream_index: 0,
            width: 0,
            height: 0,
            frame_index: 0,
            flushing: false,
            done: true,
            healthy: true,
        }
    }

    fn attach(&mut self, ictx: Input, origin: &SourceOrigin) -> Result<VideoMetadata, String> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| e.to_string())?;
        let decoder = codec_ctx.decoder().video().map_err(|e| e.to_string())?;

        let fps =
            rational_to_fps(stream.avg_frame_rate()).or_else(|| rational_to_fps(stream.rate()));
        let total_frames = match origin {
            SourceOrigin::File(_) if stream.frames() > 0 => Some(stream.frames() as usize),
            _ => None,
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            origin: origin.clone(),
        };

        if metadata.width == 0 || metadata.height == 0 {
            return Err("video stream reports zero dimensions".into());
        }

        self.width = metadata.width;
        self.height = metadata.height;
        self.video_stream_index = video_stream_index;
        self.decoder = Some(decoder);
        self.input_ctx = Some(ictx);
        self.frame_index = 0;
        self.flushing = false;
        self.done = false;
        self.healthy = true;

        Ok(metadata)
    }

    /// Pulls one decoded frame out of the decoder, if it has one ready.
    fn receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };
        let mut decoded = Video::empty();
        if decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        // Cameras can report their pixel format only once the first frame
        // arrives, so the scaler is built lazily from the decoded frame.
        if self.scaler.is_none() {
            self.scaler = Some(ffmpeg_next::software::scaling::Context::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                ffmpeg_next::format::Pixel::RGB24,
                self.width,
                self.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?);
        }
        let scaler = self.scaler.as_mut().ok_or("scaler unavailable")?;

        let mut rgb_frame = Video::empty();
        scaler.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn fail(&mut self, reason: impl std::fmt::Display) {
        log::warn!("Frame source stopped after {} frames: {reason}", self.frame_index);
        self.healthy = false;
        self.done = true;
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self, origin: &SourceOrigin) -> Result<VideoMetadata, OpenError> {
        self.close();

        let to_open_err = |reason: String| match origin {
            SourceOrigin::File(path) => {
                OpenError::InvalidFormat(format!("{}: {reason}", path.display()))
            }
            SourceOrigin::Device { index } => {
                OpenError::DeviceUnavailable(format!("camera #{index}: {reason}"))
            }
        };

        let ictx = match origin {
            SourceOrigin::File(path) => open_file(path),
            SourceOrigin::Device { index } => open_device(*index),
        }
        .map_err(|e| to_open_err(e.to_string()))?;

        let metadata = self.attach(ictx, origin).map_err(to_open_err)?;
        log::info!(
            "Opened {origin}: {}x{} @ {} fps, {} frames, codec {}",
            metadata.width,
            metadata.height,
            metadata
                .fps
                .map_or_else(|| "?".to_string(), |f| format!("{f:.2}")),
            metadata
                .total_frames
                .map_or_else(|| "?".to_string(), |n| n.to_string()),
            metadata.codec,
        );
        Ok(metadata)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        while !self.done {
            match self.receive() {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => {}
                Err(e) => {
                    self.fail(e);
                    return None;
                }
            }

            if self.flushing {
                self.done = true;
                return None;
            }

            let ictx = self.input_ctx.as_mut()?;
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(ictx) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Some(decoder) = self.decoder.as_mut() {
                        if let Err(e) = decoder.send_packet(&packet) {
                            log::debug!("Skipping undecodable packet: {e}");
                        }
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        let _ = decoder.send_eof();
                    }
                    self.flushing = true;
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    std::thread::sleep(DEVICE_RETRY_DELAY);
                }
                Err(e) => {
                    self.fail(e);
                    return None;
                }
            }
        }
        None
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn close(&mut self) {
        if self.input_ctx.is_some() {
            log::debug!("Closing frame source after {} frames", self.frame_index);
        }
        self.scaler = None;
        self.decoder = None;
        self.input_ctx = None;
        self.done = true;
    }
}

fn open_file(path: &Path) -> Result<Input, Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;
    Ok(ffmpeg_next::format::input(path)?)
}

fn open_device(index: u32) -> Result<Input, Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;
    ffmpeg_next::device::register_all();

    let (format_name, url) = capture_input(index);
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|name| name == format_name))
        .ok_or_else(|| format!("capture backend '{format_name}' not available"))?;

    let context = ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )?;
    Ok(context.input())
}

/// Platform capture backend and device URL for a camera index.
fn capture_input(index: u32) -> (&'static str, String) {
    #[cfg(target_os = "macos")]
    {
        ("avfoundation", index.to_string())
    }
    #[cfg(target_os = "windows")]
    {
        ("vfwcap", index.to_string())
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ("v4l2", format!("/dev/video{index}"))
    }
}

fn rational_to_fps(rate: ffmpeg_next::Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
