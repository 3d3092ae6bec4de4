use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::lifecycle::resource_guard::ResourceGuard;
use crate::shared::constants::{DEFAULT_DEVICE_INDEX, DEFAULT_FRAME_SKIP, DEFAULT_WEBCAM_PACING};
use crate::shared::error::PipelineError;
use crate::video::domain::frame_source::{FrameSource, SourceOrigin};

use super::display_sink::{DisplaySink, DisplayUpdate};
use super::inference_adapter::InferenceAdapter;

const CAPTURE_FAILED: &str = "Failed to capture video frame.";

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct WebcamConfig {
    pub device_index: u32,
    /// Annotate every K-th acquired frame (0, K, 2K, ...); drop the rest.
    pub frame_skip: usize,
    /// Sleep after each loop iteration.
    pub pacing: Duration,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device_index: DEFAULT_DEVICE_INDEX,
            frame_skip: DEFAULT_FRAME_SKIP,
            pacing: DEFAULT_WEBCAM_PACING,
        }
    }
}

impl WebcamConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_skip == 0 {
            return Err("frame skip must be at least 1".into());
        }
        Ok(())
    }
}

/// The capture device is open iff the session is `Active`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebcamState {
    Idle,
    Active,
}

/// Frame counts for one Active period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub acquired: usize,
    /// Frames sent through inference and published.
    pub processed: usize,
    /// Processed frames published without overlay.
    pub degraded: usize,
}

/// Emitted when the capture loop exits.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Stopped on request.
    Stopped(SessionSummary),
    /// Ended on its own because acquisition failed. The session is Idle.
    Failed {
        error: PipelineError,
        summary: SessionSummary,
    },
}

/// Components that move onto the capture thread and come back on join.
struct LoopParts {
    source: Box<dyn FrameSource>,
    adapter: InferenceAdapter,
    sink: Box<dyn DisplaySink>,
}

/// Start/stop-able live annotation over a capture device.
///
/// `start` opens the device on the caller's thread and runs the capture
/// loop on a worker; `stop` signals the worker, waits for it and takes the
/// device back so the session can be started again.
pub struct WebcamSession {
    config: WebcamConfig,
    parts: Option<LoopParts>,
    worker: Option<JoinHandle<(LoopParts, SessionSummary)>>,
    state: Arc<AtomicU8>,
    stop_requested: Arc<AtomicBool>,
    cancel: Option<Arc<AtomicBool>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl WebcamSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        adapter: InferenceAdapter,
        sink: Box<dyn DisplaySink>,
        config: WebcamConfig,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            parts: Some(LoopParts {
                source,
                adapter,
                sink,
            }),
            worker: None,
            state: Arc::new(AtomicU8::new(IDLE)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            cancel: None,
            events_tx,
            events_rx,
        }
    }

    /// Shares a cancellation flag with the caller. Raising it stops the
    /// loop at its next iteration. The session only reads this flag, so one
    /// raised before `start` ends the new loop straight away.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> WebcamState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => WebcamState::Active,
            _ => WebcamState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == WebcamState::Active
    }

    /// Loop exit notifications, including self-termination on capture
    /// failure.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Opens the device and starts the capture loop. No-op when Active.
    ///
    /// On failure the session stays Idle.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.is_active() {
            log::debug!("Webcam session already active");
            return Ok(());
        }
        self.config.validate().map_err(PipelineError::Config)?;
        // A loop that ended on its own still holds the parts.
        self.reclaim();

        let mut parts = self
            .parts
            .take()
            .ok_or_else(|| PipelineError::resource("webcam session", "capture loop was lost"))?;

        let origin = SourceOrigin::Device {
            index: self.config.device_index,
        };
        let metadata = match parts.source.open(&origin) {
            Ok(metadata) => metadata,
            Err(e) => {
                parts.source.close();
                self.parts = Some(parts);
                log::warn!("{e}");
                return Err(e.into());
            }
        };
        log::info!(
            "Webcam session started on {origin} ({}x{})",
            metadata.width,
            metadata.height
        );

        self.stop_requested.store(false, Ordering::Relaxed);
        self.state.store(ACTIVE, Ordering::Release);

        let config = self.config.clone();
        let stop_requested = self.stop_requested.clone();
        let cancel = self.cancel.clone();
        let state = self.state.clone();
        let events = self.events_tx.clone();
        self.worker = Some(thread::spawn(move || {
            let should_stop = || {
                stop_requested.load(Ordering::Relaxed)
                    || cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
            };
            capture_loop(parts, &config, should_stop, &state, &events)
        }));
        Ok(())
    }

    /// Stops the loop, releases the device and returns the counts for the
    /// Active period that just ended. `None` when nothing was running.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        if self.worker.is_none() {
            return None;
        }
        self.stop_requested.store(true, Ordering::Relaxed);
        let summary = self.reclaim();
        if let Some(summary) = &summary {
            log::info!(
                "Webcam session stopped ({} frames acquired, {} annotated)",
                summary.acquired,
                summary.processed
            );
        }
        summary
    }

    /// Joins a finished or cancelled worker and takes its parts back.
    fn reclaim(&mut self) -> Option<SessionSummary> {
        let handle = self.worker.take()?;
        let result = handle.join();
        self.state.store(IDLE, Ordering::Release);
        match result {
            Ok((parts, summary)) => {
                self.parts = Some(parts);
                Some(summary)
            }
            Err(_) => {
                log::error!("Webcam capture loop panicked; the device handle is lost");
                None
            }
        }
    }
}

impl Drop for WebcamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    parts: LoopParts,
    config: &WebcamConfig,
    should_stop: impl Fn() -> bool,
    state: &AtomicU8,
    events: &Sender<SessionEvent>,
) -> (LoopParts, SessionSummary) {
    let LoopParts {
        source,
        mut adapter,
        mut sink,
    } = parts;
    let mut source = ResourceGuard::new("webcam device", source);
    let mut summary = SessionSummary::default();
    let mut error = None;

    loop {
        if should_stop() {
            break;
        }

        let Some(frame) = source.next_frame() else {
            error = Some(PipelineError::io("capture", CAPTURE_FAILED));
            break;
        };
        let position = summary.acquired;
        summary.acquired += 1;

        if position % config.frame_skip == 0 {
            let annotated = adapter.annotate(frame);
            summary.processed += 1;
            if !annotated.is_annotated() {
                summary.degraded += 1;
            }
            let update = DisplayUpdate {
                progress: None,
                caption: Some(format!("Frame {}", position + 1)),
            };
            sink.show(&annotated, &update);
        }

        thread::sleep(config.pacing);
    }

    let (source, released) = source.into_inner();
    if let Err(e) = released {
        log::warn!("Failed to release webcam device: {e}");
    }
    state.store(IDLE, Ordering::Release);

    let event = match error {
        Some(error) => {
            log::error!("{error}");
            SessionEvent::Failed { error, summary }
        }
        None => SessionEvent::Stopped(summary),
    };
    // The session owns a receiver, so this only fails once it is gone.
    let _ = events.send(event);

    (
        LoopParts {
            source,
            adapter,
            sink,
        },
        summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::inference_service::InferenceService;
    use crate::shared::error::{ErrorKind, OpenError};
    use crate::shared::frame::{AnnotatedFrame, Frame};
    use crate::shared::video_metadata::VideoMetadata;
    use std::sync::Mutex;

    const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Default)]
    struct CameraLog {
        opens: usize,
        closes: usize,
        is_open: bool,
    }

    /// Camera yielding `frames` frames per open (unbounded when `None`),
    /// then a capture failure.
    struct StubCamera {
        frames: Option<usize>,
        available: bool,
        next: usize,
        log: Arc<Mutex<CameraLog>>,
    }

    impl StubCamera {
        fn new(frames: Option<usize>) -> (Self, Arc<Mutex<CameraLog>>) {
            let log = Arc::new(Mutex::new(CameraLog::default()));
            (
                Self {
                    frames,
                    available: true,
                    next: 0,
                    log: log.clone(),
                },
                log,
            )
        }
    }

    impl FrameSource for StubCamera {
        fn open(&mut self, origin: &SourceOrigin) -> Result<VideoMetadata, OpenError> {
            if !self.available {
                return Err(OpenError::DeviceUnavailable("no such device".into()));
            }
            let mut log = self.log.lock().unwrap();
            log.opens += 1;
            log.is_open = true;
            self.next = 0;
            Ok(VideoMetadata {
                width: 2,
                height: 2,
                fps: None,
                total_frames: None,
                codec: "stub".into(),
                origin: origin.clone(),
            })
        }

        fn next_frame(&mut self) -> Option<Frame> {
            if self.frames.is_some_and(|n| self.next >= n) {
                return None;
            }
            let frame = Frame::new(vec![0; 12], 2, 2, 3, self.next);
            self.next += 1;
            Some(frame)
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn close(&mut self) {
            let mut log = self.log.lock().unwrap();
            if log.is_open {
                log.closes += 1;
            }
            log.is_open = false;
        }
    }

    struct MarkingService;

    impl InferenceService for MarkingService {
        fn annotate(
            &mut self,
            frame: &Frame,
        ) -> Result<AnnotatedFrame, Box<dyn std::error::Error>> {
            Ok(AnnotatedFrame::new(frame.clone(), vec![]))
        }
    }

    struct RecordingSink {
        shown: Arc<Mutex<Vec<usize>>>,
    }

    impl DisplaySink for RecordingSink {
        fn show(&mut self, frame: &AnnotatedFrame, _update: &DisplayUpdate) {
            self.shown.lock().unwrap().push(frame.index());
        }
    }

    fn session(
        camera: StubCamera,
        pacing: Duration,
    ) -> (WebcamSession, Arc<Mutex<Vec<usize>>>) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let session = WebcamSession::new(
            Box::new(camera),
            InferenceAdapter::new(Box::new(MarkingService)),
            Box::new(RecordingSink {
                shown: shown.clone(),
            }),
            WebcamConfig {
                pacing,
                ..WebcamConfig::default()
            },
        );
        (session, shown)
    }

    #[test]
    fn test_start_then_immediate_stop() {
        let (camera, log) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::from_millis(1));

        session.start().unwrap();
        assert_eq!(session.state(), WebcamState::Active);
        assert!(log.lock().unwrap().is_open);

        let summary = session.stop().unwrap();
        assert_eq!(session.state(), WebcamState::Idle);
        let log = log.lock().unwrap();
        assert!(!log.is_open);
        assert_eq!((log.opens, log.closes), (1, 1));
        assert!(summary.processed <= summary.acquired);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (camera, _) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::ZERO);
        assert_eq!(session.stop(), None);
        assert_eq!(session.state(), WebcamState::Idle);
    }

    #[test]
    fn test_unavailable_device_stays_idle() {
        let (mut camera, log) = StubCamera::new(None);
        camera.available = false;
        let (mut session, _) = session(camera, Duration::ZERO);

        let err = session.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(session.state(), WebcamState::Idle);
        assert!(!log.lock().unwrap().is_open);
    }

    #[test]
    fn test_every_second_frame_annotated() {
        let (camera, log) = StubCamera::new(Some(100));
        let (mut session, shown) = session(camera, Duration::ZERO);
        let events = session.events();

        session.start().unwrap();
        let event = events.recv_timeout(EVENT_TIMEOUT).unwrap();

        let (error, summary) = match event {
            SessionEvent::Failed { error, summary } => (error, summary),
            other => panic!("expected capture failure, got {other:?}"),
        };
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.to_string().contains("Failed to capture video frame."));
        assert_eq!(summary.acquired, 100);
        assert_eq!(summary.processed, 50);
        let shown = shown.lock().unwrap();
        assert_eq!(shown.len(), 50);
        assert!(shown.iter().all(|i| i % 2 == 0));

        assert_eq!(session.state(), WebcamState::Idle);
        assert!(!log.lock().unwrap().is_open);
    }

    #[test]
    fn test_start_while_active_is_noop() {
        let (camera, log) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::from_millis(1));

        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(log.lock().unwrap().opens, 1);
        session.stop();
    }

    #[test]
    fn test_restart_after_stop() {
        let (camera, log) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::from_millis(1));

        session.start().unwrap();
        session.stop();
        session.start().unwrap();
        assert!(session.is_active());
        session.stop();

        let log = log.lock().unwrap();
        assert_eq!((log.opens, log.closes), (2, 2));
    }

    #[test]
    fn test_restart_after_capture_failure() {
        let (camera, log) = StubCamera::new(Some(3));
        let (mut session, _) = session(camera, Duration::ZERO);
        let events = session.events();

        session.start().unwrap();
        assert!(matches!(
            events.recv_timeout(EVENT_TIMEOUT).unwrap(),
            SessionEvent::Failed { .. }
        ));

        session.start().unwrap();
        assert!(matches!(
            events.recv_timeout(EVENT_TIMEOUT).unwrap(),
            SessionEvent::Failed { .. }
        ));
        assert_eq!(log.lock().unwrap().opens, 2);
        assert_eq!(session.state(), WebcamState::Idle);
    }

    #[test]
    fn test_external_cancel_flag_stops_loop() {
        let (camera, log) = StubCamera::new(None);
        let (session, _) = session(camera, Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut session = session.with_cancel_flag(cancelled.clone());
        let events = session.events();

        session.start().unwrap();
        cancelled.store(true, Ordering::Relaxed);

        assert!(matches!(
            events.recv_timeout(EVENT_TIMEOUT).unwrap(),
            SessionEvent::Stopped(_)
        ));
        assert_eq!(session.state(), WebcamState::Idle);
        assert!(!log.lock().unwrap().is_open);
    }

    #[test]
    fn test_cancel_flag_is_never_written_by_session() {
        let (camera, _) = StubCamera::new(None);
        let (session, _) = session(camera, Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut session = session.with_cancel_flag(cancelled.clone());

        session.start().unwrap();
        session.stop().unwrap();
        assert!(!cancelled.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cancel_raised_before_start_is_honoured() {
        let (camera, log) = StubCamera::new(None);
        let (session, shown) = session(camera, Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(true));
        let mut session = session.with_cancel_flag(cancelled.clone());
        let events = session.events();

        session.start().unwrap();

        assert_eq!(
            events.recv_timeout(EVENT_TIMEOUT).unwrap(),
            SessionEvent::Stopped(SessionSummary::default())
        );
        assert!(cancelled.load(Ordering::Relaxed));
        assert!(shown.lock().unwrap().is_empty());
        assert!(!log.lock().unwrap().is_open);
    }

    #[test]
    fn test_zero_frame_skip_rejected_by_start() {
        let (camera, log) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::from_millis(1));
        session.config.frame_skip = 0;

        let err = session.start().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(session.state(), WebcamState::Idle);
        assert_eq!(log.lock().unwrap().opens, 0);

        session.config.frame_skip = 1;
        session.start().unwrap();
        assert!(session.is_active());
        session.stop();
    }

    #[test]
    fn test_drop_releases_device() {
        let (camera, log) = StubCamera::new(None);
        let (mut session, _) = session(camera, Duration::from_millis(1));
        session.start().unwrap();
        drop(session);
        assert!(!log.lock().unwrap().is_open);
    }

    #[test]
    fn test_config_validation() {
        assert!(WebcamConfig::default().validate().is_ok());
        let bad = WebcamConfig {
            frame_skip: 0,
            ..WebcamConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
