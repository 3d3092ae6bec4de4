use thiserror::Error;

/// Structured error category, stable across message wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFormat,
    DeviceUnavailable,
    Io,
    Inference,
    Resource,
    Cancelled,
    Usage,
}

/// Failure to open a frame source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpenError {
    #[error("failed to load video, please provide a valid video file: {0}")]
    InvalidFormat(String),
    #[error("could not access webcam, please ensure it is connected and accessible: {0}")]
    DeviceUnavailable(String),
}

impl OpenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpenError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            OpenError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
        }
    }
}

/// Per-frame inference failure. Absorbed by the inference adapter.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("error processing frame {frame_index}: {message}")]
pub struct InferenceError {
    pub frame_index: usize,
    pub message: String,
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Inference
    }
}

/// Errors that end a pipeline run or webcam session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("{stage} failed: {message}")]
    Io { stage: &'static str, message: String },
    #[error("{resource}: {message}")]
    Resource {
        resource: &'static str,
        message: String,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("processing cancelled")]
    Cancelled,
    #[error("pipeline already executed")]
    AlreadyExecuted,
}

impl PipelineError {
    pub fn io(stage: &'static str, err: impl std::fmt::Display) -> Self {
        PipelineError::Io {
            stage,
            message: err.to_string(),
        }
    }

    pub fn resource(resource: &'static str, err: impl std::fmt::Display) -> Self {
        PipelineError::Resource {
            resource,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Open(e) => e.kind(),
            PipelineError::Io { .. } => ErrorKind::Io,
            PipelineError::Resource { .. } => ErrorKind::Resource,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Config(_) | PipelineError::AlreadyExecuted => ErrorKind::Usage,
        }
    }
}
