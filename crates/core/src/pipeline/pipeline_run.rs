use std::path::{Path, PathBuf};

/// Lifecycle of one video pipeline execution. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Bookkeeping for one video pipeline execution.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineRun {
    status: RunStatus,
    output_path: Option<PathBuf>,
    total_frames: Option<usize>,
    processed: usize,
    degraded: usize,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            status: RunStatus::Created,
            output_path: None,
            total_frames: None,
            processed: 0,
            degraded: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn total_frames(&self) -> Option<usize> {
        self.total_frames
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn degraded(&self) -> usize {
        self.degraded
    }

    /// `Created -> Running`. Returns false if the run already started.
    pub fn start(&mut self, total_frames: Option<usize>) -> bool {
        if self.status != RunStatus::Created {
            return false;
        }
        self.status = RunStatus::Running;
        self.total_frames = total_frames;
        true
    }

    pub fn set_output_path(&mut self, path: &Path) {
        self.output_path = Some(path.to_path_buf());
    }

    /// Counts one more frame written. A container that under-reported its
    /// length gets its total raised to match.
    pub fn record_frame(&mut self, degraded: bool) {
        self.processed += 1;
        if degraded {
            self.degraded += 1;
        }
        if let Some(total) = self.total_frames {
            if self.processed > total {
                log::warn!(
                    "Source reported {total} frames but yielded more; raising total to {}",
                    self.processed
                );
                self.total_frames = Some(self.processed);
            }
        }
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self) -> bool {
        self.finish(RunStatus::Completed)
    }

    /// `Created | Running -> Failed`.
    pub fn fail(&mut self) -> bool {
        self.finish(RunStatus::Failed)
    }

    fn finish(&mut self, to: RunStatus) -> bool {
        let allowed = match to {
            RunStatus::Completed => self.status == RunStatus::Running,
            _ => !self.status.is_terminal(),
        };
        if allowed {
            self.status = to;
        }
        allowed
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
