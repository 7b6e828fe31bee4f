use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use studio_contracts::config::PollingConfig;
use studio_contracts::tasks::{TaskStatus, VideoTask};

use crate::error::{GenerationError, GenerationResult};
use crate::GenerationBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Floor for configured intervals; `interval_secs = 0` would spin on the API.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval().max(MIN_INTERVAL),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// What one status response means for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Continue { label: String },
    Completed { url: String },
    Failed(GenerationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { url: String, attempts: u32 },
    /// The owner stopped the loop; nothing was surfaced.
    Stopped { attempts: u32 },
}

pub fn progress_label(status: TaskStatus) -> String {
    format!("Rendering video... ({status})")
}

/// Blocks between ticks. Returning `false` ends the loop without an error.
pub trait PollPacer {
    fn wait(&mut self, interval: Duration) -> bool;

    fn stopped(&self) -> bool {
        false
    }
}

/// Sleep that wakes as soon as the stop flag is raised or the sending side
/// of the channel is dropped.
#[derive(Debug)]
pub struct ChannelPacer {
    wake: Receiver<()>,
    stop_flag: Arc<AtomicBool>,
}

impl ChannelPacer {
    pub fn new(wake: Receiver<()>, stop_flag: Arc<AtomicBool>) -> Self {
        Self { wake, stop_flag }
    }
}

impl PollPacer for ChannelPacer {
    fn wait(&mut self, interval: Duration) -> bool {
        if self.stopped() {
            return false;
        }
        match self.wake.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => !self.stopped(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }
}

/// Poll state for one video task.
///
/// `submitted -> queued -> in_progress -> completed | failed`, plus the
/// implicit timeout once `max_attempts` queries passed without a terminal
/// state. The terminal check of a tick runs before the timeout check, so a
/// task that finishes on the last allowed attempt still succeeds.
#[derive(Debug, Clone)]
pub struct TaskPoller {
    task_id: String,
    settings: PollSettings,
    attempts: u32,
    last_status: TaskStatus,
}

impl TaskPoller {
    pub fn new(task_id: impl Into<String>, settings: PollSettings) -> Self {
        Self {
            task_id: task_id.into(),
            settings,
            attempts: 0,
            last_status: TaskStatus::Submitted,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_status(&self) -> TaskStatus {
        self.last_status
    }

    pub fn observe(&mut self, response: GenerationResult<VideoTask>) -> PollStep {
        self.attempts += 1;
        let task = match response {
            Ok(task) => task,
            Err(err) => return PollStep::Failed(err),
        };
        self.last_status = task.status;

        match task.status {
            TaskStatus::Completed => {
                if let Some(url) = task.result_url() {
                    return PollStep::Completed {
                        url: url.to_string(),
                    };
                }
            }
            TaskStatus::Failed => {
                if task.is_user_cancelled() {
                    return PollStep::Failed(GenerationError::cancelled());
                }
                return PollStep::Failed(GenerationError::task_failed(task.error_message()));
            }
            _ => {}
        }

        if self.attempts >= self.settings.max_attempts {
            return PollStep::Failed(GenerationError::timed_out());
        }
        PollStep::Continue {
            label: progress_label(task.status),
        }
    }

    /// Runs ticks until a terminal step or until `pacer` stops the loop.
    /// `on_progress` sees every non-terminal label.
    pub fn run<P, F>(
        &mut self,
        source: &dyn GenerationBackend,
        pacer: &mut P,
        mut on_progress: F,
    ) -> GenerationResult<PollOutcome>
    where
        P: PollPacer + ?Sized,
        F: FnMut(&TaskPoller, &str),
    {
        loop {
            if !pacer.wait(self.settings.interval) {
                return Ok(PollOutcome::Stopped {
                    attempts: self.attempts,
                });
            }
            let response = source.fetch_task(&self.task_id);
            if pacer.stopped() {
                return Ok(PollOutcome::Stopped {
                    attempts: self.attempts,
                });
            }
            match self.observe(response) {
                PollStep::Continue { label } => on_progress(self, &label),
                PollStep::Completed { url } => {
                    return Ok(PollOutcome::Completed {
                        url,
                        attempts: self.attempts,
                    })
                }
                PollStep::Failed(err) => return Err(err),
            }
        }
    }
}
