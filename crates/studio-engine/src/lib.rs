use std::path::Path;

use serde_json::{Map, Value};
use studio_contracts::tasks::VideoTask;

mod client;
mod error;
mod poller;
mod request;
mod session;

pub use client::{parse_image_response, parse_task_response, ApiClient, ImageResult};
pub use error::{
    GenerationError, GenerationErrorKind, GenerationResult, CANCELLED_MESSAGE,
    INVALID_FORMAT_MESSAGE, TASK_FAILED_DEFAULT_MESSAGE, TIMED_OUT_MESSAGE,
};
pub use poller::{
    progress_label, ChannelPacer, PollOutcome, PollPacer, PollSettings, PollStep, TaskPoller,
};
pub use request::{image_payload, video_params, GenerationRequest, Mode};
pub use session::{GenerationSession, SessionSnapshot, Submission, VIDEO_SUBMITTED_LABEL};

/// The remote side of a generation. `ApiClient` talks HTTP; tests script it.
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    fn generate_image(&self, prompt: &str) -> GenerationResult<ImageResult>;
    fn edit_image(&self, prompt: &str, image: &Path) -> GenerationResult<ImageResult>;
    fn submit_video(&self, request: &GenerationRequest) -> GenerationResult<VideoTask>;
    fn fetch_task(&self, task_id: &str) -> GenerationResult<VideoTask>;
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}


#[cfg(test)]
mod tests {
    use super::truncate_text;

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
