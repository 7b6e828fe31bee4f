use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Marker the upstream API uses when the user declines a high-cost request.
pub const USER_CANCELLED_MARKER: &str = "USER_CANCELLED_HIGH_COST_REQUEST";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Submitted,
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub url: Option<String>,
}

/// Server-side handle for an asynchronous video job, as returned by both the
/// submission and the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTask {
    pub task_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub data: Vec<TaskOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// In-progress status payloads send `null` for fields they have not filled yet.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl VideoTask {
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            data: Vec::new(),
            error: None,
        }
    }

    pub fn result_url(&self) -> Option<&str> {
        self.data
            .first()
            .and_then(|output| output.url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// `error.message`, or the error itself when the API sends a bare string.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let text = match error {
            Value::String(text) => text.as_str(),
            Value::Object(obj) => obj.get("message").and_then(Value::as_str)?,
            _ => return None,
        };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|obj| obj.get("code"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn is_user_cancelled(&self) -> bool {
        if self.error_code() == Some(USER_CANCELLED_MARKER) {
            return true;
        }
        self.error_message()
            .map(|message| message.contains(USER_CANCELLED_MARKER))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TaskStatus, VideoTask, USER_CANCELLED_MARKER};

    #[test]
    fn parses_status_payload_with_result() -> anyhow::Result<()> {
        let task: VideoTask = serde_json::from_value(json!({
            "task_id": "task-1",
            "status": "completed",
            "data": [{"url": "https://cdn.example/video.mp4"}],
            "created_at": 1700000000,
        }))?;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result_url(), Some("https://cdn.example/video.mp4"));
        assert!(task.error.is_none());
        Ok(())
    }

    #[test]
    fn unknown_status_is_not_terminal() -> anyhow::Result<()> {
        let task: VideoTask = serde_json::from_value(json!({
            "task_id": "task-1",
            "status": "warming_up",
        }))?;
        assert_eq!(task.status, TaskStatus::Unknown);
        assert!(!task.status.is_terminal());
        Ok(())
    }

    #[test]
    fn missing_status_defaults_to_submitted() -> anyhow::Result<()> {
        let task: VideoTask = serde_json::from_value(json!({"task_id": "task-1"}))?;
        assert_eq!(task.status, TaskStatus::Submitted);
        assert_eq!(task.result_url(), None);
        Ok(())
    }

    #[test]
    fn error_message_accepts_object_and_string() -> anyhow::Result<()> {
        let object: VideoTask = serde_json::from_value(json!({
            "task_id": "t",
            "status": "failed",
            "error": {"message": "content policy", "code": "MODERATION"},
        }))?;
        assert_eq!(object.error_message().as_deref(), Some("content policy"));
        assert_eq!(object.error_code(), Some("MODERATION"));

        let bare: VideoTask = serde_json::from_value(json!({
            "task_id": "t",
            "status": "failed",
            "error": "quota exceeded",
        }))?;
        assert_eq!(bare.error_message().as_deref(), Some("quota exceeded"));
        assert_eq!(bare.error_code(), None);
        Ok(())
    }

    #[test]
    fn cancellation_detected_by_code_or_message() -> anyhow::Result<()> {
        let by_code: VideoTask = serde_json::from_value(json!({
            "task_id": "t",
            "status": "failed",
            "error": {"code": USER_CANCELLED_MARKER},
        }))?;
        assert!(by_code.is_user_cancelled());

        let by_message: VideoTask = serde_json::from_value(json!({
            "task_id": "t",
            "status": "failed",
            "error": {"message": format!("request rejected: {USER_CANCELLED_MARKER}")},
        }))?;
        assert!(by_message.is_user_cancelled());

        let plain: VideoTask = serde_json::from_value(json!({
            "task_id": "t",
            "status": "failed",
            "error": {"message": "boom"},
        }))?;
        assert!(!plain.is_user_cancelled());
        Ok(())
    }

    #[test]
    fn null_data_and_null_url_parse_without_result() -> anyhow::Result<()> {
        let pending: VideoTask = serde_json::from_value(json!({
            "task_id": "task-1",
            "status": "in_progress",
            "data": null,
            "error": null,
        }))?;
        assert_eq!(pending.status, TaskStatus::InProgress);
        assert!(pending.data.is_empty());
        assert_eq!(pending.result_url(), None);
        assert_eq!(pending.error_message(), None);

        let unfilled: VideoTask = serde_json::from_value(json!({
            "task_id": "task-1",
            "status": "completed",
            "data": [{"url": null}],
        }))?;
        assert_eq!(unfilled.status, TaskStatus::Completed);
        assert_eq!(unfilled.result_url(), None);

        let no_status: VideoTask =
            serde_json::from_value(json!({"task_id": "task-1", "status": null}))?;
        assert_eq!(no_status.status, TaskStatus::Submitted);
        Ok(())
    }
}
