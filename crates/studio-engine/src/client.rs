use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use studio_contracts::config::{ImageGeneratorConfig, StudioConfig, VideoGeneratorConfig};
use studio_contracts::tasks::VideoTask;

use crate::error::{GenerationError, GenerationResult};
use crate::request::{image_payload, video_params, GenerationRequest};
use crate::{truncate_text, GenerationBackend};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Status queries are cheap; a stalled one should not hold the poll worker for long.
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// A displayable image result: either a hosted URL or an inline payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResult {
    Url(String),
    Inline { mime_type: String, base64: String },
}

impl ImageResult {
    /// URL suitable for an `<img src>`; inline payloads become `data:` URLs.
    pub fn display_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Inline { mime_type, base64 } => format!("data:{mime_type};base64,{base64}"),
        }
    }

    pub fn inline_bytes(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match self {
            Self::Url(_) => Ok(None),
            Self::Inline { base64, .. } => Ok(Some(BASE64.decode(base64.as_bytes())?)),
        }
    }
}

/// Blocking client for the hosted generation API.
pub struct ApiClient {
    config: StudioConfig,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(config: StudioConfig) -> GenerationResult<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GenerationError::transport(format!("HTTP client init failed: {err}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path.trim_start_matches('/'))
    }

    fn api_key(&self) -> GenerationResult<&str> {
        self.config.api_key().ok_or_else(|| {
            GenerationError::config_missing("API Error - API key not configured (set STUDIO_API_KEY)")
        })
    }

    fn image_config(&self, missing: &str) -> GenerationResult<&ImageGeneratorConfig> {
        self.config
            .image_generator
            .as_ref()
            .ok_or_else(|| GenerationError::config_missing(missing))
    }

    fn video_config(&self) -> GenerationResult<&VideoGeneratorConfig> {
        self.config
            .video_generator
            .as_ref()
            .ok_or_else(|| {
                GenerationError::config_missing("API Error - Video generator config not found")
            })
    }
}

impl GenerationBackend for ApiClient {
    fn name(&self) -> &str {
        "api"
    }

    fn generate_image(&self, prompt: &str) -> GenerationResult<ImageResult> {
        let config = self.image_config("API Error - Image generator config not found")?;
        let api_key = self.api_key()?;
        let endpoint = self.endpoint("images/generations");
        let payload = image_payload(config, prompt);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&Value::Object(payload))
            .send()?;
        let body = response_json_or_error(response, "Image generation failed", true)?;
        parse_image_response(&body)
    }

    fn edit_image(&self, prompt: &str, image: &Path) -> GenerationResult<ImageResult> {
        let config = self.image_config("API Error - Image editor config not found")?;
        let api_key = self.api_key()?;
        let endpoint = self.endpoint("images/edits");

        let mut form = MultipartForm::new();
        for (key, value) in image_payload(config, prompt) {
            form = form.text(key, value.as_str().unwrap_or_default().to_string());
        }
        form = form.part("image", image_part(image)?);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()?;
        let body = response_json_or_error(response, "Image editing failed", true)?;
        parse_image_response(&body)
    }

    fn submit_video(&self, request: &GenerationRequest) -> GenerationResult<VideoTask> {
        let config = self.video_config()?;
        let api_key = self.api_key()?;
        let endpoint = self.endpoint("videos/generations");
        let params = Value::Object(video_params(config, request));

        let form = MultipartForm::new().text("generate_params", params.to_string());
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()?;
        let body = response_json_or_error(response, "Video generation failed", true)?;
        parse_task_response(body)
    }

    fn fetch_task(&self, task_id: &str) -> GenerationResult<VideoTask> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint(&format!("videos/generations/{task_id}"));

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(api_key)
            .timeout(STATUS_TIMEOUT)
            .send()?;
        let body = response_json_or_error(response, "Polling failed", false)?;
        parse_task_response(body)
    }
}

fn image_part(path: &Path) -> GenerationResult<MultipartPart> {
    let bytes = fs::read(path).map_err(|err| {
        GenerationError::invalid_request(format!("failed reading {}: {err}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("image.png")
        .to_string();
    let mut part = MultipartPart::bytes(bytes).file_name(file_name);
    if let Some(mime) = mime_for_path(path) {
        part = part
            .mime_str(mime)
            .map_err(|err| GenerationError::invalid_request(format!("invalid mime '{mime}': {err}")))?;
    }
    Ok(part)
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn response_json_or_error(
    response: HttpResponse,
    failure: &str,
    with_reason: bool,
) -> GenerationResult<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text()?;
    if !status.is_success() {
        let message = match status.canonical_reason().filter(|_| with_reason) {
            Some(reason) => format!("{failure}: {code} {reason}"),
            None => format!("{failure}: {code}"),
        };
        return Err(GenerationError::http(code, message, &truncate_text(&body, 2048)));
    }
    serde_json::from_str(&body).map_err(|_| GenerationError::malformed())
}

/// `data[0].b64_json` wins over `data[0].url`; anything else is malformed.
pub fn parse_image_response(body: &Value) -> GenerationResult<ImageResult> {
    let first = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
        .ok_or_else(GenerationError::malformed)?;

    let field = |key: &str| {
        first
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    if let Some(b64) = field("b64_json") {
        return Ok(ImageResult::Inline {
            mime_type: "image/png".to_string(),
            base64: b64.to_string(),
        });
    }
    if let Some(url) = field("url") {
        return Ok(ImageResult::Url(url.to_string()));
    }
    Err(GenerationError::malformed())
}

pub fn parse_task_response(body: Value) -> GenerationResult<VideoTask> {
    let task: VideoTask = serde_json::from_value(body).map_err(|_| GenerationError::malformed())?;
    if task.task_id.trim().is_empty() {
        return Err(GenerationError::malformed());
    }
    Ok(task)
}
