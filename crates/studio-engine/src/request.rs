use std::path::PathBuf;

use serde_json::{json, Map, Value};
use studio_contracts::config::{render_prompt, ImageGeneratorConfig, VideoGeneratorConfig};
use studio_contracts::gallery::ItemKind;
use studio_contracts::models::ModelFamily;

use crate::error::{GenerationError, GenerationResult};
use crate::map_object;

const VEO_DEFAULT_RESOLUTION: &str = "720p";
const DEFAULT_ASPECT_RATIO: &str = "16:9";
const SORA_LANDSCAPE_SIZE: &str = "1280x720";
const SORA_PORTRAIT_SIZE: &str = "720x1280";
const SORA_DEFAULT_SECONDS: &str = "4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Image,
    Edit,
    Video,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Edit => "edit",
            Self::Video => "video",
        }
    }

    pub fn item_kind(self) -> ItemKind {
        match self {
            Self::Image | Self::Edit => ItemKind::Image,
            Self::Video => ItemKind::Video,
        }
    }

    /// Label shown while the first request is in flight.
    pub fn initial_status_label(self) -> &'static str {
        match self {
            Self::Image | Self::Edit => "Creating masterpiece...",
            Self::Video => "Initializing video engine...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub mode: Mode,
    /// Seconds, as the API expects it (`"4"`, `"8"`, ...).
    pub duration: Option<String>,
    pub with_audio: Option<bool>,
    pub aspect_ratio: Option<String>,
    pub input_image: Option<PathBuf>,
}

impl GenerationRequest {
    fn new(prompt: impl Into<String>, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            duration: None,
            with_audio: None,
            aspect_ratio: None,
            input_image: None,
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self::new(prompt, Mode::Image)
    }

    pub fn edit(prompt: impl Into<String>, input_image: impl Into<PathBuf>) -> Self {
        let mut request = Self::new(prompt, Mode::Edit);
        request.input_image = Some(input_image.into());
        request
    }

    pub fn video(prompt: impl Into<String>) -> Self {
        Self::new(prompt, Mode::Video)
    }

    pub fn with_duration(mut self, seconds: impl Into<String>) -> Self {
        self.duration = Some(seconds.into());
        self
    }

    pub fn with_audio(mut self, with_audio: bool) -> Self {
        self.with_audio = Some(with_audio);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn validate(&self) -> GenerationResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::invalid_request("Prompt must not be empty"));
        }
        if self.mode == Mode::Edit && self.input_image.is_none() {
            return Err(GenerationError::invalid_request(
                "Image editing requires an input image",
            ));
        }
        Ok(())
    }

    fn duration(&self) -> Option<&str> {
        non_empty(self.duration.as_deref())
    }

    fn aspect_ratio(&self) -> Option<&str> {
        non_empty(self.aspect_ratio.as_deref())
    }
}

/// JSON body for the image generation endpoint. Also the field set of the
/// multipart edit form.
pub fn image_payload(config: &ImageGeneratorConfig, prompt: &str) -> Map<String, Value> {
    let mut payload = map_object(json!({
        "model": config.model,
        "prompt": render_prompt(config.prompt_template.as_deref(), prompt),
    }));
    if let Some(format) = non_empty(config.response_format.as_deref()) {
        payload.insert(
            "response_format".to_string(),
            Value::String(format.to_string()),
        );
    }
    payload
}

/// `generate_params` blob for the video endpoint, shaped for the model family.
pub fn video_params(config: &VideoGeneratorConfig, request: &GenerationRequest) -> Map<String, Value> {
    let mut params = map_object(json!({
        "prompt": render_prompt(config.prompt_template.as_deref(), &request.prompt),
        "model": config.model,
    }));

    match ModelFamily::from_model_id(&config.model) {
        ModelFamily::Veo => {
            let resolution =
                non_empty(config.resolution.as_deref()).unwrap_or(VEO_DEFAULT_RESOLUTION);
            let aspect_ratio = request
                .aspect_ratio()
                .or_else(|| non_empty(config.aspect_ratio.as_deref()))
                .unwrap_or(DEFAULT_ASPECT_RATIO);
            let generate_audio = request
                .with_audio
                .or(config.generate_audio)
                .unwrap_or(false);
            params.insert("resolution".to_string(), json!(resolution));
            params.insert("aspect_ratio".to_string(), json!(aspect_ratio));
            params.insert("generate_audio".to_string(), json!(generate_audio));
        }
        ModelFamily::Sora => {
            let size = sora_size(request.aspect_ratio())
                .or_else(|| non_empty(config.size.as_deref()))
                .unwrap_or(SORA_LANDSCAPE_SIZE);
            let seconds = request
                .duration()
                .or_else(|| non_empty(config.seconds.as_deref()))
                .unwrap_or(SORA_DEFAULT_SECONDS);
            params.insert("size".to_string(), json!(size));
            params.insert("seconds".to_string(), json!(seconds));
            if let Some(with_audio) = request.with_audio {
                params.insert("generate_audio".to_string(), json!(with_audio));
            }
        }
        ModelFamily::Generic => {}
    }
    params
}

fn sora_size(aspect_ratio: Option<&str>) -> Option<&'static str> {
    match aspect_ratio? {
        "16:9" => Some(SORA_LANDSCAPE_SIZE),
        "9:16" => Some(SORA_PORTRAIT_SIZE),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use studio_contracts::config::{ImageGeneratorConfig, VideoGeneratorConfig};
    use studio_contracts::gallery::ItemKind;

    use super::{image_payload, video_params, GenerationRequest, Mode};
    use crate::error::GenerationErrorKind;

    fn video_config(model: &str) -> VideoGeneratorConfig {
        VideoGeneratorConfig {
            model: model.to_string(),
            ..VideoGeneratorConfig::default()
        }
    }

    #[test]
    fn image_payload_applies_template_and_format() {
        let config = ImageGeneratorConfig {
            model: "nano-banana".to_string(),
            prompt_template: Some("Poster art: {description}".to_string()),
            response_format: Some("b64_json".to_string()),
        };
        assert_eq!(
            Value::Object(image_payload(&config, "a koi pond")),
            json!({
                "model": "nano-banana",
                "prompt": "Poster art: a koi pond",
                "response_format": "b64_json",
            })
        );
    }

    #[test]
    fn image_payload_omits_missing_format() {
        let config = ImageGeneratorConfig {
            response_format: None,
            ..ImageGeneratorConfig::default()
        };
        assert!(!image_payload(&config, "x").contains_key("response_format"));
    }

    #[test]
    fn sora_maps_aspect_ratio_to_pixel_size() {
        let config = video_config("sora-2");
        let portrait = video_params(
            &config,
            &GenerationRequest::video("city at night").with_aspect_ratio("9:16"),
        );
        assert_eq!(
            Value::Object(portrait),
            json!({
                "prompt": "city at night",
                "model": "sora-2",
                "size": "720x1280",
                "seconds": "4",
            })
        );

        let landscape = video_params(
            &config,
            &GenerationRequest::video("x").with_aspect_ratio("16:9"),
        );
        assert_eq!(landscape["size"], json!("1280x720"));
    }

    #[test]
    fn sora_duration_and_audio_come_from_request() {
        let config = VideoGeneratorConfig {
            seconds: Some("8".to_string()),
            ..video_config("sora-2-pro")
        };
        let defaulted = video_params(&config, &GenerationRequest::video("x"));
        assert_eq!(defaulted["seconds"], json!("8"));
        assert!(!defaulted.contains_key("generate_audio"));

        let explicit = video_params(
            &config,
            &GenerationRequest::video("x")
                .with_duration("12")
                .with_audio(false),
        );
        assert_eq!(explicit["seconds"], json!("12"));
        assert_eq!(explicit["generate_audio"], json!(false));
    }

    #[test]
    fn sora_unknown_ratio_keeps_configured_size() {
        let config = VideoGeneratorConfig {
            size: Some("1024x1792".to_string()),
            ..video_config("sora-2")
        };
        let params = video_params(
            &config,
            &GenerationRequest::video("x").with_aspect_ratio("1:1"),
        );
        assert_eq!(params["size"], json!("1024x1792"));

        let portrait = video_params(
            &config,
            &GenerationRequest::video("x").with_aspect_ratio("9:16"),
        );
        assert_eq!(portrait["size"], json!("720x1280"));
    }

    #[test]
    fn veo_defaults_and_overrides() {
        let defaults = video_params(&video_config("veo3"), &GenerationRequest::video("waves"));
        assert_eq!(
            Value::Object(defaults),
            json!({
                "prompt": "waves",
                "model": "veo3",
                "resolution": "720p",
                "aspect_ratio": "16:9",
                "generate_audio": false,
            })
        );

        let config = VideoGeneratorConfig {
            resolution: Some("1080p".to_string()),
            aspect_ratio: Some("9:16".to_string()),
            generate_audio: Some(true),
            ..video_config("veo3-fast")
        };
        let from_config = video_params(&config, &GenerationRequest::video("x").with_duration("8"));
        assert_eq!(from_config["resolution"], json!("1080p"));
        assert_eq!(from_config["aspect_ratio"], json!("9:16"));
        assert_eq!(from_config["generate_audio"], json!(true));
        assert!(!from_config.contains_key("seconds"));

        let from_request = video_params(
            &config,
            &GenerationRequest::video("x")
                .with_aspect_ratio("16:9")
                .with_audio(false),
        );
        assert_eq!(from_request["aspect_ratio"], json!("16:9"));
        assert_eq!(from_request["generate_audio"], json!(false));
    }

    #[test]
    fn generic_model_sends_prompt_and_model_only() {
        let params = video_params(
            &video_config("kling-v2"),
            &GenerationRequest::video("x")
                .with_duration("8")
                .with_audio(true)
                .with_aspect_ratio("9:16"),
        );
        assert_eq!(Value::Object(params), json!({"prompt": "x", "model": "kling-v2"}));
    }

    #[test]
    fn validation_rejects_blank_prompt_and_missing_edit_image() {
        let blank = GenerationRequest::image("   ").validate();
        assert_eq!(
            blank.err().map(|err| err.kind()),
            Some(GenerationErrorKind::InvalidRequest)
        );

        let mut edit = GenerationRequest::edit("brighter", "in.png");
        assert!(edit.validate().is_ok());
        edit.input_image = None;
        assert!(edit.validate().is_err());
        assert_eq!(edit.mode, Mode::Edit);
    }

    #[test]
    fn edits_are_stored_as_images() {
        assert_eq!(Mode::Image.item_kind(), ItemKind::Image);
        assert_eq!(Mode::Edit.item_kind(), ItemKind::Image);
        assert_eq!(Mode::Video.item_kind(), ItemKind::Video);
    }
}
