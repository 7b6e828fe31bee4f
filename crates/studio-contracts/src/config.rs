use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.youware.com/public/v1/ai";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;

/// Explicit replacement for the settings the hosted page used to inject
/// globally. Everything the submission path needs is read from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub image_generator: Option<ImageGeneratorConfig>,
    pub video_generator: Option<VideoGeneratorConfig>,
    pub polling: PollingConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            image_generator: Some(ImageGeneratorConfig::default()),
            video_generator: Some(VideoGeneratorConfig::default()),
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeneratorConfig {
    pub model: String,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
}

impl Default for ImageGeneratorConfig {
    fn default() -> Self {
        Self {
            model: "nano-banana".to_string(),
            prompt_template: None,
            response_format: Some("b64_json".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoGeneratorConfig {
    pub model: String,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub generate_audio: Option<bool>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub seconds: Option<String>,
}

impl Default for VideoGeneratorConfig {
    fn default() -> Self {
        Self {
            model: "sora-2".to_string(),
            prompt_template: None,
            resolution: None,
            aspect_ratio: None,
            generate_audio: None,
            size: None,
            seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl StudioConfig {
    /// Reads `path` (defaults when absent) and applies `STUDIO_*` env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed reading config {}", path.display()))?;
                Self::from_json_str(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            Some(path) => anyhow::bail!("config file not found: {}", path.display()),
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.api_base = normalize_api_base(&config.api_base);
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env("STUDIO_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(base) = non_empty_env("STUDIO_API_BASE") {
            self.api_base = normalize_api_base(&base);
        }
        if let Some(model) = non_empty_env("STUDIO_IMAGE_MODEL") {
            self.image_generator.get_or_insert_with(Default::default).model = model;
        }
        if let Some(model) = non_empty_env("STUDIO_VIDEO_MODEL") {
            self.video_generator.get_or_insert_with(Default::default).model = model;
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Applies a prompt template. `{description}` is replaced by the prompt; a
/// template without the placeholder becomes a prefix.
pub fn render_prompt(template: Option<&str>, prompt: &str) -> String {
    let Some(template) = template.map(str::trim).filter(|value| !value.is_empty()) else {
        return prompt.to_string();
    };
    if template.contains("{description}") {
        return template.replace("{description}", prompt);
    }
    format!("{template}\n\n{prompt}")
}

fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_BASE.to_string();
    }
    trimmed.to_string()
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{render_prompt, StudioConfig, DEFAULT_API_BASE};

    #[test]
    fn defaults_cover_both_generators() {
        let config = StudioConfig::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(
            config.image_generator.as_ref().map(|c| c.model.as_str()),
            Some("nano-banana")
        );
        assert_eq!(
            config.video_generator.as_ref().map(|c| c.model.as_str()),
            Some("sora-2")
        );
        assert_eq!(config.polling.interval(), Duration::from_secs(5));
        assert_eq!(config.polling.max_attempts, 120);
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn json_config_fills_missing_sections_with_defaults() -> anyhow::Result<()> {
        let config = StudioConfig::from_json_str(
            r#"{
                "api_base": "https://proxy.local/v1/ai/",
                "video_generator": {"model": "veo3-fast", "resolution": "1080p"},
                "polling": {"interval_secs": 2}
            }"#,
        )?;
        assert_eq!(config.api_base, "https://proxy.local/v1/ai");
        let video = config.video_generator.clone().unwrap_or_default();
        assert_eq!(video.model, "veo3-fast");
        assert_eq!(video.resolution.as_deref(), Some("1080p"));
        assert_eq!(config.polling.interval_secs, 2);
        assert_eq!(config.polling.max_attempts, 120);
        assert!(config.image_generator.is_some());
        Ok(())
    }

    #[test]
    fn explicit_null_generator_stays_missing() -> anyhow::Result<()> {
        let config = StudioConfig::from_json_str(r#"{"image_generator": null}"#)?;
        assert!(config.image_generator.is_none());
        Ok(())
    }

    #[test]
    fn api_key_is_never_serialized() -> anyhow::Result<()> {
        let config = StudioConfig {
            api_key: Some("sk-secret".to_string()),
            ..StudioConfig::default()
        };
        let raw = serde_json::to_string(&config)?;
        assert!(!raw.contains("sk-secret"));
        Ok(())
    }

    #[test]
    fn load_missing_path_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let err = StudioConfig::load(Some(&temp.path().join("nope.json")))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("config file not found"));
        Ok(())
    }

    #[test]
    fn prompt_template_substitutes_description() {
        assert_eq!(render_prompt(None, "a cat"), "a cat");
        assert_eq!(
            render_prompt(Some("Cinematic shot of {description}, 35mm"), "a cat"),
            "Cinematic shot of a cat, 35mm"
        );
        assert_eq!(
            render_prompt(Some("Studio lighting."), "a cat"),
            "Studio lighting.\n\na cat"
        );
        assert_eq!(render_prompt(Some("   "), "a cat"), "a cat");
    }
}
