use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, ASPECT_RATIOS, DURATION_CHOICES, MODE_COMMANDS, NO_ARG_COMMANDS,
    RAW_ARG_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }

    fn invalid(raw: &str, reason: String) -> Self {
        let mut intent = Self::new("invalid", raw);
        intent
            .command_args
            .insert("reason".to_string(), Value::String(reason));
        intent
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_audio_arg(arg: &str) -> Option<Option<bool>> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "" | "toggle" => Some(None),
        "on" | "true" | "yes" | "1" => Some(Some(true)),
        "off" | "false" | "no" | "0" => Some(Some(false)),
        _ => None,
    }
}

fn parse_edit(raw: &str, arg: &str) -> Intent {
    let mut parts = split_args(arg).into_iter();
    let Some(path) = parts.next() else {
        return Intent::invalid(raw, "/edit requires an image path and a prompt".to_string());
    };
    let prompt = parts.collect::<Vec<String>>().join(" ");
    if prompt.trim().is_empty() {
        return Intent::invalid(raw, "/edit requires a prompt after the image path".to_string());
    }
    let mut intent = Intent::new("edit", raw);
    intent
        .command_args
        .insert("path".to_string(), Value::String(path));
    intent.prompt = Some(prompt.trim().to_string());
    intent
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("model".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(mode) = find_action(&command, MODE_COMMANDS) {
                let mut intent = Intent::new("set_mode", text);
                intent
                    .settings_update
                    .insert("mode".to_string(), Value::String(mode.to_string()));
                if !arg.is_empty() {
                    intent.action = "generate".to_string();
                    intent.prompt = Some(arg.to_string());
                }
                return intent;
            }

            match command.as_str() {
                "duration" => {
                    if !DURATION_CHOICES.contains(&arg) {
                        return Intent::invalid(
                            text,
                            format!("duration must be one of {}", DURATION_CHOICES.join(", ")),
                        );
                    }
                    let mut intent = Intent::new("set_duration", text);
                    intent
                        .settings_update
                        .insert("duration".to_string(), Value::String(arg.to_string()));
                    return intent;
                }
                "aspect" => {
                    if !ASPECT_RATIOS.contains(&arg) {
                        return Intent::invalid(
                            text,
                            format!("aspect ratio must be one of {}", ASPECT_RATIOS.join(", ")),
                        );
                    }
                    let mut intent = Intent::new("set_aspect_ratio", text);
                    intent
                        .settings_update
                        .insert("aspect_ratio".to_string(), Value::String(arg.to_string()));
                    return intent;
                }
                "audio" => {
                    let Some(value) = parse_audio_arg(arg) else {
                        return Intent::invalid(text, "audio takes on, off or toggle".to_string());
                    };
                    let mut intent = Intent::new("set_audio", text);
                    intent.settings_update.insert(
                        "with_audio".to_string(),
                        value.map(Value::Bool).unwrap_or(Value::Null),
                    );
                    return intent;
                }
                "edit" => return parse_edit(text, arg),
                _ => {}
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}
