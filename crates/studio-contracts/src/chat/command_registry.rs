#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image_model",
        action: "set_image_model",
    },
    CommandSpec {
        command: "video_model",
        action: "set_video_model",
    },
];

pub(crate) const MODE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "image",
    },
    CommandSpec {
        command: "video",
        action: "video",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "gallery",
        action: "gallery",
    },
    CommandSpec {
        command: "cancel",
        action: "cancel",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
];

pub const DURATION_CHOICES: &[&str] = &["4", "8", "12"];

pub const ASPECT_RATIOS: &[&str] = &["16:9", "9:16"];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/image",
    "/video",
    "/edit",
    "/duration",
    "/audio",
    "/aspect",
    "/image_model",
    "/video_model",
    "/status",
    "/gallery",
    "/cancel",
    "/help",
];
