mod command_registry;
mod intent_parser;

pub use command_registry::{ASPECT_RATIOS, CHAT_HELP_COMMANDS, DURATION_CHOICES};
pub use intent_parser::{parse_intent, Intent};
