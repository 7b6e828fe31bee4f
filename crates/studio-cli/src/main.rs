use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use studio_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use studio_contracts::config::{non_empty_env, StudioConfig};
use studio_contracts::events::EventWriter;
use studio_contracts::gallery::{Gallery, GeneratedItem, ItemKind};
use studio_contracts::models::{Capability, ModelSelector};
use studio_engine::{
    ApiClient, GenerationBackend, GenerationError, GenerationErrorKind, GenerationRequest,
    GenerationSession, Mode, PollSettings, SessionSnapshot, Submission,
};
use uuid::Uuid;

const GALLERY_FILE: &str = "gallery.json";
const EVENTS_FILE: &str = "events.jsonl";
const IMAGES_DIR: &str = "images";
const LIST_PROMPT_CHARS: usize = 48;

#[derive(Debug, Parser)]
#[command(name = "studio", version, about = "Prompt studio image/video generation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image from a prompt.
    Image(ImageArgs),
    /// Edit an existing image with a prompt.
    Edit(EditArgs),
    /// Submit a video task and poll it to completion.
    Video(VideoArgs),
    /// Query a video task once.
    Status(StatusArgs),
    /// List generated items, newest first.
    Gallery(GalleryArgs),
    /// Interactive prompt loop.
    Chat(ChatArgs),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// JSON config file (falls back to STUDIO_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "studio_out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ImageArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct VideoArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_parser = ["4", "8", "12"])]
    duration: Option<String>,
    #[arg(long, conflicts_with = "no_audio")]
    audio: bool,
    #[arg(long)]
    no_audio: bool,
    #[arg(long, value_parser = ["16:9", "9:16"])]
    aspect_ratio: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    #[arg(long)]
    task_id: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct GalleryArgs {
    /// Print the items as JSON instead of one line each.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Image(args) => run_image(args),
        Command::Edit(args) => run_edit(args),
        Command::Video(args) => run_video(args),
        Command::Status(args) => run_status(args),
        Command::Gallery(args) => run_gallery(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

struct Workspace {
    config: StudioConfig,
    out: PathBuf,
    events: EventWriter,
}

impl Workspace {
    fn open(common: &CommonArgs) -> Result<Self> {
        let config_path = common
            .config
            .clone()
            .or_else(|| non_empty_env("STUDIO_CONFIG").map(PathBuf::from));
        let config = StudioConfig::load(config_path.as_deref())?;
        fs::create_dir_all(&common.out)
            .with_context(|| format!("failed creating {}", common.out.display()))?;
        let events_path = common
            .events
            .clone()
            .unwrap_or_else(|| common.out.join(EVENTS_FILE));
        Ok(Self {
            config,
            out: common.out.clone(),
            events: EventWriter::new(events_path, Uuid::new_v4().to_string()),
        })
    }

    fn session(&self) -> Result<GenerationSession> {
        let backend: Arc<dyn GenerationBackend> = Arc::new(ApiClient::new(self.config.clone())?);
        let session = GenerationSession::new(
            backend,
            self.events.clone(),
            PollSettings::from(&self.config.polling),
            Gallery::load(self.out.join(GALLERY_FILE)),
        );
        Ok(session.with_progress_listener(|label| println!("{label}")))
    }
}

fn run_image(args: ImageArgs) -> Result<i32> {
    let mut workspace = Workspace::open(&args.common)?;
    report_fallback(apply_model_override(
        &mut workspace.config,
        args.model.as_deref(),
        Capability::Image,
    )?);
    let mut session = workspace.session()?;
    match session.submit(GenerationRequest::image(args.prompt)) {
        Ok(submission) => finish_image(&workspace.out, submission),
        Err(err) => finish_with_error(err),
    }
}

fn run_edit(args: EditArgs) -> Result<i32> {
    if !args.image.is_file() {
        bail!("input image not found: {}", args.image.display());
    }
    let mut workspace = Workspace::open(&args.common)?;
    report_fallback(apply_model_override(
        &mut workspace.config,
        args.model.as_deref(),
        Capability::Edit,
    )?);
    let mut session = workspace.session()?;
    match session.submit(GenerationRequest::edit(args.prompt, args.image)) {
        Ok(submission) => finish_image(&workspace.out, submission),
        Err(err) => finish_with_error(err),
    }
}

fn run_video(args: VideoArgs) -> Result<i32> {
    let mut workspace = Workspace::open(&args.common)?;
    report_fallback(apply_model_override(
        &mut workspace.config,
        args.model.as_deref(),
        Capability::Video,
    )?);

    let mut request = GenerationRequest::video(args.prompt);
    if let Some(duration) = args.duration {
        request = request.with_duration(duration);
    }
    if let Some(with_audio) = audio_flag(args.audio, args.no_audio) {
        request = request.with_audio(with_audio);
    }
    if let Some(aspect_ratio) = args.aspect_ratio {
        request = request.with_aspect_ratio(aspect_ratio);
    }

    let mut session = workspace.session()?;
    match session.submit(request) {
        Ok(Submission::VideoTask { task_id }) => println!("Task {task_id} submitted"),
        Ok(Submission::Image(_)) => bail!("video request returned an image"),
        Err(err) => return finish_with_error(err),
    }

    let snapshot = session.wait();
    if let Some(err) = snapshot.error {
        return finish_with_error(err);
    }
    match snapshot.items.first() {
        Some(item) if item.kind == ItemKind::Video => report_item(&workspace.out, item)?,
        _ => bail!("video task ended without a result"),
    }
    Ok(0)
}

fn run_status(args: StatusArgs) -> Result<i32> {
    let workspace = Workspace::open(&args.common)?;
    let client = ApiClient::new(workspace.config)?;
    let task = client.fetch_task(&args.task_id)?;
    println!("Task {}: {}", task.task_id, task.status);
    if let Some(url) = task.result_url() {
        println!("Result: {url}");
    }
    if let Some(message) = task.error_message() {
        println!("Error: {message}");
    }
    Ok(0)
}

fn run_gallery(args: GalleryArgs) -> Result<i32> {
    let path = args.common.out.join(GALLERY_FILE);
    let gallery = Gallery::load(&path);
    if args.json {
        println!("{}", serde_json::to_string_pretty(gallery.items())?);
        return Ok(0);
    }
    if gallery.is_empty() {
        println!("No items in {}", path.display());
        return Ok(0);
    }
    for item in gallery.items() {
        println!("{}", format_item_line(item));
    }
    Ok(0)
}

struct ChatState {
    mode: Mode,
    duration: String,
    with_audio: bool,
    aspect_ratio: String,
    seen_item: Option<String>,
    seen_error: Option<GenerationError>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            mode: Mode::Image,
            duration: "4".to_string(),
            with_audio: false,
            aspect_ratio: "16:9".to_string(),
            seen_item: None,
            seen_error: None,
        }
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut workspace = Workspace::open(&args.common)?;
    let mut session = workspace.session()?;
    let mut state = ChatState {
        seen_item: session.snapshot().items.first().map(|item| item.id.clone()),
        ..ChatState::default()
    };

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Studio chat started. Type /help for commands.");

    loop {
        report_finished(&session.snapshot(), &mut state, &workspace.out)?;
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }
        if let Some(mode) = intent_mode(&intent) {
            state.mode = mode;
        }

        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "set_mode" => {
                println!("Mode: {}", state.mode.as_str());
            }
            "set_duration" => {
                if let Some(duration) =
                    value_as_non_empty_string(intent.settings_update.get("duration"))
                {
                    state.duration = duration;
                }
                println!("Duration: {}s", state.duration);
            }
            "set_aspect_ratio" => {
                if let Some(ratio) =
                    value_as_non_empty_string(intent.settings_update.get("aspect_ratio"))
                {
                    state.aspect_ratio = ratio;
                }
                println!("Aspect ratio: {}", state.aspect_ratio);
            }
            "set_audio" => {
                state.with_audio = match intent.settings_update.get("with_audio") {
                    Some(Value::Bool(value)) => *value,
                    _ => !state.with_audio,
                };
                println!("Audio: {}", on_off(state.with_audio));
            }
            "set_image_model" | "set_video_model" => {
                let capability = if intent.action == "set_video_model" {
                    Capability::Video
                } else {
                    Capability::Image
                };
                let Some(requested) = value_as_non_empty_string(intent.command_args.get("model"))
                else {
                    println!(
                        "{} model: {}",
                        capability.as_str(),
                        current_model(&workspace.config, capability)
                    );
                    continue;
                };
                if session.is_generating() {
                    println!("{}", GenerationError::busy());
                    continue;
                }
                match apply_model_override(&mut workspace.config, Some(&requested), capability) {
                    Ok(reason) => {
                        report_fallback(reason);
                        session = workspace.session()?;
                        println!(
                            "{} model set to {}",
                            capability.as_str(),
                            current_model(&workspace.config, capability)
                        );
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "status" => {
                print_status(&session.snapshot(), &state);
            }
            "gallery" => {
                let snapshot = session.snapshot();
                if snapshot.items.is_empty() {
                    println!("No items yet.");
                }
                for item in &snapshot.items {
                    println!("{}", format_item_line(item));
                }
            }
            "cancel" => {
                if session.cancel() {
                    println!("Generation stopped. The remote task was abandoned.");
                } else {
                    println!("Nothing to cancel.");
                }
            }
            "generate" | "edit" => {
                let Some(request) = chat_request(&intent, &state) else {
                    println!("Nothing to generate.");
                    continue;
                };
                submit_from_chat(&mut session, &mut state, &workspace.out, request)?;
            }
            "invalid" => {
                let reason = value_as_non_empty_string(intent.command_args.get("reason"))
                    .unwrap_or_else(|| "Invalid command".to_string());
                println!("{reason}");
            }
            _ => {
                println!("Unknown command: {}. Type /help.", intent.raw.trim());
            }
        }
    }

    if session.is_generating() {
        println!("Waiting for the current generation to finish...");
        let snapshot = session.wait();
        report_finished(&snapshot, &mut state, &workspace.out)?;
    }
    Ok(())
}

fn submit_from_chat(
    session: &mut GenerationSession,
    state: &mut ChatState,
    out: &Path,
    request: GenerationRequest,
) -> Result<()> {
    match session.submit(request) {
        Ok(Submission::Image(item)) => {
            state.seen_error = None;
            state.seen_item = Some(item.id.clone());
            report_item(out, &item)?;
        }
        Ok(Submission::VideoTask { task_id }) => {
            state.seen_error = None;
            println!("Task {task_id} submitted; polling in the background.");
        }
        Err(err) => {
            print_generation_error(&err);
            if err.kind() != GenerationErrorKind::Busy {
                state.seen_error = Some(err);
            }
        }
    }
    Ok(())
}

/// Prints items and errors that landed since the last prompt.
fn report_finished(snapshot: &SessionSnapshot, state: &mut ChatState, out: &Path) -> Result<()> {
    if let Some(item) = snapshot.items.first() {
        if state.seen_item.as_deref() != Some(item.id.as_str()) {
            state.seen_item = Some(item.id.clone());
            report_item(out, item)?;
        }
    }
    if snapshot.error.is_some() && snapshot.error != state.seen_error {
        if let Some(err) = snapshot.error.as_ref() {
            print_generation_error(err);
        }
        state.seen_error = snapshot.error.clone();
    }
    Ok(())
}

fn print_status(snapshot: &SessionSnapshot, state: &ChatState) {
    println!(
        "Mode: {} | duration {}s | audio {} | aspect {}",
        state.mode.as_str(),
        state.duration,
        on_off(state.with_audio),
        state.aspect_ratio
    );
    if snapshot.is_generating {
        println!(
            "Generating: {}",
            snapshot.status_label.as_deref().unwrap_or("working...")
        );
    } else {
        println!("Idle");
    }
    if let Some(task_id) = snapshot.active_task.as_deref() {
        println!("Active task: {task_id}");
    }
    if let Some(err) = snapshot.error.as_ref() {
        println!("Last error: {err}");
    }
    println!("Items: {}", snapshot.items.len());
}

fn intent_mode(intent: &Intent) -> Option<Mode> {
    match intent.settings_update.get("mode").and_then(Value::as_str) {
        Some("image") => Some(Mode::Image),
        Some("video") => Some(Mode::Video),
        _ => None,
    }
}

fn chat_request(intent: &Intent, state: &ChatState) -> Option<GenerationRequest> {
    let prompt = intent.prompt.clone()?;
    if intent.action == "edit" {
        let path = value_as_non_empty_string(intent.command_args.get("path"))?;
        return Some(GenerationRequest::edit(prompt, path));
    }
    let request = match state.mode {
        Mode::Video => GenerationRequest::video(prompt)
            .with_duration(state.duration.clone())
            .with_audio(state.with_audio)
            .with_aspect_ratio(state.aspect_ratio.clone()),
        Mode::Image | Mode::Edit => GenerationRequest::image(prompt),
    };
    Some(request)
}

/// Points the generator section for `capability` at `requested`, resolved
/// through the model registry. Returns the fallback reason, if any.
fn apply_model_override(
    config: &mut StudioConfig,
    requested: Option<&str>,
    capability: Capability,
) -> Result<Option<String>> {
    let Some(requested) = requested.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let selection = ModelSelector::new(None)
        .select(Some(requested), capability)
        .map_err(anyhow::Error::msg)?;
    let model = selection.model.name;
    match capability {
        Capability::Video => {
            config.video_generator.get_or_insert_with(Default::default).model = model;
        }
        Capability::Image | Capability::Edit => {
            config.image_generator.get_or_insert_with(Default::default).model = model;
        }
    }
    Ok(selection.fallback_reason)
}

fn current_model(config: &StudioConfig, capability: Capability) -> String {
    let model = match capability {
        Capability::Video => config.video_generator.as_ref().map(|c| c.model.as_str()),
        Capability::Image | Capability::Edit => {
            config.image_generator.as_ref().map(|c| c.model.as_str())
        }
    };
    model.unwrap_or("(not configured)").to_string()
}

fn report_fallback(reason: Option<String>) {
    if let Some(reason) = reason {
        println!("{reason}");
    }
}

fn audio_flag(audio: bool, no_audio: bool) -> Option<bool> {
    match (audio, no_audio) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

fn finish_image(out: &Path, submission: Submission) -> Result<i32> {
    match submission {
        Submission::Image(item) => {
            report_item(out, &item)?;
            Ok(0)
        }
        Submission::VideoTask { task_id } => bail!("image request returned task {task_id}"),
    }
}

/// Cancellation is reported but is not a failure exit.
fn finish_with_error(err: GenerationError) -> Result<i32> {
    if err.is_benign() {
        println!("{err}");
        return Ok(0);
    }
    Err(err.into())
}

fn print_generation_error(err: &GenerationError) {
    if err.is_benign() {
        println!("{err}");
    } else {
        println!("Generation failed: {err}");
    }
}

fn report_item(out: &Path, item: &GeneratedItem) -> Result<()> {
    match save_inline_image(&out.join(IMAGES_DIR), item)? {
        Some(path) => println!("Saved {} ({})", path.display(), item.id),
        None => println!("{} ready: {}", capitalize(item.kind.as_str()), item.url),
    }
    Ok(())
}

/// Writes `data:` URL items to `dir`; hosted URLs are left alone.
fn save_inline_image(dir: &Path, item: &GeneratedItem) -> Result<Option<PathBuf>> {
    let Some((mime_type, payload)) = split_data_url(&item.url) else {
        return Ok(None);
    };
    let bytes = BASE64
        .decode(payload.as_bytes())
        .with_context(|| format!("invalid inline image payload for {}", item.id))?;
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let path = dir.join(format!("{}.{}", item.id, extension_for_mime(mime_type)));
    fs::write(&path, bytes).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(Some(path))
}

fn split_data_url(url: &str) -> Option<(&str, &str)> {
    url.strip_prefix("data:")?.split_once(";base64,")
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn format_item_line(item: &GeneratedItem) -> String {
    let url = match split_data_url(&item.url) {
        Some((mime_type, _)) => format!("<inline {mime_type}>"),
        None => item.url.clone(),
    };
    format!(
        "{}  {:<5}  {}  {}",
        item.id,
        item.kind.as_str(),
        clamp_text(&item.prompt, LIST_PROMPT_CHARS),
        url
    )
}

fn clamp_text(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    flat.chars().take(max_chars).collect::<String>() + "…"
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use clap::Parser;
    use studio_contracts::chat::parse_intent;
    use studio_contracts::config::StudioConfig;
    use studio_contracts::gallery::{GeneratedItem, ItemKind};
    use studio_contracts::models::Capability;
    use studio_engine::Mode;

    use super::{
        apply_model_override, audio_flag, chat_request, clamp_text, format_item_line,
        intent_mode, save_inline_image, split_data_url, ChatState, Cli, Command,
    };

    #[test]
    fn video_command_parses_flags() {
        let cli = Cli::try_parse_from([
            "studio",
            "video",
            "--prompt",
            "a comet",
            "--duration",
            "8",
            "--no-audio",
            "--aspect-ratio",
            "9:16",
            "--out",
            "/tmp/studio",
        ]);
        let Ok(Cli {
            command: Command::Video(args),
        }) = cli
        else {
            panic!("expected video command");
        };
        assert_eq!(args.duration.as_deref(), Some("8"));
        assert_eq!(args.aspect_ratio.as_deref(), Some("9:16"));
        assert_eq!(audio_flag(args.audio, args.no_audio), Some(false));
        assert_eq!(args.common.out, PathBuf::from("/tmp/studio"));
    }

    #[test]
    fn video_command_rejects_unsupported_duration() {
        let cli = Cli::try_parse_from(["studio", "video", "--prompt", "x", "--duration", "5"]);
        assert!(cli.is_err());
        let both = Cli::try_parse_from(["studio", "video", "--prompt", "x", "--audio", "--no-audio"]);
        assert!(both.is_err());
    }

    #[test]
    fn audio_flag_is_tri_state() {
        assert_eq!(audio_flag(false, false), None);
        assert_eq!(audio_flag(true, false), Some(true));
        assert_eq!(audio_flag(false, true), Some(false));
    }

    #[test]
    fn chat_video_request_carries_prompt_settings() {
        let state = ChatState {
            mode: Mode::Video,
            duration: "12".to_string(),
            with_audio: true,
            aspect_ratio: "9:16".to_string(),
            ..ChatState::default()
        };
        let intent = parse_intent("a paper boat in rain");
        let request = chat_request(&intent, &state).unwrap_or_else(|| panic!("request"));
        assert_eq!(request.mode, Mode::Video);
        assert_eq!(request.duration.as_deref(), Some("12"));
        assert_eq!(request.with_audio, Some(true));
        assert_eq!(request.aspect_ratio.as_deref(), Some("9:16"));
    }

    #[test]
    fn chat_image_and_edit_requests() {
        let state = ChatState::default();
        let image = chat_request(&parse_intent("a fox"), &state).unwrap_or_else(|| panic!("image"));
        assert_eq!(image.mode, Mode::Image);
        assert_eq!(image.duration, None);

        let edit = chat_request(
            &parse_intent("/edit \"my shots/fox.png\" make it snowy"),
            &state,
        )
        .unwrap_or_else(|| panic!("edit"));
        assert_eq!(edit.mode, Mode::Edit);
        assert_eq!(edit.prompt, "make it snowy");
        assert_eq!(edit.input_image, Some(PathBuf::from("my shots/fox.png")));
    }

    #[test]
    fn mode_commands_switch_chat_mode() {
        assert_eq!(intent_mode(&parse_intent("/video")), Some(Mode::Video));
        assert_eq!(intent_mode(&parse_intent("/image a cat")), Some(Mode::Image));
        assert_eq!(intent_mode(&parse_intent("a cat")), None);
    }

    #[test]
    fn model_override_resolves_through_registry() -> anyhow::Result<()> {
        let mut config = StudioConfig::default();

        assert_eq!(apply_model_override(&mut config, None, Capability::Video)?, None);
        assert_eq!(
            config.video_generator.as_ref().map(|c| c.model.as_str()),
            Some("sora-2")
        );

        assert_eq!(
            apply_model_override(&mut config, Some("veo3-fast"), Capability::Video)?,
            None
        );
        assert_eq!(
            config.video_generator.as_ref().map(|c| c.model.as_str()),
            Some("veo3-fast")
        );

        let reason = apply_model_override(&mut config, Some("sora-2"), Capability::Image)?;
        assert!(reason.unwrap_or_default().contains("unavailable"));
        assert_eq!(
            config.image_generator.as_ref().map(|c| c.model.as_str()),
            Some("nano-banana")
        );
        Ok(())
    }

    #[test]
    fn inline_images_are_written_to_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let item = GeneratedItem::new(ItemKind::Image, "data:image/png;base64,aGVsbG8=", "hello");

        let path = save_inline_image(temp.path(), &item)?.unwrap_or_default();

        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("png"));
        assert_eq!(fs::read(&path)?, b"hello".to_vec());

        let hosted = GeneratedItem::new(ItemKind::Video, "https://cdn.example/v.mp4", "v");
        assert_eq!(save_inline_image(temp.path(), &hosted)?, None);
        Ok(())
    }

    #[test]
    fn data_urls_are_split_and_abbreviated() {
        assert_eq!(
            split_data_url("data:image/jpeg;base64,AAAA"),
            Some(("image/jpeg", "AAAA"))
        );
        assert_eq!(split_data_url("https://x/y.png"), None);

        let item = GeneratedItem::new(ItemKind::Image, "data:image/png;base64,AAAA", "p");
        assert!(format_item_line(&item).ends_with("<inline image/png>"));
    }

    #[test]
    fn clamp_text_flattens_whitespace() {
        assert_eq!(clamp_text("a\n  b", 10), "a b");
        assert_eq!(clamp_text("abcdef", 3), "abc…");
    }
}
