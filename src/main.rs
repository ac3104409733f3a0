//! Application entry point: SoundSnapper terminal front end.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run) and apply environment keys.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the model, synthesizer and cpal playback backend.
//! 5. Wire [`AudioOrchestrator`], [`SoundPipeline`] and the transformation
//!    chain into a [`Session`].
//! 6. Optionally capture the image given on the command line.
//! 7. Read commands from stdin until `quit` or EOF.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use sound_snapper::{
    audio::{AudioOrchestrator, ChannelKind, CpalBackend, ElevenLabsClient, VolumeStep},
    config::AppConfig,
    media::{Image, ImageData},
    session::{Session, SessionError, SessionState},
    sound::SoundPipeline,
    transform::TransformationOrchestrator,
    vision::{GeminiClient, GenerativeModel, Mood, TRANSFORMATION_STYLES},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Snap a picture, hear the scene, remix the picture.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to capture at startup (file path or http(s) URL)
    #[arg(value_name = "IMAGE")]
    image: Option<String>,

    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mood for sound generation: Real, Dreamy, Sci-Fi or Cartoon
    #[arg(short, long)]
    mood: Option<Mood>,
}

const HELP: &str = "\
commands:
  snap <path|url>           capture an image
  style <name>              pick a preset style
  prompt <text>             use a custom transformation
  transform                 transform with the selected style or prompt
  sfx                       generate a new sound effect
  mood <name>               Real, Dreamy, Sci-Fi or Cartoon
  vol <ambience|effect> <+|->
  status                    show the session
  reset                     clear the image and stop sounds
  quit";

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("SoundSnapper starting up");

    let args = Args::parse();

    // 2. Configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}), using defaults");
            AppConfig::default()
        }),
    };
    config.apply_env();
    if let Some(mood) = args.mood {
        config.mood = mood;
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config, args.image))
}

async fn run(config: AppConfig, image: Option<String>) -> Result<()> {
    // 4. Backends
    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::from_config(&config.gemini));
    if !model.is_configured() {
        log::warn!("No Gemini API key; analysis will fall back to the default scene");
    }
    let synth = Arc::new(ElevenLabsClient::from_config(&config.elevenlabs));
    let backend = Arc::new(CpalBackend::new(config.audio.output_device.clone()));

    // 5. Session
    let audio = Arc::new(AudioOrchestrator::new(synth, backend, &config.audio));
    let sound = Arc::new(SoundPipeline::new(Arc::clone(&model), audio));
    let transformer = Arc::new(TransformationOrchestrator::from_config(&config, model));
    log::info!("Transformation chain: {:?}", transformer.provider_names());
    let session = Session::new(sound, transformer, config.mood, config.ui.clone());

    // 6. Startup capture
    if let Some(target) = image {
        spawn_snap(&session, target);
    }

    // 7. Command loop.  Long operations run on their own tasks so `status`
    //    can show the busy phase and a second request meets `Busy`.
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Snap(target) => spawn_snap(&session, target),
            Command::Style(style) => match session.select_preset(&style) {
                Ok(()) => println!("style: {style}"),
                Err(e) => println!("{e}; styles: {}", TRANSFORMATION_STYLES.join(", ")),
            },
            Command::Prompt(text) => {
                session.set_custom_instruction(&text);
                println!("prompt: {text}");
            }
            Command::Transform => spawn_transform(&session),
            Command::Sfx => spawn_sfx(&session),
            Command::Mood(name) => match name.parse::<Mood>() {
                Ok(mood) => {
                    session.set_mood(mood);
                    println!("mood: {mood}");
                }
                Err(e) => println!("{e}"),
            },
            Command::Volume(kind, step) => {
                if let Some(volume) = session.adjust_volume(kind, step) {
                    println!("{kind}: {volume}");
                }
            }
            Command::Status => print_status(&session.snapshot()),
            Command::Reset => match session.reset() {
                Ok(()) => println!("ready for a new image"),
                Err(e) => println!("{e}"),
            },
            Command::Usage(usage) => println!("usage: {usage}"),
            Command::Unknown(other) => println!("unknown command `{other}`; try `help`"),
        }
    }

    log::info!("SoundSnapper shutting down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Empty,
    Quit,
    Help,
    Snap(String),
    Style(String),
    Prompt(String),
    Transform,
    Sfx,
    Mood(String),
    Volume(ChannelKind, VolumeStep),
    Status,
    Reset,
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => Command::Empty,
            "quit" | "exit" => Command::Quit,
            "help" => Command::Help,
            "snap" if rest.is_empty() => Command::Usage("snap <path|url>"),
            "snap" => Command::Snap(rest.to_string()),
            "style" => Command::Style(rest.to_string()),
            "prompt" => Command::Prompt(rest.to_string()),
            "transform" => Command::Transform,
            "sfx" => Command::Sfx,
            "mood" => Command::Mood(rest.to_string()),
            "vol" => Self::parse_volume(rest),
            "status" => Command::Status,
            "reset" => Command::Reset,
            other => Command::Unknown(other.to_string()),
        }
    }

    fn parse_volume(rest: &str) -> Self {
        const USAGE: &str = "vol <ambience|effect> <+|->";
        let mut parts = rest.split_whitespace();
        let kind = match parts.next() {
            Some("ambience") => ChannelKind::Ambience,
            Some("effect") => ChannelKind::Effect,
            _ => return Command::Usage(USAGE),
        };
        match parts.next() {
            Some("+") => Command::Volume(kind, VolumeStep::Increase),
            Some("-") => Command::Volume(kind, VolumeStep::Decrease),
            _ => Command::Usage(USAGE),
        }
    }
}

// ---------------------------------------------------------------------------
// Background operations
// ---------------------------------------------------------------------------

fn load_image(target: &str) -> Result<Image> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(Image::Remote(target.to_string()));
    }
    let data = ImageData::from_path(Path::new(target))
        .with_context(|| format!("cannot read image {target}"))?;
    Ok(Image::Inline(data))
}

fn spawn_snap(session: &Session, target: String) {
    let image = match load_image(&target) {
        Ok(image) => image,
        Err(e) => {
            println!("{e:#}");
            return;
        }
    };
    let session = session.clone();
    tokio::spawn(async move {
        match session.capture(image).await {
            Ok(outcome) => {
                let scene = outcome.scene();
                println!("scene:    {}", scene.scene_description);
                println!("ambience: {}", scene.ambience);
                println!("effect:   {}", scene.sound_effect);
            }
            Err(e) => println!("{e}"),
        }
    });
}

fn spawn_transform(session: &Session) {
    let session = session.clone();
    tokio::spawn(async move {
        match session.transform_selected().await {
            Ok(outcome) => {
                println!("{} → {}", outcome.provider, outcome.image.describe());
                if let Some(follow_up) = outcome.follow_up {
                    if let Err(e) = follow_up.await {
                        log::warn!("follow-up analysis ended early: {e}");
                    }
                }
                println!("scene:    {}", session.snapshot().scene.scene_description);
            }
            Err(SessionError::Transform(e)) => println!("{}", e.category().message()),
            Err(e) => println!("{e}"),
        }
    });
}

fn spawn_sfx(session: &Session) {
    let session = session.clone();
    tokio::spawn(async move {
        match session.regenerate_effect().await {
            Ok(effect) => println!("effect: {effect}"),
            Err(e) => println!("{e}"),
        }
    });
}

fn print_status(state: &SessionState) {
    println!("phase:    {}", state.phase.label());
    if let Some(message) = &state.loading_message {
        println!("loading:  {message}");
    }
    match state.displayed_image() {
        Some(image) => println!("image:    {}", image.describe()),
        None => println!("image:    (none)"),
    }
    println!("mood:     {}", state.mood);
    if let Some(instruction) = &state.instruction {
        println!("style:    {}", instruction.label());
    }
    println!("scene:    {}", state.scene.scene_description);
    println!("ambience: {}", state.scene.ambience);
    println!("effect:   {}", state.effect_description);
    if let Some(banner) = &state.banner {
        println!("error:    {}", banner.message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
