use anyhow::{Context, Result};
use clap::Parser;
use muse_storyteller::ai::mime::detect_image_mime;
use muse_storyteller::app::{App, Notification, Outcome};
use muse_storyteller::audio;
use muse_storyteller::models::{Speaker, StoryResult};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "muse")]
#[command(about = "Turn a photograph into a story, then chat about it")]
struct CliArgs {
    /// Image to analyse (JPEG, PNG, WebP or GIF).
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Where narration audio is written. The extension is adjusted to the codec.
    #[arg(long, value_name = "PATH", default_value = "narration.wav")]
    audio_out: PathBuf,

    /// Print the story as JSON and exit without starting the chat loop.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Chat(String),
    Narrate,
    New(PathBuf),
    Reset,
    Quit,
    Help,
    Empty,
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    match line.split_once(' ') {
        Some(("/new", path)) if !path.trim().is_empty() => Command::New(PathBuf::from(path.trim())),
        _ => match line {
            "/narrate" => Command::Narrate,
            "/reset" => Command::Reset,
            "/quit" | "/exit" => Command::Quit,
            "/help" | "/new" => Command::Help,
            _ => Command::Chat(line.to_string()),
        },
    }
}

fn read_image(path: &Path) -> Result<(Vec<u8>, &'static str)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = detect_image_mime(&bytes)
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    Ok((bytes, mime))
}

fn print_story(story: &StoryResult) {
    println!();
    println!("Mood: {}", story.mood);
    println!();
    println!("{}", story.opening_paragraph);
    println!();
    println!("Scene: {}", story.scene_description);
    println!();
    println!("Captions:");
    for caption in &story.captions {
        println!("  - {}", caption);
    }
    println!("Music:");
    for pick in &story.music_recommendations {
        println!("  - {}", pick);
    }
    println!();
}

fn print_notifications(rx: &mut UnboundedReceiver<Notification>) {
    while let Ok(notification) = rx.try_recv() {
        eprintln!("! {}", notification.message);
    }
}

async fn start_story(app: &App, path: &Path) -> Result<bool> {
    let (bytes, mime) = read_image(path)?;
    info!("Loaded {} ({}, {} bytes)", path.display(), mime, bytes.len());
    println!("Reading the image...");

    if app.select_image(bytes, mime).await != Outcome::Applied {
        return Ok(false);
    }
    if let Some(story) = app.session().await.story() {
        print_story(story);
    }
    Ok(true)
}

/// Write the narration whenever playback starts. The terminal has no player,
/// so the file hand-off ends playback whether or not the write succeeded.
async fn narrate(app: &App, audio_out: &Path) -> Result<Option<PathBuf>> {
    if app.request_narration().await != Outcome::Applied {
        return Ok(None);
    }

    let session = app.session().await;
    let Some(narration) = session.narration().filter(|_| session.is_narration_playing()) else {
        return Ok(None);
    };

    let (bytes, extension) = audio::playable(narration);
    let path = audio_out.with_extension(extension);
    let written = tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()));
    app.finish_playback().await;
    written?;
    Ok(Some(path))
}

async fn run(args: CliArgs) -> Result<()> {
    let (app, mut notifications) = App::new()?;

    let ready = start_story(&app, &args.image).await?;
    print_notifications(&mut notifications);

    if args.json {
        let session = app.session().await;
        let story = session
            .story()
            .context("No story was generated for this image")?;
        println!("{}", serde_json::to_string_pretty(story)?);
        return Ok(());
    }

    if ready {
        println!("Ask the muse anything. /narrate, /new <image>, /reset, /quit");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("Commands: /narrate, /new <image>, /reset, /quit"),
            Command::Reset => {
                app.reset_session().await;
                println!("Session cleared. Use /new <image> to begin again.");
            }
            Command::New(path) => {
                app.reset_session().await;
                if let Err(e) = start_story(&app, &path).await {
                    eprintln!("! {:#}", e);
                }
            }
            Command::Narrate => match narrate(&app, &args.audio_out).await {
                Ok(Some(path)) => println!("Narration saved to {}", path.display()),
                Ok(None) => {}
                Err(e) => eprintln!("! {:#}", e),
            },
            Command::Chat(text) => {
                if app.send_chat_message(&text).await == Outcome::Applied {
                    let session = app.session().await;
                    if let Some(turn) = session
                        .transcript()
                        .last()
                        .filter(|t| t.speaker == Speaker::Assistant)
                    {
                        println!("\n{}\n", turn.text);
                    }
                }
            }
        }
        print_notifications(&mut notifications);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "muse_storyteller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("muse failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
