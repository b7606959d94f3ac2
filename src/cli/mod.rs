//! Command-line interface for foodlens.
//!
//! Each on-screen trigger maps to a command: the capture
//! button (`capture`), the speak-result button and mascot (inside
//! `session`), plus diagnostics for voices, lookups and configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::adapters::{
    CommandCamera, CommandSpeech, FrameSource, NutritionSource, OpenFoodFactsClient,
    SpeechEngine, StillImageCamera,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    CaptureOutcome, Platform, Screen, ScreenUpdate, Session, SpeechNarrator, VoiceDirectory,
};
use crate::domain::narration::INTRO_TEXT;

/// How long a one-shot capture waits for voices before exiting unspoken
const NARRATION_WAIT: Duration = Duration::from_secs(10);

/// foodlens - photograph food, hear what it is and what is in it
#[derive(Parser, Debug)]
#[command(name = "foodlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture one frame, classify it, look up nutrition and read it aloud
    Capture {
        /// Use this image file instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Show results without speaking
        #[arg(long)]
        no_speak: bool,

        /// Save the captured frame here
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print the capture report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session: c = capture, s = speak result, i = intro, q = quit
    Session {
        /// Use this image file instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Speak arbitrary text with the preferred voice
    Speak {
        /// Text to speak
        text: String,
    },

    /// Speak the usage guide
    Intro,

    /// List synthesis voices and the preferred one
    Voices,

    /// Look up nutrition facts for a food name
    Lookup {
        /// Food name (e.g. "apple")
        food: String,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;

        match self.command {
            Commands::Capture {
                image,
                no_speak,
                snapshot,
                json,
            } => capture(config, image, no_speak, snapshot, json).await,
            Commands::Session { image } => run_session(config, image).await,
            Commands::Speak { text } => speak(config, &text).await,
            Commands::Intro => speak(config, INTRO_TEXT).await,
            Commands::Voices => list_voices(config).await,
            Commands::Lookup { food } => lookup(config, &food).await,
            Commands::Config => show_config(config),
        }
    }
}

/// Camera for the given image override
fn camera_for(config: &ResolvedConfig, image: Option<PathBuf>) -> Arc<dyn FrameSource> {
    match image {
        Some(path) => Arc::new(StillImageCamera::new(path)),
        None => Arc::new(CommandCamera::from_settings(&config.camera)),
    }
}

/// Voice directory + narrator without the rest of the pipeline
async fn build_narrator(config: &ResolvedConfig) -> (Arc<VoiceDirectory>, SpeechNarrator) {
    let engine: Arc<dyn SpeechEngine> = Arc::new(CommandSpeech::new(config.speech.program.clone()));
    let directory = Arc::new(VoiceDirectory::new(
        Arc::clone(&engine),
        config.speech.locale.clone(),
    ));
    directory.refresh().await;

    let narrator = SpeechNarrator::from_settings(Arc::clone(&directory), engine, &config.speech);
    (directory, narrator)
}

fn print_alerts(screen: &Screen) {
    for alert in screen.alerts() {
        eprintln!("⚠ {}", alert);
    }
}

fn print_outcome(outcome: &CaptureOutcome, screen: &Screen, json: bool) -> Result<()> {
    match outcome {
        CaptureOutcome::Completed(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
                return Ok(());
            }
            println!();
            println!("{}", screen.label());
            println!("──────────────────────────────────────────");
            let nutrition = screen.nutrition();
            if nutrition.is_empty() {
                println!("(nutrition lookup still running)");
            } else {
                println!("{}", nutrition);
            }
            println!();
            println!("Narration: {}", report.narration);
        }
        CaptureOutcome::ModelLoading => println!("{}", screen.label()),
        CaptureOutcome::CameraUnavailable => print_alerts(screen),
        CaptureOutcome::Busy => println!("A capture is already in progress."),
    }
    Ok(())
}

/// Run a single capture cycle
async fn capture(
    config: &ResolvedConfig,
    image: Option<PathBuf>,
    no_speak: bool,
    snapshot: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let platform = Platform::from_config(config, camera_for(config, image));
    let session = Session::new(config, platform).with_narration(!no_speak);

    if !session.start().await {
        print_alerts(&session.screen);
        anyhow::bail!("Camera unavailable");
    }

    match session.classifier.wait_ready(config.model.load_timeout()).await {
        Ok(classes) => info!(classes, "Model ready"),
        Err(e) => warn!(error = %e, "Model not ready; capture will report loading"),
    }

    let outcome = session.pipeline.capture().await?;
    print_outcome(&outcome, &session.screen, json)?;

    if let Some(path) = snapshot {
        if let Some(frame) = session.screen.snapshot() {
            tokio::fs::write(&path, &frame.data)
                .await
                .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
            info!(path = %path.display(), "Snapshot saved");
        }
    }

    if !no_speak {
        let narration = session.pipeline.wait_for_narration();
        if tokio::time::timeout(NARRATION_WAIT, narration).await.is_err() {
            warn!(timeout = ?NARRATION_WAIT, "No synthesis voices; result not spoken");
            return Ok(());
        }
        session.narrator.wait_until_done().await;
    }
    Ok(())
}

/// Interactive loop mapping typed commands to the capture, speak and intro triggers
async fn run_session(config: &ResolvedConfig, image: Option<PathBuf>) -> Result<()> {
    let platform = Platform::from_config(config, camera_for(config, image));
    let session = Arc::new(Session::new(config, platform));

    // Render screen changes as they happen (late lookups included)
    let mut updates = session.screen.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match update {
                ScreenUpdate::Label(text) => println!("{}", text),
                ScreenUpdate::Nutrition(text) if !text.is_empty() => println!("{}", text),
                ScreenUpdate::Alert(text) => eprintln!("⚠ {}", text),
                _ => {}
            }
        }
    });

    session.start().await;

    println!("c = capture, s = speak result, i = intro, q = quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match line.trim() {
            "c" | "capture" => {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    match session.pipeline.capture().await {
                        Ok(CaptureOutcome::Busy) => println!("A capture is already in progress."),
                        Ok(_) => {}
                        Err(e) => eprintln!("Capture failed: {}", e),
                    }
                });
            }
            "s" | "speak" => {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    if let Err(e) = session.pipeline.speak_result().await {
                        eprintln!("Speech failed: {}", e);
                    }
                });
            }
            "i" | "intro" => {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    if let Err(e) = session.pipeline.speak_intro().await {
                        eprintln!("Speech failed: {}", e);
                    }
                });
            }
            "q" | "quit" => break,
            "" => {}
            other => println!("Unknown command: {}", other),
        }
    }

    printer.abort();
    Ok(())
}

/// Speak text and wait for playback to end
async fn speak(config: &ResolvedConfig, text: &str) -> Result<()> {
    let (_directory, narrator) = build_narrator(config).await;
    narrator.speak(text).await?;
    narrator.wait_until_done().await;
    Ok(())
}

/// List voices and the preferred one
async fn list_voices(config: &ResolvedConfig) -> Result<()> {
    let (directory, _narrator) = build_narrator(config).await;

    println!();
    println!("Synthesis voices ({})", config.speech.program);
    println!("══════════════════════════════════════════");
    for voice in directory.voices() {
        println!("{:<10} {}", voice.locale, voice.name);
    }
    println!();

    match directory.resolve_preferred() {
        Some(voice) => println!(
            "Preferred for {}: {} ({})",
            directory.locale(),
            voice.name,
            voice.locale
        ),
        None => println!("No voices available"),
    }
    Ok(())
}

/// Look up and print nutrition facts
async fn lookup(config: &ResolvedConfig, food: &str) -> Result<()> {
    let client = OpenFoodFactsClient::from_settings(&config.nutrition);
    let info = client
        .fetch_nutrition_info(food)
        .await
        .with_context(|| format!("Nutrition lookup for '{}' failed", food))?;

    println!("{}", info.render());
    Ok(())
}

/// Print the resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    match &config.config_file {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# Config file: (none, using defaults)"),
    }
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
