//! Wiring of the pipeline components.
//!
//! A session owns one of each component plus the background tasks that
//! keep them fresh (voice list watcher, model loader).

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::classifier::Classifier;
use super::narrator::SpeechNarrator;
use super::pipeline::CapturePipeline;
use super::screen::Screen;
use super::voice_directory::VoiceDirectory;
use crate::adapters::{
    CommandInference, CommandSpeech, FrameSource, InferenceBackend, NutritionSource,
    OpenFoodFactsClient, SpeechEngine,
};
use crate::config::ResolvedConfig;

/// External capabilities a session is built from
pub struct Platform {
    pub camera: Arc<dyn FrameSource>,
    pub inference: Arc<dyn InferenceBackend>,
    pub nutrition: Arc<dyn NutritionSource>,
    pub speech: Arc<dyn SpeechEngine>,
}

impl Platform {
    /// Default adapters for everything but the camera.
    ///
    /// Starts the speech engine's voice monitor, which stops on its own
    /// once the engine is dropped.
    pub fn from_config(config: &ResolvedConfig, camera: Arc<dyn FrameSource>) -> Self {
        let speech = Arc::new(CommandSpeech::new(config.speech.program.clone()));
        speech.monitor_voices(config.speech.monitor_interval());

        Self {
            camera,
            inference: Arc::new(CommandInference::from_settings(&config.inference)),
            nutrition: Arc::new(OpenFoodFactsClient::from_settings(&config.nutrition)),
            speech,
        }
    }
}

/// A running foodlens instance
pub struct Session {
    pub directory: Arc<VoiceDirectory>,
    pub narrator: Arc<SpeechNarrator>,
    pub classifier: Arc<Classifier>,
    pub screen: Arc<Screen>,
    pub pipeline: CapturePipeline,
    model_url: String,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Assemble the components (nothing is started yet)
    pub fn new(config: &ResolvedConfig, platform: Platform) -> Self {
        let directory = Arc::new(VoiceDirectory::new(
            Arc::clone(&platform.speech),
            config.speech.locale.clone(),
        ));
        let narrator = Arc::new(SpeechNarrator::from_settings(
            Arc::clone(&directory),
            Arc::clone(&platform.speech),
            &config.speech,
        ));
        let classifier = Arc::new(Classifier::new(platform.inference));
        let screen = Arc::new(Screen::new());

        let pipeline = CapturePipeline::new(
            platform.camera,
            Arc::clone(&classifier),
            platform.nutrition,
            Arc::clone(&narrator),
            Arc::clone(&screen),
        )
        .with_narration_timeout(config.capture.narration_timeout());

        Self {
            directory,
            narrator,
            classifier,
            screen,
            pipeline,
            model_url: config.model.url.clone(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Turn end-of-cycle narration on or off
    pub fn with_narration(self, narrate: bool) -> Self {
        self.pipeline.set_narration(narrate);
        self
    }

    /// Load voices, start watching for voice changes, and start loading
    /// the model in the background
    pub async fn start_speech_and_model(&self) {
        let voices = self.directory.refresh().await;
        info!(voices, locale = self.directory.locale(), "Voice directory loaded");

        let watcher = self.directory.watch_platform();

        let classifier = Arc::clone(&self.classifier);
        let model_url = self.model_url.clone();
        let loader = tokio::spawn(async move {
            if let Err(e) = classifier.load_model(&model_url).await {
                error!(%model_url, error = %e, "Model could not be loaded");
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(watcher);
        tasks.push(loader);
    }

    /// Start everything: speech, model loading, and the camera stream.
    ///
    /// Returns whether the camera opened.
    pub async fn start(&self) -> bool {
        self.start_speech_and_model().await;
        self.pipeline.start_camera().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
