//! Speech narrator.
//!
//! Speaking waits until the voice directory is populated, then cancels
//! whatever is playing and submits a new utterance in the target locale.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::voice_directory::VoiceDirectory;
use crate::adapters::SpeechEngine;
use crate::config::SpeechSettings;
use crate::domain::Utterance;

/// Errors surfaced by the narrator
#[derive(Debug, Clone, Error)]
pub enum NarrationError {
    #[error("no synthesis voices available after {attempts} attempts")]
    VoicesUnavailable { attempts: u32 },
}

/// Turns text into speech, one utterance at a time
pub struct SpeechNarrator {
    directory: Arc<VoiceDirectory>,
    engine: Arc<dyn SpeechEngine>,
    retry_interval: Duration,
    max_retries: Option<u32>,
    /// Held across cancel + submit so concurrent calls cannot overlap
    speak_lock: Mutex<()>,
}

impl SpeechNarrator {
    pub fn new(
        directory: Arc<VoiceDirectory>,
        engine: Arc<dyn SpeechEngine>,
        retry_interval: Duration,
        max_retries: Option<u32>,
    ) -> Self {
        Self {
            directory,
            engine,
            retry_interval,
            max_retries,
            speak_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(
        directory: Arc<VoiceDirectory>,
        engine: Arc<dyn SpeechEngine>,
        settings: &SpeechSettings,
    ) -> Self {
        Self::new(
            directory,
            engine,
            settings.retry_interval(),
            settings.max_retries,
        )
    }

    /// Speak `text`, replacing any utterance in progress.
    ///
    /// Playback failures are logged, not returned. The only error is running
    /// out of readiness retries when a bound is configured.
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn speak(&self, text: &str) -> Result<(), NarrationError> {
        self.wait_for_voices().await?;

        let _guard = self.speak_lock.lock().await;

        let voice = self.directory.resolve_preferred();
        let utterance = Utterance::new(text, self.directory.locale()).with_voice(voice);

        self.engine.cancel().await;
        if let Err(e) = self.engine.speak(utterance).await {
            warn!(engine = self.engine.name(), error = %e, "Speech playback failed");
            return Ok(());
        }

        info!("Narrating");
        Ok(())
    }

    /// Wait for the current utterance to finish playing
    pub async fn wait_until_done(&self) {
        self.engine.wait_until_done().await;
    }

    /// Block until the directory holds at least one voice.
    ///
    /// Wakes on readiness changes, and every `retry_interval` re-reads the
    /// voice list itself in case the platform never notifies.
    async fn wait_for_voices(&self) -> Result<(), NarrationError> {
        let mut ready = self.directory.subscribe();
        let mut attempts = 0u32;

        loop {
            if *ready.borrow_and_update() {
                return Ok(());
            }

            if let Some(max) = self.max_retries {
                if attempts >= max {
                    warn!(attempts, "Gave up waiting for voices");
                    return Err(NarrationError::VoicesUnavailable { attempts });
                }
            }
            attempts += 1;
            debug!(attempts, "Voices not ready, waiting");

            tokio::select! {
                changed = ready.changed() => {
                    if changed.is_err() {
                        return Err(NarrationError::VoicesUnavailable { attempts });
                    }
                }
                _ = tokio::time::sleep(self.retry_interval) => {
                    self.directory.refresh().await;
                }
            }
        }
    }
}
