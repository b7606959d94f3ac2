//! Cache of the speech platform's voices.
//!
//! The directory starts empty, is filled by `refresh()`, and is refilled
//! every time the platform reports that its voice list changed. Readiness
//! (non-empty cache) is published on a watch channel so waiters can
//! subscribe instead of polling a flag.

use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::SpeechEngine;
use crate::domain::Voice;

/// Cached voice list with preferred-locale resolution
pub struct VoiceDirectory {
    engine: Arc<dyn SpeechEngine>,
    locale: String,
    voices: RwLock<Vec<Voice>>,
    ready: watch::Sender<bool>,
}

impl VoiceDirectory {
    /// Create an empty directory preferring `locale`
    pub fn new(engine: Arc<dyn SpeechEngine>, locale: impl Into<String>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            engine,
            locale: locale.into(),
            voices: RwLock::new(Vec::new()),
            ready,
        }
    }

    /// Target locale tag
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Re-read the platform voice list and replace the cache.
    ///
    /// A failed listing leaves the cache untouched. Returns the number of
    /// cached voices.
    pub async fn refresh(&self) -> usize {
        let voices = match self.engine.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                warn!(engine = self.engine.name(), error = %e, "Failed to list voices");
                return self.len();
            }
        };

        let count = voices.len();
        {
            let mut cached = self.voices.write().unwrap_or_else(|e| e.into_inner());
            *cached = voices;
        }
        self.ready.send_replace(count > 0);

        debug!(count, "Voice directory refreshed");
        count
    }

    /// First voice matching the target locale, else the first voice, else none
    pub fn resolve_preferred(&self) -> Option<Voice> {
        let voices = self.voices.read().unwrap_or_else(|e| e.into_inner());
        voices
            .iter()
            .find(|v| v.locale == self.locale)
            .or_else(|| voices.first())
            .cloned()
    }

    /// Snapshot of the cached voices
    pub fn voices(&self) -> Vec<Voice> {
        self.voices.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.voices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the cache currently holds at least one voice
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Subscribe to readiness changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Refresh whenever the platform signals a voice list change.
    ///
    /// The task ends when the engine drops its notification channel.
    pub fn watch_platform(self: &Arc<Self>) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        let mut changes = self.engine.voices_changed();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let count = directory.refresh().await;
                        info!(count, "Voice list changed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
