//! Display surface.
//!
//! Holds what the user currently sees: the captured snapshot, the
//! prediction label, the nutrition text and any alerts. Every change is
//! broadcast as a [`ScreenUpdate`] so a front end can render it. Writes are
//! unversioned; the last one wins.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::Frame;

/// A change to the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenUpdate {
    Snapshot { bytes: usize },
    Label(String),
    Nutrition(String),
    Alert(String),
}

#[derive(Debug, Default)]
struct ScreenState {
    snapshot: Option<Frame>,
    snapshot_visible: bool,
    label: String,
    nutrition: String,
    alerts: Vec<String>,
}

/// Shared display surface
pub struct Screen {
    state: Mutex<ScreenState>,
    updates: broadcast::Sender<ScreenUpdate>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(ScreenState::default()),
            updates,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScreenState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn publish(&self, update: ScreenUpdate) {
        // Nobody listening is fine
        let _ = self.updates.send(update);
    }

    /// Subscribe to screen changes
    pub fn subscribe(&self) -> broadcast::Receiver<ScreenUpdate> {
        self.updates.subscribe()
    }

    /// Replace the snapshot and make it visible
    pub fn show_snapshot(&self, frame: Frame) {
        let bytes = frame.len();
        self.with_state(|s| {
            s.snapshot = Some(frame);
            s.snapshot_visible = true;
        });
        debug!(bytes, "Snapshot shown");
        self.publish(ScreenUpdate::Snapshot { bytes });
    }

    pub fn set_label(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_state(|s| s.label = text.clone());
        debug!(label = %text, "Label updated");
        self.publish(ScreenUpdate::Label(text));
    }

    pub fn set_nutrition(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_state(|s| s.nutrition = text.clone());
        self.publish(ScreenUpdate::Nutrition(text));
    }

    /// Raise a user-visible alert
    pub fn alert(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "Alert");
        self.with_state(|s| s.alerts.push(message.clone()));
        self.publish(ScreenUpdate::Alert(message));
    }

    pub fn label(&self) -> String {
        self.with_state(|s| s.label.clone())
    }

    pub fn nutrition(&self) -> String {
        self.with_state(|s| s.nutrition.clone())
    }

    pub fn snapshot(&self) -> Option<Frame> {
        self.with_state(|s| s.snapshot.clone())
    }

    pub fn snapshot_visible(&self) -> bool {
        self.with_state(|s| s.snapshot_visible)
    }

    pub fn alerts(&self) -> Vec<String> {
        self.with_state(|s| s.alerts.clone())
    }
}
