//! Capture pipeline.
//!
//! One capture trigger drives a single cycle:
//!
//! ```text
//! Idle → Capturing → Predicted → Enriching → Narrated → Idle
//! ```
//!
//! The frame is shown, the best prediction is displayed, the nutrition
//! lookup runs in its own task and renders whenever it lands, and narration
//! is scheduled once the lookup finishes or the narration deadline passes
//! (measured from the start of prediction), whichever is first. Narration
//! runs in the background, so the cycle never waits on voice readiness. A
//! capture triggered while another is in flight is rejected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::classifier::{Classifier, ClassifierError};
use super::narrator::{NarrationError, SpeechNarrator};
use super::screen::Screen;
use crate::adapters::{CameraError, FrameSource, NutritionSource};
use crate::domain::narration::{CAMERA_DENIED_PREFIX, INTRO_TEXT, MODEL_LOADING};
use crate::domain::nutrition::NUTRITION_LOOKUP_FAILED;
use crate::domain::{best_prediction, compose_narration, format_label, Prediction};

/// Default wait for the lookup before narrating anyway
pub const DEFAULT_NARRATION_TIMEOUT: Duration = Duration::from_millis(1200);

/// Stage of the current capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Capturing,
    Predicted,
    Enriching,
    Narrated,
}

/// Camera stream state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    /// Not opened yet
    Closed,
    Open,
    /// Opening failed; capture stays disabled
    Denied(String),
}

/// What the nutrition lookup had produced by narration time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LookupStatus {
    Rendered { text: String },
    Failed { error: String },
    /// Still running when the narration deadline passed
    Pending,
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub prediction: Prediction,
    /// Label as displayed
    pub label: String,
    pub lookup: LookupStatus,
    /// Text handed to the narrator
    pub narration: String,
    /// Whether narration was scheduled
    pub narrated: bool,
}

/// Result of a capture trigger
#[derive(Debug)]
pub enum CaptureOutcome {
    Completed(CaptureReport),
    /// Model not loaded; the loading message is displayed
    ModelLoading,
    /// Camera could not be opened
    CameraUnavailable,
    /// Another capture is still in flight
    Busy,
}

/// Errors that abort a capture cycle
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("classifier returned no predictions")]
    NoPredictions,
}

/// Resets the in-flight flag when the cycle ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Capture → predict → enrich → narrate orchestration
pub struct CapturePipeline {
    camera: Arc<dyn FrameSource>,
    classifier: Arc<Classifier>,
    nutrition: Arc<dyn NutritionSource>,
    narrator: Arc<SpeechNarrator>,
    screen: Arc<Screen>,
    narration_timeout: Duration,
    narrate: AtomicBool,
    camera_status: Mutex<CameraStatus>,
    in_flight: AtomicBool,
    /// Incremented per cycle; late lookups from older cycles are dropped
    cycle: Arc<AtomicU64>,
    state: watch::Sender<CaptureState>,
    /// Most recently scheduled narration
    narration: Mutex<Option<JoinHandle<()>>>,
}

impl CapturePipeline {
    pub fn new(
        camera: Arc<dyn FrameSource>,
        classifier: Arc<Classifier>,
        nutrition: Arc<dyn NutritionSource>,
        narrator: Arc<SpeechNarrator>,
        screen: Arc<Screen>,
    ) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        Self {
            camera,
            classifier,
            nutrition,
            narrator,
            screen,
            narration_timeout: DEFAULT_NARRATION_TIMEOUT,
            narrate: AtomicBool::new(true),
            camera_status: Mutex::new(CameraStatus::Closed),
            in_flight: AtomicBool::new(false),
            cycle: Arc::new(AtomicU64::new(0)),
            state,
            narration: Mutex::new(None),
        }
    }

    /// Set the narration deadline
    pub fn with_narration_timeout(mut self, timeout: Duration) -> Self {
        self.narration_timeout = timeout;
        self
    }

    /// Enable or disable speaking at the end of a cycle
    pub fn with_narration(self, narrate: bool) -> Self {
        self.set_narration(narrate);
        self
    }

    pub fn set_narration(&self, narrate: bool) {
        self.narrate.store(narrate, Ordering::Release);
    }

    pub fn screen(&self) -> &Arc<Screen> {
        &self.screen
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    fn set_state(&self, state: CaptureState) {
        debug!(?state, "Capture state");
        self.state.send_replace(state);
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.camera_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_camera_status(&self, status: CameraStatus) {
        *self.camera_status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Open the camera stream.
    ///
    /// On failure an alert is raised and capture stays disabled; there is
    /// no retry.
    pub async fn start_camera(&self) -> bool {
        match self.camera.open().await {
            Ok(()) => {
                info!(camera = self.camera.name(), "Camera ready");
                self.set_camera_status(CameraStatus::Open);
                true
            }
            Err(e) => {
                error!(camera = self.camera.name(), error = %e, "Camera unavailable");
                self.screen.alert(format!("{}{}", CAMERA_DENIED_PREFIX, e));
                self.set_camera_status(CameraStatus::Denied(e.to_string()));
                false
            }
        }
    }

    async fn ensure_camera(&self) -> bool {
        match self.camera_status() {
            CameraStatus::Open => true,
            CameraStatus::Denied(_) => false,
            CameraStatus::Closed => self.start_camera().await,
        }
    }

    /// Run one capture cycle
    #[instrument(skip(self))]
    pub async fn capture(&self) -> Result<CaptureOutcome, CaptureError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            warn!("Capture already in progress, ignoring trigger");
            return Ok(CaptureOutcome::Busy);
        };

        let outcome = self.run_cycle().await;
        self.set_state(CaptureState::Idle);
        outcome
    }

    async fn run_cycle(&self) -> Result<CaptureOutcome, CaptureError> {
        if !self.ensure_camera().await {
            return Ok(CaptureOutcome::CameraUnavailable);
        }

        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let cycle = self.cycle.fetch_add(1, Ordering::AcqRel) + 1;
        info!(%id, "Capture started");

        // Capturing: snapshot the current frame
        self.set_state(CaptureState::Capturing);
        let frame = self.camera.grab().await?;
        self.screen.show_snapshot(frame.clone());

        // Predicted: best class, or the loading message
        let prediction_started = Instant::now();
        if !self.classifier.is_loaded() {
            info!(status = ?self.classifier.status(), "Model not loaded yet");
            self.screen.set_label(MODEL_LOADING);
            self.screen.set_nutrition("");
            return Ok(CaptureOutcome::ModelLoading);
        }

        let predictions = self.classifier.predict(&frame).await?;
        let best = best_prediction(&predictions)
            .cloned()
            .ok_or(CaptureError::NoPredictions)?;

        let label = format_label(&best);
        self.screen.set_label(label.clone());
        // Clear the previous cycle's nutrition so narration never reads it
        self.screen.set_nutrition("");
        self.set_state(CaptureState::Predicted);
        info!(food = %best.label, confidence = best.percent(), "Predicted");

        // Enriching: lookup renders on its own, narration waits up to the deadline
        self.set_state(CaptureState::Enriching);
        let lookup = self.spawn_lookup(best.label.clone(), cycle);
        let deadline = prediction_started + self.narration_timeout;

        let lookup = match tokio::time::timeout_at(deadline, lookup).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => LookupStatus::Failed {
                error: e.to_string(),
            },
            Err(_) => {
                debug!(timeout = ?self.narration_timeout, "Lookup still running at narration deadline");
                LookupStatus::Pending
            }
        };

        // Narrated
        let narration = compose_narration(&self.screen.label(), &self.screen.nutrition());
        let narrate = self.narrate.load(Ordering::Acquire);
        if narrate {
            self.schedule_narration(narration.clone());
        }
        self.set_state(CaptureState::Narrated);

        Ok(CaptureOutcome::Completed(CaptureReport {
            id,
            started_at,
            prediction: best,
            label,
            lookup,
            narration,
            narrated: narrate,
        }))
    }

    /// Speak `text` in the background, superseding a narration that is
    /// still waiting for voices
    fn schedule_narration(&self, text: String) {
        let narrator = Arc::clone(&self.narrator);
        let handle = tokio::spawn(async move {
            if let Err(e) = narrator.speak(&text).await {
                warn!(error = %e, "Narration dropped");
            }
        });

        let mut current = self.narration.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(handle) {
            previous.abort();
        }
    }

    /// Wait for the last scheduled narration to be handed to the engine
    pub async fn wait_for_narration(&self) {
        let handle = self
            .narration
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Narration task failed");
                }
            }
        }
    }

    /// Look up nutrition for `food` and render it when it arrives
    fn spawn_lookup(&self, food: String, cycle: u64) -> JoinHandle<LookupStatus> {
        let source = Arc::clone(&self.nutrition);
        let screen = Arc::clone(&self.screen);
        let current_cycle = Arc::clone(&self.cycle);

        tokio::spawn(async move {
            let (text, status) = match source.fetch_nutrition_info(&food).await {
                Ok(info) => {
                    let text = info.render();
                    debug!(%food, found = info.is_found(), "Nutrition lookup finished");
                    (text.clone(), LookupStatus::Rendered { text })
                }
                Err(e) => {
                    error!(%food, error = %e, "Nutrition lookup failed");
                    (
                        NUTRITION_LOOKUP_FAILED.to_string(),
                        LookupStatus::Failed {
                            error: e.to_string(),
                        },
                    )
                }
            };

            if current_cycle.load(Ordering::Acquire) == cycle {
                screen.set_nutrition(text);
            } else {
                debug!(%food, "Discarding lookup from an earlier capture");
            }
            status
        })
    }

    /// Narrate whatever the screen currently shows
    pub async fn speak_result(&self) -> Result<String, NarrationError> {
        let text = compose_narration(&self.screen.label(), &self.screen.nutrition());
        self.narrator.speak(&text).await?;
        Ok(text)
    }

    /// Narrate the usage guide
    pub async fn speak_intro(&self) -> Result<(), NarrationError> {
        self.narrator.speak(INTRO_TEXT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_releases() {
        let flag = AtomicBool::new(false);

        let guard = InFlight::acquire(&flag).unwrap();
        assert!(InFlight::acquire(&flag).is_none());

        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }

    #[test]
    fn test_lookup_status_serialization() {
        let json = serde_json::to_string(&LookupStatus::Pending).unwrap();
        assert_eq!(json, r#"{"status":"pending"}"#);
    }
}
