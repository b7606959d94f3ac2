//! Adapter interfaces for external systems.
//!
//! Every capability the pipeline delegates (camera, model inference, food
//! database, speech synthesis) sits behind a trait here so the orchestration
//! in `core` never talks to a device, process, or HTTP service directly.

pub mod camera;
pub mod inference;
pub mod openfoodfacts;
pub mod speech;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{Frame, NutritionInfo, Utterance, Voice};

// Re-export the concrete adapters
pub use camera::{CameraError, CommandCamera, StillImageCamera};
pub use inference::{CommandInference, InferenceOutput};
pub use openfoodfacts::{LookupError, OpenFoodFactsClient};
pub use speech::CommandSpeech;

/// Source of camera frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Acquire the camera stream (permission check happens here)
    async fn open(&self) -> Result<(), CameraError>;

    /// Take the current frame
    async fn grab(&self) -> Result<Frame, CameraError>;
}

/// Runs the image model on a frame
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Score every class of the model at `model_url` against `frame`
    async fn infer(&self, model_url: &str, frame: &Frame) -> Result<InferenceOutput>;
}

/// Food database lookup
#[async_trait]
pub trait NutritionSource: Send + Sync {
    /// Look up the first product matching `food_name`
    async fn fetch_nutrition_info(&self, food_name: &str) -> Result<NutritionInfo, LookupError>;
}

/// Platform speech synthesizer
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Read the full list of voices currently offered
    async fn voices(&self) -> Result<Vec<Voice>>;

    /// Subscribe to "voice list changed" notifications
    fn voices_changed(&self) -> broadcast::Receiver<()>;

    /// Stop the playing utterance and drop any queued ones
    async fn cancel(&self);

    /// Submit an utterance for playback (returns once playback has started)
    async fn speak(&self, utterance: Utterance) -> Result<()>;

    /// Wait for the current utterance, if any, to finish playing
    async fn wait_until_done(&self) {}
}
