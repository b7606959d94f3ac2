//! Core orchestration logic.
//!
//! This module contains:
//! - VoiceDirectory: cached platform voices and preferred-voice resolution
//! - SpeechNarrator: readiness wait and cancel-before-speak playback
//! - Classifier: model asset loading and inference
//! - Screen: the display surface narration reads from
//! - CapturePipeline: the capture → predict → enrich → narrate cycle
//! - Session: wiring of all of the above

pub mod classifier;
pub mod narrator;
pub mod pipeline;
pub mod screen;
pub mod session;
pub mod voice_directory;

// Re-export commonly used types
pub use classifier::{asset_url, Classifier, ClassifierError, ModelAssets, ModelStatus};
pub use narrator::{NarrationError, SpeechNarrator};
pub use pipeline::{
    CameraStatus, CaptureError, CaptureOutcome, CapturePipeline, CaptureReport, CaptureState,
    LookupStatus,
};
pub use screen::{Screen, ScreenUpdate};
pub use session::{Platform, Session};
pub use voice_directory::VoiceDirectory;
