//! foodlens - camera food classifier with spoken nutrition facts
//!
//! Captures a camera frame, classifies it with a pre-trained image model,
//! looks the predicted food up in a public food database, and reads the
//! result aloud.
//!
//! # Architecture
//!
//! The crate owns orchestration only; classification, the food database
//! and speech synthesis are external capabilities behind traits:
//! - A capture cycle runs capture → predict → enrich → narrate
//! - The nutrition lookup renders independently of narration
//! - Narration waits for the lookup, bounded by a deadline
//! - At most one utterance is audible at a time
//!
//! # Modules
//!
//! - `adapters`: External capabilities (camera, inference, food database, speech)
//! - `core`: Orchestration (VoiceDirectory, SpeechNarrator, Classifier, CapturePipeline)
//! - `domain`: Data structures (Prediction, NutrientReport, Voice, Frame)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Classify a photo, look it up, and read the result aloud
//! foodlens capture --image lunch.png
//!
//! # Interactive session against the camera
//! foodlens session
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{CaptureOutcome, CapturePipeline, Classifier, Session, SpeechNarrator, VoiceDirectory};
pub use crate::domain::{NutrientReport, NutritionInfo, Prediction, Voice};
