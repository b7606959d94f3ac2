//! Domain types for the foodlens pipeline.
//!
//! This module contains the core data structures:
//! - Prediction: per-class classifier output and best-class selection
//! - Nutrition: nutrient reports and their rendered text
//! - Voice/Utterance: speech platform data
//! - Frame: a captured camera image
//! - Narration: display strings and narration text assembly

pub mod frame;
pub mod narration;
pub mod nutrition;
pub mod prediction;
pub mod voice;

// Re-export commonly used types
pub use frame::Frame;
pub use narration::{compose_narration, format_label, strip_label};
pub use nutrition::{Nutrient, NutrientReport, NutritionInfo};
pub use prediction::{best_prediction, Prediction};
pub use voice::{Utterance, Voice};
