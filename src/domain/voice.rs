//! Speech platform voices and utterances.

use serde::{Deserialize, Serialize};

/// A synthesis voice offered by the speech platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Locale tag (e.g. "ko-KR")
    pub locale: String,

    /// Display name
    pub name: String,
}

impl Voice {
    pub fn new(locale: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            name: name.into(),
        }
    }
}

/// One unit of synthesized speech submitted for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Text to speak
    pub text: String,

    /// Locale tag the text is written in
    pub locale: String,

    /// Voice to speak with (platform default when `None`)
    pub voice: Option<Voice>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            locale: locale.into(),
            voice: None,
        }
    }

    /// Attach a voice to the utterance
    pub fn with_voice(mut self, voice: Option<Voice>) -> Self {
        self.voice = voice;
        self
    }
}
