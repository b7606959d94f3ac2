//! Captured camera frames.

use std::fmt;

/// A single still image taken from the camera
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded image bytes
    pub data: Vec<u8>,

    /// MIME type of `data` (e.g. "image/png")
    pub mime_type: String,
}

impl Frame {
    /// Create a PNG frame
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: "image/png".to_string(),
        }
    }

    /// Guess the MIME type from the leading magic bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mime_type = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "image/jpeg"
        } else {
            "application/octet-stream"
        };

        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame holds no image data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Image bytes are noise in logs
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}
