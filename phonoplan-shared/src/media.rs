/// Allow-listed audio media types
///
/// Only three audio formats are accepted for recordings. The file extension of
/// a storage key is always derived from the MIME type, never taken from the
/// client.
///
/// | MIME type    | extension |
/// |--------------|-----------|
/// | `audio/webm` | `webm`    |
/// | `audio/wav`  | `wav`     |
/// | `audio/mpeg` | `mp3`     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest audio upload accepted (10 MiB)
pub const MAX_AUDIO_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Content type used when nothing better is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An allow-listed audio MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioMimeType {
    #[serde(rename = "audio/webm")]
    Webm,
    #[serde(rename = "audio/wav")]
    Wav,
    #[serde(rename = "audio/mpeg")]
    Mpeg,
}

/// Error returned when a MIME type is outside the allow-list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported audio MIME type: {0}")]
pub struct UnsupportedMimeType(pub String);

impl AudioMimeType {
    /// Every allowed type, in display order
    pub const ALL: [AudioMimeType; 3] = [AudioMimeType::Webm, AudioMimeType::Wav, AudioMimeType::Mpeg];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMimeType::Webm => "audio/webm",
            AudioMimeType::Wav => "audio/wav",
            AudioMimeType::Mpeg => "audio/mpeg",
        }
    }

    /// File extension for storage keys (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            AudioMimeType::Webm => "webm",
            AudioMimeType::Wav => "wav",
            AudioMimeType::Mpeg => "mp3",
        }
    }

    /// Comma-separated list of the allowed types, for error messages
    pub fn allowed_list() -> String {
        Self::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for AudioMimeType {
    type Err = UnsupportedMimeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnsupportedMimeType(s.to_string()))
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guesses a content type from an object key's extension
///
/// Used by the local object store when an upload carries no `Content-Type`.
pub fn infer_content_type(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();

    if lower.ends_with(".webm") {
        "audio/webm"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".ogg") {
        "audio/ogg"
    } else {
        DEFAULT_CONTENT_TYPE
    }
}
