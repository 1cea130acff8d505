//! Boundary to the single audio resource.
//!
//! The playback controller drives an [`AudioOutput`] and receives its
//! completion notices as [`AudioEvent`]s routed back by the event loop.

use crate::model::AudioHash;
use thiserror::Error;

/// Identifies one `load` on the audio resource.
///
/// Events carrying a token other than the active one are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// The clip played to its natural end.
    Finished(ClipToken),
    Failed { clip: ClipToken, reason: String },
}

impl AudioEvent {
    pub fn clip(&self) -> ClipToken {
        match self {
            AudioEvent::Finished(clip) | AudioEvent::Failed { clip, .. } => *clip,
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to load clip {hash}: {reason}")]
    Load { hash: AudioHash, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Owned audio resource with explicit transport controls.
pub trait AudioOutput {
    /// Replaces whatever was loaded with the clip for `hash`.
    fn load(&mut self, clip: ClipToken, hash: &AudioHash) -> Result<(), AudioError>;
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}

/// Derives clip locations from the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioLocator {
    base_url: String,
}

impl AudioLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn url_for(&self, hash: &AudioHash) -> String {
        format!("{}/api/generated_wav_files/{}", self.base_url, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_trims_trailing_slash() {
        let locator = AudioLocator::new("http://localhost:8585/");
        assert_eq!(
            locator.url_for(&AudioHash::new("abc")),
            "http://localhost:8585/api/generated_wav_files/abc"
        );
    }
}
