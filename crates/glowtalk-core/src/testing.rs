//! In-memory fakes shared by unit tests.

use crate::audio::{AudioError, AudioOutput, ClipToken};
use crate::model::AudioHash;
use crate::playback::PlaybackEffect;
use crate::prefs::{PrefError, PrefKey, PreferenceStore};
use crate::tree::NodeId;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    Load(ClipToken, AudioHash),
    Play,
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Default)]
pub struct FakeOutput {
    pub calls: Vec<AudioCall>,
    pub fail_loads_of: Option<AudioHash>,
    pub fail_play: bool,
}

impl FakeOutput {
    pub fn last_clip(&self) -> Option<ClipToken> {
        self.calls.iter().rev().find_map(|call| match call {
            AudioCall::Load(clip, _) => Some(*clip),
            _ => None,
        })
    }

    pub fn loaded_hashes(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                AudioCall::Load(_, hash) => Some(hash.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl AudioOutput for FakeOutput {
    fn load(&mut self, clip: ClipToken, hash: &AudioHash) -> Result<(), AudioError> {
        if self.fail_loads_of.as_ref() == Some(hash) {
            return Err(AudioError::Load {
                hash: hash.clone(),
                reason: "404".to_string(),
            });
        }
        self.calls.push(AudioCall::Load(clip, hash.clone()));
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.fail_play {
            return Err(AudioError::Output("no device".to_string()));
        }
        self.calls.push(AudioCall::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(AudioCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(AudioCall::Resume);
    }

    fn stop(&mut self) {
        self.calls.push(AudioCall::Stop);
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenStore;

impl PreferenceStore for BrokenStore {
    fn get(&self, _key: PrefKey) -> Option<String> {
        None
    }

    fn set(&mut self, _key: PrefKey, _value: String) -> Result<(), PrefError> {
        Err(PrefError::Io(std::io::Error::other("read-only")))
    }
}

/// Replays playing marks and fails if two nodes are ever marked at once.
pub fn assert_single_playing_mark(effects: &[PlaybackEffect]) -> HashSet<NodeId> {
    let mut playing = HashSet::new();
    for effect in effects {
        match effect {
            PlaybackEffect::MarkPlaying(node) => {
                playing.insert(*node);
            }
            PlaybackEffect::ClearPlaying(node) => {
                playing.remove(node);
            }
            _ => {}
        }
        assert!(playing.len() <= 1, "two units marked playing: {playing:?}");
    }
    playing
}
