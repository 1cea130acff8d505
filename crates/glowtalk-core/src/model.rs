//! Records carried by the streamed content feed.
//!
//! One [`ContentFragment`] arrives per feed line. Its first piece is the
//! announcement (speaker-change cue) and is never rendered as body text.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type FragmentId = i64;
pub type PieceId = i64;

/// Opaque content hash naming a pre-rendered audio clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioHash(String);

impl AudioHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric id of one audiobook (work instance) on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub u64);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    pub id: FragmentId,
    #[serde(default, alias = "character")]
    pub character_name: Option<String>,
    #[serde(default)]
    pub screenname: Option<String>,
    #[serde(default, alias = "author")]
    pub author_name: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub icon_title: Option<String>,
    #[serde(default)]
    pub content_pieces: Vec<ContentPiece>,
}

impl ContentFragment {
    pub fn announcement(&self) -> Option<&ContentPiece> {
        self.content_pieces.first()
    }

    /// Pieces rendered as body text, in original order.
    pub fn body(&self) -> &[ContentPiece] {
        self.content_pieces.get(1..).unwrap_or(&[])
    }

    pub fn speaker(&self) -> SpeakerInfo {
        SpeakerInfo {
            character_name: self.character_name.clone(),
            screenname: self.screenname.clone(),
            author_name: self.author_name.clone(),
            icon_url: self.icon_url.clone(),
            icon_title: self.icon_title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPiece {
    pub id: PieceId,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_voiced", alias = "should_voice")]
    pub is_voiced: bool,
    #[serde(default)]
    pub audio_file_hash: Option<AudioHash>,
}

impl ContentPiece {
    /// The clip for this piece; an empty hash counts as no audio.
    pub fn audio_hash(&self) -> Option<&AudioHash> {
        self.audio_file_hash
            .as_ref()
            .filter(|hash| !hash.as_str().trim().is_empty())
    }
}

fn default_voiced() -> bool {
    true
}

/// Speaker metadata shown next to a fragment's announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerInfo {
    pub character_name: Option<String>,
    pub screenname: Option<String>,
    pub author_name: Option<String>,
    pub icon_url: Option<String>,
    pub icon_title: Option<String>,
}

impl SpeakerInfo {
    /// Best single label for the speaker.
    pub fn label(&self) -> Option<&str> {
        self.character_name
            .as_deref()
            .or(self.screenname.as_deref())
            .or(self.author_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_record_with_historical_field_names() {
        let line = r#"{"id":7,"character":"Axis","author":"alicorn","content_pieces":[
            {"id":70,"text":"Axis","should_voice":true,"audio_file_hash":"aa"},
            {"id":71,"text":"Hello there.","audio_file_hash":null}
        ]}"#;
        let fragment: ContentFragment = serde_json::from_str(line).unwrap();

        assert_eq!(fragment.character_name.as_deref(), Some("Axis"));
        assert_eq!(fragment.author_name.as_deref(), Some("alicorn"));
        assert_eq!(fragment.announcement().unwrap().id, 70);
        assert_eq!(fragment.body().len(), 1);
        assert!(fragment.body()[0].is_voiced);
        assert!(fragment.body()[0].audio_hash().is_none());
    }

    #[test]
    fn empty_hash_is_not_audio() {
        let piece = ContentPiece {
            id: 1,
            text: "x".to_string(),
            is_voiced: true,
            audio_file_hash: Some(AudioHash::new("")),
        };
        assert!(piece.audio_hash().is_none());
    }

    #[test]
    fn body_of_fragment_without_pieces_is_empty() {
        let fragment: ContentFragment = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert!(fragment.announcement().is_none());
        assert!(fragment.body().is_empty());
    }

    #[test]
    fn speaker_label_prefers_character_name() {
        let speaker = SpeakerInfo {
            character_name: None,
            screenname: Some("the_spire".to_string()),
            author_name: Some("someone".to_string()),
            icon_url: None,
            icon_title: None,
        };
        assert_eq!(speaker.label(), Some("the_spire"));
    }

    #[test]
    fn speaker_keeps_icon_metadata() {
        let line = r#"{"id":3,"character_name":"Carissa","icon_url":"https://x/i.png","icon_title":"smug","content_pieces":[]}"#;
        let fragment: ContentFragment = serde_json::from_str(line).unwrap();

        let speaker = fragment.speaker();
        assert_eq!(speaker.icon_url.as_deref(), Some("https://x/i.png"));
        assert_eq!(speaker.icon_title.as_deref(), Some("smug"));
    }
}
