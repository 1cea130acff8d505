//! Playback core for streamed, narrated audiobooks.
//!
//! Fragments arrive over a newline-delimited JSON feed ([`feed`]), are
//! appended to an arena document tree ([`tree`]) and are played one clip at
//! a time in document order ([`traversal`], [`playback`]). [`session`] ties
//! these together for one open work instance.

pub mod audio;
pub mod cancellation;
pub mod feed;
pub mod highlight;
pub mod model;
pub mod playback;
pub mod prefs;
pub mod progress;
pub mod session;
pub mod status;
pub mod traversal;
pub mod tree;

#[cfg(test)]
mod testing;

pub use audio::{AudioError, AudioEvent, AudioLocator, AudioOutput, ClipToken};
pub use cancellation::CancellationToken;
pub use feed::{FeedError, FeedReader, IngestOutcome};
pub use model::{AudioHash, ContentFragment, ContentPiece, WorkId};
pub use prefs::{PrefError, PrefKey, PreferenceStore};
pub use session::{PlayerSnapshot, ReaderSession, SessionCommand, SessionEvent, ViewUpdate};
