//! One open audiobook: streamed content, playback and view state together.
//!
//! [`ReaderSession`] applies [`SessionCommand`]s and feed or audio events and
//! reports what changed as a [`ViewUpdate`] plus a [`PlayerSnapshot`].

use crate::audio::{AudioEvent, AudioOutput};
use crate::cancellation::CancellationToken;
use crate::feed::{FeedError, IngestOutcome};
use crate::highlight::{HoverChange, HoverTracker};
use crate::model::{ContentFragment, PieceId, WorkId};
use crate::playback::{PlaybackController, PlaybackEffect, PlaybackState};
use crate::prefs::{PreferenceStore, Preferences};
use crate::progress::progress_percent;
use crate::traversal::next_playable;
use crate::tree::{ContentTree, NodeId};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackView {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    #[default]
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub work: u64,
    pub state: PlaybackView,
    pub current_sequence: Option<usize>,
    pub current_piece: Option<PieceId>,
    pub progress_pct: u8,
    pub total_units: Option<usize>,
    pub auto_scroll: bool,
    pub fragments: usize,
    pub playable_units: usize,
    pub ingest: IngestState,
    pub ingest_error: Option<String>,
    pub pending_resume: Option<PieceId>,
    pub can_seek_prev: bool,
    pub can_seek_next: bool,
}

#[derive(Debug, Clone)]
pub enum SessionCommand {
    GetSnapshot,
    PlayUnit { node: NodeId },
    TogglePlayPause,
    Pause,
    Resume,
    Stop,
    SeekNext,
    SeekPrev,
    ToggleAutoScroll,
    ResumeFromSaved,
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "player_get_snapshot",
            Self::PlayUnit { .. } => "player_play_unit",
            Self::TogglePlayPause => "player_toggle_play_pause",
            Self::Pause => "player_pause",
            Self::Resume => "player_resume",
            Self::Stop => "player_stop",
            Self::SeekNext => "player_seek_next",
            Self::SeekPrev => "player_seek_prev",
            Self::ToggleAutoScroll => "player_toggle_auto_scroll",
            Self::ResumeFromSaved => "player_resume_from_saved",
        }
    }
}

/// Visual work produced by one session call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub effects: Vec<PlaybackEffect>,
    pub hover: Vec<HoverChange>,
}

impl ViewUpdate {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.hover.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub action: &'static str,
    pub snapshot: PlayerSnapshot,
    pub update: ViewUpdate,
}

/// Everything the player holds for one open work instance.
pub struct ReaderSession<A, S> {
    work: WorkId,
    tree: ContentTree,
    controller: PlaybackController<A, S>,
    hover: HoverTracker,
    total_units: Option<usize>,
    ingest: IngestState,
    ingest_error: Option<String>,
    cancel: CancellationToken,
    closed: bool,
}

impl<A: AudioOutput, S: PreferenceStore> ReaderSession<A, S> {
    pub fn new(work: WorkId, audio: A, store: S) -> Self {
        Self {
            work,
            tree: ContentTree::new(),
            controller: PlaybackController::new(work, audio, Preferences::new(store)),
            hover: HoverTracker::new(),
            total_units: None,
            ingest: IngestState::Streaming,
            ingest_error: None,
            cancel: CancellationToken::new(),
            closed: false,
        }
    }

    pub fn work(&self) -> WorkId {
        self.work
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn controller(&self) -> &PlaybackController<A, S> {
        &self.controller
    }

    /// Token the ingestion task must observe; cancelled by [`close`](Self::close).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_total_units(&mut self, total: Option<usize>) {
        debug!(?total, "Total unit count updated");
        self.total_units = total;
    }

    /// Appends a streamed fragment and starts a pending resume target that
    /// just arrived.
    pub fn on_fragment(&mut self, fragment: &ContentFragment) -> ViewUpdate {
        let mut update = ViewUpdate::default();
        if self.closed {
            debug!(fragment_id = fragment.id, "Ignoring fragment after close");
            return update;
        }
        self.tree.append_fragment(fragment);
        self.controller.on_tree_grew(&self.tree, &mut update.effects);
        self.settle_hover(&mut update);
        update
    }

    pub fn on_ingest_end(&mut self, result: &Result<IngestOutcome, FeedError>) {
        if self.closed {
            return;
        }
        match result {
            Ok(IngestOutcome::Completed { fragments }) => {
                info!(fragments, units = self.tree.playable_count(), "Content fully loaded");
                self.ingest = IngestState::Complete;
            }
            Ok(IngestOutcome::Cancelled { .. }) => self.ingest = IngestState::Cancelled,
            Err(err) => {
                warn!(fragments = self.tree.fragment_count(), "Content ingestion failed: {err}");
                self.ingest = IngestState::Failed;
                self.ingest_error = Some(err.to_string());
            }
        }
        self.controller.on_content_complete();
    }

    pub fn on_audio_event(&mut self, event: AudioEvent) -> ViewUpdate {
        let mut update = ViewUpdate::default();
        if self.closed {
            debug!(clip = event.clip().0, "Ignoring audio event after close");
            return update;
        }
        self.controller
            .on_audio_event(event, &self.tree, &mut update.effects);
        self.settle_hover(&mut update);
        update
    }

    pub fn pointer_moved(&mut self, target: Option<NodeId>) -> Vec<HoverChange> {
        if self.closed {
            return Vec::new();
        }
        let active = self.controller.active_unit().map(|unit| unit.node);
        self.hover.pointer_moved(&self.tree, target, active)
    }

    pub fn apply_command(&mut self, command: SessionCommand) -> SessionEvent {
        let action = command.action();
        let mut update = ViewUpdate::default();
        if self.closed {
            debug!(action, "Ignoring command after close");
        } else {
            let effects = &mut update.effects;
            match command {
                SessionCommand::GetSnapshot => {}
                SessionCommand::PlayUnit { node } => match self.tree.playable(node) {
                    Some(unit) => self.controller.play(unit, effects),
                    None => debug!(node = node.index(), "Clicked node has no audio"),
                },
                SessionCommand::TogglePlayPause => {
                    if self.controller.active_unit().is_some() {
                        self.controller.toggle_pause();
                    } else {
                        self.resume_from_saved(effects);
                    }
                }
                SessionCommand::Pause => self.controller.pause(),
                SessionCommand::Resume => self.controller.resume(),
                SessionCommand::Stop => self.controller.stop(effects),
                SessionCommand::SeekNext => self.controller.seek_next(&self.tree, effects),
                SessionCommand::SeekPrev => self.controller.seek_previous(&self.tree, effects),
                SessionCommand::ToggleAutoScroll => {
                    self.controller.toggle_auto_scroll();
                }
                SessionCommand::ResumeFromSaved => self.resume_from_saved(effects),
            }
            self.settle_hover(&mut update);
        }
        SessionEvent {
            action,
            snapshot: self.snapshot(),
            update,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = match self.controller.state() {
            PlaybackState::Idle => PlaybackView::Idle,
            PlaybackState::Active { paused: false, .. } => PlaybackView::Playing,
            PlaybackState::Active { paused: true, .. } => PlaybackView::Paused,
        };
        let active = self.controller.active_unit();
        let current_sequence = active.map(|unit| unit.sequence).or_else(|| {
            self.controller
                .preferences()
                .resume_pointer(self.work)
                .map(|pointer| pointer.sequence)
        });
        PlayerSnapshot {
            work: self.work.0,
            state,
            current_sequence,
            current_piece: active.map(|unit| unit.piece_id),
            progress_pct: progress_percent(current_sequence, self.total_units),
            total_units: self.total_units,
            auto_scroll: self.controller.auto_scroll(),
            fragments: self.tree.fragment_count(),
            playable_units: self.tree.playable_count(),
            ingest: self.ingest,
            ingest_error: self.ingest_error.clone(),
            pending_resume: self.controller.pending_resume().map(|pointer| pointer.piece_id),
            can_seek_prev: active.is_some_and(|unit| unit.sequence > 0),
            can_seek_next: next_playable(&self.tree, active.map(|unit| unit.node)).is_some(),
        }
    }

    /// Tears the session down: ingestion is cancelled, audio stops and no
    /// later fragment, audio or command has any effect.
    pub fn close(&mut self) -> ViewUpdate {
        let mut update = ViewUpdate::default();
        if self.closed {
            return update;
        }
        info!(work = %self.work, "Closing session");
        self.closed = true;
        self.cancel.cancel();
        self.controller.shutdown(&mut update.effects);
        update.hover.extend(self.hover.clear());
        if self.ingest == IngestState::Streaming {
            self.ingest = IngestState::Cancelled;
        }
        update
    }

    fn resume_from_saved(&mut self, effects: &mut Vec<PlaybackEffect>) {
        self.controller.resume_from_saved(&self.tree, effects);
    }

    fn settle_hover(&mut self, update: &mut ViewUpdate) {
        for effect in &update.effects {
            if let PlaybackEffect::MarkPlaying(node) = effect {
                update.hover.extend(self.hover.on_playing(*node));
            }
        }
    }
}
