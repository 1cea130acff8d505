//! Single-active-clip playback state machine.
//!
//! The controller owns the audio resource and the preference store. Visual
//! consequences (playing marks, scrolling) are returned as
//! [`PlaybackEffect`]s for the front end to apply.

use crate::audio::{AudioEvent, AudioOutput, ClipToken};
use crate::model::WorkId;
use crate::prefs::{PreferenceStore, Preferences, ResumePointer};
use crate::traversal::{first_playable, next_playable, previous_playable};
use crate::tree::{ContentTree, NodeId, PlayableUnit};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Active {
        unit: PlayableUnit,
        paused: bool,
    },
}

/// Work the front end must perform after a controller call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEffect {
    /// Mark the unit as playing; also clears any hover highlight on it.
    MarkPlaying(NodeId),
    ClearPlaying(NodeId),
    /// Scroll the node into view unconditionally.
    Reveal(NodeId),
    /// Scroll the node into view only if it is not fully visible.
    RevealIfHidden(NodeId),
    Failed { node: NodeId, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Started(PlayableUnit),
    /// The saved unit has not streamed in yet; it plays when it arrives.
    Pending(ResumePointer),
    /// The saved position was toggled off because it was already playing.
    Stopped,
    NothingToPlay,
}

pub struct PlaybackController<A, S> {
    work: WorkId,
    audio: A,
    prefs: Preferences<S>,
    state: PlaybackState,
    clip: Option<ClipToken>,
    clips_issued: u64,
    auto_scroll: bool,
    pending_resume: Option<ResumePointer>,
    content_complete: bool,
}

impl<A: AudioOutput, S: PreferenceStore> PlaybackController<A, S> {
    pub fn new(work: WorkId, audio: A, prefs: Preferences<S>) -> Self {
        let auto_scroll = prefs.auto_scroll();
        Self {
            work,
            audio,
            prefs,
            state: PlaybackState::Idle,
            clip: None,
            clips_issued: 0,
            auto_scroll,
            pending_resume: None,
            content_complete: false,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn active_unit(&self) -> Option<&PlayableUnit> {
        match &self.state {
            PlaybackState::Active { unit, .. } => Some(unit),
            PlaybackState::Idle => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Active { paused: false, .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, PlaybackState::Active { paused: true, .. })
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn pending_resume(&self) -> Option<ResumePointer> {
        self.pending_resume
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn preferences(&self) -> &Preferences<S> {
        &self.prefs
    }

    /// User request to play `unit`.
    ///
    /// Playing the unit that is already audibly playing stops it instead. An
    /// explicit request supersedes any pending resume target.
    pub fn play(&mut self, unit: PlayableUnit, effects: &mut Vec<PlaybackEffect>) {
        if let Some(pointer) = self.pending_resume.take() {
            debug!(piece_id = pointer.piece_id, "Dropping pending resume target");
        }
        self.start(unit, effects);
    }

    pub fn stop(&mut self, effects: &mut Vec<PlaybackEffect>) {
        if let Some(unit) = self.halt(effects) {
            info!(sequence = unit.sequence, "Stopped playback");
        }
    }

    pub fn pause(&mut self) {
        if let PlaybackState::Active { unit, paused } = &mut self.state {
            if !*paused {
                self.audio.pause();
                *paused = true;
                info!(sequence = unit.sequence, "Paused playback");
            }
        }
    }

    pub fn resume(&mut self) {
        if let PlaybackState::Active { unit, paused } = &mut self.state {
            if *paused {
                self.audio.resume();
                *paused = false;
                info!(sequence = unit.sequence, "Resumed playback");
            }
        }
    }

    /// Pauses an audible unit or resumes a paused one; idle stays idle.
    pub fn toggle_pause(&mut self) {
        match self.state {
            PlaybackState::Active { paused: true, .. } => self.resume(),
            PlaybackState::Active { paused: false, .. } => self.pause(),
            PlaybackState::Idle => debug!("Nothing to pause"),
        }
    }

    /// Flips and persists the auto-scroll preference; playback is untouched.
    pub fn toggle_auto_scroll(&mut self) -> bool {
        self.auto_scroll = !self.auto_scroll;
        if let Err(err) = self.prefs.set_auto_scroll(self.auto_scroll) {
            warn!(enabled = self.auto_scroll, "Failed to persist auto-scroll: {err}");
        }
        info!(enabled = self.auto_scroll, "Updated auto-scroll to playing text");
        self.auto_scroll
    }

    /// Reacts to a completion notice from the audio resource.
    pub fn on_audio_event(
        &mut self,
        event: AudioEvent,
        tree: &ContentTree,
        effects: &mut Vec<PlaybackEffect>,
    ) {
        if self.clip != Some(event.clip()) {
            debug!(clip = event.clip().0, "Ignoring event for stale clip");
            return;
        }
        match event {
            AudioEvent::Finished(_) => {
                let Some(finished) = self.halt(effects) else {
                    return;
                };
                match next_playable(tree, Some(finished.node)) {
                    Some(next) => {
                        debug!(from = finished.sequence, to = next.sequence, "Auto-advancing");
                        let node = next.node;
                        if self.start(next, effects) == Start::Playing && self.auto_scroll {
                            effects.push(PlaybackEffect::RevealIfHidden(node));
                        }
                    }
                    None => info!(
                        sequence = finished.sequence,
                        "Reached end of available audio"
                    ),
                }
            }
            AudioEvent::Failed { reason, .. } => {
                if let Some(unit) = self.halt(effects) {
                    warn!(sequence = unit.sequence, hash = %unit.audio_hash, "Playback failed: {reason}");
                    effects.push(PlaybackEffect::Failed {
                        node: unit.node,
                        message: reason,
                    });
                }
            }
        }
    }

    /// Continues from the saved resume pointer, or from the first unit when
    /// nothing was saved.
    pub fn resume_from_saved(
        &mut self,
        tree: &ContentTree,
        effects: &mut Vec<PlaybackEffect>,
    ) -> ResumeOutcome {
        self.pending_resume = None;
        let Some(pointer) = self.prefs.resume_pointer(self.work) else {
            return match first_playable(tree) {
                Some(unit) => self.start_revealed(unit, false, effects),
                None => {
                    info!("Nothing playable yet");
                    ResumeOutcome::NothingToPlay
                }
            };
        };

        match self.resolve_pointer(tree, pointer) {
            Resolution::Unit(unit) => self.start_revealed(unit, true, effects),
            Resolution::Exhausted | Resolution::NotArrived if self.content_complete => {
                info!(piece_id = pointer.piece_id, "Nothing playable at or after saved position");
                ResumeOutcome::NothingToPlay
            }
            Resolution::Exhausted | Resolution::NotArrived => {
                info!(
                    piece_id = pointer.piece_id,
                    sequence = pointer.sequence,
                    "Saved position not streamed yet; waiting for it"
                );
                self.pending_resume = Some(pointer);
                ResumeOutcome::Pending(pointer)
            }
        }
    }

    /// Starts the pending resume target once the tree has grown to include
    /// it. Returns the unit that started, if any.
    pub fn on_tree_grew(
        &mut self,
        tree: &ContentTree,
        effects: &mut Vec<PlaybackEffect>,
    ) -> Option<PlayableUnit> {
        let pointer = self.pending_resume?;
        match self.resolve_pointer(tree, pointer) {
            Resolution::NotArrived => None,
            Resolution::Exhausted => {
                // Silent saved piece: the next audible unit may still stream in.
                debug!(piece_id = pointer.piece_id, "Saved position has no audio yet");
                None
            }
            Resolution::Unit(unit) => {
                self.pending_resume = None;
                info!(piece_id = pointer.piece_id, sequence = unit.sequence, "Resuming saved position");
                match self.start_revealed(unit, true, effects) {
                    ResumeOutcome::Started(unit) => Some(unit),
                    _ => None,
                }
            }
        }
    }

    /// No more content will stream in; a resume target still waiting is
    /// dropped and later resume requests no longer wait.
    pub fn on_content_complete(&mut self) -> Option<ResumePointer> {
        self.content_complete = true;
        let dropped = self.pending_resume.take();
        if let Some(pointer) = dropped {
            info!(piece_id = pointer.piece_id, "Saved position never became playable");
        }
        dropped
    }

    /// Plays the unit after the active one, or the first unit when idle.
    pub fn seek_next(&mut self, tree: &ContentTree, effects: &mut Vec<PlaybackEffect>) {
        let current = self.active_unit().map(|unit| unit.node);
        if let Some(next) = next_playable(tree, current) {
            self.seek_to(next, effects);
        }
    }

    pub fn seek_previous(&mut self, tree: &ContentTree, effects: &mut Vec<PlaybackEffect>) {
        let Some(previous) = self
            .active_unit()
            .and_then(|unit| previous_playable(tree, unit))
        else {
            return;
        };
        self.seek_to(previous, effects);
    }

    /// Stops audio and forgets the pending resume target.
    pub fn shutdown(&mut self, effects: &mut Vec<PlaybackEffect>) {
        self.pending_resume = None;
        self.halt(effects);
    }

    fn seek_to(&mut self, unit: PlayableUnit, effects: &mut Vec<PlaybackEffect>) {
        self.pending_resume = None;
        let node = unit.node;
        self.halt(effects);
        if self.start(unit, effects) == Start::Playing && self.auto_scroll {
            effects.push(PlaybackEffect::RevealIfHidden(node));
        }
    }

    fn start_revealed(
        &mut self,
        unit: PlayableUnit,
        reveal: bool,
        effects: &mut Vec<PlaybackEffect>,
    ) -> ResumeOutcome {
        let node = unit.node;
        let started = unit.clone();
        match self.start(unit, effects) {
            Start::Playing => {
                if reveal {
                    effects.push(PlaybackEffect::Reveal(node));
                }
                ResumeOutcome::Started(started)
            }
            Start::Toggled => ResumeOutcome::Stopped,
            Start::Failed => ResumeOutcome::NothingToPlay,
        }
    }

    fn resolve_pointer(&self, tree: &ContentTree, pointer: ResumePointer) -> Resolution {
        let Some(node) = tree.node_for_piece(pointer.piece_id) else {
            return Resolution::NotArrived;
        };
        match tree.playable(node).or_else(|| next_playable(tree, Some(node))) {
            Some(unit) => Resolution::Unit(unit),
            None => Resolution::Exhausted,
        }
    }

    fn start(&mut self, unit: PlayableUnit, effects: &mut Vec<PlaybackEffect>) -> Start {
        if let PlaybackState::Active {
            unit: active,
            paused: false,
        } = &self.state
        {
            if active.node == unit.node {
                info!(sequence = unit.sequence, "Playing unit clicked again; stopping");
                self.halt(effects);
                return Start::Toggled;
            }
        }

        self.halt(effects);
        self.clips_issued += 1;
        let clip = ClipToken(self.clips_issued);

        if let Err(err) = self.audio.load(clip, &unit.audio_hash) {
            warn!(sequence = unit.sequence, "Failed to load clip: {err}");
            effects.push(PlaybackEffect::Failed {
                node: unit.node,
                message: err.to_string(),
            });
            return Start::Failed;
        }

        let pointer = ResumePointer {
            piece_id: unit.piece_id,
            sequence: unit.sequence,
        };
        if let Err(err) = self.prefs.save_resume_pointer(self.work, pointer) {
            warn!(work = %self.work, "Failed to persist resume pointer: {err}");
        }

        if let Err(err) = self.audio.play() {
            warn!(sequence = unit.sequence, "Failed to start clip: {err}");
            self.audio.stop();
            effects.push(PlaybackEffect::Failed {
                node: unit.node,
                message: err.to_string(),
            });
            return Start::Failed;
        }

        info!(
            sequence = unit.sequence,
            piece_id = unit.piece_id,
            hash = %unit.audio_hash,
            "Playing unit"
        );
        self.clip = Some(clip);
        effects.push(PlaybackEffect::MarkPlaying(unit.node));
        self.state = PlaybackState::Active {
            unit,
            paused: false,
        };
        Start::Playing
    }

    /// Stops the active clip, if any, and returns the unit it belonged to.
    fn halt(&mut self, effects: &mut Vec<PlaybackEffect>) -> Option<PlayableUnit> {
        self.clip = None;
        match std::mem::take(&mut self.state) {
            PlaybackState::Active { unit, .. } => {
                self.audio.stop();
                effects.push(PlaybackEffect::ClearPlaying(unit.node));
                Some(unit)
            }
            PlaybackState::Idle => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Start {
    Playing,
    Toggled,
    Failed,
}

enum Resolution {
    Unit(PlayableUnit),
    NotArrived,
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioEvent;
    use crate::model::AudioHash;
    use crate::prefs::MemoryStore;
    use crate::testing::{AudioCall, BrokenStore, FakeOutput, assert_single_playing_mark};
    use crate::tree::tests::{fragment, piece, two_fragment_tree};

    const WORK: WorkId = WorkId(9);

    fn controller() -> PlaybackController<FakeOutput, MemoryStore> {
        PlaybackController::new(WORK, FakeOutput::default(), Preferences::new(MemoryStore::new()))
    }

    fn finish_active<S: PreferenceStore>(
        controller: &mut PlaybackController<FakeOutput, S>,
        tree: &ContentTree,
        effects: &mut Vec<PlaybackEffect>,
    ) {
        let clip = controller.audio().last_clip().unwrap();
        controller.on_audio_event(AudioEvent::Finished(clip), tree, effects);
    }

    #[test]
    fn play_persists_pointer_before_completion() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let unit = tree.unit_by_sequence(1).unwrap();

        controller.play(unit.clone(), &mut effects);

        assert!(controller.is_playing());
        assert_eq!(controller.active_unit(), Some(&unit));
        assert_eq!(
            controller.preferences().resume_pointer(WORK),
            Some(ResumePointer { piece_id: 11, sequence: 1 })
        );
        assert_eq!(effects, vec![PlaybackEffect::MarkPlaying(unit.node)]);
        assert_eq!(controller.audio().loaded_hashes(), vec!["h1"]);
    }

    #[test]
    fn playing_the_same_unit_twice_toggles_to_idle() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let unit = tree.unit_by_sequence(0).unwrap();

        controller.play(unit.clone(), &mut effects);
        controller.play(unit.clone(), &mut effects);

        assert_eq!(controller.state(), &PlaybackState::Idle);
        assert_eq!(controller.audio().calls.last(), Some(&AudioCall::Stop));
        assert!(assert_single_playing_mark(&effects).is_empty());
    }

    #[test]
    fn playing_a_paused_unit_again_restarts_it() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let unit = tree.unit_by_sequence(0).unwrap();

        controller.play(unit.clone(), &mut effects);
        controller.pause();
        controller.play(unit.clone(), &mut effects);

        assert!(controller.is_playing());
        assert_eq!(controller.audio().loaded_hashes(), vec!["h0", "h0"]);
    }

    #[test]
    fn switching_units_stops_previous_first() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let first = tree.unit_by_sequence(0).unwrap();
        let second = tree.unit_by_sequence(2).unwrap();

        controller.play(first.clone(), &mut effects);
        controller.play(second.clone(), &mut effects);

        assert_eq!(
            effects,
            vec![
                PlaybackEffect::MarkPlaying(first.node),
                PlaybackEffect::ClearPlaying(first.node),
                PlaybackEffect::MarkPlaying(second.node),
            ]
        );
        let calls = &controller.audio().calls;
        let stop_at = calls.iter().position(|c| *c == AudioCall::Stop).unwrap();
        let second_load = calls
            .iter()
            .rposition(|c| matches!(c, AudioCall::Load(..)))
            .unwrap();
        assert!(stop_at < second_load);
        assert_eq!(assert_single_playing_mark(&effects).len(), 1);
    }

    #[test]
    fn completion_auto_advances_and_moves_resume_pointer() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();

        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);
        finish_active(&mut controller, &tree, &mut effects);

        let active = controller.active_unit().unwrap().clone();
        assert_eq!(active.sequence, 1);
        assert_eq!(
            controller.preferences().resume_pointer(WORK),
            Some(ResumePointer { piece_id: 11, sequence: 1 })
        );
        assert!(!effects.iter().any(|e| matches!(e, PlaybackEffect::RevealIfHidden(_))));
        assert_single_playing_mark(&effects);
    }

    #[test]
    fn completion_reveals_next_unit_when_auto_scroll_enabled() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        controller.toggle_auto_scroll();

        controller.play(tree.unit_by_sequence(1).unwrap(), &mut effects);
        finish_active(&mut controller, &tree, &mut effects);

        let next = tree.unit_by_sequence(2).unwrap();
        assert_eq!(effects.last(), Some(&PlaybackEffect::RevealIfHidden(next.node)));
    }

    #[test]
    fn completion_of_last_unit_goes_idle() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let last = tree.unit_by_sequence(2).unwrap();

        controller.play(last.clone(), &mut effects);
        finish_active(&mut controller, &tree, &mut effects);

        assert_eq!(controller.state(), &PlaybackState::Idle);
        assert_eq!(effects.last(), Some(&PlaybackEffect::ClearPlaying(last.node)));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();

        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);
        let stale = controller.audio().last_clip().unwrap();
        controller.play(tree.unit_by_sequence(2).unwrap(), &mut effects);
        controller.on_audio_event(AudioEvent::Finished(stale), &tree, &mut effects);

        assert_eq!(controller.active_unit().unwrap().sequence, 2);

        controller.stop(&mut effects);
        let stopped = controller.audio().last_clip().unwrap();
        controller.on_audio_event(AudioEvent::Finished(stopped), &tree, &mut effects);
        assert_eq!(controller.state(), &PlaybackState::Idle);
    }

    #[test]
    fn pause_and_resume_keep_unit_and_pointer() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let unit = tree.unit_by_sequence(1).unwrap();
        controller.play(unit.clone(), &mut effects);
        let pointer = controller.preferences().resume_pointer(WORK);

        controller.toggle_pause();
        assert!(controller.is_paused());
        assert_eq!(controller.active_unit(), Some(&unit));
        controller.toggle_pause();
        assert!(controller.is_playing());

        assert_eq!(controller.preferences().resume_pointer(WORK), pointer);
        assert_eq!(
            &controller.audio().calls[2..],
            &[AudioCall::Pause, AudioCall::Resume]
        );
    }

    #[test]
    fn load_failure_returns_to_idle_without_persisting() {
        let tree = two_fragment_tree();
        let output = FakeOutput {
            fail_loads_of: Some(AudioHash::new("h1")),
            ..FakeOutput::default()
        };
        let mut controller =
            PlaybackController::new(WORK, output, Preferences::new(MemoryStore::new()));
        let mut effects = Vec::new();

        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);
        finish_active(&mut controller, &tree, &mut effects);

        assert_eq!(controller.state(), &PlaybackState::Idle);
        assert!(matches!(effects.last(), Some(PlaybackEffect::Failed { .. })));
        assert_eq!(
            controller.preferences().resume_pointer(WORK),
            Some(ResumePointer { piece_id: 10, sequence: 0 })
        );
        assert!(assert_single_playing_mark(&effects).is_empty());
    }

    #[test]
    fn playback_failure_event_returns_to_idle() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        let unit = tree.unit_by_sequence(0).unwrap();
        controller.play(unit.clone(), &mut effects);

        let clip = controller.audio().last_clip().unwrap();
        controller.on_audio_event(
            AudioEvent::Failed {
                clip,
                reason: "decode error".to_string(),
            },
            &tree,
            &mut effects,
        );

        assert_eq!(controller.state(), &PlaybackState::Idle);
        assert_eq!(
            effects.last(),
            Some(&PlaybackEffect::Failed {
                node: unit.node,
                message: "decode error".to_string()
            })
        );
    }

    #[test]
    fn preference_write_failure_does_not_interrupt_playback() {
        let tree = two_fragment_tree();
        let mut controller =
            PlaybackController::new(WORK, FakeOutput::default(), Preferences::new(BrokenStore));
        let mut effects = Vec::new();

        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);
        assert!(controller.is_playing());
        assert!(controller.toggle_auto_scroll());
    }

    #[test]
    fn resume_without_pointer_plays_first_unit() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();

        let outcome = controller.resume_from_saved(&tree, &mut effects);

        let first = tree.unit_by_sequence(0).unwrap();
        assert_eq!(outcome, ResumeOutcome::Started(first.clone()));
        assert_eq!(controller.active_unit(), Some(&first));
    }

    #[test]
    fn resume_on_empty_tree_has_nothing_to_play() {
        let tree = ContentTree::new();
        let mut controller = controller();
        let mut effects = Vec::new();

        assert_eq!(
            controller.resume_from_saved(&tree, &mut effects),
            ResumeOutcome::NothingToPlay
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn resume_plays_saved_unit_and_reveals_it() {
        let tree = two_fragment_tree();
        let mut store = MemoryStore::new();
        store
            .set(
                crate::prefs::PrefKey::ResumePosition(WORK),
                r#"{"piece_id":20,"sequence":2}"#.to_string(),
            )
            .unwrap();
        let mut controller =
            PlaybackController::new(WORK, FakeOutput::default(), Preferences::new(store));
        let mut effects = Vec::new();

        let outcome = controller.resume_from_saved(&tree, &mut effects);

        let saved = tree.unit_by_sequence(2).unwrap();
        assert_eq!(outcome, ResumeOutcome::Started(saved.clone()));
        assert_eq!(effects.last(), Some(&PlaybackEffect::Reveal(saved.node)));
    }

    #[test]
    fn pending_resume_fires_exactly_once_when_piece_arrives() {
        let mut tree = two_fragment_tree();
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs
            .save_resume_pointer(WORK, ResumePointer { piece_id: 41, sequence: 5 })
            .unwrap();
        let mut controller = PlaybackController::new(WORK, FakeOutput::default(), prefs);
        let mut effects = Vec::new();

        let outcome = controller.resume_from_saved(&tree, &mut effects);
        assert!(matches!(outcome, ResumeOutcome::Pending(_)));
        assert!(controller.audio().calls.is_empty());

        tree.append_fragment(&fragment(3, vec![piece(30, Some("h3"))]));
        assert!(controller.on_tree_grew(&tree, &mut effects).is_none());
        assert!(controller.pending_resume().is_some());

        tree.append_fragment(&fragment(4, vec![piece(40, Some("h4")), piece(41, Some("h5"))]));
        let started = controller.on_tree_grew(&tree, &mut effects).unwrap();
        assert_eq!(started.piece_id, 41);
        assert!(controller.pending_resume().is_none());

        tree.append_fragment(&fragment(5, vec![piece(50, Some("h6"))]));
        assert!(controller.on_tree_grew(&tree, &mut effects).is_none());
        assert_eq!(controller.audio().loaded_hashes(), vec!["h5"]);
    }

    #[test]
    fn explicit_play_cancels_pending_resume() {
        let tree = two_fragment_tree();
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs
            .save_resume_pointer(WORK, ResumePointer { piece_id: 99, sequence: 9 })
            .unwrap();
        let mut controller = PlaybackController::new(WORK, FakeOutput::default(), prefs);
        let mut effects = Vec::new();

        controller.resume_from_saved(&tree, &mut effects);
        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);
        assert!(controller.pending_resume().is_none());
    }

    #[test]
    fn seek_moves_between_neighbours() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();

        controller.seek_next(&tree, &mut effects);
        assert_eq!(controller.active_unit().unwrap().sequence, 0);
        controller.seek_next(&tree, &mut effects);
        controller.seek_next(&tree, &mut effects);
        assert_eq!(controller.active_unit().unwrap().sequence, 2);
        controller.seek_next(&tree, &mut effects);
        assert_eq!(controller.active_unit().unwrap().sequence, 2);

        controller.seek_previous(&tree, &mut effects);
        assert_eq!(controller.active_unit().unwrap().sequence, 1);
        assert_single_playing_mark(&effects);
    }

    #[test]
    fn shutdown_stops_audio_and_clears_pending() {
        let tree = two_fragment_tree();
        let mut controller = controller();
        let mut effects = Vec::new();
        controller.play(tree.unit_by_sequence(0).unwrap(), &mut effects);

        controller.shutdown(&mut effects);

        assert_eq!(controller.state(), &PlaybackState::Idle);
        assert!(controller.pending_resume().is_none());
        assert_eq!(controller.audio().calls.last(), Some(&AudioCall::Stop));
    }

    fn controller_with_pointer(pointer: ResumePointer) -> PlaybackController<FakeOutput, MemoryStore> {
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs.save_resume_pointer(WORK, pointer).unwrap();
        PlaybackController::new(WORK, FakeOutput::default(), prefs)
    }

    #[test]
    fn silent_saved_piece_waits_for_next_unit_to_stream_in() {
        let mut tree = two_fragment_tree();
        let mut controller = controller_with_pointer(ResumePointer { piece_id: 30, sequence: 3 });
        let mut effects = Vec::new();

        assert!(matches!(
            controller.resume_from_saved(&tree, &mut effects),
            ResumeOutcome::Pending(_)
        ));

        tree.append_fragment(&fragment(3, vec![piece(30, None)]));
        assert!(controller.on_tree_grew(&tree, &mut effects).is_none());
        assert!(controller.pending_resume().is_some());

        tree.append_fragment(&fragment(4, vec![piece(40, Some("h4"))]));
        let started = controller.on_tree_grew(&tree, &mut effects).unwrap();
        assert_eq!(started.piece_id, 40);
        assert!(controller.pending_resume().is_none());
        assert_eq!(effects.last(), Some(&PlaybackEffect::Reveal(started.node)));
    }

    #[test]
    fn silent_saved_piece_waits_when_resumed_mid_stream() {
        let mut tree = two_fragment_tree();
        tree.append_fragment(&fragment(3, vec![piece(30, None)]));
        let mut controller = controller_with_pointer(ResumePointer { piece_id: 30, sequence: 3 });
        let mut effects = Vec::new();

        assert!(matches!(
            controller.resume_from_saved(&tree, &mut effects),
            ResumeOutcome::Pending(_)
        ));

        tree.append_fragment(&fragment(4, vec![piece(40, Some("h4"))]));
        assert_eq!(controller.on_tree_grew(&tree, &mut effects).unwrap().piece_id, 40);
    }

    #[test]
    fn content_complete_drops_waiting_resume_target() {
        let mut tree = two_fragment_tree();
        let mut controller = controller_with_pointer(ResumePointer { piece_id: 30, sequence: 3 });
        let mut effects = Vec::new();
        controller.resume_from_saved(&tree, &mut effects);
        tree.append_fragment(&fragment(3, vec![piece(30, None)]));
        controller.on_tree_grew(&tree, &mut effects);

        assert_eq!(controller.on_content_complete().map(|p| p.piece_id), Some(30));
        assert!(controller.pending_resume().is_none());
        assert_eq!(
            controller.resume_from_saved(&tree, &mut effects),
            ResumeOutcome::NothingToPlay
        );
        assert!(controller.audio().calls.is_empty());
    }
}
