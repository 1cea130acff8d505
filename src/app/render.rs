//! Plain-text rendering of fragments, playback effects and snapshots.

use glowtalk_core::model::ContentFragment;
use glowtalk_core::playback::PlaybackEffect;
use glowtalk_core::session::{IngestState, PlaybackView};
use glowtalk_core::status::StatusChange;
use glowtalk_core::tree::{ContentTree, NodeId, NodeKind};
use glowtalk_core::{PlayerSnapshot, ViewUpdate};
use std::time::Duration;
use tracing::debug;

/// One block per fragment: speaker line, then body pieces with clip numbers.
pub(super) fn fragment(tree: &ContentTree, fragment: &ContentFragment) -> String {
    let speaker = fragment.speaker();
    let label = speaker.label().unwrap_or("(narration)");
    let announced = fragment
        .announcement()
        .and_then(|piece| tree.unit_for_piece(piece.id));
    let heading = match speaker.icon_title.as_deref() {
        Some(icon) => format!("-- {label} ({icon}) --"),
        None => format!("-- {label} --"),
    };
    let mut out = match announced {
        Some(unit) => format!("[{:>4}] {heading}", unit.sequence),
        None => format!("       {heading}"),
    };
    for piece in fragment.body() {
        out.push('\n');
        match tree.unit_for_piece(piece.id) {
            Some(unit) => out.push_str(&format!("[{:>4}] {}", unit.sequence, piece.text.trim())),
            None => out.push_str(&format!("       {}", piece.text.trim())),
        }
    }
    out
}

/// Lines to print for `update`; hover changes have no terminal form.
pub(super) fn update(tree: &ContentTree, update: &ViewUpdate) -> Vec<String> {
    let lines = update
        .effects
        .iter()
        .filter_map(|effect| effect_line(tree, effect))
        .collect();
    if !update.hover.is_empty() {
        debug!(changes = update.hover.len(), "Hover changes");
    }
    lines
}

fn effect_line(tree: &ContentTree, effect: &PlaybackEffect) -> Option<String> {
    match effect {
        PlaybackEffect::MarkPlaying(node) => Some(format!(">> playing {}", clip_label(tree, *node))),
        PlaybackEffect::ClearPlaying(_) => None,
        PlaybackEffect::Reveal(node) | PlaybackEffect::RevealIfHidden(node) => {
            Some(format!("   {}", node_text(tree, *node)))
        }
        PlaybackEffect::Failed { node, message } => {
            Some(format!("!! could not play {}: {message}", clip_label(tree, *node)))
        }
    }
}

fn clip_label(tree: &ContentTree, node: NodeId) -> String {
    match tree.playable(node) {
        Some(unit) => format!("#{}", unit.sequence),
        None => format!("node {}", node.index()),
    }
}

fn node_text(tree: &ContentTree, node: NodeId) -> String {
    let Some(entry) = tree.node(node) else {
        return String::new();
    };
    match &entry.kind {
        NodeKind::Text { text, .. } => text.trim().to_string(),
        NodeKind::Info { .. } => {
            let speaker = entry
                .parent()
                .and_then(|parent| tree.node(parent))
                .and_then(|container| match &container.kind {
                    NodeKind::Fragment { speaker, .. } => speaker.label().map(str::to_string),
                    _ => None,
                });
            format!("-- {} --", speaker.as_deref().unwrap_or("(narration)"))
        }
        NodeKind::Fragment { .. } | NodeKind::Root => String::new(),
    }
}

pub(super) fn snapshot(snapshot: &PlayerSnapshot) -> String {
    let state = match snapshot.state {
        PlaybackView::Idle => "idle",
        PlaybackView::Playing => "playing",
        PlaybackView::Paused => "paused",
    };
    let feed = match snapshot.ingest {
        IngestState::Streaming => "streaming",
        IngestState::Complete => "complete",
        IngestState::Failed => "failed",
        IngestState::Cancelled => "cancelled",
    };
    let position = match (snapshot.current_sequence, snapshot.total_units) {
        (Some(current), Some(total)) => format!("#{current} of {total}"),
        (Some(current), None) => format!("#{current}"),
        (None, _) => "-".to_string(),
    };
    let mut out = format!(
        "{state} at {position} ({}%) | auto-scroll {} | {} fragments, {} clips | feed {feed}",
        snapshot.progress_pct,
        if snapshot.auto_scroll { "on" } else { "off" },
        snapshot.fragments,
        snapshot.playable_units,
    );
    if let Some(piece) = snapshot.pending_resume {
        out.push_str(&format!(" | waiting for piece {piece}"));
    }
    if let Some(error) = &snapshot.ingest_error {
        out.push_str(&format!(" | {error}"));
    }
    out
}

pub(super) fn status(change: &StatusChange) -> String {
    let status = change.status;
    let mut out = format!(
        "generation: {} done, {} pending, {} running, {} failed",
        status.completed, status.pending, status.in_progress, status.failed
    );
    if let Some(eta) = change.eta {
        out.push_str(&format!(", about {} left", format_duration(eta)));
    }
    out
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, _) => format!("{h}h {m:02}m"),
    }
}
