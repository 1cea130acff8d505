//! Hover highlight for audio-bearing nodes.
//!
//! This is presentation state only; the playback controller never reads it.

use crate::tree::{ContentTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverChange {
    Highlight(NodeId),
    Clear(NodeId),
}

#[derive(Debug, Default)]
pub struct HoverTracker {
    hovered: Option<NodeId>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    /// Moves the highlight to the audio-bearing node under the pointer.
    ///
    /// `target` is the node under the pointer, if any; the nearest node at or
    /// above it that carries audio is highlighted unless it is `active`.
    pub fn pointer_moved(
        &mut self,
        tree: &ContentTree,
        target: Option<NodeId>,
        active: Option<NodeId>,
    ) -> Vec<HoverChange> {
        let wanted = target
            .and_then(|node| audio_ancestor(tree, node))
            .filter(|node| Some(*node) != active);
        if wanted == self.hovered {
            return Vec::new();
        }

        let mut changes = Vec::with_capacity(2);
        if let Some(previous) = self.hovered.take() {
            changes.push(HoverChange::Clear(previous));
        }
        if let Some(node) = wanted {
            changes.push(HoverChange::Highlight(node));
        }
        self.hovered = wanted;
        changes
    }

    /// Drops the highlight from a node that just started playing.
    pub fn on_playing(&mut self, node: NodeId) -> Option<HoverChange> {
        if self.hovered == Some(node) {
            self.hovered = None;
            return Some(HoverChange::Clear(node));
        }
        None
    }

    pub fn clear(&mut self) -> Option<HoverChange> {
        self.hovered.take().map(HoverChange::Clear)
    }
}

fn audio_ancestor(tree: &ContentTree, node: NodeId) -> Option<NodeId> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        let entry = tree.node(current)?;
        if entry.audio_hash.is_some() {
            return Some(current);
        }
        cursor = entry.parent();
    }
    None
}
