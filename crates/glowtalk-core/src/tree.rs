//! Append-only document tree built from feed fragments.
//!
//! Nodes live in an insertion-ordered arena and link to each other by index.
//! Every node that carries an audio hash gets the next sequence index from a
//! single tree-wide counter; indices are never reused or reassigned.

use crate::model::{AudioHash, ContentFragment, FragmentId, PieceId, SpeakerInfo};
use std::collections::HashMap;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Fragment {
        fragment_id: FragmentId,
        speaker: SpeakerInfo,
    },
    /// The announcement piece of a fragment; never shown as body text.
    Info {
        fragment_id: FragmentId,
        piece_id: PieceId,
    },
    Text {
        piece_id: PieceId,
        text: String,
        voiced: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub audio_hash: Option<AudioHash>,
    pub sequence: Option<usize>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, audio_hash: Option<AudioHash>, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            audio_hash,
            sequence: None,
            parent,
            first_child: None,
            last_child: None,
            next_sibling: None,
        }
    }

    pub fn piece_id(&self) -> Option<PieceId> {
        match &self.kind {
            NodeKind::Info { piece_id, .. } | NodeKind::Text { piece_id, .. } => Some(*piece_id),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }
}

/// A piece with audio, addressable for playback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayableUnit {
    pub node: NodeId,
    pub piece_id: PieceId,
    pub sequence: usize,
    pub audio_hash: AudioHash,
}

/// Result of appending one fragment.
#[derive(Debug, Clone)]
pub struct AppendedFragment {
    pub container: NodeId,
    pub units: Vec<PlayableUnit>,
}

#[derive(Debug, Clone)]
pub struct ContentTree {
    nodes: Vec<Node>,
    by_sequence: Vec<NodeId>,
    by_piece: HashMap<PieceId, NodeId>,
    fragment_count: usize,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root, None, None)],
            by_sequence: Vec::new(),
            by_piece: HashMap::new(),
            fragment_count: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragment_count == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    pub fn playable_count(&self) -> usize {
        self.by_sequence.len()
    }

    /// Appends `fragment` after everything already in the tree.
    pub fn append_fragment(&mut self, fragment: &ContentFragment) -> AppendedFragment {
        let root = self.root();
        let container = self.push_child(
            root,
            NodeKind::Fragment {
                fragment_id: fragment.id,
                speaker: fragment.speaker(),
            },
            None,
        );

        let mut units = Vec::new();
        if let Some(announcement) = fragment.announcement() {
            let info = self.push_child(
                container,
                NodeKind::Info {
                    fragment_id: fragment.id,
                    piece_id: announcement.id,
                },
                announcement.audio_hash().cloned(),
            );
            units.extend(self.register_piece(info, announcement.id));
        }
        for piece in fragment.body() {
            let text = self.push_child(
                container,
                NodeKind::Text {
                    piece_id: piece.id,
                    text: piece.text.clone(),
                    voiced: piece.is_voiced,
                },
                piece.audio_hash().cloned(),
            );
            units.extend(self.register_piece(text, piece.id));
        }

        self.fragment_count += 1;
        trace!(
            fragment_id = fragment.id,
            playable = units.len(),
            total_playable = self.by_sequence.len(),
            "Appended fragment"
        );
        AppendedFragment { container, units }
    }

    /// The PlayableUnit at `node`, if the node carries audio.
    pub fn playable(&self, node: NodeId) -> Option<PlayableUnit> {
        let entry = self.node(node)?;
        Some(PlayableUnit {
            node,
            piece_id: entry.piece_id()?,
            sequence: entry.sequence?,
            audio_hash: entry.audio_hash.clone()?,
        })
    }

    pub fn unit_by_sequence(&self, sequence: usize) -> Option<PlayableUnit> {
        self.by_sequence
            .get(sequence)
            .and_then(|node| self.playable(*node))
    }

    /// Looks up a piece that may not have streamed in yet.
    pub fn node_for_piece(&self, piece_id: PieceId) -> Option<NodeId> {
        self.by_piece.get(&piece_id).copied()
    }

    pub fn unit_for_piece(&self, piece_id: PieceId) -> Option<PlayableUnit> {
        self.node_for_piece(piece_id)
            .and_then(|node| self.playable(node))
    }

    /// Children of `parent` in document order.
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.node(parent).and_then(Node::first_child),
        }
    }

    fn push_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        audio_hash: Option<AudioHash>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, audio_hash, Some(parent)));
        match self.nodes[parent.0].last_child {
            Some(last) => self.nodes[last.0].next_sibling = Some(id),
            None => self.nodes[parent.0].first_child = Some(id),
        }
        self.nodes[parent.0].last_child = Some(id);
        id
    }

    fn register_piece(&mut self, node: NodeId, piece_id: PieceId) -> Option<PlayableUnit> {
        match self.by_piece.get(&piece_id).copied() {
            Some(existing) => warn!(
                piece_id,
                existing = existing.0,
                duplicate = node.0,
                "Duplicate piece id in feed; keeping first occurrence for lookups"
            ),
            None => {
                self.by_piece.insert(piece_id, node);
            }
        }

        if self.nodes[node.0].audio_hash.is_none() {
            return None;
        }
        let sequence = self.by_sequence.len();
        self.nodes[node.0].sequence = Some(sequence);
        self.by_sequence.push(node);
        self.playable(node)
    }
}

pub struct Children<'a> {
    tree: &'a ContentTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).and_then(Node::next_sibling);
        Some(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::ContentPiece;

    pub(crate) fn piece(id: PieceId, hash: Option<&str>) -> ContentPiece {
        ContentPiece {
            id,
            text: format!("piece {id}"),
            is_voiced: hash.is_some(),
            audio_file_hash: hash.map(AudioHash::new),
        }
    }

    pub(crate) fn fragment(id: FragmentId, pieces: Vec<ContentPiece>) -> ContentFragment {
        ContentFragment {
            id,
            character_name: Some(format!("speaker {id}")),
            screenname: None,
            author_name: None,
            icon_url: None,
            icon_title: None,
            content_pieces: pieces,
        }
    }

    /// Two fragments: announcements `h0`/`h2`, bodies `h1`/none.
    pub(crate) fn two_fragment_tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.append_fragment(&fragment(1, vec![piece(10, Some("h0")), piece(11, Some("h1"))]));
        tree.append_fragment(&fragment(2, vec![piece(20, Some("h2")), piece(21, None)]));
        tree
    }

    #[test]
    fn sequence_indices_follow_document_order_and_skip_silent_pieces() {
        let tree = two_fragment_tree();

        let hashes: Vec<_> = (0..tree.playable_count())
            .map(|seq| tree.unit_by_sequence(seq).unwrap().audio_hash)
            .collect();
        assert_eq!(
            hashes,
            vec![AudioHash::new("h0"), AudioHash::new("h1"), AudioHash::new("h2")]
        );
        let silent = tree.node_for_piece(21).unwrap();
        assert_eq!(tree.node(silent).unwrap().sequence, None);
        assert!(tree.playable(silent).is_none());
    }

    #[test]
    fn sequence_indices_are_contiguous_across_many_fragments() {
        let mut tree = ContentTree::new();
        let mut next_piece = 0;
        let mut seen = Vec::new();
        for fragment_id in 0..25 {
            let pieces = (0..=(fragment_id % 4))
                .map(|_| {
                    next_piece += 1;
                    piece(next_piece, Some("h"))
                })
                .collect();
            let appended = tree.append_fragment(&fragment(fragment_id, pieces));
            seen.extend(appended.units.iter().map(|unit| unit.sequence));
        }

        assert_eq!(seen, (0..tree.playable_count()).collect::<Vec<_>>());
        assert_eq!(tree.playable_count(), next_piece as usize);
    }

    #[test]
    fn container_holds_info_then_text_nodes() {
        let mut tree = ContentTree::new();
        let appended =
            tree.append_fragment(&fragment(5, vec![piece(50, Some("a")), piece(51, None), piece(52, Some("b"))]));

        let kinds: Vec<_> = tree
            .children(appended.container)
            .map(|id| tree.node(id).unwrap().kind.clone())
            .collect();
        assert!(matches!(kinds[0], NodeKind::Info { piece_id: 50, fragment_id: 5 }));
        assert!(matches!(kinds[1], NodeKind::Text { piece_id: 51, .. }));
        assert!(matches!(kinds[2], NodeKind::Text { piece_id: 52, .. }));
        assert_eq!(appended.units.len(), 2);
    }

    #[test]
    fn appending_does_not_touch_existing_nodes() {
        let mut tree = two_fragment_tree();
        let before = tree.unit_by_sequence(2).unwrap();
        tree.append_fragment(&fragment(3, vec![piece(30, Some("h3"))]));

        assert_eq!(tree.unit_by_sequence(2), Some(before));
        assert_eq!(tree.unit_by_sequence(3).unwrap().piece_id, 30);
        assert_eq!(tree.fragment_count(), 3);
    }

    #[test]
    fn duplicate_piece_id_keeps_first_lookup() {
        let mut tree = ContentTree::new();
        tree.append_fragment(&fragment(1, vec![piece(7, Some("a"))]));
        tree.append_fragment(&fragment(2, vec![piece(7, Some("b"))]));

        assert_eq!(tree.unit_for_piece(7).unwrap().sequence, 0);
        assert_eq!(tree.playable_count(), 2);
    }
}
