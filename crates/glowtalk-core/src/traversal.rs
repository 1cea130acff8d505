//! Next-playable-unit search in document order.

use crate::tree::{ContentTree, NodeId, PlayableUnit};

/// The first PlayableUnit in the tree, if any has arrived yet.
pub fn first_playable(tree: &ContentTree) -> Option<PlayableUnit> {
    walk_from(tree, tree.root())
}

/// The PlayableUnit following `current` in document order.
///
/// `None` for `current` means start of document. The walk only sees nodes
/// present when it runs; fragments appended later are picked up by the next
/// call.
pub fn next_playable(tree: &ContentTree, current: Option<NodeId>) -> Option<PlayableUnit> {
    match current {
        None => first_playable(tree),
        Some(node) => {
            tree.node(node)?;
            walk_from(tree, node)
        }
    }
}

/// The PlayableUnit preceding `current` by sequence index.
pub fn previous_playable(tree: &ContentTree, current: &PlayableUnit) -> Option<PlayableUnit> {
    let sequence = current.sequence.checked_sub(1)?;
    tree.unit_by_sequence(sequence)
}

fn walk_from(tree: &ContentTree, start: NodeId) -> Option<PlayableUnit> {
    let mut cursor = successor(tree, start);
    while let Some(node) = cursor {
        if let Some(unit) = tree.playable(node) {
            return Some(unit);
        }
        cursor = successor(tree, node);
    }
    None
}

/// Pre-order successor: first child, else the nearest following sibling of
/// the node or of its closest ancestor that has one.
fn successor(tree: &ContentTree, node: NodeId) -> Option<NodeId> {
    let entry = tree.node(node)?;
    if let Some(child) = entry.first_child() {
        return Some(child);
    }
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        let entry = tree.node(current)?;
        if let Some(sibling) = entry.next_sibling() {
            return Some(sibling);
        }
        cursor = entry.parent();
    }
    None
}
