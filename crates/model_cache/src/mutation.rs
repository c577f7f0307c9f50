//! Mutation batch classification.
//!
//! Contract:
//! - One drained batch of raw records classifies to at most one `ChildList`,
//!   at most one `Text`, and any number of `ElementId` mutations, in that
//!   order.
//! - Records inside opaque subtrees (entity wrappers, block-entity
//!   containers) are ignored; repeated records on the same target reuse a
//!   per-flush ignore-set instead of re-walking ancestors.
//! - Any condition the classifier cannot represent collapses the whole
//!   batch to a single `Unknown` — the always-safe fallback.

use live_dom::{DomTree, NodeKey, RawMutation};
use std::collections::HashSet;

/// Attribute marking an element as an entity wrapper (opaque subtree).
pub const ENTITY_WRAPPER_ATTR: &str = "data-entity";

/// Attribute marking an element as a block-entity container.
pub const BLOCK_ENTITY_CONTAINER_ATTR: &str = "data-entity-container";

/// One coarse-grained, single-use classification of a record batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// All characterData activity hit this one text node.
    Text { node: NodeKey },
    /// All childList activity shared one parent; accumulated node lists.
    ChildList {
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
    },
    /// An `id` attribute changed on this element.
    ElementId { element: NodeKey },
    /// The batch could not be classified; the cache must be invalidated.
    Unknown,
}

/// Closest ancestor-or-self carrying the entity wrapper attribute, stopping
/// at (and excluding anything above) `root`.
pub fn find_closest_entity_wrapper(
    tree: &DomTree,
    node: NodeKey,
    root: NodeKey,
) -> Option<NodeKey> {
    closest_within(tree, node, root, ENTITY_WRAPPER_ATTR)
}

/// Closest ancestor-or-self carrying the block-entity container attribute.
pub fn find_closest_block_entity_container(
    tree: &DomTree,
    node: NodeKey,
    root: NodeKey,
) -> Option<NodeKey> {
    closest_within(tree, node, root, BLOCK_ENTITY_CONTAINER_ATTR)
}

fn closest_within(tree: &DomTree, node: NodeKey, root: NodeKey, attr: &str) -> Option<NodeKey> {
    let found = tree.closest(node, |t, key| key == root || t.has_attribute(key, attr))?;
    if found == root {
        None
    } else {
        Some(found)
    }
}

/// Wraps the observed subtree's lifetime and turns drained record batches
/// into classified [`Mutation`]s.
pub struct MutationObserverAdapter {
    root: NodeKey,
    observing: bool,
}

impl MutationObserverAdapter {
    pub fn new(root: NodeKey) -> Self {
        Self {
            root,
            observing: false,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Begin observing. Idempotent.
    pub fn start_observing(&mut self, tree: &mut DomTree) {
        if !self.observing {
            tree.start_observing(self.root);
            self.observing = true;
        }
    }

    /// Stop observing, dropping any pending records. Idempotent.
    pub fn stop_observing(&mut self, tree: &mut DomTree) {
        if self.observing {
            tree.stop_observing();
            self.observing = false;
        }
    }

    /// Swap the observed root, restarting observation against the new one.
    pub fn set_root(&mut self, tree: &mut DomTree, root: NodeKey) {
        self.root = root;
        if self.observing {
            tree.start_observing(root);
        }
    }

    /// Synchronously drain pending records.
    ///
    /// With `discard` set the records are dropped unclassified (used when
    /// the caller is about to replace the model wholesale).
    pub fn flush(&mut self, tree: &mut DomTree, discard: bool) -> Vec<Mutation> {
        let batch = tree.take_records();
        if discard {
            return Vec::new();
        }
        if batch.overflowed {
            log::debug!(target: "model_cache.mutation", "record queue overflowed; batch unclassifiable");
            return vec![Mutation::Unknown];
        }
        if batch.records.is_empty() {
            return Vec::new();
        }
        self.classify(tree, &batch.records)
    }

    fn classify(&self, tree: &DomTree, records: &[RawMutation]) -> Vec<Mutation> {
        let mut ignored: HashSet<NodeKey> = HashSet::new();
        let mut element_ids: Vec<NodeKey> = Vec::new();
        let mut text_target: Option<NodeKey> = None;
        let mut child_target: Option<NodeKey> = None;
        let mut added: Vec<NodeKey> = Vec::new();
        let mut removed: Vec<NodeKey> = Vec::new();

        for record in records {
            let target = match record {
                RawMutation::CharacterData { target } => *target,
                RawMutation::ChildList { target, .. } => *target,
                RawMutation::Attribute { target, .. } => *target,
            };
            if ignored.contains(&target) {
                continue;
            }
            if find_closest_entity_wrapper(tree, target, self.root).is_some()
                || find_closest_block_entity_container(tree, target, self.root).is_some()
            {
                ignored.insert(target);
                continue;
            }

            match record {
                RawMutation::Attribute { target, name } => {
                    // Only `id` flips are safe to patch; any other attribute
                    // change can invalidate unrelated cached format state.
                    if name == "id"
                        && tree.is_element(*target)
                        && tree.contains(self.root, *target)
                    {
                        if !element_ids.contains(target) {
                            element_ids.push(*target);
                        }
                    } else {
                        log::trace!(target: "model_cache.mutation", "unclassifiable attribute '{name}' on node {}", target.0);
                        return vec![Mutation::Unknown];
                    }
                }
                RawMutation::CharacterData { target } => match text_target {
                    None => text_target = Some(*target),
                    Some(existing) if existing == *target => {}
                    Some(_) => {
                        log::trace!(target: "model_cache.mutation", "characterData on multiple targets");
                        return vec![Mutation::Unknown];
                    }
                },
                RawMutation::ChildList {
                    target,
                    added: rec_added,
                    removed: rec_removed,
                } => {
                    match child_target {
                        None => child_target = Some(*target),
                        Some(existing) if existing == *target => {}
                        Some(_) => {
                            log::trace!(target: "model_cache.mutation", "childList on multiple targets");
                            return vec![Mutation::Unknown];
                        }
                    }
                    added.extend(rec_added.iter().copied());
                    removed.extend(rec_removed.iter().copied());
                }
            }
        }

        let mut mutations = Vec::new();
        if child_target.is_some() {
            // A node in both lists is NOT a no-op: a move within the parent
            // emits exactly that pair, and the model order must follow it.
            // Both lists pass through; the reconciler re-anchors the node.
            mutations.push(Mutation::ChildList { added, removed });
        }
        if let Some(node) = text_target {
            mutations.push(Mutation::Text { node });
        }
        for element in element_ids {
            mutations.push(Mutation::ElementId { element });
        }
        mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(tree: &mut DomTree) -> (NodeKey, NodeKey, NodeKey) {
        let root = tree.create_element("div");
        let para = tree.create_element("p");
        let text = tree.create_text("test");
        tree.append_child(root, para).unwrap();
        tree.append_child(para, text).unwrap();
        (root, para, text)
    }

    #[test]
    fn single_text_target_classifies_as_text() {
        let mut tree = DomTree::new();
        let (root, _para, text) = editor(&mut tree);
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_text(text, "te").unwrap();
        tree.set_text(text, "tes").unwrap();
        assert_eq!(
            adapter.flush(&mut tree, false),
            vec![Mutation::Text { node: text }]
        );
    }

    #[test]
    fn two_text_targets_collapse_to_unknown() {
        let mut tree = DomTree::new();
        let (root, para, text) = editor(&mut tree);
        let other = tree.create_text("other");
        tree.append_child(para, other).unwrap();
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_text(text, "a").unwrap();
        tree.set_text(other, "b").unwrap();
        assert_eq!(adapter.flush(&mut tree, false), vec![Mutation::Unknown]);
    }

    #[test]
    fn non_id_attribute_is_unknown() {
        let mut tree = DomTree::new();
        let (root, para, _text) = editor(&mut tree);
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_attribute(para, "style", Some("color: red")).unwrap();
        assert_eq!(adapter.flush(&mut tree, false), vec![Mutation::Unknown]);
    }

    #[test]
    fn id_attribute_classifies_as_element_id() {
        let mut tree = DomTree::new();
        let (root, para, _text) = editor(&mut tree);
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_attribute(para, "id", Some("p1")).unwrap();
        assert_eq!(
            adapter.flush(&mut tree, false),
            vec![Mutation::ElementId { element: para }]
        );
    }

    #[test]
    fn child_list_and_text_emit_in_order() {
        let mut tree = DomTree::new();
        let (root, para, text) = editor(&mut tree);
        let added = tree.create_text("new");
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_text(text, "typed").unwrap();
        tree.append_child(para, added).unwrap();
        assert_eq!(
            adapter.flush(&mut tree, false),
            vec![
                Mutation::ChildList {
                    added: vec![added],
                    removed: vec![],
                },
                Mutation::Text { node: text },
            ]
        );
    }

    #[test]
    fn child_list_on_two_parents_is_unknown() {
        let mut tree = DomTree::new();
        let (root, para, _text) = editor(&mut tree);
        let para2 = tree.create_element("p");
        tree.append_child(root, para2).unwrap();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.append_child(para, a).unwrap();
        tree.append_child(para2, b).unwrap();
        assert_eq!(adapter.flush(&mut tree, false), vec![Mutation::Unknown]);
    }

    #[test]
    fn mutations_inside_entity_wrapper_are_ignored() {
        let mut tree = DomTree::new();
        let (root, _para, _text) = editor(&mut tree);
        let wrapper = tree.create_element("span");
        tree.set_attribute(wrapper, ENTITY_WRAPPER_ATTR, Some("widget"))
            .unwrap();
        let inner = tree.create_text("opaque");
        tree.append_child(root, wrapper).unwrap();
        tree.append_child(wrapper, inner).unwrap();
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_text(inner, "changed").unwrap();
        tree.set_text(inner, "changed again").unwrap();
        assert_eq!(adapter.flush(&mut tree, false), Vec::<Mutation>::new());
    }

    #[test]
    fn discard_drops_records_without_classifying() {
        let mut tree = DomTree::new();
        let (root, _para, text) = editor(&mut tree);
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.set_text(text, "x").unwrap();
        assert_eq!(adapter.flush(&mut tree, true), Vec::<Mutation>::new());
        assert_eq!(adapter.flush(&mut tree, false), Vec::<Mutation>::new());
    }

    #[test]
    fn node_in_both_lists_passes_through() {
        // a move within the parent shows up as the same node removed and
        // re-added; both sides must survive classification
        let mut tree = DomTree::new();
        let (root, para, text) = editor(&mut tree);
        let mut adapter = MutationObserverAdapter::new(root);
        adapter.start_observing(&mut tree);
        tree.remove_child(text).unwrap();
        tree.append_child(para, text).unwrap();
        assert_eq!(
            adapter.flush(&mut tree, false),
            vec![Mutation::ChildList {
                added: vec![text],
                removed: vec![text],
            }]
        );
    }
}
