//! DOM node arena with mutation recording.
//!
//! Contract:
//! - Nodes are identified by non-zero [`NodeKey`]s; keys are never reused.
//! - Mutating operations record a [`RawMutation`] when an observer is active
//!   and the target is reachable from the observed root at mutation time.
//! - Records are drained explicitly by [`DomTree::take_records`]; nothing is
//!   delivered implicitly.
//! - Detached nodes stay in the arena and remain readable; `is_connected`
//!   answers reachability separately.
//! - The record queue is bounded; overflow is reported on the drained batch
//!   so the consumer can degrade to its conservative path instead of acting
//!   on a truncated history.

use crate::selection::DomSelection;
use crate::types::{DomError, DomNode, NodeKey, RawMutation};
use std::collections::HashMap;

/// Pending records beyond this count stop being stored and flag the batch.
const MAX_PENDING_RECORDS: usize = 4096;

struct NodeEntry {
    node: DomNode,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

struct Observer {
    root: NodeKey,
    queue: Vec<RawMutation>,
    overflowed: bool,
}

/// One drained batch of raw mutation records.
#[derive(Debug, Default)]
pub struct RecordBatch {
    pub records: Vec<RawMutation>,
    /// `true` if the queue overflowed while collecting this batch; the
    /// records are then incomplete and must not be trusted.
    pub overflowed: bool,
}

/// Arena of DOM nodes with parent/children links, an optional observer, and
/// the document's native selection.
#[derive(Default)]
pub struct DomTree {
    nodes: HashMap<NodeKey, NodeEntry>,
    next_key: u32,
    observer: Option<Observer>,
    selection: Option<DomSelection>,
}

impl DomTree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_key: 0,
            observer: None,
            selection: None,
        }
    }

    fn alloc(&mut self, node: DomNode) -> NodeKey {
        self.next_key += 1;
        let key = NodeKey(self.next_key);
        self.nodes.insert(
            key,
            NodeEntry {
                node,
                parent: None,
                children: Vec::new(),
            },
        );
        key
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, name: &str) -> NodeKey {
        self.alloc(DomNode::Element {
            name: name.to_string(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.alloc(DomNode::Text {
            text: text.to_string(),
        })
    }

    // ---- read side ----

    pub fn contains_key(&self, node: NodeKey) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn is_element(&self, node: NodeKey) -> bool {
        matches!(
            self.nodes.get(&node),
            Some(NodeEntry {
                node: DomNode::Element { .. },
                ..
            })
        )
    }

    pub fn is_text(&self, node: NodeKey) -> bool {
        matches!(
            self.nodes.get(&node),
            Some(NodeEntry {
                node: DomNode::Text { .. },
                ..
            })
        )
    }

    /// Element tag name, or `None` for text/unknown nodes.
    pub fn tag_name(&self, node: NodeKey) -> Option<&str> {
        match self.nodes.get(&node) {
            Some(NodeEntry {
                node: DomNode::Element { name, .. },
                ..
            }) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Text node data, or `None` for elements/unknown nodes.
    pub fn text(&self, node: NodeKey) -> Option<&str> {
        match self.nodes.get(&node) {
            Some(NodeEntry {
                node: DomNode::Text { text },
                ..
            }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// First value of the named attribute, or `None` if absent/valueless.
    pub fn attribute(&self, node: NodeKey, name: &str) -> Option<&str> {
        match self.nodes.get(&node) {
            Some(NodeEntry {
                node: DomNode::Element { attributes, .. },
                ..
            }) => attributes
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.as_deref()),
            _ => None,
        }
    }

    /// Returns `true` if the named attribute is present (with or without a value).
    pub fn has_attribute(&self, node: NodeKey, name: &str) -> bool {
        match self.nodes.get(&node) {
            Some(NodeEntry {
                node: DomNode::Element { attributes, .. },
                ..
            }) => attributes.iter().any(|(k, _)| k == name),
            _ => false,
        }
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&node).and_then(|e| e.parent)
    }

    /// Child keys in order; empty for text/unknown nodes.
    pub fn children(&self, node: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&node)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_at(&self, parent: NodeKey, index: usize) -> Option<NodeKey> {
        self.children(parent).get(index).copied()
    }

    pub fn previous_sibling(&self, node: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&k| k == node)?;
        pos.checked_sub(1).map(|i| siblings[i])
    }

    pub fn next_sibling(&self, node: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&k| k == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Returns `true` if `node` is `ancestor` or lies in its subtree.
    pub fn contains(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.parent(key);
        }
        false
    }

    /// Walk from `node` up through its ancestors, returning the first node
    /// for which `pred` holds (including `node` itself).
    pub fn closest(&self, node: NodeKey, pred: impl Fn(&DomTree, NodeKey) -> bool) -> Option<NodeKey> {
        let mut current = Some(node);
        while let Some(key) = current {
            if pred(self, key) {
                return Some(key);
            }
            current = self.parent(key);
        }
        None
    }

    /// Returns `true` if `node` is reachable from the currently observed
    /// root, or from `root` when given explicitly.
    pub fn is_connected(&self, root: NodeKey, node: NodeKey) -> bool {
        self.contains(root, node)
    }

    // ---- mutation side ----

    /// Append `child` to the end of `parent`'s child list.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.attach(parent, child, None)
    }

    /// Insert `child` into `parent` before the existing child `before`.
    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: NodeKey,
    ) -> Result<(), DomError> {
        self.attach(parent, child, Some(before))
    }

    fn attach(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: Option<NodeKey>,
    ) -> Result<(), DomError> {
        if !self.nodes.contains_key(&parent) {
            return Err(DomError::UnknownKey(parent));
        }
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        let Some(child_entry) = self.nodes.get(&child) else {
            return Err(DomError::UnknownKey(child));
        };
        if child_entry.parent.is_some() {
            return Err(DomError::AlreadyAttached(child));
        }
        if self.contains(child, parent) {
            return Err(DomError::WouldCycle(child));
        }
        let position = match before {
            Some(reference) => {
                let pos = self
                    .children(parent)
                    .iter()
                    .position(|&k| k == reference)
                    .ok_or(DomError::MissingSibling(reference))?;
                Some(pos)
            }
            None => None,
        };
        let parent_entry = self.nodes.get_mut(&parent).expect("parent checked above");
        match position {
            Some(pos) => parent_entry.children.insert(pos, child),
            None => parent_entry.children.push(child),
        }
        self.nodes.get_mut(&child).expect("child checked above").parent = Some(parent);
        self.record(
            parent,
            RawMutation::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            },
        );
        Ok(())
    }

    /// Detach `child` from its parent. The node stays in the arena.
    pub fn remove_child(&mut self, child: NodeKey) -> Result<(), DomError> {
        if !self.nodes.contains_key(&child) {
            return Err(DomError::UnknownKey(child));
        }
        let Some(parent) = self.parent(child) else {
            return Err(DomError::NotAttached(child));
        };
        // Record first: reachability of the parent is judged before detach,
        // matching observer semantics for removals.
        self.record(
            parent,
            RawMutation::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![child],
            },
        );
        if let Some(parent_entry) = self.nodes.get_mut(&parent) {
            parent_entry.children.retain(|&k| k != child);
        }
        if let Some(child_entry) = self.nodes.get_mut(&child) {
            child_entry.parent = None;
        }
        Ok(())
    }

    /// Replace a text node's data.
    pub fn set_text(&mut self, node: NodeKey, new_text: &str) -> Result<(), DomError> {
        match self.nodes.get_mut(&node) {
            Some(NodeEntry {
                node: DomNode::Text { text },
                ..
            }) => {
                *text = new_text.to_string();
                self.record(node, RawMutation::CharacterData { target: node });
                Ok(())
            }
            Some(_) => Err(DomError::NotAText(node)),
            None => Err(DomError::UnknownKey(node)),
        }
    }

    /// Set (or with `None`, make valueless) an attribute on an element.
    pub fn set_attribute(
        &mut self,
        node: NodeKey,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), DomError> {
        match self.nodes.get_mut(&node) {
            Some(NodeEntry {
                node: DomNode::Element { attributes, .. },
                ..
            }) => {
                match attributes.iter_mut().find(|(k, _)| k == name) {
                    Some(slot) => slot.1 = value.map(str::to_string),
                    None => attributes.push((name.to_string(), value.map(str::to_string))),
                }
                self.record(
                    node,
                    RawMutation::Attribute {
                        target: node,
                        name: name.to_string(),
                    },
                );
                Ok(())
            }
            Some(_) => Err(DomError::NotAnElement(node)),
            None => Err(DomError::UnknownKey(node)),
        }
    }

    /// Browser-style normalize step for two adjacent text siblings: append
    /// `removed`'s data to `kept`, then detach `removed`.
    ///
    /// Emits the records a real normalize pass would (a characterData change
    /// on the kept node, then a childList removal on the parent), so
    /// observation stays truthful for writer-driven merges.
    pub fn merge_text(&mut self, kept: NodeKey, removed: NodeKey) -> Result<(), DomError> {
        if !self.is_text(kept) {
            return Err(DomError::NotAText(kept));
        }
        if !self.is_text(removed) {
            return Err(DomError::NotAText(removed));
        }
        if self.next_sibling(kept) != Some(removed) {
            return Err(DomError::MissingSibling(removed));
        }
        let tail = self.text(removed).unwrap_or_default().to_string();
        let mut combined = self.text(kept).unwrap_or_default().to_string();
        combined.push_str(&tail);
        self.set_text(kept, &combined)?;
        self.remove_child(removed)?;
        Ok(())
    }

    // ---- observer ----

    /// Begin recording mutations under `root`. Idempotent; switching roots
    /// drops any pending records for the previous root.
    pub fn start_observing(&mut self, root: NodeKey) {
        match &self.observer {
            Some(observer) if observer.root == root => {}
            _ => {
                log::trace!(target: "live_dom.observer", "start observing root {}", root.0);
                self.observer = Some(Observer {
                    root,
                    queue: Vec::new(),
                    overflowed: false,
                });
            }
        }
    }

    /// Stop recording. Idempotent; pending records are dropped.
    pub fn stop_observing(&mut self) {
        if self.observer.take().is_some() {
            log::trace!(target: "live_dom.observer", "stop observing");
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observer.is_some()
    }

    /// Root currently observed, if any.
    pub fn observed_root(&self) -> Option<NodeKey> {
        self.observer.as_ref().map(|o| o.root)
    }

    /// Drain all pending records in arrival order.
    pub fn take_records(&mut self) -> RecordBatch {
        match self.observer.as_mut() {
            Some(observer) => {
                let batch = RecordBatch {
                    records: std::mem::take(&mut observer.queue),
                    overflowed: observer.overflowed,
                };
                observer.overflowed = false;
                batch
            }
            None => RecordBatch::default(),
        }
    }

    fn record(&mut self, target: NodeKey, mutation: RawMutation) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        let root = observer.root;
        if !self.contains(root, target) {
            return;
        }
        let observer = self.observer.as_mut().expect("observer checked above");
        if observer.queue.len() >= MAX_PENDING_RECORDS {
            observer.overflowed = true;
            return;
        }
        observer.queue.push(mutation);
    }

    // ---- native selection ----

    pub fn set_native_selection(&mut self, selection: Option<DomSelection>) {
        self.selection = selection;
    }

    pub fn native_selection(&self) -> Option<DomSelection> {
        self.selection.clone()
    }
}
