use std::fmt;

/// Opaque handle for stable node identity within a [`DomTree`](crate::DomTree).
///
/// Keys are allocated monotonically and never reused, so a key held by an
/// external side table stays unambiguous even after the node is detached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

impl NodeKey {
    /// Reserved sentinel for "unassigned/invalid" identity.
    ///
    /// Never allocated by a tree and never valid as an operation target.
    pub const INVALID: NodeKey = NodeKey(0);

    /// Returns `true` if this key is not the invalid sentinel.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// A single DOM node's content.
///
/// Attribute order and duplicates are preserved; consumers must not dedupe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomNode {
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
    },
    Text {
        text: String,
    },
}

/// Raw, per-operation mutation record.
///
/// Records are ephemeral: they are pushed while an observer is active and
/// consumed in arrival order by a single drain. Classification into
/// coarse-grained mutations happens downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawMutation {
    /// A text node's data changed.
    CharacterData { target: NodeKey },
    /// Children were added to and/or removed from `target`.
    ChildList {
        target: NodeKey,
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
    },
    /// An attribute on an element changed (set or removed).
    Attribute { target: NodeKey, name: String },
}

/// Error for misuse of the arena API.
///
/// These signal caller bugs (unknown key, wrong node kind, structural
/// violation), not recoverable conditions of the document itself.
#[derive(Debug, PartialEq, Eq)]
pub enum DomError {
    UnknownKey(NodeKey),
    NotAnElement(NodeKey),
    NotAText(NodeKey),
    AlreadyAttached(NodeKey),
    NotAttached(NodeKey),
    MissingSibling(NodeKey),
    WouldCycle(NodeKey),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnknownKey(k) => write!(f, "unknown node key {}", k.0),
            DomError::NotAnElement(k) => write!(f, "node {} is not an element", k.0),
            DomError::NotAText(k) => write!(f, "node {} is not a text node", k.0),
            DomError::AlreadyAttached(k) => write!(f, "node {} already has a parent", k.0),
            DomError::NotAttached(k) => write!(f, "node {} has no parent", k.0),
            DomError::MissingSibling(k) => write!(f, "reference node {} not found in parent", k.0),
            DomError::WouldCycle(k) => write!(f, "inserting node {} would create a cycle", k.0),
        }
    }
}

impl std::error::Error for DomError {}
