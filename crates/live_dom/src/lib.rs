//! # live_dom
//!
//! Mutable, observable DOM arena — the platform stand-in the content-model
//! cache layer reconciles against.
//!
//! This crate provides:
//! - [`DomTree`]: an arena of element/text nodes keyed by opaque [`NodeKey`]s,
//!   with tree mutation operations that record raw mutation records while an
//!   observer is active
//! - [`DomSelection`]: the native selection value type (range/image/table)
//! - [`RawMutation`]: the per-operation records drained by `take_records()`
//!
//! ## Design principles
//!
//! This crate is intentionally UI-agnostic and does not depend on any
//! graphics framework, layout system, or platform API. It models exactly the
//! observable surface a browser exposes to an editing layer: tree structure,
//! text data, attributes, a native selection, and batched change records
//! delivered on explicit drain (no implicit microtask timing, so tests can
//! control delivery deterministically).
//!
//! Detached nodes stay in the arena. External side tables may hold keys to
//! nodes the tree no longer reaches; those keys must keep resolving (the
//! caller decides what staleness means). Whether a node is still reachable
//! from a given root is a separate query, [`DomTree::is_connected`].

mod selection;
mod tree;
mod types;

pub use selection::{DomPosition, DomSelection};
pub use tree::{DomTree, RecordBatch};
pub use types::{DomError, DomNode, NodeKey, RawMutation};
