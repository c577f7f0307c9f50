//! # content_model
//!
//! The semantic, DOM-independent document tree ("Content Model") plus the
//! model-side selection helpers.
//!
//! This crate provides:
//! - [`ContentModelDocument`]: a tree of blocks (paragraph, table, block
//!   entity) whose leaves are [`Segment`]s (text run, image, line break,
//!   selection marker, inline entity)
//! - [`ParagraphKey`]/[`SegmentKey`]/[`TableKey`]: opaque handles that name
//!   model nodes without holding references into the tree, so an external
//!   side table can point at them
//! - [`set_selection`]/[`collapse_selection`]: ordered-walk selection
//!   marking over the whole document, including table cells
//!
//! ## Design principles
//!
//! The model is a plain owned tree; there is no interior mutability and no
//! back-pointers. Consumers that need to address into the tree (the
//! DOM↔Model index) do so through keys and re-resolve them against the live
//! tree on every use, so a key to a node that has since been removed or
//! restructured simply fails to resolve.

mod document;
mod selection;
mod types;

pub use document::ContentModelDocument;
pub use selection::{collapse_selection, set_selection};
pub use types::{
    Block, ElementFormat, EntityBlock, Paragraph, ParagraphKey, Segment, SegmentFormat,
    SegmentKey, SegmentKind, Table, TableCell, TableKey, TableRow,
};
