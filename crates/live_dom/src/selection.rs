//! Native selection representation.

use crate::types::NodeKey;

/// One endpoint of a range selection: a node plus an offset into it.
///
/// For a text node the offset is a byte offset into its data and must land
/// on a char boundary; for an element it is an index into the child list.
/// Both conventions follow the browser's `(container, offset)` pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomPosition {
    pub node: NodeKey,
    pub offset: usize,
}

impl DomPosition {
    #[inline]
    pub fn new(node: NodeKey, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Snapshot of the native selection, compared by value.
///
/// `Range` endpoints are stored in document order (`start` before `end`);
/// a backward (focus-before-anchor) native range sets `reverted` instead of
/// swapping the endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomSelection {
    Range {
        start: DomPosition,
        end: DomPosition,
        reverted: bool,
    },
    Image {
        image: NodeKey,
    },
    Table {
        table: NodeKey,
        first_row: usize,
        first_column: usize,
        last_row: usize,
        last_column: usize,
    },
}

impl DomSelection {
    /// A collapsed (caret) range at the given position.
    pub fn collapsed(node: NodeKey, offset: usize) -> Self {
        let pos = DomPosition::new(node, offset);
        DomSelection::Range {
            start: pos,
            end: pos,
            reverted: false,
        }
    }

    /// Returns `true` for a zero-width range selection.
    pub fn is_collapsed(&self) -> bool {
        match self {
            DomSelection::Range { start, end, .. } => start == end,
            DomSelection::Image { .. } | DomSelection::Table { .. } => false,
        }
    }
}
