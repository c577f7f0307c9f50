//! DOM↔Model index: the side table associating live DOM nodes with the
//! model nodes they currently represent.
//!
//! Contract:
//! - An entry is advisory. It is trusted only after re-validation against
//!   the live model at lookup time: the entry's segment keys must appear as
//!   a contiguous subsequence of the named paragraph's `segments`. Anything
//!   else is stale and reported as "not indexed", never as an error.
//! - A text node's entry covers the *ordered* run of segments (text runs
//!   plus any selection markers between them) the node currently renders.
//! - Merging two text nodes transfers the removed node's association onto
//!   the kept node only when the two runs are adjacent in the paragraph;
//!   otherwise both entries are cleared (a combined entry could not be
//!   proven contiguous).

use content_model::{ContentModelDocument, ParagraphKey, SegmentKey, TableKey};
use live_dom::{DomError, DomTree, NodeKey};
use std::collections::HashMap;

/// Association from a DOM text node to a run of segments in one paragraph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentItem {
    pub paragraph: ParagraphKey,
    pub segments: Vec<SegmentKey>,
    /// Entry for a block-entity delimiter text node. Valid as a selection
    /// anchor, but text/child-list reconciliation refuses to touch it.
    pub is_block_entity_delimiter: bool,
}

/// Association from a table root element to its model table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableItem {
    pub table: TableKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexItem {
    Segment(SegmentItem),
    Table(TableItem),
}

/// A validated segment entry: where the run currently sits in its paragraph.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedSegments {
    pub paragraph: ParagraphKey,
    /// Index of the run's first segment in `paragraph.segments`.
    pub first_index: usize,
    /// Number of segments in the run.
    pub len: usize,
    pub is_block_entity_delimiter: bool,
}

/// The side table. One entry per indexed DOM node.
#[derive(Debug, Default)]
pub struct DomIndexer {
    items: HashMap<NodeKey, IndexItem>,
}

impl DomIndexer {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Associate a text node with one or more consecutive segments of one
    /// paragraph. Replaces any previous entry for the node.
    pub fn on_segment(
        &mut self,
        node: NodeKey,
        paragraph: ParagraphKey,
        segments: Vec<SegmentKey>,
    ) {
        self.items.insert(
            node,
            IndexItem::Segment(SegmentItem {
                paragraph,
                segments,
                is_block_entity_delimiter: false,
            }),
        );
    }

    /// Associate a table root element with its model table.
    pub fn on_table(&mut self, element: NodeKey, table: TableKey) {
        self.items.insert(element, IndexItem::Table(TableItem { table }));
    }

    /// Associate a block-entity delimiter text node with the delimiter
    /// paragraph's marker-carrying segment.
    pub fn on_block_entity_delimiter(
        &mut self,
        node: NodeKey,
        paragraph: ParagraphKey,
        segment: SegmentKey,
    ) {
        self.items.insert(
            node,
            IndexItem::Segment(SegmentItem {
                paragraph,
                segments: vec![segment],
                is_block_entity_delimiter: true,
            }),
        );
    }

    /// Post-process a freshly converted paragraph's DOM subtree: coalesce
    /// adjacent text-node siblings that map to the same paragraph into one
    /// DOM node with one entry, so a single text node's boundaries match
    /// exactly one lookup target. Any element child resets the run.
    pub fn on_paragraph(
        &mut self,
        tree: &mut DomTree,
        paragraph_element: NodeKey,
    ) -> Result<(), DomError> {
        let children: Vec<NodeKey> = tree.children(paragraph_element).to_vec();
        let mut previous_text: Option<NodeKey> = None;
        for child in children {
            if !tree.is_text(child) {
                previous_text = None;
                continue;
            }
            let Some(prev) = previous_text else {
                previous_text = Some(child);
                continue;
            };
            let mergeable = match (self.segment_item(prev), self.segment_item(child)) {
                (Some(a), Some(b)) => {
                    a.paragraph == b.paragraph && !a.is_block_entity_delimiter
                        && !b.is_block_entity_delimiter
                }
                _ => false,
            };
            if mergeable {
                tree.merge_text(prev, child)?;
                let tail = match self.items.remove(&child) {
                    Some(IndexItem::Segment(item)) => item.segments,
                    _ => Vec::new(),
                };
                if let Some(IndexItem::Segment(item)) = self.items.get_mut(&prev) {
                    item.segments.extend(tail);
                }
                // prev stays the run head; the next text sibling merges into it too
            } else {
                previous_text = Some(child);
            }
        }
        Ok(())
    }

    /// The browser merged two adjacent text nodes. Transfer the removed
    /// node's association onto the kept node if the runs are index-adjacent
    /// in the paragraph; otherwise clear both.
    pub fn on_merge_text(
        &mut self,
        doc: &ContentModelDocument,
        kept: NodeKey,
        removed: NodeKey,
    ) {
        let adjacent = match (
            self.resolve_segment_item(doc, kept),
            self.resolve_segment_item(doc, removed),
        ) {
            (Some(a), Some(b)) => {
                a.paragraph == b.paragraph && a.first_index + a.len == b.first_index
            }
            _ => false,
        };
        if adjacent {
            let tail = match self.items.remove(&removed) {
                Some(IndexItem::Segment(item)) => item.segments,
                _ => Vec::new(),
            };
            if let Some(IndexItem::Segment(item)) = self.items.get_mut(&kept) {
                item.segments.extend(tail);
            }
        } else {
            self.items.remove(&kept);
            self.items.remove(&removed);
        }
    }

    /// Raw segment entry, without staleness validation.
    pub fn segment_item(&self, node: NodeKey) -> Option<&SegmentItem> {
        match self.items.get(&node) {
            Some(IndexItem::Segment(item)) => Some(item),
            _ => None,
        }
    }

    /// Raw table entry, without staleness validation.
    pub fn table_item(&self, node: NodeKey) -> Option<&TableItem> {
        match self.items.get(&node) {
            Some(IndexItem::Table(item)) => Some(item),
            _ => None,
        }
    }

    /// Validate a segment entry against the live model.
    ///
    /// Returns the run's current position, or `None` when the node is not
    /// indexed, the paragraph no longer resolves, or the run is no longer a
    /// contiguous subsequence of the paragraph's segments.
    pub fn resolve_segment_item(
        &self,
        doc: &ContentModelDocument,
        node: NodeKey,
    ) -> Option<ResolvedSegments> {
        let item = self.segment_item(node)?;
        if item.segments.is_empty() {
            return None;
        }
        let paragraph = doc.paragraph(item.paragraph)?;
        let first_index = paragraph.position_of(item.segments[0])?;
        for (offset, key) in item.segments.iter().enumerate() {
            let segment = paragraph.segments.get(first_index + offset)?;
            if segment.key != *key {
                return None;
            }
        }
        Some(ResolvedSegments {
            paragraph: item.paragraph,
            first_index,
            len: item.segments.len(),
            is_block_entity_delimiter: item.is_block_entity_delimiter,
        })
    }

    /// Drop one node's entry.
    pub fn remove(&mut self, node: NodeKey) {
        self.items.remove(&node);
    }

    /// Drop every entry. Called when the cache is rebuilt from scratch.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
