//! Incremental reconciliation of the cached model against observed changes.
//!
//! Contract:
//! - Every operation returns a success flag; `false` means the change could
//!   not be proven safe to patch and the caller must invalidate the cache.
//! - Failure is the designed fallback, not an error. No operation throws,
//!   retries, or leaves a state it reports as successful while diverging
//!   from what a full re-parse of the current DOM would produce.
//! - On `false` the model may hold partial edits; the caller discards it,
//!   so no rollback is attempted.
//! - Stale index entries are treated as "not indexed" (validation happens
//!   at lookup time), never as an error.

use crate::index::DomIndexer;
use content_model::{
    collapse_selection, set_selection, Block, ContentModelDocument, ParagraphKey, Segment,
    SegmentFormat, SegmentKey, SegmentKind,
};
use live_dom::{DomPosition, DomSelection, DomTree, NodeKey};

/// How to rebuild a text node's model coverage.
enum TextShape {
    /// One text segment holding the node's current data.
    Resync,
    /// Split at a byte offset and place a selection marker in the cut.
    Caret(usize),
    /// Split twice; the middle piece is marked selected.
    Range(usize, usize),
}

/// Map a native selection onto model selection state.
///
/// `old_selection` is the previously cached selection; a collapsed old text
/// caret is resynced first (dropping its marker and absorbing any text
/// drift) so repeated reconciliations do not accumulate markers.
pub fn reconcile_selection(
    doc: &mut ContentModelDocument,
    indexer: &mut DomIndexer,
    tree: &DomTree,
    new_selection: &DomSelection,
    old_selection: Option<&DomSelection>,
) -> bool {
    if let Some(DomSelection::Range { start, end, .. }) = old_selection {
        if start == end && tree.is_text(start.node) {
            if let Some(resolved) = indexer.resolve_segment_item(doc, start.node) {
                if !resolved.is_block_entity_delimiter
                    && rebuild_text_coverage(
                        doc,
                        indexer,
                        tree,
                        start.node,
                        TextShape::Resync,
                        None,
                    )
                    .is_none()
                {
                    return false;
                }
            }
        }
    }

    collapse_selection(doc);

    match new_selection {
        DomSelection::Image { image } => reconcile_image_selection(doc, indexer, *image),
        DomSelection::Table {
            table,
            first_row,
            first_column,
            last_row,
            last_column,
        } => reconcile_table_selection(
            doc,
            indexer,
            *table,
            (*first_row, *first_column),
            (*last_row, *last_column),
        ),
        DomSelection::Range {
            start,
            end,
            reverted,
        } => {
            if start == end {
                reconcile_position(doc, indexer, tree, *start, None).is_some()
            } else if start.node == end.node && tree.is_text(start.node) {
                rebuild_text_coverage(
                    doc,
                    indexer,
                    tree,
                    start.node,
                    TextShape::Range(start.offset, end.offset),
                    None,
                )
                .is_some()
            } else {
                let Some(first) = reconcile_position(doc, indexer, tree, *start, None) else {
                    return false;
                };
                // The first marker is protected from the second endpoint's
                // absorption; only pre-existing old markers may be absorbed.
                let Some(second) = reconcile_position(doc, indexer, tree, *end, Some(first))
                else {
                    return false;
                };
                if !segment_exists(doc, first) || !segment_exists(doc, second) {
                    return false;
                }
                set_selection(doc, first, second);
                if *reverted {
                    doc.has_reverted_range_selection = true;
                }
                true
            }
        }
    }
}

fn reconcile_image_selection(
    doc: &mut ContentModelDocument,
    indexer: &DomIndexer,
    image: NodeKey,
) -> bool {
    let Some(resolved) = indexer.resolve_segment_item(doc, image) else {
        return false;
    };
    if resolved.len != 1 || resolved.is_block_entity_delimiter {
        return false;
    }
    let Some(paragraph) = doc.paragraph_mut(resolved.paragraph) else {
        return false;
    };
    let segment = &mut paragraph.segments[resolved.first_index];
    match &mut segment.kind {
        SegmentKind::Image {
            is_selected_as_image_selection,
            ..
        } => {
            *is_selected_as_image_selection = true;
            segment.is_selected = true;
            true
        }
        _ => false,
    }
}

fn reconcile_table_selection(
    doc: &mut ContentModelDocument,
    indexer: &DomIndexer,
    table: NodeKey,
    first: (usize, usize),
    last: (usize, usize),
) -> bool {
    let Some(item) = indexer.table_item(table) else {
        return false;
    };
    let Some(model_table) = doc.table_mut(item.table) else {
        return false;
    };
    let (first_row, first_column) = first;
    let (last_row, last_column) = last;
    if first_row > last_row || first_column > last_column {
        return false;
    }
    if last_row >= model_table.rows.len() {
        return false;
    }
    for (row_index, row) in model_table.rows.iter_mut().enumerate() {
        let row_in_range = row_index >= first_row && row_index <= last_row;
        if row_in_range && last_column >= row.cells.len() {
            return false;
        }
        for (col_index, cell) in row.cells.iter_mut().enumerate() {
            cell.is_selected =
                row_in_range && col_index >= first_column && col_index <= last_column;
        }
    }
    true
}

/// Resolve one selection endpoint to a marker in the model.
///
/// A text-node endpoint splits the node's coverage at the offset; an
/// element endpoint synthesizes a marker adjacent to the nearest indexed
/// child around the offset. Returns the marker's key, or `None` when the
/// endpoint cannot be proven to map to a model position.
fn reconcile_position(
    doc: &mut ContentModelDocument,
    indexer: &mut DomIndexer,
    tree: &DomTree,
    pos: DomPosition,
    protect: Option<SegmentKey>,
) -> Option<SegmentKey> {
    if tree.is_text(pos.node) {
        let resolved = indexer.resolve_segment_item(doc, pos.node)?;
        if resolved.is_block_entity_delimiter {
            // Delimiter text is opaque; the caret lands next to it, not in it.
            let at = if pos.offset == 0 {
                resolved.first_index
            } else {
                resolved.first_index + resolved.len
            };
            return insert_marker(doc, resolved.paragraph, at, protect);
        }
        return rebuild_text_coverage(
            doc,
            indexer,
            tree,
            pos.node,
            TextShape::Caret(pos.offset),
            protect,
        )
        .flatten();
    }

    let children = tree.children(pos.node);
    if pos.offset > 0 {
        if let Some(&previous) = children.get(pos.offset - 1) {
            if let Some(resolved) = indexer.resolve_segment_item(doc, previous) {
                return insert_marker(
                    doc,
                    resolved.paragraph,
                    resolved.first_index + resolved.len,
                    protect,
                );
            }
        }
    }
    if let Some(&next) = children.get(pos.offset) {
        if let Some(resolved) = indexer.resolve_segment_item(doc, next) {
            return insert_marker(doc, resolved.paragraph, resolved.first_index, protect);
        }
    }
    None
}

fn absorbable(segment: &Segment, protect: Option<SegmentKey>) -> bool {
    segment.is_marker() && Some(segment.key) != protect
}

/// Insert a selected marker at `at` in the paragraph, absorbing at most one
/// adjacent run of old markers on each side. A `protect`ed marker (one
/// placed earlier in the same reconciliation pass) is never absorbed.
fn insert_marker(
    doc: &mut ContentModelDocument,
    paragraph: ParagraphKey,
    at: usize,
    protect: Option<SegmentKey>,
) -> Option<SegmentKey> {
    let paragraph = doc.paragraph_mut(paragraph)?;
    let mut at = at.min(paragraph.segments.len());
    while at > 0 && absorbable(&paragraph.segments[at - 1], protect) {
        paragraph.segments.remove(at - 1);
        at -= 1;
    }
    while at < paragraph.segments.len() && absorbable(&paragraph.segments[at], protect) {
        paragraph.segments.remove(at);
    }
    let format = paragraph
        .segments
        .get(at.saturating_sub(1))
        .map(|s| s.format.clone())
        .unwrap_or_default();
    let mut marker = Segment::marker(format);
    marker.is_selected = true;
    let key = marker.key;
    paragraph.segments.insert(at, marker);
    Some(key)
}

/// Rebuild a text node's model coverage from its current DOM data.
///
/// The replaced span is the validated entry extended by at most one
/// adjacent old-marker run on each side; a `protect`ed marker stops the
/// extension. Returns `Some(marker_key)` for the caret shape, `Some(None)`
/// for the others, `None` on failure (stale entry, delimiter entry, or an
/// offset that is not a char boundary of the node's data).
fn rebuild_text_coverage(
    doc: &mut ContentModelDocument,
    indexer: &mut DomIndexer,
    tree: &DomTree,
    node: NodeKey,
    shape: TextShape,
    protect: Option<SegmentKey>,
) -> Option<Option<SegmentKey>> {
    let resolved = indexer.resolve_segment_item(doc, node)?;
    if resolved.is_block_entity_delimiter {
        return None;
    }
    let text = tree.text(node)?.to_string();
    let paragraph = doc.paragraph_mut(resolved.paragraph)?;

    let mut lo = resolved.first_index;
    let mut hi = resolved.first_index + resolved.len;
    while lo > 0 && absorbable(&paragraph.segments[lo - 1], protect) {
        lo -= 1;
    }
    while hi < paragraph.segments.len() && absorbable(&paragraph.segments[hi], protect) {
        hi += 1;
    }

    let base_format = paragraph.segments[resolved.first_index].format.clone();
    let mut new_segments: Vec<Segment> = Vec::new();
    let mut marker_key: Option<SegmentKey> = None;

    match shape {
        TextShape::Resync => {
            new_segments.push(Segment::text(text.as_str(), base_format));
        }
        TextShape::Caret(offset) => {
            if !text.is_char_boundary(offset) {
                return None;
            }
            let (before, after) = text.split_at(offset);
            if !before.is_empty() {
                new_segments.push(Segment::text(before, base_format.clone()));
            }
            let mut marker = Segment::marker(base_format.clone());
            marker.is_selected = true;
            marker_key = Some(marker.key);
            new_segments.push(marker);
            if !after.is_empty() {
                new_segments.push(Segment::text(after, base_format));
            }
        }
        TextShape::Range(start, end) => {
            if start > end || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                return None;
            }
            let before = &text[..start];
            let middle = &text[start..end];
            let after = &text[end..];
            if !before.is_empty() {
                new_segments.push(Segment::text(before, base_format.clone()));
            }
            if !middle.is_empty() {
                let mut selected = Segment::text(middle, base_format.clone());
                selected.is_selected = true;
                new_segments.push(selected);
            }
            if !after.is_empty() {
                new_segments.push(Segment::text(after, base_format));
            }
        }
    }

    let keys: Vec<SegmentKey> = new_segments.iter().map(|s| s.key).collect();
    paragraph.segments.splice(lo..hi, new_segments);
    indexer.on_segment(node, resolved.paragraph, keys);
    Some(marker_key)
}

/// Map a narrow child-list change (at most one added text node and/or one
/// removed node) onto segment insertion/removal.
pub fn reconcile_child_list(
    doc: &mut ContentModelDocument,
    indexer: &mut DomIndexer,
    tree: &DomTree,
    added: &[NodeKey],
    removed: &[NodeKey],
) -> bool {
    if added.len() > 1 || removed.len() > 1 {
        return false;
    }

    // Removal first; it doubles as the insertion context for an added node
    // that has no indexed sibling (e.g. the browser replaced a node).
    let mut context: Option<(ParagraphKey, usize, SegmentFormat)> = None;
    if let Some(&removed_node) = removed.first() {
        let Some(resolved) = indexer.resolve_segment_item(doc, removed_node) else {
            return false;
        };
        if resolved.is_block_entity_delimiter {
            return false;
        }
        let Some(paragraph) = doc.paragraph_mut(resolved.paragraph) else {
            return false;
        };
        let format = paragraph.segments[resolved.first_index].format.clone();
        paragraph
            .segments
            .drain(resolved.first_index..resolved.first_index + resolved.len);
        indexer.remove(removed_node);
        context = Some((resolved.paragraph, resolved.first_index, format));
    }

    if let Some(&added_node) = added.first() {
        if !tree.is_text(added_node) {
            return false;
        }
        let Some(text) = tree.text(added_node).map(str::to_string) else {
            return false;
        };

        let target = resolve_insertion_target(doc, indexer, tree, added_node)
            .or_else(|| context.take());
        let Some((paragraph_key, index, format)) = target else {
            // A pending added node with no anchor and no matching removal in
            // this batch cannot be placed.
            return false;
        };
        let Some(paragraph) = doc.paragraph_mut(paragraph_key) else {
            return false;
        };
        let index = index.min(paragraph.segments.len());
        let segment = Segment::text(text, format);
        let key = segment.key;
        paragraph.segments.insert(index, segment);
        indexer.on_segment(added_node, paragraph_key, vec![key]);
    }

    true
}

/// Insertion point for an added text node, from an indexed previous sibling
/// (after its run) or an indexed next sibling (before its run).
fn resolve_insertion_target(
    doc: &ContentModelDocument,
    indexer: &DomIndexer,
    tree: &DomTree,
    node: NodeKey,
) -> Option<(ParagraphKey, usize, SegmentFormat)> {
    if let Some(previous) = tree.previous_sibling(node) {
        if let Some(resolved) = indexer.resolve_segment_item(doc, previous) {
            if !resolved.is_block_entity_delimiter {
                let paragraph = doc.paragraph(resolved.paragraph)?;
                let format = paragraph.segments[resolved.first_index + resolved.len - 1]
                    .format
                    .clone();
                return Some((
                    resolved.paragraph,
                    resolved.first_index + resolved.len,
                    format,
                ));
            }
        }
    }
    if let Some(next) = tree.next_sibling(node) {
        if let Some(resolved) = indexer.resolve_segment_item(doc, next) {
            if !resolved.is_block_entity_delimiter {
                let paragraph = doc.paragraph(resolved.paragraph)?;
                let format = paragraph.segments[resolved.first_index].format.clone();
                return Some((resolved.paragraph, resolved.first_index, format));
            }
        }
    }
    None
}

/// Resync a text node's segment content to the node's current data after a
/// characterData mutation.
pub fn reconcile_text(
    doc: &mut ContentModelDocument,
    indexer: &mut DomIndexer,
    tree: &DomTree,
    node: NodeKey,
) -> bool {
    rebuild_text_coverage(doc, indexer, tree, node, TextShape::Resync, None).is_some()
}

/// Propagate an `id` attribute change onto the indexed image segment's or
/// table's format.
pub fn reconcile_element_id(
    doc: &mut ContentModelDocument,
    indexer: &DomIndexer,
    tree: &DomTree,
    element: NodeKey,
) -> bool {
    let id = tree.attribute(element, "id").map(str::to_string);
    if let Some(resolved) = indexer.resolve_segment_item(doc, element) {
        if resolved.len != 1 || resolved.is_block_entity_delimiter {
            return false;
        }
        let Some(paragraph) = doc.paragraph_mut(resolved.paragraph) else {
            return false;
        };
        let segment = &mut paragraph.segments[resolved.first_index];
        if matches!(segment.kind, SegmentKind::Image { .. }) {
            segment.format.id = id;
            return true;
        }
        return false;
    }
    if let Some(item) = indexer.table_item(element) {
        if let Some(table) = doc.table_mut(item.table) {
            table.format.id = id;
            return true;
        }
    }
    false
}

fn segment_exists(doc: &ContentModelDocument, key: SegmentKey) -> bool {
    fn in_blocks(blocks: &[Block], key: SegmentKey) -> bool {
        blocks.iter().any(|block| match block {
            Block::Paragraph(p) => p.segments.iter().any(|s| s.key == key),
            Block::Table(table) => table
                .rows
                .iter()
                .flat_map(|r| r.cells.iter())
                .any(|cell| in_blocks(&cell.blocks, key)),
            Block::Entity(_) => false,
        })
    }
    in_blocks(&doc.blocks, key)
}
