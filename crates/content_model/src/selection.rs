//! Ordered-walk selection marking.

use crate::document::ContentModelDocument;
use crate::types::{Block, Segment, SegmentKey, SegmentKind};

/// Clear every selection flag in the document.
///
/// Selection markers are left in place; removing stale markers is the
/// reconciler's job (they carry position, not highlight state).
pub fn collapse_selection(doc: &mut ContentModelDocument) {
    clear_blocks(&mut doc.blocks);
}

fn clear_blocks(blocks: &mut [Block]) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for segment in &mut p.segments {
                    clear_segment(segment);
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        cell.is_selected = false;
                        clear_blocks(&mut cell.blocks);
                    }
                }
            }
            Block::Entity(_) => {}
        }
    }
}

fn clear_segment(segment: &mut Segment) {
    segment.is_selected = false;
    if let SegmentKind::Image {
        is_selected_as_image_selection,
        ..
    } = &mut segment.kind
    {
        *is_selected_as_image_selection = false;
    }
}

/// Mark every segment in the inclusive span between the two boundary
/// segments as selected, clearing selection everywhere else.
///
/// The boundaries may appear in either document order. A table cell whose
/// segments all fall inside the span (and that has at least one segment) is
/// additionally marked selected as a cell.
pub fn set_selection(doc: &mut ContentModelDocument, from: SegmentKey, to: SegmentKey) {
    let mut walker = Walker {
        from,
        to,
        in_span: false,
        finished: false,
    };
    walk_blocks(&mut doc.blocks, &mut walker);
}

struct Walker {
    from: SegmentKey,
    to: SegmentKey,
    in_span: bool,
    finished: bool,
}

fn walk_blocks(blocks: &mut [Block], walker: &mut Walker) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for segment in &mut p.segments {
                    visit_segment(segment, walker);
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        let mut any = false;
                        let mut all = true;
                        walk_cell(&mut cell.blocks, walker, &mut any, &mut all);
                        cell.is_selected = any && all;
                    }
                }
            }
            Block::Entity(_) => {}
        }
    }
}

fn walk_cell(blocks: &mut [Block], walker: &mut Walker, any: &mut bool, all: &mut bool) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for segment in &mut p.segments {
                    visit_segment(segment, walker);
                    if segment.is_selected {
                        *any = true;
                    } else {
                        *all = false;
                    }
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        let mut cell_any = false;
                        let mut cell_all = true;
                        walk_cell(&mut cell.blocks, walker, &mut cell_any, &mut cell_all);
                        cell.is_selected = cell_any && cell_all;
                        *any |= cell_any;
                        *all &= cell_all;
                    }
                }
            }
            Block::Entity(_) => {}
        }
    }
}

fn visit_segment(segment: &mut Segment, walker: &mut Walker) {
    let is_boundary = segment.key == walker.from || segment.key == walker.to;
    let single = walker.from == walker.to;

    if is_boundary && !walker.in_span && !walker.finished {
        segment.is_selected = true;
        if single {
            walker.finished = true;
        } else {
            walker.in_span = true;
        }
        return;
    }

    if walker.in_span {
        segment.is_selected = true;
        if is_boundary {
            walker.in_span = false;
            walker.finished = true;
        }
        return;
    }

    clear_segment(segment);
}
