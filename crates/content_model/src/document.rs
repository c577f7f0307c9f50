//! Document root and key-based lookup.

use crate::types::{Block, Paragraph, ParagraphKey, Table, TableKey};

/// Root of a content model tree.
///
/// Exclusively owned by whoever caches it; mutated only through
/// reconciliation or replaced wholesale by a full re-parse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentModelDocument {
    pub blocks: Vec<Block>,
    /// Set when a reconciled multi-node range selection reported a backward
    /// (anchor-after-focus) native direction. Side-channel consumed by
    /// rendering; never cleared by this subsystem.
    pub has_reverted_range_selection: bool,
}

impl ContentModelDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            has_reverted_range_selection: false,
        }
    }

    /// Resolve a paragraph key against the live tree.
    ///
    /// Walks blocks depth-first, including table cells. Returns `None` for a
    /// key whose paragraph has been removed; callers treat that as stale.
    pub fn paragraph(&self, key: ParagraphKey) -> Option<&Paragraph> {
        find_paragraph(&self.blocks, key)
    }

    pub fn paragraph_mut(&mut self, key: ParagraphKey) -> Option<&mut Paragraph> {
        find_paragraph_mut(&mut self.blocks, key)
    }

    pub fn table(&self, key: TableKey) -> Option<&Table> {
        find_table(&self.blocks, key)
    }

    pub fn table_mut(&mut self, key: TableKey) -> Option<&mut Table> {
        find_table_mut(&mut self.blocks, key)
    }
}

fn find_paragraph(blocks: &[Block], key: ParagraphKey) -> Option<&Paragraph> {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                if p.key == key {
                    return Some(p);
                }
            }
            Block::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        if let Some(found) = find_paragraph(&cell.blocks, key) {
                            return Some(found);
                        }
                    }
                }
            }
            Block::Entity(_) => {}
        }
    }
    None
}

fn find_paragraph_mut(blocks: &mut [Block], key: ParagraphKey) -> Option<&mut Paragraph> {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                if p.key == key {
                    return Some(p);
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        if let Some(found) = find_paragraph_mut(&mut cell.blocks, key) {
                            return Some(found);
                        }
                    }
                }
            }
            Block::Entity(_) => {}
        }
    }
    None
}

fn find_table(blocks: &[Block], key: TableKey) -> Option<&Table> {
    for block in blocks {
        match block {
            Block::Table(table) => {
                if table.key == key {
                    return Some(table);
                }
                for row in &table.rows {
                    for cell in &row.cells {
                        if let Some(found) = find_table(&cell.blocks, key) {
                            return Some(found);
                        }
                    }
                }
            }
            Block::Paragraph(_) | Block::Entity(_) => {}
        }
    }
    None
}

fn find_table_mut(blocks: &mut [Block], key: TableKey) -> Option<&mut Table> {
    for block in blocks {
        match block {
            Block::Table(table) => {
                if table.key == key {
                    return Some(table);
                }
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        if let Some(found) = find_table_mut(&mut cell.blocks, key) {
                            return Some(found);
                        }
                    }
                }
            }
            Block::Paragraph(_) | Block::Entity(_) => {}
        }
    }
    None
}
