use std::sync::atomic::{AtomicU32, Ordering};

// One process-wide counter feeds all three key types. Keys only need to be
// unique, not dense, and a shared atomic avoids threading an allocator
// through every reconciliation call.
static NEXT_KEY: AtomicU32 = AtomicU32::new(1);

fn next_raw() -> u32 {
    NEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

/// Opaque handle naming one paragraph in a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParagraphKey(u32);

impl ParagraphKey {
    pub fn new() -> Self {
        Self(next_raw())
    }
}

impl Default for ParagraphKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle naming one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentKey(u32);

impl SegmentKey {
    pub fn new() -> Self {
        Self(next_raw())
    }
}

impl Default for SegmentKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle naming one table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableKey(u32);

impl TableKey {
    pub fn new() -> Self {
        Self(next_raw())
    }
}

impl Default for TableKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Character-level formatting carried by a segment.
///
/// Only `id` is written by reconciliation (element-id reconcile on images);
/// the rest is pass-through state a full converter would populate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentFormat {
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub id: Option<String>,
}

/// Element-level formatting for blocks and tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementFormat {
    pub id: Option<String>,
}

/// Leaf content unit of a paragraph.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub key: SegmentKey,
    pub format: SegmentFormat,
    pub is_selected: bool,
    pub kind: SegmentKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SegmentKind {
    Text {
        text: String,
    },
    Image {
        src: String,
        is_selected_as_image_selection: bool,
    },
    Br,
    /// Zero-width segment marking a collapsed caret position.
    SelectionMarker,
    /// Inline reference to an opaque entity.
    Entity {
        entity_type: String,
    },
}

impl Segment {
    pub fn text(text: impl Into<String>, format: SegmentFormat) -> Self {
        Self {
            key: SegmentKey::new(),
            format,
            is_selected: false,
            kind: SegmentKind::Text { text: text.into() },
        }
    }

    pub fn image(src: impl Into<String>, format: SegmentFormat) -> Self {
        Self {
            key: SegmentKey::new(),
            format,
            is_selected: false,
            kind: SegmentKind::Image {
                src: src.into(),
                is_selected_as_image_selection: false,
            },
        }
    }

    pub fn br(format: SegmentFormat) -> Self {
        Self {
            key: SegmentKey::new(),
            format,
            is_selected: false,
            kind: SegmentKind::Br,
        }
    }

    pub fn marker(format: SegmentFormat) -> Self {
        Self {
            key: SegmentKey::new(),
            format,
            is_selected: false,
            kind: SegmentKind::SelectionMarker,
        }
    }

    #[inline]
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, SegmentKind::SelectionMarker)
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, SegmentKind::Text { .. })
    }

    /// Text run content, or `None` for non-text segments.
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A run of segments forming one line-level block.
#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub key: ParagraphKey,
    pub segments: Vec<Segment>,
    pub format: ElementFormat,
}

impl Paragraph {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            key: ParagraphKey::new(),
            segments,
            format: ElementFormat::default(),
        }
    }

    /// Index of the segment with the given key, if present.
    pub fn position_of(&self, key: SegmentKey) -> Option<usize> {
        self.segments.iter().position(|s| s.key == key)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub blocks: Vec<Block>,
    pub is_selected: bool,
}

impl TableCell {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            is_selected: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub key: TableKey,
    pub rows: Vec<TableRow>,
    pub format: ElementFormat,
}

impl Table {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            key: TableKey::new(),
            rows,
            format: ElementFormat::default(),
        }
    }
}

/// A block-level opaque entity (embedded widget).
#[derive(Clone, Debug, PartialEq)]
pub struct EntityBlock {
    pub entity_type: String,
    pub format: ElementFormat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Entity(EntityBlock),
}
