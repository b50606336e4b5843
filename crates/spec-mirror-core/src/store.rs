//! Document store seam.
//!
//! The workflow reads a page's direct children and patches individual
//! blocks. [`DocumentStore`] is the async trait the Notion adapter
//! implements; `fakes::MemoryDocumentStore` implements it for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checklist::{Block, BlockKind, SpecItem};
use crate::error::StoreError;
use crate::link::Annotation;

/// Result type for document store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Maximum number of children requested from a page. Larger pages are
/// truncated silently.
pub const PAGE_SIZE: usize = 100;

/// Color applied to annotation runs.
pub const ANNOTATION_COLOR: &str = "blue";

/// Text styling for a written run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub code: bool,
    pub color: String,
}

impl Annotations {
    /// Inline-code, blue: the style of every annotation run.
    pub fn annotation_style() -> Self {
        Annotations {
            code: true,
            color: ANNOTATION_COLOR.to_string(),
        }
    }
}

/// One rich-text run to write back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl RichTextRun {
    pub fn plain(content: impl Into<String>) -> Self {
        RichTextRun {
            content: content.into(),
            link: None,
            annotations: None,
        }
    }
}

/// A block patch, tagged by how the block kind is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum BlockUpdate {
    /// To-do blocks: replace the text and tick the box
    Checkbox {
        rich_text: Vec<RichTextRun>,
        checked: bool,
    },
    /// Every other text-bearing kind: replace the text only
    Text {
        kind: BlockKind,
        rich_text: Vec<RichTextRun>,
    },
}

impl BlockUpdate {
    /// The item's original text followed by the styled annotation run.
    pub fn annotate(item: &SpecItem, annotation: &Annotation) -> Self {
        let rich_text = vec![
            RichTextRun::plain(item.text.clone()),
            RichTextRun {
                content: annotation.text.clone(),
                link: Some(annotation.url.clone()),
                annotations: Some(Annotations::annotation_style()),
            },
        ];

        if item.kind.is_checkbox() {
            BlockUpdate::Checkbox {
                rich_text,
                checked: true,
            }
        } else {
            BlockUpdate::Text {
                kind: item.kind,
                rich_text,
            }
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockUpdate::Checkbox { .. } => BlockKind::ToDo,
            BlockUpdate::Text { kind, .. } => *kind,
        }
    }

    pub fn rich_text(&self) -> &[RichTextRun] {
        match self {
            BlockUpdate::Checkbox { rich_text, .. } | BlockUpdate::Text { rich_text, .. } => {
                rich_text
            }
        }
    }

    /// `Some(true)` for checkbox updates.
    pub fn checked(&self) -> Option<bool> {
        match self {
            BlockUpdate::Checkbox { checked, .. } => Some(*checked),
            BlockUpdate::Text { .. } => None,
        }
    }

    /// Concatenated text as it will read after the update.
    pub fn plain_text(&self) -> String {
        self.rich_text().iter().map(|r| r.content.as_str()).collect()
    }
}

/// Read and patch access to the checklist page.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the direct children of a page (first [`PAGE_SIZE`] only).
    async fn list_children(&self, page_id: &str) -> StoreResult<Vec<Block>>;

    /// Apply `update` to a single block.
    async fn update_block(&self, block_id: &str, update: &BlockUpdate) -> StoreResult<()>;
}
