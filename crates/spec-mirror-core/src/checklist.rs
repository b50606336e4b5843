//! Spec checklist model.
//!
//! A document store hands back raw [`Block`]s; [`Checklist::from_blocks`]
//! keeps the ones that count as spec items for the current audit mode and
//! indexes them by block id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::link::IdempotencyMarker;

/// Notion block kinds the workflow understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ToDo,
    BulletedListItem,
    NumberedListItem,
    Paragraph,
    #[serde(rename = "heading_1")]
    Heading1,
    #[serde(rename = "heading_2")]
    Heading2,
    #[serde(rename = "heading_3")]
    Heading3,
    Toggle,
}

impl BlockKind {
    /// The block `type` string used by the Notion API.
    pub fn api_name(&self) -> &'static str {
        match self {
            BlockKind::ToDo => "to_do",
            BlockKind::BulletedListItem => "bulleted_list_item",
            BlockKind::NumberedListItem => "numbered_list_item",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading1 => "heading_1",
            BlockKind::Heading2 => "heading_2",
            BlockKind::Heading3 => "heading_3",
            BlockKind::Toggle => "toggle",
        }
    }

    /// Parse a Notion block `type`. Unknown kinds (images, tables, ...)
    /// return `None`.
    pub fn from_api_name(name: &str) -> Option<Self> {
        match name {
            "to_do" => Some(BlockKind::ToDo),
            "bulleted_list_item" => Some(BlockKind::BulletedListItem),
            "numbered_list_item" => Some(BlockKind::NumberedListItem),
            "paragraph" => Some(BlockKind::Paragraph),
            "heading_1" => Some(BlockKind::Heading1),
            "heading_2" => Some(BlockKind::Heading2),
            "heading_3" => Some(BlockKind::Heading3),
            "toggle" => Some(BlockKind::Toggle),
            _ => None,
        }
    }

    /// Whether the block carries a `checked` flag.
    pub fn is_checkbox(&self) -> bool {
        matches!(self, BlockKind::ToDo)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// One run of rich text as read from a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextRun {
    pub plain_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        TextRun {
            plain_text: text.into(),
            href: None,
        }
    }

    pub fn linked(text: impl Into<String>, href: impl Into<String>) -> Self {
        TextRun {
            plain_text: text.into(),
            href: Some(href.into()),
        }
    }
}

/// A direct child block of the checklist page, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    /// Raw Notion block type (kept even for kinds we do not audit)
    pub block_type: String,
    #[serde(default)]
    pub rich_text: Vec<TextRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl Block {
    /// Concatenated plain text of all runs.
    pub fn plain_text(&self) -> String {
        self.rich_text.iter().map(|r| r.plain_text.as_str()).collect()
    }

    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_api_name(&self.block_type)
    }
}

/// A checklist entry offered to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecItem {
    pub id: String,
    pub text: String,
    pub kind: BlockKind,
    pub checked: bool,
    /// Link targets already present in the block's rich text
    pub links: Vec<String>,
    /// Whether a previous run (for this pull request) already annotated it
    pub already_linked: bool,
}

/// Ordered spec items with lookup by block id.
#[derive(Debug, Clone, Default)]
pub struct Checklist {
    items: Vec<SpecItem>,
    index: HashMap<String, usize>,
}

impl Checklist {
    /// Build a checklist from raw blocks.
    ///
    /// Keeps blocks whose kind is in `kinds` and whose text is non-empty
    /// after concatenating all runs. Order follows the page. A block id seen
    /// twice keeps its first occurrence.
    pub fn from_blocks(blocks: &[Block], kinds: &[BlockKind], marker: &IdempotencyMarker) -> Self {
        let mut checklist = Checklist::default();

        for block in blocks {
            let Some(kind) = block.kind().filter(|k| kinds.contains(k)) else {
                continue;
            };
            let text = block.plain_text();
            if text.trim().is_empty() || checklist.index.contains_key(&block.id) {
                continue;
            }

            let links: Vec<String> = block
                .rich_text
                .iter()
                .filter_map(|r| r.href.clone())
                .collect();
            let already_linked = marker.is_present(&text, &links);

            checklist
                .index
                .insert(block.id.clone(), checklist.items.len());
            checklist.items.push(SpecItem {
                id: block.id.clone(),
                text,
                kind,
                checked: block.checked.unwrap_or(false),
                links,
                already_linked,
            });
        }

        checklist
    }

    pub fn get(&self, id: &str) -> Option<&SpecItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn items(&self) -> &[SpecItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items not yet annotated for this pull request.
    pub fn pending(&self) -> impl Iterator<Item = &SpecItem> {
        self.items.iter().filter(|item| !item.already_linked)
    }
}
