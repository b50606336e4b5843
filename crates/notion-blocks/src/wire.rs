//! Notion block wire format.
//!
//! A block arrives as `{"id", "type": "<kind>", "<kind>": {...payload}}`.
//! Only `rich_text` and `checked` are read from the payload; everything else
//! is ignored so unknown kinds still decode.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use spec_mirror_core::{Block, BlockUpdate, RichTextRun, StoreError, TextRun};

/// Notion rejects text objects longer than this many characters.
pub const MAX_TEXT_CONTENT: usize = 2000;

/// `GET /blocks/{id}/children` response.
#[derive(Debug, Deserialize)]
pub struct BlockList {
    pub results: Vec<WireBlock>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(flatten)]
    pub payloads: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockPayload {
    #[serde(default)]
    rich_text: Vec<WireRichText>,
    #[serde(default)]
    checked: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireRichText {
    #[serde(default)]
    plain_text: String,
    #[serde(default)]
    href: Option<String>,
}

/// Notion error body: `{"object": "error", "status", "code", "message"}`.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl WireBlock {
    pub fn into_block(self) -> Result<Block, StoreError> {
        let WireBlock {
            id,
            block_type,
            mut payloads,
        } = self;
        let payload = match payloads.remove(&block_type) {
            Some(value @ Value::Object(_)) => serde_json::from_value::<BlockPayload>(value)?,
            _ => BlockPayload::default(),
        };

        Ok(Block {
            id,
            block_type,
            rich_text: payload
                .rich_text
                .into_iter()
                .map(|r| TextRun {
                    plain_text: r.plain_text,
                    href: r.href,
                })
                .collect(),
            checked: payload.checked,
        })
    }
}

/// Decode a children listing into core blocks.
///
/// Returns the blocks and whether the page has more children than were
/// returned.
pub fn parse_children(body: &str) -> Result<(Vec<Block>, bool), StoreError> {
    let list: BlockList = serde_json::from_str(body)?;
    let has_more = list.has_more;
    let blocks = list
        .results
        .into_iter()
        .map(WireBlock::into_block)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((blocks, has_more))
}

/// Extract the message of an error response, falling back to the raw body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if !err.message.is_empty() => {
            if err.code.is_empty() {
                err.message
            } else {
                format!("{}: {}", err.code, err.message)
            }
        }
        _ => body.trim().to_string(),
    }
}

/// Build the `PATCH /blocks/{id}` body for an update.
pub fn update_body(update: &BlockUpdate) -> Value {
    let rich_text: Vec<Value> = update.rich_text().iter().flat_map(rich_text_objects).collect();

    let payload = match update.checked() {
        Some(checked) => json!({ "rich_text": rich_text, "checked": checked }),
        None => json!({ "rich_text": rich_text }),
    };

    let mut body = serde_json::Map::new();
    body.insert(update.kind().api_name().to_string(), payload);
    Value::Object(body)
}

// One run may become several text objects when it exceeds the content limit.
fn rich_text_objects(run: &RichTextRun) -> Vec<Value> {
    chunk_chars(&run.content, MAX_TEXT_CONTENT)
        .into_iter()
        .map(|content| {
            let mut text = json!({ "content": content });
            if let Some(url) = &run.link {
                text["link"] = json!({ "url": url });
            }
            let mut object = json!({ "type": "text", "text": text });
            if let Some(style) = &run.annotations {
                object["annotations"] = json!({ "code": style.code, "color": style.color });
            }
            object
        })
        .collect()
}

fn chunk_chars(text: &str, size: usize) -> Vec<&str> {
    if text.is_empty() {
        return vec![text];
    }
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&text[start..]);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use spec_mirror_core::{Annotations, BlockKind};

    const LISTING: &str = r#"{
        "object": "list",
        "results": [
            {
                "object": "block",
                "id": "X1",
                "type": "to_do",
                "has_children": false,
                "to_do": {
                    "rich_text": [
                        {"type": "text", "plain_text": "Add retry ", "href": null},
                        {"type": "text", "plain_text": "logic", "href": "https://example.com"}
                    ],
                    "checked": false,
                    "color": "default"
                }
            },
            {
                "object": "block",
                "id": "IMG",
                "type": "image",
                "image": {"type": "external", "external": {"url": "https://example.com/a.png"}}
            },
            {
                "object": "block",
                "id": "DIV",
                "type": "divider",
                "divider": {}
            }
        ],
        "next_cursor": null,
        "has_more": false
    }"#;

    #[test]
    fn listing_decodes_text_and_checked_state() {
        let (blocks, has_more) = parse_children(LISTING).unwrap();

        assert!(!has_more);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].id, "X1");
        assert_eq!(blocks[0].plain_text(), "Add retry logic");
        assert_eq!(blocks[0].checked, Some(false));
        assert_eq!(blocks[0].rich_text[1].href.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn non_text_blocks_decode_with_empty_text() {
        let (blocks, _) = parse_children(LISTING).unwrap();
        assert_eq!(blocks[1].block_type, "image");
        assert!(blocks[1].rich_text.is_empty());
        assert!(blocks[2].rich_text.is_empty());
    }

    #[test]
    fn garbage_listing_is_a_decode_error() {
        let err = parse_children("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn error_message_prefers_api_message() {
        let body = r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find block"}"#;
        assert_eq!(error_message(body), "object_not_found: Could not find block");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
    }

    fn annotated(kind: BlockKind) -> BlockUpdate {
        let rich_text = vec![
            RichTextRun::plain("Add retry logic"),
            RichTextRun {
                content: " [PR #42]".to_string(),
                link: Some("https://github.com/acme/widgets/pull/42".to_string()),
                annotations: Some(Annotations::annotation_style()),
            },
        ];
        if kind.is_checkbox() {
            BlockUpdate::Checkbox {
                rich_text,
                checked: true,
            }
        } else {
            BlockUpdate::Text { kind, rich_text }
        }
    }

    #[test]
    fn checkbox_update_body() {
        let body = update_body(&annotated(BlockKind::ToDo));

        let payload = &body["to_do"];
        assert_eq!(payload["checked"], true);
        assert_eq!(payload["rich_text"][0]["text"]["content"], "Add retry logic");
        assert!(payload["rich_text"][0].get("annotations").is_none());
        assert_eq!(
            payload["rich_text"][1]["text"]["link"]["url"],
            "https://github.com/acme/widgets/pull/42"
        );
        assert_eq!(payload["rich_text"][1]["annotations"]["code"], true);
        assert_eq!(payload["rich_text"][1]["annotations"]["color"], "blue");
    }

    #[test]
    fn text_update_body_has_no_checked_flag() {
        let body = update_body(&annotated(BlockKind::Heading2));

        assert!(body.get("heading_2").is_some());
        assert!(body["heading_2"].get("checked").is_none());
    }

    #[test]
    fn long_runs_are_split_at_content_limit() {
        let update = BlockUpdate::Checkbox {
            rich_text: vec![RichTextRun::plain("é".repeat(MAX_TEXT_CONTENT + 10))],
            checked: true,
        };
        let body = update_body(&update);
        let runs = body["to_do"]["rich_text"].as_array().unwrap();

        assert_eq!(runs.len(), 2);
        let first = runs[0]["text"]["content"].as_str().unwrap();
        assert_eq!(first.chars().count(), MAX_TEXT_CONTENT);
    }

    #[test]
    fn chunking_keeps_short_and_empty_text_whole() {
        assert_eq!(chunk_chars("abc", 2000), vec!["abc"]);
        assert_eq!(chunk_chars("", 2000), vec![""]);
        assert_eq!(chunk_chars("abcd", 2), vec!["ab", "cd"]);
    }
}
