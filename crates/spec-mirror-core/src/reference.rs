//! Notion page reference extraction.
//!
//! Milestone descriptions point at the spec checklist either with a bare
//! page id or a full URL such as
//! `https://www.notion.so/Workspace-a1b2c3d4e5f647a8b9c0d1e2f3a4b5c6`.
//! Both forms end in a 32-character lowercase hex run, which is all we need.

use std::sync::OnceLock;

use regex::Regex;

/// A Notion page id (32 lowercase hex characters, no dashes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(String);

impl PageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn page_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The surrounding groups reject runs that are part of a longer hex
    // string (commit SHAs, digests).
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9a-f])([0-9a-f]{32})(?:[^0-9a-f]|$)")
            .expect("page id pattern is valid")
    })
}

/// Find the first page id embedded in `text`.
///
/// Returns `None` when the text holds no standalone 32-character lowercase
/// hex run; callers treat that as "nothing to audit".
pub fn extract_page_id(text: &str) -> Option<PageId> {
    page_id_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| PageId(m.as_str().to_string()))
}
