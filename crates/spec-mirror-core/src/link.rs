//! Annotation links and idempotency markers.
//!
//! Every annotation written for pull request `n` contains the text `PR #n`.
//! On re-runs that text (or an existing link to the pull request) marks the
//! item as done, so a block is never annotated twice for the same PR.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{AuditMode, PullRequest};
use crate::oracle::MatchResult;

/// Detects annotations left by earlier runs.
#[derive(Debug, Clone)]
pub struct IdempotencyMarker {
    needle: String,
    pr_url: String,
    deep_links: bool,
}

impl IdempotencyMarker {
    /// `deep_links` additionally treats any existing `/blob/` link as a
    /// previous traceable annotation.
    pub fn new(pr_number: u64, pr_url: &str, deep_links: bool) -> Self {
        IdempotencyMarker {
            needle: format!("PR #{pr_number}"),
            pr_url: pr_url.trim_end_matches('/').to_string(),
            deep_links,
        }
    }

    pub fn for_run(pr: &PullRequest, mode: AuditMode) -> Self {
        Self::new(pr.number, &pr.url, mode.wants_locations())
    }

    /// A marker that never matches, for listing a checklist outside of any
    /// pull request.
    pub fn disabled() -> Self {
        IdempotencyMarker {
            needle: String::new(),
            pr_url: String::new(),
            deep_links: false,
        }
    }

    /// The literal marker text, e.g. `PR #42`.
    pub fn text(&self) -> &str {
        &self.needle
    }

    pub fn is_present(&self, text: &str, links: &[String]) -> bool {
        if self.needle.is_empty() {
            return false;
        }
        self.text_has_marker(text)
            || links.iter().any(|href| {
                href.trim_end_matches('/') == self.pr_url
                    || (self.deep_links && href.contains("/blob/"))
            })
    }

    // `PR #4` must not match inside `PR #42`.
    fn text_has_marker(&self, text: &str) -> bool {
        text.match_indices(&self.needle).any(|(start, _)| {
            !text[start + self.needle.len()..].starts_with(|c: char| c.is_ascii_digit())
        })
    }
}

fn anchor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:lines?)?L?(\d+)(?:-L?(\d+)|,(\d+))?$")
            .expect("anchor pattern is valid")
    })
}

/// Normalize an oracle-reported line range into a `#L10-L42` style anchor
/// (without the `#`).
///
/// Accepts `10`, `10-42`, `L10-42`, `L10-L42`, `lines 10-42`, en-dash
/// variants and any letter case. A reversed range is reordered. The hunk
/// header form `start,count` (`10,33` or `+10,33`) covers `count` lines
/// from `start`. Anything else is passed through with whitespace removed;
/// an empty range yields `None`.
pub fn normalize_line_anchor(range: &str) -> Option<String> {
    let cleaned: String = range
        .trim()
        .trim_start_matches(['#', '+'])
        .replace(['\u{2013}', '\u{2014}'], "-")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    match line_span(&cleaned) {
        Some((start, end)) if end > start => Some(format!("L{start}-L{end}")),
        Some((start, _)) => Some(format!("L{start}")),
        None => Some(cleaned),
    }
}

// First and last line of a recognized range, in ascending order.
fn line_span(cleaned: &str) -> Option<(u64, u64)> {
    let caps = anchor_pattern().captures(cleaned)?;
    let start: u64 = caps[1].parse().ok()?;

    if let Some(end) = caps.get(2) {
        let end: u64 = end.as_str().parse().ok()?;
        return Some((start.min(end), start.max(end)));
    }
    if let Some(count) = caps.get(3) {
        let count: u64 = count.as_str().parse().ok()?;
        let last = start.checked_add(count.saturating_sub(1))?;
        return Some((start, last));
    }
    Some((start, start))
}

/// Clean a repository-relative path reported by the oracle.
///
/// Strips leading slashes and the `b/` prefix of the new-file side of a
/// unified diff. Other leading directories, `a/` included, are kept.
pub fn normalize_file_path(path: &str) -> String {
    let path = path.trim().trim_start_matches('/');
    path.strip_prefix("b/").unwrap_or(path).to_string()
}

/// The text and target of one appended annotation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub text: String,
    pub url: String,
}

/// Builds annotation runs for matches of one pull request.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    pr: PullRequest,
    mode: AuditMode,
}

impl LinkBuilder {
    pub fn new(pr: PullRequest, mode: AuditMode) -> Self {
        LinkBuilder { pr, mode }
    }

    /// `https://<host>/<repo>/blob/<sha>/<path>#<anchor>`, when the match and
    /// the pull request carry enough to build it.
    pub fn deep_link(&self, m: &MatchResult) -> Option<String> {
        let path = m.file_path.as_deref().map(normalize_file_path)?;
        if path.is_empty() {
            return None;
        }
        let repo = self.pr.repository.as_deref()?;
        let sha = self.pr.head_sha.as_deref()?;

        let mut url = format!("{}/{}/blob/{}/{}", self.pr.server_url, repo, sha, path);
        if let Some(anchor) = m.line_range.as_deref().and_then(normalize_line_anchor) {
            url.push('#');
            url.push_str(&anchor);
        }
        Some(url)
    }

    pub fn annotation(&self, m: &MatchResult) -> Annotation {
        let marker = format!(" [PR #{}]", self.pr.number);

        if self.mode == AuditMode::Checklist {
            return Annotation {
                text: marker,
                url: self.pr.url.clone(),
            };
        }

        let Some(url) = self.deep_link(m) else {
            return Annotation {
                text: with_summary(marker, m.summary.as_deref()),
                url: self.pr.url.clone(),
            };
        };

        let path = m
            .file_path
            .as_deref()
            .map(normalize_file_path)
            .unwrap_or_default();
        let location = match m.line_range.as_deref().and_then(normalize_line_anchor) {
            Some(anchor) => format!("{path}#{anchor}"),
            None => path,
        };
        Annotation {
            text: with_summary(format!("{marker} {location}"), m.summary.as_deref()),
            url,
        }
    }
}

fn with_summary(text: String, summary: Option<&str>) -> String {
    match summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!("{text} — {summary}"),
        None => text,
    }
}
