//! Audit oracle seam.
//!
//! An [`AuditOracle`] receives one [`AuditRequest`] (prompt plus the JSON
//! schema the answer must follow) and returns the raw verdict text.
//! [`parse_verdict`] turns that text into [`MatchResult`]s and is shared by
//! every oracle implementation, fakes included.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::checklist::Checklist;
use crate::config::AuditMode;
use crate::diff::DiffBlob;
use crate::error::OracleError;

/// Result type for oracle operations
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Sampling temperature for every audit call.
pub const AUDIT_TEMPERATURE: f32 = 0.1;

/// One item the oracle judged implemented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl MatchResult {
    pub fn id_only(id: impl Into<String>) -> Self {
        MatchResult {
            id: id.into(),
            file_path: None,
            line_range: None,
            summary: None,
        }
    }
}

/// A fully built oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRequest {
    pub mode: AuditMode,
    pub prompt: String,
    pub response_schema: Value,
    pub temperature: f32,
}

impl AuditRequest {
    pub fn new(checklist: &Checklist, diff: &DiffBlob, mode: AuditMode) -> Self {
        AuditRequest {
            mode,
            prompt: build_prompt(checklist, diff, mode),
            response_schema: response_schema(mode),
            temperature: AUDIT_TEMPERATURE,
        }
    }
}

/// Judges which spec items a diff implements.
#[async_trait]
pub trait AuditOracle: Send + Sync {
    /// Submit the request and return the model's verdict text unparsed.
    async fn judge(&self, request: &AuditRequest) -> OracleResult<String>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

/// Build the audit prompt: spec lines, diff, then the rules.
pub fn build_prompt(checklist: &Checklist, diff: &DiffBlob, mode: AuditMode) -> String {
    let mut prompt = String::from(
        "You are a code auditor. Decide which specification items the code diff implements.\n\n",
    );

    prompt.push_str("[Specs]\n");
    for item in checklist.items() {
        let _ = writeln!(prompt, "- [ID: {}] {}", item.id, item.text);
    }

    prompt.push_str("\n[Code Diff]\n");
    prompt.push_str(diff.as_str());
    if !diff.as_str().ends_with('\n') {
        prompt.push('\n');
    }

    prompt.push_str("\n[Rules]\n");
    prompt.push_str("1. Only include IDs where actual code logic implements the spec.\n");
    prompt.push_str("2. Ignore comments or documentation changes.\n");
    prompt.push_str("3. Only use IDs that appear in the [Specs] list.\n");
    if mode.wants_locations() {
        prompt.push_str(
            "4. For each match give the file_path of the implementing file relative to the \
             repository root, and the line_range of the implementing lines in the new version \
             of the file (read it from the `+start,count` side of the hunk header, \
             e.g. \"10-42\").\n",
        );
        prompt.push_str("5. Give a one-sentence summary of how the code implements the item.\n");
    }

    prompt
}

/// The JSON schema the answer must follow, in the model API's dialect.
pub fn response_schema(mode: AuditMode) -> Value {
    match mode {
        AuditMode::Checklist => json!({
            "type": "OBJECT",
            "properties": {
                "matched_ids": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["matched_ids"]
        }),
        AuditMode::Traceable => json!({
            "type": "OBJECT",
            "properties": {
                "matches": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "file_path": { "type": "STRING" },
                            "line_range": { "type": "STRING" },
                            "summary": { "type": "STRING" }
                        },
                        "required": ["id", "file_path", "line_range"]
                    }
                }
            },
            "required": ["matches"]
        }),
    }
}

#[derive(Deserialize)]
struct ChecklistVerdict {
    #[serde(alias = "implemented_ids")]
    matched_ids: Vec<String>,
}

#[derive(Deserialize)]
struct TraceableVerdict {
    matches: Vec<LocatedMatch>,
}

// Traceable answers must carry a location; only the summary is optional.
#[derive(Deserialize)]
struct LocatedMatch {
    id: String,
    file_path: String,
    line_range: String,
    #[serde(default)]
    summary: Option<String>,
}

impl From<LocatedMatch> for MatchResult {
    fn from(m: LocatedMatch) -> Self {
        MatchResult {
            id: m.id,
            file_path: Some(m.file_path),
            line_range: Some(m.line_range),
            summary: m.summary,
        }
    }
}

/// Parse verdict text strictly against the mode's schema.
///
/// A surrounding markdown code fence is tolerated. Anything else that is
/// not the declared JSON shape is [`OracleError::MalformedVerdict`].
pub fn parse_verdict(text: &str, mode: AuditMode) -> OracleResult<Vec<MatchResult>> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(OracleError::MalformedVerdict("empty verdict".to_string()));
    }

    let malformed = |e: serde_json::Error| OracleError::MalformedVerdict(e.to_string());
    match mode {
        AuditMode::Checklist => {
            let verdict: ChecklistVerdict = serde_json::from_str(body).map_err(malformed)?;
            Ok(verdict
                .matched_ids
                .into_iter()
                .map(MatchResult::id_only)
                .collect())
        }
        AuditMode::Traceable => {
            let verdict: TraceableVerdict = serde_json::from_str(body).map_err(malformed)?;
            Ok(verdict.matches.into_iter().map(MatchResult::from).collect())
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}
