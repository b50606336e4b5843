//! Spec Mirror core: audit a pull-request diff against a Notion spec checklist.
//!
//! The milestone description of a pull request points at a Notion page whose
//! to-do and bullet items are the spec. A run loads the diff, finds the page,
//! lists its items, asks a language model which items the diff implements,
//! and annotates those items with a link back to the pull request.
//!
//! ## Key Components
//!
//! - `RunConfig`: validated configuration for one run
//! - `DocumentStore`: async seam over the Notion blocks API
//! - `AuditOracle`: async seam over the model call; `parse_verdict` is shared
//! - `SpecMirror`: the ordered run, returning a `RunOutcome`
//!
//! In-memory implementations of both seams live in [`fakes`].

pub mod checklist;
pub mod config;
pub mod diff;
mod error;
pub mod fakes;
pub mod link;
pub mod obs;
pub mod oracle;
pub mod pipeline;
pub mod reference;
pub mod store;
pub mod telemetry;
pub mod writer;

pub use checklist::{Block, BlockKind, Checklist, SpecItem, TextRun};
pub use config::{ApiKey, AuditMode, DiffSource, PullRequest, RawConfig, RunConfig};
pub use diff::DiffBlob;
pub use error::{ConfigError, MirrorError, OracleError, Result, StoreError};
pub use link::{normalize_line_anchor, Annotation, IdempotencyMarker, LinkBuilder};
pub use oracle::{
    build_prompt, parse_verdict, response_schema, AuditOracle, AuditRequest, MatchResult,
    OracleResult,
};
pub use pipeline::{fetch_checklist, RunOutcome, RunReport, SkipReason, SpecMirror};
pub use reference::{extract_page_id, PageId};
pub use store::{Annotations, BlockUpdate, DocumentStore, RichTextRun, StoreResult};
pub use writer::{ResultWriter, WriteSummary};
