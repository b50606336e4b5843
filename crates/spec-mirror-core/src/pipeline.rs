//! The audit run: diff, page reference, checklist, oracle, write-back.
//!
//! A run is a single ordered pass with no retries. Every step either hands
//! its output to the next one or ends the run:
//!
//! ```text
//! start -> diff -> reference -> checklist -> oracle -> write -> Completed
//!                      |            |
//!                      +-> Skipped  +-> Skipped (no items)
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use crate::checklist::Checklist;
use crate::config::{AuditMode, RunConfig};
use crate::diff::DiffBlob;
use crate::error::{MirrorError, Result};
use crate::link::{IdempotencyMarker, LinkBuilder};
use crate::obs::{self, RunSpan};
use crate::oracle::{parse_verdict, AuditOracle, AuditRequest};
use crate::reference::{extract_page_id, PageId};
use crate::store::DocumentStore;
use crate::writer::ResultWriter;

/// Why a run ended without doing anything. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The milestone text holds no page id
    NoDocumentReference,
    /// The page has no auditable items
    NoSpecItems { page_id: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoDocumentReference => {
                write!(f, "milestone description does not reference a spec page")
            }
            SkipReason::NoSpecItems { page_id } => {
                write!(f, "spec page {page_id} has no checklist items")
            }
        }
    }
}

/// Counts for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub page_id: String,
    pub mode: AuditMode,
    /// Spec items offered to the oracle
    pub audited: usize,
    pub matched: usize,
    pub unknown: usize,
    pub already_linked: usize,
    pub updated: usize,
    pub diff_truncated: bool,
    pub dry_run: bool,
}

/// Terminal state of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Skipped { reason: SkipReason },
    Completed(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Skipped { .. } => None,
        }
    }
}

/// Fetch a page's children and keep the items auditable in `mode`.
pub async fn fetch_checklist(
    store: &dyn DocumentStore,
    page_id: &PageId,
    mode: AuditMode,
    marker: &IdempotencyMarker,
) -> Result<Checklist> {
    let blocks = store
        .list_children(page_id.as_str())
        .await
        .map_err(|source| MirrorError::Fetch {
            page_id: page_id.to_string(),
            source,
        })?;
    let checklist = Checklist::from_blocks(&blocks, mode.block_kinds(), marker);

    let linked = checklist.items().iter().filter(|i| i.already_linked).count();
    obs::emit_checklist_fetched(page_id.as_str(), blocks.len(), checklist.len(), linked);
    Ok(checklist)
}

/// One configured audit run.
pub struct SpecMirror {
    config: RunConfig,
    store: Arc<dyn DocumentStore>,
    oracle: Arc<dyn AuditOracle>,
}

impl SpecMirror {
    pub fn new(
        config: RunConfig,
        store: Arc<dyn DocumentStore>,
        oracle: Arc<dyn AuditOracle>,
    ) -> Self {
        SpecMirror {
            config,
            store,
            oracle,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the run once.
    pub async fn run(&self) -> Result<RunOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let pr = &self.config.pull_request;
        let _span = RunSpan::enter(&run_id, pr.number);
        let started = Instant::now();
        obs::emit_run_started(&run_id, pr.number, self.config.mode, self.config.dry_run);

        match self.execute(&run_id).await {
            Ok(RunOutcome::Skipped { reason }) => {
                obs::emit_run_skipped(&run_id, &reason);
                Ok(RunOutcome::Skipped { reason })
            }
            Ok(RunOutcome::Completed(report)) => {
                obs::emit_run_finished(
                    &run_id,
                    started.elapsed().as_millis() as u64,
                    report.matched,
                    report.updated,
                );
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                obs::emit_run_failed(&run_id, &e);
                Err(e)
            }
        }
    }

    async fn execute(&self, run_id: &str) -> Result<RunOutcome> {
        let config = &self.config;

        let diff = DiffBlob::load(&config.diff_source, config.diff_limit)?;
        obs::emit_diff_loaded(diff.original_chars(), config.diff_limit, diff.is_truncated());
        if diff.is_empty() {
            warn!("diff is empty; the oracle is unlikely to match anything");
        }

        let Some(page_id) = extract_page_id(&config.milestone) else {
            return Ok(RunOutcome::Skipped {
                reason: SkipReason::NoDocumentReference,
            });
        };

        let marker = IdempotencyMarker::for_run(&config.pull_request, config.mode);
        let checklist =
            fetch_checklist(self.store.as_ref(), &page_id, config.mode, &marker).await?;
        if checklist.is_empty() {
            return Ok(RunOutcome::Skipped {
                reason: SkipReason::NoSpecItems {
                    page_id: page_id.to_string(),
                },
            });
        }

        let request = AuditRequest::new(&checklist, &diff, config.mode);
        let verdict = self.oracle.judge(&request).await?;
        let matches = parse_verdict(&verdict, config.mode)?;
        obs::emit_oracle_verdict(self.oracle.model(), matches.len());

        let writer = ResultWriter::new(
            self.store.clone(),
            LinkBuilder::new(config.pull_request.clone(), config.mode),
            config.dry_run,
        );
        let summary = writer.apply(&checklist, &matches).await?;

        Ok(RunOutcome::Completed(RunReport {
            run_id: run_id.to_string(),
            page_id: page_id.to_string(),
            mode: config.mode,
            audited: checklist.len(),
            matched: summary.matched,
            unknown: summary.unknown,
            already_linked: summary.already_linked,
            updated: summary.updated,
            diff_truncated: diff.is_truncated(),
            dry_run: config.dry_run,
        }))
    }
}
