//! Structured observability hooks for the spec-mirror run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via the `RunSpan` RAII guard
//! - Emission functions for each workflow step: diff load, checklist fetch,
//!   oracle verdict, block updates and the terminal outcome
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::{info, warn};

use crate::config::AuditMode;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("3f2c...", 42);
/// // every event below carries run_id and pr_number
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id and pull request.
    pub fn enter(run_id: &str, pr_number: u64) -> Self {
        let span = tracing::info_span!("spec_mirror.run", run_id = %run_id, pr_number = pr_number);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, pr_number: u64, mode: AuditMode, dry_run: bool) {
    info!(
        event = "run.started",
        run_id = %run_id,
        pr_number = pr_number,
        mode = %mode,
        dry_run = dry_run,
    );
}

/// Emit event: diff loaded (and whether it was cut to the budget).
pub fn emit_diff_loaded(chars: usize, limit: usize, truncated: bool) {
    if truncated {
        warn!(event = "diff.truncated", chars = chars, limit = limit);
    } else {
        info!(event = "diff.loaded", chars = chars);
    }
}

/// Emit event: run skipped without error.
pub fn emit_run_skipped(run_id: &str, reason: &dyn std::fmt::Display) {
    info!(event = "run.skipped", run_id = %run_id, reason = %reason);
}

/// Emit event: checklist fetched and filtered.
pub fn emit_checklist_fetched(page_id: &str, blocks: usize, items: usize, already_linked: usize) {
    info!(
        event = "checklist.fetched",
        page_id = %page_id,
        blocks = blocks,
        items = items,
        already_linked = already_linked,
    );
}

/// Emit event: oracle answered.
pub fn emit_oracle_verdict(model: &str, matched: usize) {
    info!(event = "oracle.verdict", model = %model, matched = matched);
}

/// Emit event: a matched id was not written (unknown, duplicate, or already linked).
pub fn emit_match_skipped(block_id: &str, reason: &str) {
    info!(event = "match.skipped", block_id = %block_id, reason = reason);
}

/// Emit event: a block was annotated (or would have been, on a dry run).
pub fn emit_block_updated(block_id: &str, link: &str, dry_run: bool) {
    info!(event = "block.updated", block_id = %block_id, link = %link, dry_run = dry_run);
}

/// Emit event: run finished successfully.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, matched: usize, updated: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        matched = matched,
        updated = updated,
    );
}

/// Emit event: run failed (error level).
pub fn emit_run_failed(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "run.failed", run_id = %run_id, error = %error);
}
