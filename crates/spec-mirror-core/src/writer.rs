//! Writes oracle matches back into the checklist page.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::checklist::Checklist;
use crate::error::{MirrorError, Result};
use crate::link::LinkBuilder;
use crate::obs;
use crate::oracle::MatchResult;
use crate::store::{BlockUpdate, DocumentStore};

/// Counts from one write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Distinct ids the oracle returned
    pub matched: usize,
    /// Ids not present in the checklist
    pub unknown: usize,
    /// Known ids skipped because a previous run annotated them
    pub already_linked: usize,
    /// Blocks updated (or, on a dry run, that would have been)
    pub updated: usize,
}

/// Applies matches to the store, one block update per new match.
pub struct ResultWriter {
    store: Arc<dyn DocumentStore>,
    links: LinkBuilder,
    dry_run: bool,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn DocumentStore>, links: LinkBuilder, dry_run: bool) -> Self {
        ResultWriter {
            store,
            links,
            dry_run,
        }
    }

    /// Annotate every matched, known, not-yet-linked item.
    ///
    /// Each id is handled at most once. The first failed update stops the
    /// pass; updates already issued stay applied and
    /// [`MirrorError::UpdateFailed`] reports how many there were.
    pub async fn apply(
        &self,
        checklist: &Checklist,
        matches: &[MatchResult],
    ) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        let mut seen = HashSet::new();

        for m in matches {
            if !seen.insert(m.id.as_str()) {
                obs::emit_match_skipped(&m.id, "duplicate");
                continue;
            }
            summary.matched += 1;

            let Some(item) = checklist.get(&m.id) else {
                summary.unknown += 1;
                obs::emit_match_skipped(&m.id, "unknown_id");
                continue;
            };
            if item.already_linked {
                summary.already_linked += 1;
                obs::emit_match_skipped(&m.id, "already_linked");
                continue;
            }

            let annotation = self.links.annotation(m);
            let update = BlockUpdate::annotate(item, &annotation);

            if self.dry_run {
                debug!(
                    block_id = %item.id,
                    text = %update.plain_text(),
                    "dry run, update not sent"
                );
            } else {
                self.store
                    .update_block(&item.id, &update)
                    .await
                    .map_err(|source| MirrorError::UpdateFailed {
                        block_id: item.id.clone(),
                        updated: summary.updated,
                        source,
                    })?;
            }

            summary.updated += 1;
            obs::emit_block_updated(&item.id, &annotation.url, self.dry_run);
        }

        Ok(summary)
    }
}
