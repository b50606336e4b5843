//! In-memory fakes for the store and oracle seams (testing only)
//!
//! `MemoryDocumentStore` keeps pages as block lists and applies updates to
//! them, so a second run observes the first run's annotations.
//! `StubOracle` answers every request with fixed verdict text.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checklist::{Block, TextRun};
use crate::error::{OracleError, StoreError};
use crate::oracle::{AuditOracle, AuditRequest, OracleResult};
use crate::store::{BlockUpdate, DocumentStore, StoreResult, PAGE_SIZE};

// ---------------------------------------------------------------------------
// MemoryDocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store backed by `HashMap<page_id, blocks>`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    pages: Mutex<HashMap<String, Vec<Block>>>,
    list_calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, BlockUpdate)>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a page with child blocks.
    pub fn with_page(self, page_id: &str, blocks: Vec<Block>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(page_id.to_string(), blocks);
        self
    }

    /// Make every update to `block_id` fail with a 500.
    pub fn fail_updates_for(&self, block_id: &str) {
        self.failing.lock().unwrap().insert(block_id.to_string());
    }

    /// Page ids passed to `list_children`, in call order.
    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Successful updates, in call order.
    pub fn updates(&self) -> Vec<(String, BlockUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    /// Total calls of either kind.
    pub fn call_count(&self) -> usize {
        self.list_calls.lock().unwrap().len() + self.updates.lock().unwrap().len()
    }

    /// Current state of a block.
    pub fn block(&self, block_id: &str) -> Option<Block> {
        self.pages
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|b| b.id == block_id)
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_children(&self, page_id: &str) -> StoreResult<Vec<Block>> {
        self.list_calls.lock().unwrap().push(page_id.to_string());
        let pages = self.pages.lock().unwrap();
        pages
            .get(page_id)
            .map(|blocks| blocks.iter().take(PAGE_SIZE).cloned().collect())
            .ok_or_else(|| StoreError::Status {
                status: 404,
                message: format!("Could not find block with ID: {page_id}"),
            })
    }

    async fn update_block(&self, block_id: &str, update: &BlockUpdate) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(block_id) {
            return Err(StoreError::Status {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        let mut pages = self.pages.lock().unwrap();
        let block = pages
            .values_mut()
            .flatten()
            .find(|b| b.id == block_id)
            .ok_or_else(|| StoreError::BlockNotFound {
                block_id: block_id.to_string(),
            })?;

        block.rich_text = update
            .rich_text()
            .iter()
            .map(|run| TextRun {
                plain_text: run.content.clone(),
                href: run.link.clone(),
            })
            .collect();
        if let Some(checked) = update.checked() {
            block.checked = Some(checked);
        }
        drop(pages);

        self.updates
            .lock()
            .unwrap()
            .push((block_id.to_string(), update.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StubOracle
// ---------------------------------------------------------------------------

/// Oracle that returns canned verdict text (or a transport error).
#[derive(Debug)]
pub struct StubOracle {
    reply: Result<String, String>,
    requests: Mutex<Vec<AuditRequest>>,
}

impl StubOracle {
    /// Answer every request with `verdict`.
    pub fn replying(verdict: impl Into<String>) -> Self {
        StubOracle {
            reply: Ok(verdict.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with `OracleError::Transport(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        StubOracle {
            reply: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<AuditRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditOracle for StubOracle {
    async fn judge(&self, request: &AuditRequest) -> OracleResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().map_err(OracleError::Transport)
    }

    fn model(&self) -> &str {
        "stub"
    }
}
