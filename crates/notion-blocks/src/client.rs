//! Notion blocks API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use tracing::{debug, warn};

use spec_mirror_core::store::{DocumentStore, StoreResult, PAGE_SIZE};
use spec_mirror_core::{ApiKey, Block, BlockUpdate, StoreError};

use crate::wire;

/// Public Notion API base.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// API version pinned for every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Notion client configuration
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Integration token
    pub token: ApiKey,
    /// API base URL (overridable for tests and proxies)
    pub api_base: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl NotionConfig {
    pub fn new(token: ApiKey) -> Self {
        NotionConfig {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the client at a different API base
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`DocumentStore`] backed by the Notion blocks API.
pub struct NotionClient {
    config: NotionConfig,
    http_client: reqwest::Client,
}

impl NotionClient {
    /// Create a new Notion client
    pub fn new(config: NotionConfig) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("spec-mirror-notion-blocks/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(NotionClient {
            config,
            http_client,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(self.config.token.expose())
            .header("Notion-Version", NOTION_VERSION)
    }

    pub(crate) fn list_request(&self, page_id: &str) -> RequestBuilder {
        let url = format!("{}/blocks/{}/children", self.config.api_base, page_id);
        self.authorized(self.http_client.get(url))
            .query(&[("page_size", PAGE_SIZE)])
    }

    pub(crate) fn update_request(&self, block_id: &str, update: &BlockUpdate) -> RequestBuilder {
        let url = format!("{}/blocks/{}", self.config.api_base, block_id);
        self.authorized(self.http_client.patch(url))
            .json(&wire::update_body(update))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<(StatusCode, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait]
impl DocumentStore for NotionClient {
    async fn list_children(&self, page_id: &str) -> StoreResult<Vec<Block>> {
        debug!(page_id = %page_id, "listing page children");
        let (status, body) = self.send(self.list_request(page_id)).await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: wire::error_message(&body),
            });
        }

        let (blocks, has_more) = wire::parse_children(&body)?;
        if has_more {
            warn!(
                page_id = %page_id,
                page_size = PAGE_SIZE,
                "page has more children than one listing returns; the rest are not audited"
            );
        }
        Ok(blocks)
    }

    async fn update_block(&self, block_id: &str, update: &BlockUpdate) -> StoreResult<()> {
        debug!(block_id = %block_id, kind = %update.kind(), "updating block");
        let (status, body) = self.send(self.update_request(block_id, update)).await?;

        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::BlockNotFound {
                block_id: block_id.to_string(),
            }),
            s => Err(StoreError::Status {
                status: s.as_u16(),
                message: wire::error_message(&body),
            }),
        }
    }
}
