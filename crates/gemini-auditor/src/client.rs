//! Gemini `generateContent` client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use tracing::debug;

use spec_mirror_core::oracle::{AuditOracle, OracleResult};
use spec_mirror_core::{ApiKey, AuditRequest, OracleError};

use crate::wire::{self, GenerateRequest};

/// Public Generative Language API base.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-request timeout. Audits of large diffs are slow.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: ApiKey,
    /// Model name, e.g. `gemini-2.5-flash`
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: ApiKey, model: &str) -> Self {
        GeminiConfig {
            api_key,
            model: model.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`AuditOracle`] backed by Gemini.
pub struct GeminiAuditor {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiAuditor {
    pub fn new(config: GeminiConfig) -> OracleResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("spec-mirror-gemini-auditor/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(GeminiAuditor {
            config,
            http_client,
        })
    }

    pub(crate) fn generate_request(&self, request: &AuditRequest) -> RequestBuilder {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.model
        );
        self.http_client
            .post(url)
            .header("x-goog-api-key", self.config.api_key.expose())
            .json(&GenerateRequest::from(request))
    }
}

#[async_trait]
impl AuditOracle for GeminiAuditor {
    async fn judge(&self, request: &AuditRequest) -> OracleResult<String> {
        debug!(
            model = %self.config.model,
            mode = %request.mode,
            prompt_chars = request.prompt.len(),
            "submitting audit"
        );

        let response = self
            .generate_request(request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                message: wire::error_message(&body),
            });
        }
        wire::extract_text(&body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spec_mirror_core::{response_schema, AuditMode};

    #[test]
    fn test_generate_request_shape() {
        let auditor =
            GeminiAuditor::new(GeminiConfig::new(ApiKey::new("g-key"), "gemini-2.5-flash"))
                .unwrap();
        let request = AuditRequest {
            mode: AuditMode::Checklist,
            prompt: "audit".to_string(),
            response_schema: response_schema(AuditMode::Checklist),
            temperature: 0.1,
        };

        let built = auditor.generate_request(&request).build().unwrap();

        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(
            built.url().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(built.headers()["x-goog-api-key"], "g-key");
        assert_eq!(auditor.model(), "gemini-2.5-flash");
    }

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::new(ApiKey::new("k"), "m");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }
}
