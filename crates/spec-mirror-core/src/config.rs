//! Run configuration.
//!
//! Everything the workflow needs is resolved once, up front, into a
//! [`RunConfig`]. Values arrive as a [`RawConfig`] (filled from CLI flags,
//! which in turn fall back to the environment variables in [`vars`]) and are
//! validated by [`RunConfig::resolve`]. Missing required values fail here,
//! before any client is constructed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::checklist::BlockKind;
use crate::error::ConfigError;

/// Environment variable names read by the workflow.
pub mod vars {
    pub const NOTION_KEY: &str = "NOTION_KEY";
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    pub const DIFF_FILE_PATH: &str = "DIFF_FILE_PATH";
    pub const PR_DIFF: &str = "PR_DIFF";
    pub const PR_MILESTONE_DESC: &str = "PR_MILESTONE_DESC";
    pub const PR_NUMBER: &str = "PR_NUMBER";
    pub const PR_URL: &str = "PR_URL";
    pub const PR_HEAD_SHA: &str = "PR_HEAD_SHA";
    pub const GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
    pub const GITHUB_SERVER_URL: &str = "GITHUB_SERVER_URL";
    pub const SPEC_MIRROR_MODE: &str = "SPEC_MIRROR_MODE";
    pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
    pub const SPEC_MIRROR_DIFF_LIMIT: &str = "SPEC_MIRROR_DIFF_LIMIT";
}

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Maximum diff length (in characters) sent to the oracle.
pub const DEFAULT_DIFF_LIMIT: usize = 500_000;

/// Source host used to build deep links.
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Which flavour of audit to run.
///
/// | Mode        | Block kinds audited                   | Link target           |
/// |-------------|---------------------------------------|-----------------------|
/// | `Checklist` | to-do and bulleted items              | pull request URL      |
/// | `Traceable` | lists, paragraphs, headings, toggles  | file + line deep link |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    #[default]
    Checklist,
    Traceable,
}

impl AuditMode {
    /// Block kinds that count as spec items in this mode.
    pub fn block_kinds(&self) -> &'static [BlockKind] {
        match self {
            AuditMode::Checklist => &[BlockKind::ToDo, BlockKind::BulletedListItem],
            AuditMode::Traceable => &[
                BlockKind::ToDo,
                BlockKind::BulletedListItem,
                BlockKind::NumberedListItem,
                BlockKind::Paragraph,
                BlockKind::Heading1,
                BlockKind::Heading2,
                BlockKind::Heading3,
                BlockKind::Toggle,
            ],
        }
    }

    /// Whether the oracle is asked for file/line attribution.
    pub fn wants_locations(&self) -> bool {
        matches!(self, AuditMode::Traceable)
    }
}

impl std::fmt::Display for AuditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditMode::Checklist => write!(f, "checklist"),
            AuditMode::Traceable => write!(f, "traceable"),
        }
    }
}

impl std::str::FromStr for AuditMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checklist" => Ok(AuditMode::Checklist),
            "traceable" => Ok(AuditMode::Traceable),
            other => Err(ConfigError::Invalid {
                var: vars::SPEC_MIRROR_MODE,
                reason: format!("unknown mode '{other}' (expected checklist or traceable)"),
            }),
        }
    }
}

/// An API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Where the diff text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    /// Read from a file on disk
    File(PathBuf),
    /// Read from standard input (`-` as the file path)
    Stdin,
    /// Passed inline, e.g. through `PR_DIFF`
    Inline(String),
}

/// Pull-request metadata used for markers and links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub head_sha: Option<String>,
    pub repository: Option<String>,
    pub server_url: String,
}

/// Unvalidated configuration values. `None` and empty strings both mean
/// "not provided".
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub notion_key: Option<String>,
    pub google_api_key: Option<String>,
    pub diff_file: Option<String>,
    pub diff_inline: Option<String>,
    pub milestone: Option<String>,
    pub pr_number: Option<String>,
    pub pr_url: Option<String>,
    pub head_sha: Option<String>,
    pub repository: Option<String>,
    pub server_url: Option<String>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub diff_limit: Option<String>,
    pub dry_run: bool,
}

impl RawConfig {
    /// Collect values from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Collect values through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        RawConfig {
            notion_key: lookup(vars::NOTION_KEY),
            google_api_key: lookup(vars::GOOGLE_API_KEY),
            diff_file: lookup(vars::DIFF_FILE_PATH),
            diff_inline: lookup(vars::PR_DIFF),
            milestone: lookup(vars::PR_MILESTONE_DESC),
            pr_number: lookup(vars::PR_NUMBER),
            pr_url: lookup(vars::PR_URL),
            head_sha: lookup(vars::PR_HEAD_SHA),
            repository: lookup(vars::GITHUB_REPOSITORY),
            server_url: lookup(vars::GITHUB_SERVER_URL),
            mode: lookup(vars::SPEC_MIRROR_MODE),
            model: lookup(vars::GEMINI_MODEL),
            diff_limit: lookup(vars::SPEC_MIRROR_DIFF_LIMIT),
            dry_run: false,
        }
    }
}

/// Validated, read-only configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub notion_key: ApiKey,
    pub google_api_key: ApiKey,
    pub model: String,
    pub diff_source: DiffSource,
    pub diff_limit: usize,
    pub milestone: String,
    pub pull_request: PullRequest,
    pub mode: AuditMode,
    pub dry_run: bool,
}

impl RunConfig {
    /// Validate raw values into a run configuration.
    ///
    /// Required: both API keys, a diff source, the pull-request number and
    /// URL. `Traceable` mode additionally requires the head SHA and the
    /// repository name. The milestone may be empty (the run then skips).
    pub fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let notion_key = required(raw.notion_key, vars::NOTION_KEY)?;
        let google_api_key = required(raw.google_api_key, vars::GOOGLE_API_KEY)?;

        let diff_source = match (present(raw.diff_file), present(raw.diff_inline)) {
            (Some(path), _) if path == "-" => DiffSource::Stdin,
            (Some(path), _) => DiffSource::File(PathBuf::from(path)),
            (None, Some(text)) => DiffSource::Inline(text),
            (None, None) => return Err(ConfigError::NoDiffSource),
        };

        let number_text = required(raw.pr_number, vars::PR_NUMBER)?;
        let number = number_text
            .trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                var: vars::PR_NUMBER,
                reason: format!("'{number_text}' is not a pull request number: {e}"),
            })?;
        let url = required(raw.pr_url, vars::PR_URL)?;

        let mode = match present(raw.mode) {
            Some(text) => text.parse::<AuditMode>()?,
            None => AuditMode::default(),
        };

        let head_sha = present(raw.head_sha);
        let repository = present(raw.repository).map(|r| r.trim_matches('/').to_string());
        if mode == AuditMode::Traceable {
            if head_sha.is_none() {
                return Err(ConfigError::Missing {
                    var: vars::PR_HEAD_SHA,
                });
            }
            if repository.is_none() {
                return Err(ConfigError::Missing {
                    var: vars::GITHUB_REPOSITORY,
                });
            }
        }

        let diff_limit = match present(raw.diff_limit) {
            Some(text) => parse_limit(&text)?,
            None => DEFAULT_DIFF_LIMIT,
        };

        let server_url = present(raw.server_url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(RunConfig {
            notion_key: ApiKey::new(notion_key),
            google_api_key: ApiKey::new(google_api_key),
            model: present(raw.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            diff_source,
            diff_limit,
            milestone: raw.milestone.unwrap_or_default(),
            pull_request: PullRequest {
                number,
                url,
                head_sha,
                repository,
                server_url,
            },
            mode,
            dry_run: raw.dry_run,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, var: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing { var })
}

fn parse_limit(text: &str) -> Result<usize, ConfigError> {
    let limit = text
        .trim()
        .replace('_', "")
        .parse::<usize>()
        .map_err(|e| ConfigError::Invalid {
            var: vars::SPEC_MIRROR_DIFF_LIMIT,
            reason: e.to_string(),
        })?;
    if limit == 0 {
        return Err(ConfigError::Invalid {
            var: vars::SPEC_MIRROR_DIFF_LIMIT,
            reason: "limit must be greater than zero".to_string(),
        });
    }
    Ok(limit)
}
