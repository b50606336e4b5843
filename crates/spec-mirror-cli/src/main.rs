//! Spec Mirror CLI
//!
//! The `spec-mirror` command audits a pull request against the Notion spec
//! checklist referenced by its milestone, and links implemented items back
//! to the pull request.
//!
//! ## Commands
//!
//! - `run`: audit the diff and annotate matched items
//! - `specs`: list the checklist items of the referenced page
//! - `extract-id`: print the page id found in a piece of text
//!
//! Every option falls back to the environment variable named in its help,
//! and a `.env` file in the working directory is loaded first.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use gemini_auditor::{GeminiAuditor, GeminiConfig};
use notion_blocks::{NotionClient, NotionConfig};
use spec_mirror_core::config::vars;
use spec_mirror_core::{
    extract_page_id, fetch_checklist, ApiKey, AuditMode, IdempotencyMarker, RawConfig, RunConfig,
    RunOutcome, SpecMirror,
};

#[derive(Parser)]
#[command(name = "spec-mirror")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Audit pull-request diffs against Notion spec checklists", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit the diff and annotate implemented spec items
    Run(RunArgs),

    /// List the spec items of the page referenced by the milestone
    Specs(SpecsArgs),

    /// Print the Notion page id embedded in TEXT
    ExtractId {
        /// Milestone description or Notion URL
        text: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Notion integration token
    #[arg(long, env = vars::NOTION_KEY, hide_env_values = true)]
    notion_key: Option<String>,

    /// Gemini API key
    #[arg(long, env = vars::GOOGLE_API_KEY, hide_env_values = true)]
    google_api_key: Option<String>,

    /// Diff file to audit (`-` reads stdin)
    #[arg(long, env = vars::DIFF_FILE_PATH)]
    diff_file: Option<String>,

    /// Diff text, used when no diff file is given
    #[arg(long, env = vars::PR_DIFF, hide_env_values = true)]
    diff: Option<String>,

    /// Milestone description holding the spec page link
    #[arg(long, env = vars::PR_MILESTONE_DESC)]
    milestone: Option<String>,

    /// Pull request number
    #[arg(long, env = vars::PR_NUMBER)]
    pr_number: Option<String>,

    /// Pull request URL
    #[arg(long, env = vars::PR_URL)]
    pr_url: Option<String>,

    /// Head commit SHA (traceable mode)
    #[arg(long, env = vars::PR_HEAD_SHA)]
    head_sha: Option<String>,

    /// Repository as owner/name (traceable mode)
    #[arg(long, env = vars::GITHUB_REPOSITORY)]
    repository: Option<String>,

    /// Source host for deep links
    #[arg(long, env = vars::GITHUB_SERVER_URL)]
    server_url: Option<String>,

    /// Audit mode: checklist or traceable
    #[arg(long, env = vars::SPEC_MIRROR_MODE)]
    mode: Option<String>,

    /// Gemini model name
    #[arg(long, env = vars::GEMINI_MODEL)]
    model: Option<String>,

    /// Maximum diff length in characters
    #[arg(long, env = vars::SPEC_MIRROR_DIFF_LIMIT)]
    diff_limit: Option<String>,

    /// Log intended updates without writing them
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    endpoints: EndpointArgs,
}

impl RunArgs {
    fn into_parts(self) -> (RawConfig, EndpointArgs) {
        let raw = RawConfig {
            notion_key: self.notion_key,
            google_api_key: self.google_api_key,
            diff_file: self.diff_file,
            diff_inline: self.diff,
            milestone: self.milestone,
            pr_number: self.pr_number,
            pr_url: self.pr_url,
            head_sha: self.head_sha,
            repository: self.repository,
            server_url: self.server_url,
            mode: self.mode,
            model: self.model,
            diff_limit: self.diff_limit,
            dry_run: self.dry_run,
        };
        (raw, self.endpoints)
    }
}

#[derive(Args, Debug)]
struct SpecsArgs {
    /// Notion integration token
    #[arg(long, env = vars::NOTION_KEY, hide_env_values = true)]
    notion_key: Option<String>,

    /// Milestone description (or Notion URL) holding the spec page link
    #[arg(long, env = vars::PR_MILESTONE_DESC)]
    milestone: Option<String>,

    /// Audit mode: checklist or traceable
    #[arg(long, env = vars::SPEC_MIRROR_MODE)]
    mode: Option<String>,

    /// Pull request number, to flag items already linked to it
    #[arg(long, env = vars::PR_NUMBER)]
    pr_number: Option<String>,

    /// Pull request URL, to flag items already linked to it
    #[arg(long, env = vars::PR_URL)]
    pr_url: Option<String>,

    #[command(flatten)]
    endpoints: EndpointArgs,
}

/// API base overrides (proxies, local test servers).
#[derive(Args, Debug)]
struct EndpointArgs {
    #[arg(long, env = "NOTION_API_BASE", hide = true)]
    notion_api_base: Option<String>,

    #[arg(long, env = "GEMINI_API_BASE", hide = true)]
    gemini_api_base: Option<String>,
}

impl EndpointArgs {
    fn notion(&self, token: ApiKey) -> Result<NotionClient> {
        let mut config = NotionConfig::new(token);
        if let Some(base) = &self.notion_api_base {
            config = config.with_api_base(base);
        }
        NotionClient::new(config).context("Failed to create Notion client")
    }

    fn gemini(&self, api_key: ApiKey, model: &str) -> Result<GeminiAuditor> {
        let mut config = GeminiConfig::new(api_key, model);
        if let Some(base) = &self.gemini_api_base {
            config = config.with_api_base(base);
        }
        GeminiAuditor::new(config).context("Failed to create Gemini client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    spec_mirror_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Specs(args) => cmd_specs(args).await,
        Commands::ExtractId { text } => cmd_extract_id(&text),
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let (raw, endpoints) = args.into_parts();
    let config = RunConfig::resolve(raw).context("Invalid configuration")?;

    let store = endpoints.notion(config.notion_key.clone())?;
    let oracle = endpoints.gemini(config.google_api_key.clone(), &config.model)?;
    let mirror = SpecMirror::new(config, Arc::new(store), Arc::new(oracle));

    let outcome = mirror.run().await.context("Spec audit failed")?;
    match outcome {
        RunOutcome::Skipped { reason } => {
            println!("Skipped: {reason}");
        }
        RunOutcome::Completed(report) => {
            let suffix = if report.dry_run { " (dry run)" } else { "" };
            println!(
                "Audited {} spec item(s) on page {}: {} matched, {} updated{}",
                report.audited, report.page_id, report.matched, report.updated, suffix
            );
            if report.already_linked > 0 {
                println!("  {} already linked to this pull request", report.already_linked);
            }
            if report.unknown > 0 {
                println!("  {} unknown id(s) ignored", report.unknown);
            }
            if report.diff_truncated {
                println!("  diff was truncated to the configured limit");
            }
        }
    }
    Ok(())
}

async fn cmd_specs(args: SpecsArgs) -> Result<()> {
    let Some(notion_key) = args.notion_key.filter(|k| !k.trim().is_empty()) else {
        bail!("missing required configuration: {}", vars::NOTION_KEY);
    };
    let mode = match args.mode.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(text) => text.parse::<AuditMode>()?,
        None => AuditMode::default(),
    };

    let milestone = args.milestone.unwrap_or_default();
    let Some(page_id) = extract_page_id(&milestone) else {
        println!("No spec page referenced");
        return Ok(());
    };

    let marker = match (args.pr_number, args.pr_url) {
        (Some(number), Some(url)) => {
            let number = number
                .trim()
                .trim_start_matches('#')
                .parse::<u64>()
                .with_context(|| format!("Invalid pull request number '{number}'"))?;
            IdempotencyMarker::new(number, &url, mode.wants_locations())
        }
        _ => IdempotencyMarker::disabled(),
    };

    let store = args.endpoints.notion(ApiKey::new(notion_key))?;
    let checklist = fetch_checklist(&store, &page_id, mode, &marker).await?;
    info!(page_id = %page_id, items = checklist.len(), "checklist loaded");

    println!("Page {page_id}: {} spec item(s)", checklist.len());
    for item in checklist.items() {
        let tick = if item.checked { "x" } else { " " };
        let linked = if item.already_linked { "  (linked)" } else { "" };
        println!("[{tick}] {}  {}{linked}", item.id, item.text);
    }
    Ok(())
}

fn cmd_extract_id(text: &str) -> Result<()> {
    match extract_page_id(text) {
        Some(page_id) => {
            println!("{page_id}");
            Ok(())
        }
        None => bail!("No Notion page id found"),
    }
}
