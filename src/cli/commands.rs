//! CLI command definitions for prepline.
//!
//! This module provides a command-line surface over the lineage core:
//! listing and creating versions, driving a transformation pipeline to a
//! terminal status, and rendering the lineage tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use crate::api::{HttpVersionsApi, VersionsApi};
use crate::config::CoreConfig;
use crate::lineage::{Forest, LineageTreeBuilder, TreeLayout};
use crate::method::ColumnSelection;
use crate::model::{DataType, TaskId, VersionId};
use crate::pipeline::{PipelineOrchestrator, PollEvent, SessionContext};
use crate::store::{NewVersion, VersionStore};

/// Dataset preprocessing lineage inspector and pipeline runner.
#[derive(Parser)]
#[command(name = "prepline")]
#[command(about = "Inspect dataset version lineage and run preprocessing pipelines")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// List the versions of a task in creation order.
    List(ListArgs),

    /// Create a new version in RAW state.
    Create(CreateArgs),

    /// Submit a transformation for a RAW version and poll to completion.
    Run(RunArgs),

    /// Render the lineage tree of a task.
    Tree(TreeArgs),
}

/// Backend connection arguments shared by all commands.
#[derive(Parser, Debug)]
pub struct ConnectArgs {
    /// Base URL of the platform backend.
    #[arg(long, env = "PREPLINE_API_BASE")]
    pub api_base: String,

    /// Bearer token for the backend.
    #[arg(long, env = "PREPLINE_TOKEN")]
    pub token: Option<String>,

    /// Backend user id, merged into submission bodies.
    #[arg(long, env = "PREPLINE_USER_ID")]
    pub user_id: Option<i64>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Poll interval in seconds.
    #[arg(long, default_value_t = 5)]
    pub poll_interval_secs: u64,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Task whose versions to list.
    #[arg(long)]
    pub task: TaskId,

    /// Print the raw records as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `create` command.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Task to create the version under.
    #[arg(long)]
    pub task: TaskId,

    /// User-facing label.
    #[arg(long)]
    pub name: String,

    /// Parent version; omit to create a root.
    #[arg(long)]
    pub parent: Option<VersionId>,

    /// Transformation method id; required for derived versions.
    #[arg(long)]
    pub method: Option<i64>,

    /// Column classification as column=quantitative|qualitative pairs.
    /// Required for roots; overrides inheritance for derived versions.
    #[arg(long = "data-type", value_name = "COL=KIND")]
    pub data_types: Vec<String>,

    /// Opaque transformation config as a JSON document.
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Task that owns the version.
    #[arg(long)]
    pub task: TaskId,

    /// RAW version to submit.
    #[arg(long)]
    pub version: VersionId,

    /// Transformation family (e.g. imputation).
    #[arg(long)]
    pub technique: String,

    /// Concrete method within the family (e.g. mean).
    #[arg(long = "method")]
    pub method_name: String,

    /// Columns the transformation applies to.
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Minimum number of columns the method requires.
    #[arg(long, default_value_t = 1)]
    pub min_columns: usize,

    /// Method parameters as key=value pairs (value parsed as JSON, falling
    /// back to a plain string).
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

/// Arguments for the `tree` command.
#[derive(Parser, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Task whose lineage to render.
    #[arg(long)]
    pub task: TaskId,

    /// Print the positioned nodes and edges as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parses CLI arguments without executing commands.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the CLI with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::List(args) => run_list_command(args).await,
        Commands::Create(args) => run_create_command(args).await,
        Commands::Run(args) => run_run_command(args).await,
        Commands::Tree(args) => run_tree_command(args).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_api(connect: &ConnectArgs) -> anyhow::Result<Arc<HttpVersionsApi>> {
    let config = CoreConfig::new()
        .with_api_base(connect.api_base.clone())
        .with_http_timeout(Duration::from_secs(connect.http_timeout_secs))
        .with_poll_interval(Duration::from_secs(connect.poll_interval_secs));
    config.validate()?;

    Ok(Arc::new(HttpVersionsApi::new(
        config.api_base,
        connect.token.clone(),
        config.http_timeout,
    )))
}

async fn run_list_command(args: ListArgs) -> anyhow::Result<()> {
    let api = build_api(&args.connect)?;
    let store = VersionStore::new(api as Arc<dyn VersionsApi>, args.task);

    let versions = store.list_versions().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    for version in &versions {
        println!(
            "{:>6}  {:<10} {:<24} parent={}",
            version.id,
            version.status.to_string(),
            version.name,
            version
                .prev_version
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    info!(task_id = args.task, count = versions.len(), "Listed versions");
    Ok(())
}

async fn run_create_command(args: CreateArgs) -> anyhow::Result<()> {
    let api = build_api(&args.connect)?;
    let store = VersionStore::new(api as Arc<dyn VersionsApi>, args.task);
    store.list_versions().await?;

    let data_types = if args.data_types.is_empty() {
        None
    } else {
        Some(parse_data_types(&args.data_types)?)
    };

    let config = match &args.config {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Null,
    };

    let request = NewVersion {
        prev_version: args.parent,
        method_id: args.method,
        name: args.name,
        config,
        data_types,
    };

    let created = store.create_version(request).await?;
    if let Some(advisory) = store.take_advisory().await {
        warn!(error = %advisory, "Version created with degraded data types");
    }

    // The new version becomes the selection as soon as a snapshot holds it.
    store.refresh(Some(created.id)).await?;

    info!(
        version_id = created.id,
        status = %created.status,
        "Created version"
    );
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

async fn run_run_command(args: RunArgs) -> anyhow::Result<()> {
    let api = build_api(&args.connect)?;
    let store = Arc::new(VersionStore::new(
        Arc::clone(&api) as Arc<dyn VersionsApi>,
        args.task,
    ));
    store.list_versions().await?;

    let session = match (&args.connect.token, args.connect.user_id) {
        (Some(token), Some(user_id)) => SessionContext::new(user_id, token.clone()),
        _ => anyhow::bail!("running a pipeline requires --token and --user-id"),
    };

    let mut selection = ColumnSelection::new(args.technique, args.method_name)
        .with_min_columns(args.min_columns)
        .with_columns(args.columns);
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        selection = selection.with_parameter(key, value);
    }

    let (orchestrator, mut events) = PipelineOrchestrator::new(
        api as Arc<dyn VersionsApi>,
        Arc::clone(&store),
        Some(session),
        Duration::from_secs(args.connect.poll_interval_secs),
    );

    orchestrator.start(args.version, &selection).await?;
    info!(version_id = args.version, "Pipeline started");

    while let Some(event) = events.recv().await {
        match event {
            PollEvent::Status { status, .. } => {
                info!(version_id = args.version, status = %status, "Pipeline running");
            }
            PollEvent::Error { message, .. } => {
                warn!(version_id = args.version, error = %message, "Poll tick failed");
            }
            PollEvent::Terminal { status, .. } => {
                info!(version_id = args.version, status = %status, "Pipeline finished");
                break;
            }
        }
    }
    orchestrator.stop().await;

    store.refresh(Some(args.version)).await?;
    if let Some(version) = store.get(args.version).await {
        println!("{}", serde_json::to_string_pretty(&version)?);
    }
    Ok(())
}

async fn run_tree_command(args: TreeArgs) -> anyhow::Result<()> {
    let api = build_api(&args.connect)?;
    let store = VersionStore::new(api as Arc<dyn VersionsApi>, args.task);

    let versions = store.list_versions().await?;
    let forest = LineageTreeBuilder::build(&versions)?;

    if args.json {
        let layout = TreeLayout::new().layout(&forest);
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    for &root in forest.roots() {
        print_subtree(&forest, root, 0);
    }
    Ok(())
}

fn print_subtree(forest: &Forest, index: usize, depth: usize) {
    let node = forest.node(index);
    println!(
        "{}{} (#{}) [{}]",
        "  ".repeat(depth),
        node.version.name,
        node.version.id,
        node.version.status
    );
    for &child in &node.children {
        print_subtree(forest, child, depth + 1);
    }
}

// ============================================================================
// Argument Parsing Helpers
// ============================================================================

fn parse_data_types(pairs: &[String]) -> anyhow::Result<HashMap<String, DataType>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (column, kind) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected COL=KIND, got '{}'", pair))?;
        let data_type = match kind.to_ascii_lowercase().as_str() {
            "quantitative" => DataType::Quantitative,
            "qualitative" => DataType::Qualitative,
            other => anyhow::bail!("unknown data type '{}' for column '{}'", other, column),
        };
        map.insert(column.to_string(), data_type);
    }
    Ok(map)
}

fn parse_param(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{}'", raw))?;
    let parsed = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_types() {
        let map = parse_data_types(&[
            "age=quantitative".to_string(),
            "city=QUALITATIVE".to_string(),
        ])
        .expect("parse");

        assert_eq!(map.get("age"), Some(&DataType::Quantitative));
        assert_eq!(map.get("city"), Some(&DataType::Qualitative));
    }

    #[test]
    fn test_parse_data_types_rejects_unknown_kind() {
        assert!(parse_data_types(&["age=ordinal".to_string()]).is_err());
        assert!(parse_data_types(&["age".to_string()]).is_err());
    }

    #[test]
    fn test_parse_param_json_and_fallback() {
        let (key, value) = parse_param("value=3.5").expect("parse");
        assert_eq!(key, "value");
        assert_eq!(value, serde_json::json!(3.5));

        let (_, value) = parse_param("target=age_binned").expect("parse");
        assert_eq!(value, serde_json::json!("age_binned"));
    }
}
