use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cwr",
    about = "CWR front end: dataset export and workflow submission",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true, env = "CWR_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Export a dataset as RO-Crate metadata or a zipped crate
    Export(ExportArgs),
    /// Validate, lint and submit a workflow crate
    Submit(SubmitArgs),
    /// Inspect workflows known to the execution backend
    Workflows(WorkflowsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Overrides the configured bind address.
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Dataset identifier, e.g. `cwr/abc`.
    pub id: String,
    /// Only the dataset's workflow, as a Workflow RO-Crate.
    #[arg(long)]
    pub workflow: bool,
    /// Write a zipped crate with its files instead of detached metadata.
    #[arg(long)]
    pub download: bool,
    /// Output path. Metadata goes to stdout when omitted; archives are
    /// named after the dataset.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Zipped RO-Crate holding the workflow.
    pub archive: PathBuf,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub orcid: String,
    #[arg(long)]
    pub dry_run: bool,
    /// Parameter override as `name=value`. Repeatable.
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub webhook_url: Option<String>,
    /// Refuse to resubmit an identical workflow.
    #[arg(long)]
    pub no_force: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))
}

#[derive(Args)]
pub struct WorkflowsArgs {
    #[command(subcommand)]
    pub action: WorkflowsAction,
}

#[derive(Subcommand)]
pub enum WorkflowsAction {
    List,
    Show { id: String },
}
