use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use cwr_server::{AppConfig, AppState, CwrServer};
use cwr_workflow::{SubmissionOutcome, Submitter, SubmitForm, PARAM_PREFIX};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Export(args) => cmd_export(config, args, &cli.format).await,
        Command::Submit(args) => cmd_submit(config, args, &cli.format).await,
        Command::Workflows(args) => cmd_workflows(config, args, &cli.format).await,
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            debug!("no configuration file given, using defaults");
            Ok(AppConfig::default())
        }
    }
}

async fn cmd_serve(mut config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    println!(
        "CWR server on {} (store: {})",
        config.server.bind_addr.to_string().bold(),
        config.store.base_url.cyan()
    );
    CwrServer::new(config)?.serve().await?;
    Ok(())
}

async fn cmd_export(config: AppConfig, args: ExportArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let id = state.store.prefix().parse_id(&args.id)?;
    let krate = state
        .exporter
        .build_crate(&id, args.workflow, args.download)
        .await?;

    if !args.download {
        let rendered = serde_json::to_string_pretty(&krate.metadata_document())?;
        match args.output {
            Some(path) => {
                tokio::fs::write(&path, rendered).await?;
                println!("{} Wrote metadata to {}", "✓".green().bold(), path.display());
            }
            None => println!("{rendered}"),
        }
        return Ok(());
    }

    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(id.archive_name()));
    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let mut stream = state.exporter.stream(&krate)?;
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    info!(dataset = %id, archive = %path.display(), bytes = written, "wrote crate archive");

    if *format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({"dataset": id.as_str(), "archive": path, "bytes": written})
        );
    } else {
        println!("{} Packaged {}", "✓".green().bold(), id.as_str().yellow());
        println!("  Archive: {} ({} bytes)", path.display(), written);
    }
    Ok(())
}

async fn cmd_submit(config: AppConfig, args: SubmitArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.archive)
        .await
        .with_context(|| format!("reading {}", args.archive.display()))?;
    let state = AppState::from_config(config)?;
    let submitter = Submitter::new(args.name, args.orcid);

    let mut fields: Vec<(String, String)> = args
        .params
        .into_iter()
        .map(|(name, value)| (format!("{PARAM_PREFIX}{name}"), value))
        .collect();
    let options = [
        ("title", args.title),
        ("description", args.description),
        ("webhook_url", args.webhook_url),
    ];
    fields.extend(options.into_iter().filter_map(|(k, v)| v.map(|v| (k.to_string(), v))));
    fields.push(("dry_run".into(), args.dry_run.to_string()));
    fields.push(("force".into(), (!args.no_force).to_string()));
    let form = SubmitForm::from_fields(fields);

    let outcome = state
        .orchestrator
        .run("application/zip", bytes, form, &submitter)
        .await?;
    print_outcome(&outcome, format)?;
    if outcome.status.is_rejection() {
        anyhow::bail!("submission rejected: {}", outcome.status);
    }
    Ok(())
}

fn print_outcome(outcome: &SubmissionOutcome, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    let status = if outcome.status.is_rejection() {
        outcome.status.as_str().red().bold()
    } else {
        outcome.status.as_str().green().bold()
    };
    println!("{status}");
    println!("  Workflow: {}", outcome.workflow_id.yellow());
    if let Some(details) = &outcome.details {
        println!("  Details: {}", serde_json::to_string_pretty(details)?.dimmed());
    }
    Ok(())
}

async fn cmd_workflows(config: AppConfig, args: WorkflowsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let service = state.orchestrator.service();
    match args.action {
        WorkflowsAction::List => {
            let workflows = service.list().await?;
            if *format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&workflows)?);
                return Ok(());
            }
            if workflows.is_empty() {
                println!("No workflows.");
            }
            for workflow in &workflows {
                let name = workflow
                    .get("name")
                    .or_else(|| workflow.get("workflow_id"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                let finished = workflow
                    .finished_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "running".into());
                println!(
                    "{}  {}  {}",
                    name.yellow().bold(),
                    workflow.started_at.to_rfc3339().dimmed(),
                    finished
                );
            }
        }
        WorkflowsAction::Show { id } => {
            let detail = service.detail(&id).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
    }
    Ok(())
}
