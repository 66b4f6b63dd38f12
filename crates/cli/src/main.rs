use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mf_client::{ClientConfig, HttpRecordService};
use mf_core::intake::{self, ValidationSummary};
use mf_core::live::LiveSnapshot;
use mf_core::schema::SchemaMap;
use mf_core::schema_index::SchemaIndex;
use mf_core::tabular;
use mf_core::template::{template_headers, write_csv_template, TemplateScope};
use mf_pipeline::commit::{CommitRefused, CommitStatus};
use mf_pipeline::notify::TracingNotifier;
use mf_pipeline::session::ImportSession;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod input;

use cli::{Cli, Commands, IntakeArgs, TemplateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mf_import=info,mf_pipeline=info,mf_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let schemas = input::load_schemas(&cli.schemas)?;

    match cli.command {
        Commands::Preview(args) => preview(&schemas, &args).await,
        Commands::Commit(args) => commit(schemas, &args).await,
        Commands::Template(args) => template(&schemas, &args),
    }
}

fn api_service() -> Result<HttpRecordService> {
    let config = ClientConfig::from_env().context("Record API is not configured")?;
    tracing::info!(api_url = %config.api_url, timeout_secs = config.request_timeout_secs, "Loaded API configuration");
    Ok(HttpRecordService::from_config(&config)?)
}

/// Live records from `--live`, or from the API for `schema_names`.
async fn live_snapshot(
    args: &IntakeArgs,
    service: Option<&HttpRecordService>,
    schema_names: &[String],
) -> Result<LiveSnapshot> {
    if let Some(path) = &args.live {
        return input::load_live(path);
    }
    let snapshot = match service {
        Some(service) => service.fetch_snapshot(schema_names).await,
        None => api_service()?.fetch_snapshot(schema_names).await,
    };
    Ok(snapshot)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// preview
// ---------------------------------------------------------------------------

async fn preview(schemas: &SchemaMap, args: &IntakeArgs) -> Result<()> {
    let upload = input::load_upload(&args.file)?;
    let decoded = tabular::decode(&upload, args.sheet.as_deref())?;
    tracing::info!(file = %upload.name, rows = decoded.rows.len(), "Decoded intake file");

    let index = SchemaIndex::new(schemas);
    let prepared = intake::prepare_rows(&decoded.rows, &index);
    let live = live_snapshot(args, None, &prepared.relevant_schemas()).await?;

    let report = match intake::reconcile(&prepared, &index, &live) {
        Ok(outcome) => json!({
            "file": upload.name,
            "sheets": decoded.sheet_names,
            "activeSheet": decoded.active_sheet,
            "validation": ValidationSummary::from_rows(&outcome.rows),
            "summary": outcome.summary,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Reconciliation skipped");
            json!({
                "file": upload.name,
                "sheets": decoded.sheet_names,
                "activeSheet": decoded.active_sheet,
                "validation": ValidationSummary::from_rows(&prepared.rows),
                "summary": null,
                "reconcileError": e.to_string(),
            })
        }
    };
    print_json(&report)
}

// ---------------------------------------------------------------------------
// commit
// ---------------------------------------------------------------------------

async fn commit(schemas: SchemaMap, args: &IntakeArgs) -> Result<()> {
    let service = api_service()?;
    let user_schemas: Vec<String> = SchemaIndex::new(&schemas)
        .user_schemas()
        .map(|s| s.schema_name.clone())
        .collect();
    let live = live_snapshot(args, Some(&service), &user_schemas).await?;

    let mut session = ImportSession::new(Arc::new(schemas), service, live, TracingNotifier);
    session.on_file_selected(input::load_upload(&args.file)?)?;
    if let Some(sheet) = &args.sheet {
        session.on_sheet_selected(sheet)?;
    }

    let validation = session.validation_summary();
    if validation.has_blocking_errors() {
        print_json(&json!({ "validation": validation }))?;
        bail!("{} row error(s) must be fixed before committing", validation.errors.len());
    }

    match session.commit().await {
        Ok(outcome) => {
            print_json(&serde_json::to_value(&outcome)?)?;
            if outcome.status == CommitStatus::Failed {
                bail!("No records were committed");
            }
            Ok(())
        }
        Err(CommitRefused::NothingToCommit) => {
            tracing::info!("Nothing to commit");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// template
// ---------------------------------------------------------------------------

fn template(schemas: &SchemaMap, args: &TemplateArgs) -> Result<()> {
    let index = SchemaIndex::new(schemas);
    let names: Vec<&str> = args.schemas.iter().map(String::as_str).collect();
    let scope = if args.all {
        TemplateScope::All
    } else {
        TemplateScope::Required {
            include_conditional: args.include_conditional,
        }
    };
    let headers = template_headers(&index, &names, scope)?;

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv_template(file, &headers)?;
            tracing::info!(path = %path.display(), columns = headers.len(), "Template written");
        }
        None => write_csv_template(std::io::stdout().lock(), &headers)?,
    }
    Ok(())
}
