use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mf-import")]
#[command(author, version, about = "Validate and commit Migration Factory intake files")]
pub struct Cli {
    /// Schema definitions exported from the schema API, as a JSON array.
    #[arg(long, env = "MF_SCHEMAS")]
    pub schemas: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and reconcile a file, printing the row diagnostics and the
    /// change summary as JSON. Nothing is written.
    Preview(IntakeArgs),

    /// Reconcile a file and push its creates and updates to the API.
    Commit(IntakeArgs),

    /// Write a headers-only CSV template for one or more schemas.
    Template(TemplateArgs),
}

#[derive(Args)]
pub struct IntakeArgs {
    /// Intake file (.csv, .xlsx or .xls).
    #[arg(short, long)]
    pub file: PathBuf,

    /// Workbook sheet to read. Defaults to the first sheet.
    #[arg(long)]
    pub sheet: Option<String>,

    /// Live records as a JSON object keyed by schema name. When omitted,
    /// live records are fetched from the API.
    #[arg(long)]
    pub live: Option<PathBuf>,
}

#[derive(Args)]
pub struct TemplateArgs {
    /// Schemas to include, in column order.
    #[arg(short, long = "schema", required = true)]
    pub schemas: Vec<String>,

    /// List every visible attribute instead of only required ones.
    #[arg(long)]
    pub all: bool,

    /// Also list attributes that are required only under conditions.
    #[arg(long, conflicts_with = "all")]
    pub include_conditional: bool,

    /// Output path. Writes to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
