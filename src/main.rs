//! StockTier: demand-tier dashboard for shop stock files
//!
//! This is the main entrypoint: it loads the upload into a session, runs one
//! dashboard pass for the selected categories, prints the tables and writes
//! the charts.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use stocktier::cli::OutputFormat;
use stocktier::report::{format_text, JsonReport};
use stocktier::{logging, viz, Args, DashboardError, ErrorKind, Session};
use tracing::{debug, info};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_json);

    let start_time = Instant::now();

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let file_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let mut session = Session::new();
    let loaded = session.upload(&bytes, file_name).map_err(user_facing)?;
    debug!(records = loaded.records.len(), "session loaded");

    let available = session.categories();
    if args.list_categories {
        for category in &available {
            println!("{}", category);
        }
        return Ok(());
    }

    let selected = args.selected_categories(&available);
    let view = session.recompute(&selected).map_err(user_facing)?;

    match args.format {
        OutputFormat::Text => print!("{}", format_text(&view)),
        OutputFormat::Json => {
            let report = JsonReport {
                generated_at: Utc::now(),
                source: file_name,
                categories: &selected,
                chart_kind: args.chart,
                view: &view,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    write_charts(&args, &view)?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "pipeline complete"
    );

    Ok(())
}

fn write_charts(args: &Args, view: &stocktier::DashboardView) -> Result<()> {
    ensure_parent(&args.output)?;
    viz::render_stock_chart(&view.top_closing_stock, args.chart, &args.output).map_err(user_facing)?;

    let scatter_path = args.scatter_output();
    viz::render_cluster_scatter(view, &scatter_path).map_err(user_facing)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Prefix the message with the error class the operator sees
fn user_facing(err: DashboardError) -> anyhow::Error {
    let class = match err.kind() {
        ErrorKind::Format => "unsupported file",
        ErrorKind::Parse => "could not read file",
        ErrorKind::Validation => "invalid selection",
        ErrorKind::Computation => "cannot compute clusters",
        ErrorKind::Render => "cannot write output",
    };
    anyhow!("{}: {}", class, err)
}
