//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::viz::ChartKind;

/// How the dashboard tables are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Demand-tier dashboard for shop stock files using K-Means clustering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the stock file (.txt or .csv, `;`-separated)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Categories to include, comma-separated (default: every category in the file)
    #[arg(short, long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Mark used for the closing-stock chart
    #[arg(long, value_enum, default_value_t = ChartKind::Bar)]
    pub chart: ChartKind,

    /// Output path for the closing-stock chart (SVG)
    #[arg(short, long, default_value = "stock_chart.svg")]
    pub output: PathBuf,

    /// Print tables as text or as a JSON document
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// List the categories found in the file and exit
    #[arg(long)]
    pub list_categories: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Resolve the category selection against the categories of the upload
    ///
    /// Without `--categories` every available category is selected. Blank
    /// entries are dropped, so `--categories ""` selects nothing.
    pub fn selected_categories(&self, available: &[String]) -> Vec<String> {
        match self.categories {
            Some(ref requested) => requested
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            None => available.to_vec(),
        }
    }

    /// Path of the cluster scatter plot, next to the stock chart
    pub fn scatter_output(&self) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stock_chart");
        self.output.with_file_name(format!("{}_clusters.svg", stem))
    }
}
