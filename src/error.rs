//! Error taxonomy for a dashboard pass

use serde::Serialize;
use thiserror::Error;

/// Coarse classification shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unsupported upload file type
    Format,
    /// Malformed content or missing/invalid columns
    Parse,
    /// Invalid operator input (category selection, missing upload)
    Validation,
    /// Metric derivation or clustering cannot proceed
    Computation,
    /// Chart or report output failed
    Render,
}

/// Every failure that halts a pass
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("unsupported file format '{file_name}': use a .txt or .csv file")]
    UnsupportedFormat { file_name: String },

    #[error("failed to read file: {0}")]
    Parse(String),

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("row {row}: column '{column}' must be a non-negative number")]
    InvalidValue { row: usize, column: String },

    #[error("select at least one category")]
    EmptySelection,

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("no data loaded: upload a file first")]
    NoDataLoaded,

    #[error("product '{product_name}' (data_ke {sequence_id}) has zero opening stock")]
    ZeroOpeningStock {
        sequence_id: String,
        product_name: String,
    },

    #[error("{rows} row(s) available, at least {k} are needed to form {k} clusters")]
    TooFewRows { rows: usize, k: usize },

    #[error("only {distinct} distinct (opening stock, sell-through) pair(s), at least {k} are needed")]
    TooFewDistinctRows { distinct: usize, k: usize },

    #[error("clustering failed: {0}")]
    Clustering(#[from] linfa::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => ErrorKind::Format,
            Self::Parse(_) | Self::MissingColumn(_) | Self::InvalidValue { .. } => ErrorKind::Parse,
            Self::EmptySelection | Self::UnknownCategory(_) | Self::NoDataLoaded => {
                ErrorKind::Validation
            }
            Self::ZeroOpeningStock { .. }
            | Self::TooFewRows { .. }
            | Self::TooFewDistinctRows { .. }
            | Self::Clustering(_) => ErrorKind::Computation,
            Self::Chart(_) | Self::Io(_) => ErrorKind::Render,
        }
    }

    pub(crate) fn chart(err: impl std::fmt::Display) -> Self {
        Self::Chart(err.to_string())
    }
}

impl From<polars::prelude::PolarsError> for DashboardError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Parse(err.to_string())
    }
}
