//! Upload parsing and category filtering using Polars

use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::DashboardError;

pub const COL_SEQUENCE: &str = "data_ke";
pub const COL_PRODUCT: &str = "nama_produk";
pub const COL_CATEGORY: &str = "kategori";
pub const COL_OPENING: &str = "stok_awal";
pub const COL_CLOSING: &str = "stok_akhir";
pub const COL_SOLD: &str = "terjual";

/// Columns every upload must carry, in the order they are checked
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_CATEGORY,
    COL_SOLD,
    COL_OPENING,
    COL_CLOSING,
    COL_PRODUCT,
    COL_SEQUENCE,
];

const SEPARATOR: u8 = b';';
const ACCEPTED_EXTENSIONS: [&str; 2] = ["txt", "csv"];

/// One product row of an uploaded stock file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    /// Opaque row identifier from the source (`data_ke`)
    pub sequence_id: String,
    pub product_name: String,
    pub category: String,
    pub opening_stock: f64,
    pub closing_stock: f64,
    pub units_sold: f64,
}

/// Reject anything that is not a `.txt` or `.csv` upload
pub fn check_extension(file_name: &str) -> crate::Result<()> {
    let accepted = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false);

    if accepted {
        Ok(())
    } else {
        warn!(file_name, "rejected upload with unsupported extension");
        Err(DashboardError::UnsupportedFormat {
            file_name: file_name.to_string(),
        })
    }
}

/// Parse an uploaded byte stream into product records
///
/// # Arguments
/// * `bytes` - Raw file content, `;`-separated with a header row
/// * `file_name` - Name of the upload; only its extension is inspected
///
/// # Returns
/// * Records in source row order
pub fn load_records(bytes: &[u8], file_name: &str) -> crate::Result<Vec<ProductRecord>> {
    check_extension(file_name)?;

    // numeric columns may hold integers for many rows before the first decimal
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|opts| opts.with_separator(SEPARATOR))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()?;

    debug!(rows = df.height(), columns = df.width(), "parsed upload frame");

    for name in REQUIRED_COLUMNS {
        if df.get_column_index(name).is_none() {
            return Err(DashboardError::MissingColumn(name.to_string()));
        }
    }

    let records = frame_to_records(&df)?;
    info!(file_name, records = records.len(), "upload loaded");

    Ok(records)
}

/// Read a file from disk and parse it like an upload
pub fn load_records_from_path(path: &Path) -> crate::Result<Vec<ProductRecord>> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    check_extension(file_name)?;

    let bytes = std::fs::read(path)?;
    load_records(&bytes, file_name)
}

fn frame_to_records(df: &DataFrame) -> crate::Result<Vec<ProductRecord>> {
    let sequence_ids = text_column(df, COL_SEQUENCE)?;
    let names = text_column(df, COL_PRODUCT)?;
    let categories = text_column(df, COL_CATEGORY)?;
    let opening = numeric_column(df, COL_OPENING)?;
    let closing = numeric_column(df, COL_CLOSING)?;
    let sold = numeric_column(df, COL_SOLD)?;

    let records = (0..df.height())
        .map(|i| ProductRecord {
            sequence_id: sequence_ids[i].clone(),
            product_name: names[i].clone(),
            category: categories[i].clone(),
            opening_stock: opening[i],
            closing_stock: closing[i],
            units_sold: sold[i],
        })
        .collect();

    Ok(records)
}

/// Missing cells are rejected with their 1-based data row
fn text_column(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            value.map(str::to_string).ok_or_else(|| DashboardError::InvalidValue {
                row: i + 1,
                column: name.to_string(),
            })
        })
        .collect()
}

/// Missing, non-numeric and negative cells are rejected with their 1-based data row
fn numeric_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(DashboardError::InvalidValue {
                row: i + 1,
                column: name.to_string(),
            }),
        })
        .collect()
}

/// Distinct categories in order of first appearance
pub fn categories(records: &[ProductRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        if !seen.contains(&record.category) {
            seen.push(record.category.clone());
        }
    }
    seen
}

/// Copy out the records whose category is selected, keeping row order
pub fn filter_by_categories(
    records: &[ProductRecord],
    selected: &[String],
) -> crate::Result<Vec<ProductRecord>> {
    if selected.is_empty() {
        return Err(DashboardError::EmptySelection);
    }

    let known = categories(records);
    if let Some(unknown) = selected.iter().find(|c| !known.contains(c)) {
        return Err(DashboardError::UnknownCategory(unknown.clone()));
    }

    let filtered: Vec<ProductRecord> = records
        .iter()
        .filter(|r| selected.contains(&r.category))
        .cloned()
        .collect();

    debug!(
        selected = selected.len(),
        kept = filtered.len(),
        total = records.len(),
        "category filter applied"
    );

    Ok(filtered)
}
