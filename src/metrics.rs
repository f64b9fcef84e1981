//! Sell-through percentage derivation

use serde::Serialize;

use crate::data::ProductRecord;
use crate::error::DashboardError;

/// A product row augmented with its sell-through percentage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    #[serde(flatten)]
    pub product: ProductRecord,
    pub sell_through_pct: f64,
}

/// Round to 3 decimals, ties to even (the NumPy `round` convention)
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

/// Sell-through of a single record: `units_sold / opening_stock * 100`, rounded
pub fn sell_through_pct(record: &ProductRecord) -> crate::Result<f64> {
    if record.opening_stock == 0.0 {
        return Err(DashboardError::ZeroOpeningStock {
            sequence_id: record.sequence_id.clone(),
            product_name: record.product_name.clone(),
        });
    }
    Ok(round3(record.units_sold / record.opening_stock * 100.0))
}

/// Derive every record; the first zero-stock row fails the whole batch
pub fn derive_sell_through(records: &[ProductRecord]) -> crate::Result<Vec<DerivedRecord>> {
    records
        .iter()
        .map(|record| {
            Ok(DerivedRecord {
                product: record.clone(),
                sell_through_pct: sell_through_pct(record)?,
            })
        })
        .collect()
}
