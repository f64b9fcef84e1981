//! Upload state and the recomputation pass
//!
//! A [`Session`] holds at most one uploaded collection. Every filter change runs
//! [`run_pipeline`] from scratch against that collection: filter, derive, cluster,
//! shape. Nothing computed in one pass is reused by the next.

use tracing::{info, warn};

use crate::data::{self, ProductRecord};
use crate::error::DashboardError;
use crate::metrics::derive_sell_through;
use crate::model::{fit_clusters, ClusterParams};
use crate::report::DashboardView;

/// A successfully parsed upload
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedData {
    pub file_name: String,
    pub records: Vec<ProductRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Session {
    #[default]
    NoData,
    Loaded(LoadedData),
}

impl Session {
    pub fn new() -> Self {
        Self::NoData
    }

    /// Parse an upload; on failure the session keeps its previous state
    pub fn upload(&mut self, bytes: &[u8], file_name: &str) -> crate::Result<&LoadedData> {
        let records = data::load_records(bytes, file_name)
            .inspect_err(|err| warn!(file_name, error = %err, "upload rejected"))?;

        *self = Self::Loaded(LoadedData {
            file_name: file_name.to_string(),
            records,
        });
        self.loaded().ok_or(DashboardError::NoDataLoaded)
    }

    pub fn loaded(&self) -> Option<&LoadedData> {
        match self {
            Self::Loaded(loaded) => Some(loaded),
            Self::NoData => None,
        }
    }

    /// Categories available for selection, in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        self.loaded()
            .map(|loaded| data::categories(&loaded.records))
            .unwrap_or_default()
    }

    /// Run a full pass for the given category selection
    pub fn recompute(&self, selected: &[String]) -> crate::Result<DashboardView> {
        let loaded = self.loaded().ok_or(DashboardError::NoDataLoaded)?;
        run_pipeline(&loaded.records, selected, &ClusterParams::default())
    }
}

/// Filter, derive, cluster and shape one selection of an uploaded collection
///
/// # Arguments
/// * `records` - The uploaded collection; never modified
/// * `selected` - Categories to keep; must be non-empty
/// * `params` - Clustering configuration
pub fn run_pipeline(
    records: &[ProductRecord],
    selected: &[String],
    params: &ClusterParams,
) -> crate::Result<DashboardView> {
    let filtered = data::filter_by_categories(records, selected)?;
    let derived = derive_sell_through(&filtered)?;
    let model = fit_clusters(&derived, params)?;
    let view = DashboardView::build(&derived, &model);

    info!(
        categories = selected.len(),
        rows = derived.len(),
        clusters = view.summary.len(),
        "dashboard pass complete"
    );

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const UPLOAD: &str = "data_ke;nama_produk;kategori;stok_awal;terjual;stok_akhir\n\
        1;Kaos Polos;Atasan;10;9;1\n\
        2;Kemeja;Atasan;12;10;2\n\
        3;Celana;Bawahan;100;20;80\n\
        4;Rok;Bawahan;110;25;85\n\
        5;Topi;Aksesoris;300;6;294\n\
        6;Sabuk;Aksesoris;310;3;307\n";

    fn all(session: &Session) -> Vec<String> {
        session.categories()
    }

    #[test]
    fn test_starts_without_data() {
        let session = Session::new();
        assert!(session.loaded().is_none());
        assert!(session.categories().is_empty());

        let err = session.recompute(&["Atasan".to_string()]).unwrap_err();
        assert!(matches!(err, DashboardError::NoDataLoaded));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_upload_transitions_to_loaded() {
        let mut session = Session::new();
        let loaded = session.upload(UPLOAD.as_bytes(), "stok.csv").unwrap();
        assert_eq!(loaded.records.len(), 6);
        assert_eq!(all(&session), vec!["Atasan", "Bawahan", "Aksesoris"]);
    }

    #[test]
    fn test_failed_upload_keeps_previous_state() {
        let mut session = Session::new();
        session.upload(UPLOAD.as_bytes(), "stok.csv").unwrap();

        let err = session.upload(UPLOAD.as_bytes(), "stok.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(session.loaded().map(|l| l.file_name.as_str()), Some("stok.csv"));

        let mut empty = Session::new();
        assert!(empty.upload(b"", "stok.csv").is_err());
        assert_eq!(empty, Session::NoData);
    }

    #[test]
    fn test_recompute_is_repeatable() {
        let mut session = Session::new();
        session.upload(UPLOAD.as_bytes(), "stok.csv").unwrap();

        let selected = all(&session);
        let first = session.recompute(&selected).unwrap();
        let second = session.recompute(&selected).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.products.len(), 6);
    }

    #[test]
    fn test_empty_selection_halts() {
        let mut session = Session::new();
        session.upload(UPLOAD.as_bytes(), "stok.csv").unwrap();

        let err = session.recompute(&[]).unwrap_err();
        assert!(matches!(err, DashboardError::EmptySelection));
    }

    #[test]
    fn test_pipeline_leaves_collection_untouched() {
        let mut session = Session::new();
        session.upload(UPLOAD.as_bytes(), "stok.csv").unwrap();
        let before = session.clone();

        let selected = vec!["Atasan".to_string(), "Aksesoris".to_string()];
        let view = session.recompute(&selected).unwrap();
        assert_eq!(view.products.len(), 4);
        assert!(view.products.iter().all(|p| p.category != "Bawahan"));
        assert_eq!(session, before);
    }
}
