//! StockTier: demand-tier segmentation of shop products
//!
//! Products from a `;`-separated stock file are filtered by category, given a
//! sell-through percentage and clustered into three tiers with K-Means over
//! opening stock and sell-through. The results are shaped into dashboard tables
//! and SVG charts.

pub mod cli;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod report;
pub mod sampling;
pub mod session;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_records, ProductRecord};
pub use error::{DashboardError, ErrorKind};
pub use metrics::{derive_sell_through, DerivedRecord};
pub use model::{fit_clusters, ClusterModel, ClusterParams, ClusterSummary};
pub use report::DashboardView;
pub use session::{run_pipeline, Session};
pub use viz::ChartKind;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;
