//! Display tables shaped from a clustered record set

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::ProductRecord;
use crate::metrics::DerivedRecord;
use crate::model::{summarize, ClusterModel, ClusterSummary};
use crate::viz::ChartKind;

/// Names listed per cluster before the remainder is only counted
pub const NAME_LIST_LIMIT: usize = 50;

/// Rows in the closing-stock ranking
pub const TOP_STOCK_LIMIT: usize = 20;

/// Legend attached to the cluster ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandTier {
    High,
    Low,
    Rare,
}

impl DemandTier {
    pub fn for_cluster(cluster_id: usize) -> Option<Self> {
        match cluster_id {
            1 => Some(Self::High),
            2 => Some(Self::Low),
            3 => Some(Self::Rare),
            _ => None,
        }
    }

    pub fn cluster_id(self) -> usize {
        match self {
            Self::High => 1,
            Self::Low => 2,
            Self::Rare => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High demand",
            Self::Low => "Low demand",
            Self::Rare => "Rare demand",
        }
    }
}

/// First names of a cluster plus how many were left out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterNames {
    pub cluster_id: usize,
    pub names: Vec<String>,
    pub omitted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRow {
    pub product_name: String,
    pub opening_stock: f64,
    pub closing_stock: f64,
}

/// Stock detail of every member of a cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMembers {
    pub cluster_id: usize,
    pub rows: Vec<MemberRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub sequence_id: String,
    pub product_name: String,
    pub category: String,
    pub cluster_id: usize,
}

/// One bar of the closing-stock chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockBar {
    pub product_name: String,
    pub closing_stock: f64,
}

/// One product in clustering feature space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPoint {
    pub cluster_id: usize,
    pub opening_stock: f64,
    pub sell_through_pct: f64,
}

/// Final centroid of a cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Centroid {
    pub cluster_id: usize,
    pub opening_stock: f64,
    pub sell_through_pct: f64,
}

/// Everything a host needs to draw the dashboard for one selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub summary: Vec<ClusterSummary>,
    pub cluster_names: Vec<ClusterNames>,
    pub cluster_members: Vec<ClusterMembers>,
    pub products: Vec<ProductRow>,
    pub top_closing_stock: Vec<StockBar>,
    pub points: Vec<ClusterPoint>,
    pub centroids: Vec<Centroid>,
    pub inertia: f64,
}

impl DashboardView {
    /// Assemble every view from one clustering pass
    pub fn build(records: &[DerivedRecord], model: &ClusterModel) -> Self {
        let summary = summarize(records, model);
        let cluster_names = summary
            .iter()
            .map(|s| cluster_names(records, model, s.cluster_id, NAME_LIST_LIMIT))
            .collect();
        let cluster_members = (1..=model.n_clusters)
            .map(|id| cluster_members(records, model, id))
            .collect();
        let plain: Vec<ProductRecord> = records.iter().map(|r| r.product.clone()).collect();

        Self {
            summary,
            cluster_names,
            cluster_members,
            products: product_table(records, model),
            top_closing_stock: top_by_closing_stock(&plain, TOP_STOCK_LIMIT),
            points: records
                .iter()
                .zip(model.cluster_ids.iter())
                .map(|(r, &cluster_id)| ClusterPoint {
                    cluster_id,
                    opening_stock: r.product.opening_stock,
                    sell_through_pct: r.sell_through_pct,
                })
                .collect(),
            centroids: model
                .centroids
                .outer_iter()
                .enumerate()
                .map(|(i, c)| Centroid {
                    cluster_id: i + 1,
                    opening_stock: c[0],
                    sell_through_pct: c[1],
                })
                .collect(),
            inertia: model.inertia,
        }
    }
}

/// Member names of a cluster in row order, cut at `limit`
pub fn cluster_names(
    records: &[DerivedRecord],
    model: &ClusterModel,
    cluster_id: usize,
    limit: usize,
) -> ClusterNames {
    let members = model.members(cluster_id);
    let names = members
        .iter()
        .take(limit)
        .map(|&i| records[i].product.product_name.clone())
        .collect();

    ClusterNames {
        cluster_id,
        names,
        omitted: members.len().saturating_sub(limit),
    }
}

pub fn cluster_members(records: &[DerivedRecord], model: &ClusterModel, cluster_id: usize) -> ClusterMembers {
    let rows = model
        .members(cluster_id)
        .into_iter()
        .map(|i| MemberRow {
            product_name: records[i].product.product_name.clone(),
            opening_stock: records[i].product.opening_stock,
            closing_stock: records[i].product.closing_stock,
        })
        .collect();

    ClusterMembers { cluster_id, rows }
}

pub fn product_table(records: &[DerivedRecord], model: &ClusterModel) -> Vec<ProductRow> {
    records
        .iter()
        .zip(model.cluster_ids.iter())
        .map(|(record, &cluster_id)| ProductRow {
            sequence_id: record.product.sequence_id.clone(),
            product_name: record.product.product_name.clone(),
            category: record.product.category.clone(),
            cluster_id,
        })
        .collect()
}

/// Highest closing stock first; ties keep row order
pub fn top_by_closing_stock(records: &[ProductRecord], limit: usize) -> Vec<StockBar> {
    let mut bars: Vec<StockBar> = records
        .iter()
        .map(|r| StockBar {
            product_name: r.product_name.clone(),
            closing_stock: r.closing_stock,
        })
        .collect();
    bars.sort_by(|a, b| b.closing_stock.total_cmp(&a.closing_stock));
    bars.truncate(limit);
    bars
}

/// JSON envelope written by `--format json`
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub categories: &'a [String],
    pub chart_kind: ChartKind,
    pub view: &'a DashboardView,
}

/// Console rendering of the dashboard
pub fn format_text(view: &DashboardView) -> String {
    view.to_string()
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cluster Summary ===")?;
        writeln!(f, "  Cluster | Tier        | Members | Opening stock | Sell-through %")?;
        writeln!(f, "  --------|-------------|---------|---------------|---------------")?;
        for row in &self.summary {
            let tier = DemandTier::for_cluster(row.cluster_id)
                .map(DemandTier::label)
                .unwrap_or("-");
            writeln!(
                f,
                "  {:7} | {:11} | {:7} | {:13.3} | {:14.3}",
                row.cluster_id, tier, row.member_count, row.mean_opening_stock, row.mean_sell_through_pct
            )?;
        }
        writeln!(f, "Within-cluster sum of squares: {:.2}", self.inertia)?;

        writeln!(f, "\n=== Products per Cluster ===")?;
        for list in &self.cluster_names {
            writeln!(f, "Cluster {}:", list.cluster_id)?;
            writeln!(f, "  {}", list.names.join(", "))?;
            if list.omitted > 0 {
                writeln!(f, "  ... and {} more products", list.omitted)?;
            }
        }

        writeln!(f, "\n=== Product Table ===")?;
        writeln!(f, "  data_ke | cluster | category | product")?;
        for row in &self.products {
            writeln!(
                f,
                "  {:>7} | {:>7} | {} | {}",
                row.sequence_id, row.cluster_id, row.category, row.product_name
            )?;
        }

        writeln!(f, "\n=== Top {} by Closing Stock ===", TOP_STOCK_LIMIT)?;
        for (rank, bar) in self.top_closing_stock.iter().enumerate() {
            writeln!(f, "  {:2}. {} ({})", rank + 1, bar.product_name, bar.closing_stock)?;
        }

        writeln!(f, "\nLegend:")?;
        for tier in [DemandTier::High, DemandTier::Low, DemandTier::Rare] {
            writeln!(f, "  Cluster {} : {}", tier.cluster_id(), tier.label())?;
        }

        Ok(())
    }
}
