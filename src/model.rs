//! K-Means clustering of products over opening stock and sell-through
//!
//! Centroids are pinned to rows drawn by the seeded sampler and refined with
//! Lloyd's iteration: assign every row to its nearest centroid, move each
//! centroid to the mean of its members, repeat.

use std::collections::HashSet;

use linfa::prelude::*;
use linfa_nn::distance::{Distance, L2Dist};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::DashboardError;
use crate::metrics::DerivedRecord;
use crate::sampling::{choice_without_replacement, Mt19937};

/// Number of clustering features: opening stock and sell-through percentage
pub const N_FEATURES: usize = 2;

/// Fixed clustering configuration of the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// Number of demand tiers
    pub n_clusters: usize,
    /// Seed of the generator that picks the initial centroid rows
    pub init_seed: u32,
    pub max_iterations: u64,
    /// Relative to the mean per-feature variance of the rows being clustered
    pub tolerance: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            init_seed: 74,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// Lloyd's K-Means started from fixed centroids
#[derive(Debug, Clone)]
pub struct LloydKMeans {
    initial_centroids: Array2<f64>,
    max_iterations: u64,
    tolerance: f64,
}

/// Result of a [`LloydKMeans`] fit
#[derive(Debug, Clone)]
pub struct LloydFit {
    /// Mean of each cluster's members, row `i` is cluster `i`
    pub centroids: Array2<f64>,
    /// 0-based cluster of every row
    pub labels: Array1<usize>,
    pub iterations: u64,
}

impl LloydKMeans {
    pub fn new(initial_centroids: Array2<f64>) -> Self {
        Self {
            initial_centroids,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }

    pub fn max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.initial_centroids.nrows()
    }
}

impl<T> Fit<Array2<f64>, T, DashboardError> for LloydKMeans {
    type Object = LloydFit;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, T>) -> crate::Result<LloydFit> {
        let records = dataset.records();
        if records.ncols() != self.initial_centroids.ncols() {
            let expected = self.initial_centroids.ncols();
            return Err(linfa::Error::MismatchedShapes(records.ncols(), expected).into());
        }
        if records.nrows() < self.n_clusters() {
            return Err(linfa::Error::NotEnoughSamples.into());
        }

        let tolerance = scaled_tolerance(records, self.tolerance);
        let mut centroids = self.initial_centroids.clone();
        let mut previous: Option<Array1<usize>> = None;
        let mut settled = None;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let labels = assign_labels(records, &centroids);
            let updated = update_centroids(records, &centroids, &labels);
            let shift: f64 = centroids
                .outer_iter()
                .zip(updated.outer_iter())
                .map(|(old, new)| L2Dist.rdistance(old, new))
                .sum();
            centroids = updated;

            if previous.as_ref() == Some(&labels) {
                settled = Some(labels);
                break;
            }
            if shift <= tolerance {
                break;
            }
            previous = Some(labels);
        }

        // labels must describe the centroids that are returned
        let labels = match settled {
            Some(labels) => labels,
            None => assign_labels(records, &centroids),
        };

        debug!(iterations, tolerance, "lloyd iteration finished");

        Ok(LloydFit {
            centroids,
            labels,
            iterations,
        })
    }
}

/// Fitted clustering of one filtered record set
#[derive(Debug, Clone)]
pub struct ClusterModel {
    pub n_clusters: usize,
    /// Rows whose features seeded the centroids, in draw order
    pub initial_indices: Vec<usize>,
    /// Display cluster id (1-based) for each input row
    pub cluster_ids: Vec<usize>,
    /// Final centroids in raw feature space, row `i` belongs to cluster `i + 1`
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl ClusterModel {
    /// Member count per cluster, indexed by `cluster_id - 1`
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &id in &self.cluster_ids {
            sizes[id - 1] += 1;
        }
        sizes
    }

    /// Row indices of a cluster in original row order
    pub fn members(&self, cluster_id: usize) -> Vec<usize> {
        self.cluster_ids
            .iter()
            .enumerate()
            .filter(|&(_, &id)| id == cluster_id)
            .map(|(row, _)| row)
            .collect()
    }
}

/// Mean features of one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub member_count: usize,
    pub mean_opening_stock: f64,
    pub mean_sell_through_pct: f64,
}

/// Raw, unscaled `[opening_stock, sell_through_pct]` matrix
pub fn feature_matrix(records: &[DerivedRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), N_FEATURES), |(i, j)| match j {
        0 => records[i].product.opening_stock,
        _ => records[i].sell_through_pct,
    })
}

/// Pick the rows that seed the centroids
///
/// # Returns
/// * The drawn row indices and the `(n_clusters, 2)` matrix of their features
pub fn select_initial_centroids(
    features: &Array2<f64>,
    params: &ClusterParams,
) -> crate::Result<(Vec<usize>, Array2<f64>)> {
    let n_rows = features.nrows();
    let k = params.n_clusters;

    let distinct = count_distinct_rows(features);
    if distinct < k {
        return Err(DashboardError::TooFewDistinctRows { distinct, k });
    }

    let mut rng = Mt19937::new(params.init_seed);
    let indices = choice_without_replacement(&mut rng, n_rows, k)
        .ok_or(DashboardError::TooFewRows { rows: n_rows, k })?;

    let centroids = features.select(Axis(0), &indices);
    debug!(?indices, seed = params.init_seed, "initial centroid rows drawn");

    Ok((indices, centroids))
}

/// Fit K-Means on derived records
///
/// # Arguments
/// * `records` - Filtered records with sell-through computed
/// * `params` - Cluster count, seed and convergence settings
///
/// # Returns
/// * Fitted `ClusterModel` with 1-based ids per row
pub fn fit_clusters(records: &[DerivedRecord], params: &ClusterParams) -> crate::Result<ClusterModel> {
    let k = params.n_clusters;
    if records.len() < k {
        return Err(DashboardError::TooFewRows {
            rows: records.len(),
            k,
        });
    }

    let features = feature_matrix(records);
    let (initial_indices, initial_centroids) = select_initial_centroids(&features, params)?;

    let targets: Array1<usize> = Array1::zeros(features.nrows());
    let dataset = Dataset::new(features, targets);

    let fit = LloydKMeans::new(initial_centroids)
        .max_iterations(params.max_iterations)
        .tolerance(params.tolerance)
        .fit(&dataset)?;

    let inertia = compute_inertia(dataset.records(), &fit.labels, &fit.centroids);

    let fitted = ClusterModel {
        n_clusters: k,
        initial_indices,
        cluster_ids: fit.labels.iter().map(|&label| label + 1).collect(),
        centroids: fit.centroids,
        inertia,
    };

    info!(
        rows = records.len(),
        sizes = ?fitted.cluster_sizes(),
        iterations = fit.iterations,
        inertia = fitted.inertia,
        "clustering complete"
    );

    Ok(fitted)
}

/// Per-cluster feature means, ascending by id; empty clusters are left out
pub fn summarize(records: &[DerivedRecord], model: &ClusterModel) -> Vec<ClusterSummary> {
    let mut summaries = Vec::new();

    for cluster_id in 1..=model.n_clusters {
        let members = model.members(cluster_id);
        if members.is_empty() {
            continue;
        }

        let count = members.len() as f64;
        let opening: f64 = members.iter().map(|&i| records[i].product.opening_stock).sum();
        let sell_through: f64 = members.iter().map(|&i| records[i].sell_through_pct).sum();

        summaries.push(ClusterSummary {
            cluster_id,
            member_count: members.len(),
            mean_opening_stock: opening / count,
            mean_sell_through_pct: sell_through / count,
        });
    }

    summaries
}

/// Nearest centroid and its squared distance; ties go to the lower index
fn nearest_centroid(point: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let dist = L2Dist.rdistance(point, centroid);
        if dist < best.1 {
            best = (c, dist);
        }
    }
    best
}

fn assign_labels(records: &Array2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    records
        .outer_iter()
        .map(|row| nearest_centroid(row, centroids).0)
        .collect()
}

/// Member means; a cluster left empty takes over the farthest row
fn update_centroids(records: &Array2<f64>, centroids: &Array2<f64>, labels: &Array1<usize>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];

    for (row, &label) in records.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    relocate_empty_clusters(records, centroids, labels, &mut sums, &mut counts);

    let mut updated = centroids.clone();
    for (c, &count) in counts.iter().enumerate() {
        if count > 0 {
            updated.row_mut(c).assign(&(&sums.row(c) / count as f64));
        }
    }
    updated
}

/// Hand each empty cluster a distinct row, farthest from its current centroid first
fn relocate_empty_clusters(
    records: &Array2<f64>,
    centroids: &Array2<f64>,
    labels: &Array1<usize>,
    sums: &mut Array2<f64>,
    counts: &mut [usize],
) {
    let empty: Vec<usize> = (0..counts.len()).filter(|&c| counts[c] == 0).collect();
    if empty.is_empty() {
        return;
    }

    let distances: Vec<f64> = records
        .outer_iter()
        .zip(labels.iter())
        .map(|(row, &label)| L2Dist.rdistance(row, centroids.row(label)))
        .collect();
    let mut farthest: Vec<usize> = (0..records.nrows()).collect();
    farthest.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));

    for (&cluster, &row) in empty.iter().zip(farthest.iter()) {
        let point = records.row(row);
        let donor = labels[row];

        let mut donor_sum = sums.row_mut(donor);
        donor_sum -= &point;
        counts[donor] -= 1;

        sums.row_mut(cluster).assign(&point);
        counts[cluster] = 1;
        debug!(cluster, row, "empty cluster moved to farthest row");
    }
}

/// Tolerance scaled by the mean per-feature variance
fn scaled_tolerance(records: &Array2<f64>, tolerance: f64) -> f64 {
    records.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0) * tolerance
}

fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        .map(|row| (row[0].to_bits(), row[1].to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels.iter())
        .map(|(point, &cluster)| L2Dist.rdistance(point, centroids.row(cluster)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProductRecord;
    use crate::error::ErrorKind;

    fn derived(points: &[(f64, f64)]) -> Vec<DerivedRecord> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(opening, pct))| DerivedRecord {
                product: ProductRecord {
                    sequence_id: (i + 1).to_string(),
                    product_name: format!("Produk {}", i + 1),
                    category: "A".to_string(),
                    opening_stock: opening,
                    closing_stock: opening / 2.0,
                    units_sold: opening * pct / 100.0,
                },
                sell_through_pct: pct,
            })
            .collect()
    }

    fn three_groups() -> Vec<DerivedRecord> {
        derived(&[
            (10.0, 90.0),
            (12.0, 85.0),
            (11.0, 95.0),
            (100.0, 20.0),
            (110.0, 25.0),
            (105.0, 15.0),
            (300.0, 5.0),
            (310.0, 2.0),
            (295.0, 8.0),
        ])
    }

    #[test]
    fn test_feature_matrix_is_unscaled() {
        let features = feature_matrix(&three_groups());
        assert_eq!(features.shape(), &[9, 2]);
        assert_eq!(features[[7, 0]], 310.0);
        assert_eq!(features[[7, 1]], 2.0);
    }

    #[test]
    fn test_initial_centroids_follow_seed() {
        let features = feature_matrix(&three_groups());
        let (indices, centroids) = select_initial_centroids(&features, &ClusterParams::default()).unwrap();
        assert_eq!(indices, vec![0, 5, 7]);
        assert_eq!(centroids.row(1).to_vec(), vec![105.0, 15.0]);
    }

    #[test]
    fn test_fit_clusters() {
        let records = three_groups();
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();

        assert_eq!(model.cluster_ids, vec![1, 1, 1, 2, 2, 2, 3, 3, 3]);
        assert_eq!(model.centroids.shape(), &[3, 2]);
        assert_eq!(model.cluster_sizes(), vec![3, 3, 3]);
        assert!(model.inertia.is_finite() && model.inertia >= 0.0);
        assert_centroids_are_member_means(&records, &model);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let records = three_groups();
        let params = ClusterParams::default();
        let first = fit_clusters(&records, &params).unwrap();
        let second = fit_clusters(&records, &params).unwrap();

        assert_eq!(first.cluster_ids, second.cluster_ids);
        assert_eq!(summarize(&records, &first), summarize(&records, &second));
    }

    #[test]
    fn test_summarize() {
        let records = three_groups();
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();
        let summary = summarize(&records, &model);

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].cluster_id, 1);
        assert_eq!(summary[0].member_count, 3);
        assert!((summary[0].mean_opening_stock - 11.0).abs() < 1e-9);
        assert!((summary[0].mean_sell_through_pct - 90.0).abs() < 1e-9);
        assert!((summary[2].mean_opening_stock - 301.666_666_666).abs() < 1e-6);
    }

    #[test]
    fn test_members_partition_rows() {
        let records = three_groups();
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();

        let mut all: Vec<usize> = (1..=3).flat_map(|id| model.members(id)).collect();
        all.sort_unstable();
        assert_eq!(all, (0..records.len()).collect::<Vec<_>>());
    }

    /// Overlapping rows where the centroid update rule decides the partition
    fn overlapping() -> Vec<DerivedRecord> {
        derived(&[
            (128.0, 78.125),
            (127.0, 38.583),
            (81.0, 71.605),
            (193.0, 69.948),
            (37.0, 32.432),
            (185.0, 96.216),
            (130.0, 56.154),
            (127.0, 62.205),
            (194.0, 97.423),
            (74.0, 89.189),
            (64.0, 34.375),
        ])
    }

    fn assert_centroids_are_member_means(records: &[DerivedRecord], model: &ClusterModel) {
        let summary = summarize(records, model);
        assert_eq!(summary.len(), model.n_clusters);
        for row in &summary {
            let centroid = model.centroids.row(row.cluster_id - 1);
            assert!((centroid[0] - row.mean_opening_stock).abs() < 1e-9);
            assert!((centroid[1] - row.mean_sell_through_pct).abs() < 1e-9);
        }
    }

    #[test]
    fn test_overlapping_rows_use_plain_means() {
        let records = overlapping();
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();

        assert_eq!(model.initial_indices, vec![0, 5, 7]);
        assert_eq!(model.cluster_ids, vec![1, 1, 1, 2, 3, 2, 1, 1, 2, 1, 3]);
        assert_eq!(model.cluster_sizes(), vec![6, 3, 2]);
        assert!((model.centroids[[0, 0]] - 111.166_666_666_666_67).abs() < 1e-9);
        assert!((model.centroids[[2, 1]] - 33.4035).abs() < 1e-9);
        assert_centroids_are_member_means(&records, &model);
    }

    #[test]
    fn test_mixed_stock_levels() {
        let records = derived(&[
            (12.0, 75.0),
            (45.0, 40.0),
            (30.0, 63.333),
            (60.0, 25.0),
            (18.0, 88.889),
            (50.0, 52.0),
            (75.0, 30.667),
            (25.0, 44.0),
            (90.0, 12.222),
            (40.0, 70.0),
            (65.0, 46.154),
            (15.0, 33.333),
            (80.0, 50.0),
            (35.0, 57.143),
        ]);
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();

        assert_eq!(model.initial_indices, vec![10, 6, 2]);
        assert_eq!(model.cluster_ids, vec![3, 1, 3, 2, 3, 1, 2, 3, 2, 3, 1, 3, 1, 3]);
        assert_centroids_are_member_means(&records, &model);
    }

    #[test]
    fn test_duplicate_initial_rows_still_give_three_clusters() {
        // rows 2, 0 and 4 are drawn and all sit on the same point
        let records = derived(&[(10.0, 50.0), (20.0, 10.0), (10.0, 50.0), (30.0, 90.0), (10.0, 50.0)]);
        let model = fit_clusters(&records, &ClusterParams::default()).unwrap();

        assert_eq!(model.initial_indices, vec![2, 0, 4]);
        assert_eq!(model.cluster_ids, vec![1, 3, 1, 2, 1]);
        assert_eq!(model.cluster_sizes(), vec![3, 1, 1]);
        assert_centroids_are_member_means(&records, &model);
    }

    #[test]
    fn test_lloyd_rejects_mismatched_centroids() {
        let features = feature_matrix(&three_groups());
        let dataset = Dataset::new(features, Array1::<usize>::zeros(9));

        let err = LloydKMeans::new(Array2::zeros((3, 3))).fit(&dataset).unwrap_err();
        assert!(matches!(err, DashboardError::Clustering(_)));
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_lloyd_stops_at_iteration_bound() {
        let features = feature_matrix(&overlapping());
        let initial = features.select(Axis(0), &[0, 5, 7]);
        let dataset = Dataset::new(features, Array1::<usize>::zeros(11));

        let fit = LloydKMeans::new(initial).max_iterations(1).fit(&dataset).unwrap();
        assert_eq!(fit.iterations, 1);
        assert_eq!(fit.labels.len(), 11);
    }

    #[test]
    fn test_too_few_rows() {
        let records = derived(&[(10.0, 50.0), (20.0, 10.0)]);
        let err = fit_clusters(&records, &ClusterParams::default()).unwrap_err();
        assert!(matches!(err, DashboardError::TooFewRows { rows: 2, k: 3 }));
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_too_few_distinct_rows() {
        let records = derived(&[(10.0, 50.0), (10.0, 50.0), (20.0, 10.0), (20.0, 10.0)]);
        let err = fit_clusters(&records, &ClusterParams::default()).unwrap_err();
        assert!(matches!(err, DashboardError::TooFewDistinctRows { distinct: 2, k: 3 }));
    }
}
