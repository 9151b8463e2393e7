// src/clustering/selection.rs

use anyhow::Result;
use log::{debug, info};
use ndarray::ArrayView2;

use crate::clustering::kmeans::{fit, KMeansParams};
use crate::utils::cluster_config::ClusteringConfig;

/// Outcome of the elbow search: the chosen k and the inertia curve behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCountSelection {
    pub k: usize,
    pub k_values: Vec<usize>,
    pub inertias: Vec<f64>,
}

/// Candidate cluster counts: `2..=max(2, min(max_clusters, n / min_cluster_size))`,
/// never exceeding the number of keywords.
pub fn candidate_k_values(n_keywords: usize, config: &ClusterCountLimits) -> Vec<usize> {
    let mut max_k = config
        .max_clusters
        .min(n_keywords / config.min_cluster_size.max(1));
    if max_k < 2 {
        max_k = 2;
    }
    let max_k = max_k.min(n_keywords);
    (2..=max_k).collect()
}

/// The two thresholds that bound the candidate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCountLimits {
    pub min_cluster_size: usize,
    pub max_clusters: usize,
}

impl From<&ClusteringConfig> for ClusterCountLimits {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
            max_clusters: config.max_clusters,
        }
    }
}

/// Locates the elbow of the inertia curve.
///
/// Takes the second difference of the inertia sequence and returns the k one
/// position after its most negative entry (first on ties). With fewer than
/// three samples the smallest candidate wins, or 2 when there are none.
/// This is a heuristic; no significance test is applied.
pub fn find_elbow_point(k_values: &[usize], inertias: &[f64]) -> usize {
    if inertias.len() < 3 {
        return k_values.first().copied().unwrap_or(2);
    }

    let diffs: Vec<f64> = inertias.windows(2).map(|w| w[1] - w[0]).collect();
    let diff_diffs: Vec<f64> = diffs.windows(2).map(|w| w[1] - w[0]).collect();

    let mut elbow_idx = 0;
    for (i, &value) in diff_diffs.iter().enumerate() {
        if value < diff_diffs[elbow_idx] {
            elbow_idx = i;
        }
    }

    k_values[elbow_idx + 1]
}

/// Runs k-means for every candidate k and picks the elbow.
pub fn select_cluster_count(
    embeddings: ArrayView2<f64>,
    config: &ClusteringConfig,
) -> Result<ClusterCountSelection> {
    let n_samples = embeddings.nrows();
    let k_values = candidate_k_values(n_samples, &ClusterCountLimits::from(config));

    let mut inertias = Vec::with_capacity(k_values.len());
    for &k in &k_values {
        let run = fit(embeddings, &KMeansParams::from_config(k, config))?;
        debug!("Elbow search: k={} inertia={:.6}", k, run.inertia);
        inertias.push(run.inertia);
    }

    let k = find_elbow_point(&k_values, &inertias).min(n_samples).max(1);
    info!(
        "Selected k={} from {} candidate values ({:?})",
        k,
        k_values.len(),
        k_values
    );

    Ok(ClusterCountSelection {
        k,
        k_values,
        inertias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn limits(min_cluster_size: usize, max_clusters: usize) -> ClusterCountLimits {
        ClusterCountLimits {
            min_cluster_size,
            max_clusters,
        }
    }

    #[test]
    fn test_candidate_range() {
        assert_eq!(candidate_k_values(12, &limits(3, 20)), vec![2, 3, 4]);
        assert_eq!(candidate_k_values(6, &limits(2, 20)), vec![2, 3]);
        assert_eq!(candidate_k_values(100, &limits(3, 20)).last(), Some(&20));
        // floored at 2
        assert_eq!(candidate_k_values(3, &limits(3, 20)), vec![2]);
        // never more clusters than keywords
        assert!(candidate_k_values(1, &limits(1, 20)).is_empty());
    }

    #[test]
    fn test_elbow_with_short_curves() {
        assert_eq!(find_elbow_point(&[2, 3], &[10.0, 5.0]), 2);
        assert_eq!(find_elbow_point(&[], &[]), 2);
    }

    #[test]
    fn test_elbow_picks_most_negative_second_difference() {
        // diffs [-1, -6, -0.5], second diffs [-5, 5.5]
        assert_eq!(find_elbow_point(&[2, 3, 4, 5], &[10.0, 9.0, 3.0, 2.5]), 3);
        // diffs [-4, -1, -0.5], second diffs [3, 0.5]
        assert_eq!(find_elbow_point(&[2, 3, 4, 5], &[10.0, 6.0, 5.0, 4.5]), 4);
    }

    #[test]
    fn test_elbow_ties_take_first() {
        // second diffs [0, 0]
        assert_eq!(find_elbow_point(&[2, 3, 4, 5], &[4.0, 3.0, 2.0, 1.0]), 3);
    }

    #[test]
    fn test_select_cluster_count_records_curve() {
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [5.0, 5.0],
            [5.1, 5.0],
            [9.0, 0.0],
            [9.1, 0.0],
        ];
        let config = ClusteringConfig {
            min_cluster_size: 2,
            ..ClusteringConfig::default()
        };
        let selection = select_cluster_count(data.view(), &config).unwrap();
        assert_eq!(selection.k_values, vec![2, 3]);
        assert_eq!(selection.inertias.len(), 2);
        assert!(selection.inertias[1] <= selection.inertias[0]);
        assert_eq!(selection.k, 2);
    }
}
