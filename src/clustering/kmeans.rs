// src/clustering/kmeans.rs

use anyhow::{bail, Result};
use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use crate::utils::cluster_config::ClusteringConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub random_seed: u64,
}

impl KMeansParams {
    pub fn from_config(n_clusters: usize, config: &ClusteringConfig) -> Self {
        Self {
            n_clusters,
            n_init: config.n_init,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            random_seed: config.random_seed,
        }
    }
}

/// Best run of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
    pub n_iter: usize,
}

/// Runs `n_init` independent k-means restarts and keeps the lowest inertia.
///
/// Restart `i` seeds its own RNG with `random_seed + i`, so restarts share no
/// state and the result depends only on the data and the parameters.
pub fn fit(data: ArrayView2<f64>, params: &KMeansParams) -> Result<KMeansFit> {
    let n_samples = data.nrows();
    if n_samples == 0 {
        bail!("Cannot run k-means on an empty matrix");
    }
    if params.n_clusters == 0 {
        bail!("k-means needs at least one cluster");
    }
    if params.n_clusters > n_samples {
        bail!(
            "k-means asked for {} clusters but only {} samples are available",
            params.n_clusters,
            n_samples
        );
    }

    let tol = params.tolerance * mean_feature_variance(data);
    let mut best: Option<KMeansFit> = None;
    for init in 0..params.n_init.max(1) {
        let mut rng = StdRng::seed_from_u64(params.random_seed.wrapping_add(init as u64));
        let run = lloyd(data, params.n_clusters, params.max_iter, tol, &mut rng);
        debug!(
            "k-means k={} init={} inertia={:.6} iterations={}",
            params.n_clusters, init, run.inertia, run.n_iter
        );
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    match best {
        Some(fit) => Ok(fit),
        None => bail!("k-means produced no runs"),
    }
}

fn lloyd(data: ArrayView2<f64>, k: usize, max_iter: usize, tol: f64, rng: &mut StdRng) -> KMeansFit {
    let mut centroids = kmeans_plus_plus(data, k, rng);
    let (mut labels, _) = assign(data, &centroids);
    let mut n_iter = 0;

    for _ in 0..max_iter {
        n_iter += 1;
        let new_centroids = update_centroids(data, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(new_centroids.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        centroids = new_centroids;

        let (new_labels, _) = assign(data, &centroids);
        if new_labels == labels {
            break;
        }
        labels = new_labels;
        if shift <= tol {
            break;
        }
    }

    // Final assignment keeps labels consistent with the returned centroids.
    let (labels, inertia) = assign(data, &centroids);
    KMeansFit {
        labels,
        centroids,
        inertia,
        n_iter,
    }
}

/// k-means++ seeding with greedy local trials (`2 + ln k` candidates per centre).
fn kmeans_plus_plus(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));
    let n_local_trials = 2 + (k as f64).ln() as usize;

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));
    let mut closest: Vec<f64> = (0..n)
        .map(|i| squared_distance(data.row(i), data.row(first)))
        .collect();

    for c in 1..k {
        let potential: f64 = closest.iter().sum();
        let mut best_candidate = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_closest = Vec::new();

        for _ in 0..n_local_trials {
            let candidate = sample_weighted(&closest, potential, rng);
            let candidate_closest: Vec<f64> = closest
                .iter()
                .enumerate()
                .map(|(i, &d)| d.min(squared_distance(data.row(i), data.row(candidate))))
                .collect();
            let candidate_potential: f64 = candidate_closest.iter().sum();
            if candidate_potential < best_potential {
                best_candidate = candidate;
                best_potential = candidate_potential;
                best_closest = candidate_closest;
            }
        }

        centroids.row_mut(c).assign(&data.row(best_candidate));
        closest = best_closest;
    }

    centroids
}

/// Picks an index with probability proportional to `weights`; uniform when all weights are zero.
fn sample_weighted(weights: &[f64], total: f64, rng: &mut StdRng) -> usize {
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            last_positive = i;
        }
        cumulative += w;
        if cumulative > target {
            return i;
        }
    }
    last_positive
}

/// Nearest-centroid labels (lowest index on ties) and the resulting inertia.
fn assign(data: ArrayView2<f64>, centroids: &Array2<f64>) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = data
        .rows()
        .into_iter()
        .map(|point| {
            let mut best_k = 0;
            let mut best_dist = f64::INFINITY;
            for (ki, centroid) in centroids.rows().into_iter().enumerate() {
                let d = squared_distance(point, centroid);
                if d < best_dist {
                    best_dist = d;
                    best_k = ki;
                }
            }
            inertia += best_dist;
            best_k
        })
        .collect();
    (labels, inertia)
}

/// Mean of the points assigned to each centroid. An empty cluster takes over
/// the point farthest from its own centroid (among clusters with more than one member).
fn update_centroids(data: ArrayView2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let k = previous.nrows();
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; k];
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        let mut row = sums.row_mut(label);
        row += &data.row(i);
    }

    let mut relocated: HashSet<usize> = HashSet::new();
    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }
        let farthest = labels
            .iter()
            .enumerate()
            .filter(|(i, &label)| counts[label] > 1 && !relocated.contains(i))
            .map(|(i, &label)| (i, squared_distance(data.row(i), previous.row(label))))
            .fold(None, |acc: Option<(usize, f64)>, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });
        if let Some((point, _)) = farthest {
            let old = labels[point];
            counts[old] -= 1;
            let mut old_row = sums.row_mut(old);
            old_row -= &data.row(point);
            counts[empty] = 1;
            sums.row_mut(empty).assign(&data.row(point));
            relocated.insert(point);
        }
    }

    let mut centroids = previous.clone();
    for (ki, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(ki) / count as f64;
            centroids.row_mut(ki).assign(&mean);
        }
    }
    centroids
}

fn mean_feature_variance(data: ArrayView2<f64>) -> f64 {
    if data.ncols() == 0 {
        return 0.0;
    }
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

pub fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(k: usize) -> KMeansParams {
        KMeansParams::from_config(k, &ClusteringConfig::default())
    }

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
        ]
    }

    #[test]
    fn test_separated_blobs_are_split() {
        let data = blobs();
        let fit = fit(data.view(), &params(2)).unwrap();
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.1);
        assert_eq!(fit.centroids.dim(), (2, 2));
    }

    #[test]
    fn test_same_seed_same_result() {
        let data = blobs();
        let a = fit(data.view(), &params(3)).unwrap();
        let b = fit(data.view(), &params(3)).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_one_cluster_per_point_has_zero_inertia() {
        let data = blobs();
        let fit = fit(data.view(), &params(6)).unwrap();
        assert!(fit.inertia.abs() < 1e-12);
        let distinct: HashSet<usize> = fit.labels.iter().copied().collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_more_clusters_than_samples_is_an_error() {
        let data = blobs();
        assert!(fit(data.view(), &params(7)).is_err());
        assert!(fit(data.view(), &params(0)).is_err());
    }

    #[test]
    fn test_identical_points_do_not_panic() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let fit = fit(data.view(), &params(2)).unwrap();
        assert_eq!(fit.labels.len(), 3);
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_inertia_matches_labels_and_centroids() {
        let data = blobs();
        let fit = fit(data.view(), &params(2)).unwrap();
        let recomputed: f64 = fit
            .labels
            .iter()
            .enumerate()
            .map(|(i, &l)| squared_distance(data.row(i), fit.centroids.row(l)))
            .sum();
        assert!((recomputed - fit.inertia).abs() < 1e-12);
    }
}
