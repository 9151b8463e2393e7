// src/utils/cluster_config.rs
use anyhow::{bail, Result};
use log::{info, warn};
use std::env;
use std::str::FromStr;

/// Feature-extraction and clustering thresholds for a keyword clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Smallest group that becomes a cluster. Also the minimum number of
    /// keywords needed before clustering is attempted at all.
    pub min_cluster_size: usize,
    /// Upper bound on the candidate k values tried by the elbow search.
    pub max_clusters: usize,
    /// Maximum TF-IDF vocabulary size (embedding dimensionality).
    pub max_features: usize,
    /// Base seed for k-means; restart `i` is seeded with `random_seed + i`.
    pub random_seed: u64,
    /// Number of k-means restarts per k, best inertia wins.
    pub n_init: usize,
    /// Lloyd iterations per restart.
    pub max_iter: usize,
    /// Relative convergence tolerance, scaled by the mean feature variance.
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            max_clusters: 20,
            max_features: 1000,
            random_seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

impl ClusteringConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Missing or
    /// unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            min_cluster_size: parse_or(&lookup, "CLUSTER_MIN_SIZE", defaults.min_cluster_size),
            max_clusters: parse_or(&lookup, "CLUSTER_MAX_CLUSTERS", defaults.max_clusters),
            max_features: parse_or(&lookup, "CLUSTER_MAX_FEATURES", defaults.max_features),
            random_seed: parse_or(&lookup, "CLUSTER_RANDOM_SEED", defaults.random_seed),
            n_init: parse_or(&lookup, "CLUSTER_N_INIT", defaults.n_init),
            max_iter: parse_or(&lookup, "CLUSTER_MAX_ITER", defaults.max_iter),
            tolerance: parse_or(&lookup, "CLUSTER_TOLERANCE", defaults.tolerance),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size == 0 {
            bail!("CLUSTER_MIN_SIZE must be at least 1");
        }
        if self.max_features == 0 {
            bail!("CLUSTER_MAX_FEATURES must be at least 1");
        }
        if self.n_init == 0 || self.max_iter == 0 {
            bail!("CLUSTER_N_INIT and CLUSTER_MAX_ITER must be at least 1");
        }
        if !(self.tolerance >= 0.0) {
            bail!("CLUSTER_TOLERANCE must be a non-negative number");
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("Keyword clustering configuration:");
        info!("   Min cluster size: {}", self.min_cluster_size);
        info!("   Max clusters: {}", self.max_clusters);
        info!("   Max TF-IDF features: {}", self.max_features);
        info!(
            "   K-means: seed={}, n_init={}, max_iter={}, tol={}",
            self.random_seed, self.n_init, self.max_iter, self.tolerance
        );
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using default {}", raw, key, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults_when_unset() {
        let config = ClusteringConfig::from_lookup(|_| None);
        assert_eq!(config, ClusteringConfig::default());
        assert_eq!(config.min_cluster_size, 3);
        assert_eq!(config.max_clusters, 20);
        assert_eq!(config.max_features, 1000);
    }

    #[test]
    fn test_config_overrides() {
        let config = ClusteringConfig::from_lookup(lookup_from(&[
            ("CLUSTER_MIN_SIZE", "2"),
            ("CLUSTER_MAX_CLUSTERS", "8"),
            ("CLUSTER_RANDOM_SEED", "7"),
            ("CLUSTER_TOLERANCE", "0.001"),
        ]));
        assert_eq!(config.min_cluster_size, 2);
        assert_eq!(config.max_clusters, 8);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.tolerance, 0.001);
        assert_eq!(config.n_init, 10);
    }

    #[test]
    fn test_config_invalid_values_fall_back() {
        let config = ClusteringConfig::from_lookup(lookup_from(&[
            ("CLUSTER_MIN_SIZE", "three"),
            ("CLUSTER_MAX_FEATURES", "-5"),
        ]));
        assert_eq!(config.min_cluster_size, 3);
        assert_eq!(config.max_features, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = ClusteringConfig {
            min_cluster_size: 0,
            ..ClusteringConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClusteringConfig {
            n_init: 0,
            ..ClusteringConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(ClusteringConfig::default().validate().is_ok());
    }
}
