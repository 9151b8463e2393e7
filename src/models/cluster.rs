// src/models/cluster.rs

use serde::Serialize;
use uuid::Uuid;

/// A group of related keywords produced by one clustering run, ready for
/// database insertion.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordCluster {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Member keyword ids, parallel to `keywords`.
    pub keyword_ids: Vec<Uuid>,
    /// Member terms in fetch order (descending search volume).
    pub keywords: Vec<String>,
    /// Mean TF-IDF vector of the members; same length as the embedding.
    pub centroid: Vec<f64>,
    pub size: usize,
    pub avg_search_volume: f64,
    pub avg_difficulty: f64,
    pub avg_cpc: f64,
    /// Mean cosine similarity between members and the centroid (0.0 to 1.0).
    pub cohesion: f64,
}

/// Per-cluster entry of a [`ClusteringSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub size: usize,
    pub avg_search_volume: f64,
    pub avg_difficulty: f64,
    pub avg_cpc: f64,
    pub cohesion: f64,
}

impl From<&KeywordCluster> for ClusterSummary {
    fn from(cluster: &KeywordCluster) -> Self {
        Self {
            id: cluster.id.clone(),
            name: cluster.name.clone(),
            description: cluster.description.clone(),
            keywords: cluster.keywords.clone(),
            size: cluster.size,
            avg_search_volume: cluster.avg_search_volume,
            avg_difficulty: cluster.avg_difficulty,
            avg_cpc: cluster.avg_cpc,
            cohesion: cluster.cohesion,
        }
    }
}

/// Result of one clustering pass over an organization/project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusteringSummary {
    pub clusters_created: usize,
    pub keywords_processed: usize,
    pub clusters: Vec<ClusterSummary>,
}

impl ClusteringSummary {
    pub fn empty(keywords_processed: usize) -> Self {
        Self {
            clusters_created: 0,
            keywords_processed,
            clusters: Vec::new(),
        }
    }

    pub fn from_clusters(keywords_processed: usize, clusters: &[KeywordCluster]) -> Self {
        Self {
            clusters_created: clusters.len(),
            keywords_processed,
            clusters: clusters.iter().map(ClusterSummary::from).collect(),
        }
    }
}
