// src/clustering/create_clusters.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::MultiProgress;
use log::info;
use ndarray::{ArrayView1, ArrayView2};
use uuid::Uuid;

use crate::clustering::db::KeywordStore;
use crate::clustering::embedding::create_embeddings;
use crate::clustering::kmeans::{fit, KMeansParams};
use crate::clustering::naming::{generate_cluster_description, generate_cluster_name};
use crate::clustering::selection::select_cluster_count;
use crate::models::{ClusteringSummary, KeywordCluster, KeywordRecord, KeywordScope};
use crate::utils::cluster_config::ClusteringConfig;
use crate::utils::progress_config::stage_bar;

/// Groups an organization's unclustered keywords into named clusters.
///
/// Holds its store and thresholds explicitly; nothing is read from global
/// state. Callers must not run two passes for the same scope at once.
pub struct KeywordClusterer<S> {
    store: S,
    config: ClusteringConfig,
    multi_progress: Option<MultiProgress>,
}

impl<S: KeywordStore> KeywordClusterer<S> {
    pub fn new(store: S, config: ClusteringConfig) -> Result<Self> {
        config.validate().context("Invalid clustering configuration")?;
        Ok(Self {
            store,
            config,
            multi_progress: None,
        })
    }

    pub fn with_progress(mut self, multi_progress: Option<MultiProgress>) -> Self {
        self.multi_progress = multi_progress;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches, clusters and persists the unclustered keywords of a scope.
    pub async fn process_keywords(
        &self,
        org_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<ClusteringSummary> {
        self.run(KeywordScope::new(org_id, project_id), true).await
    }

    /// Same pipeline as [`process_keywords`](Self::process_keywords) without writing anything.
    pub async fn preview_keywords(
        &self,
        org_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<ClusteringSummary> {
        self.run(KeywordScope::new(org_id, project_id), false).await
    }

    async fn run(&self, scope: KeywordScope, persist: bool) -> Result<ClusteringSummary> {
        let main_pb = stage_bar(
            &self.multi_progress,
            3,
            "  {spinner:.cyan} [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} {msg}",
            "Fetching keywords...",
        );

        let keywords = self
            .store
            .fetch_unclustered_keywords(&scope)
            .await
            .context("Failed to fetch keywords for clustering")?;
        if let Some(pb) = &main_pb {
            pb.inc(1);
            pb.set_message("Clustering keywords...");
        }

        if keywords.is_empty() {
            info!("No unclustered keywords for org {}", scope.org_id);
            if let Some(pb) = &main_pb {
                pb.finish_with_message("Nothing to cluster");
            }
            return Ok(ClusteringSummary::empty(0));
        }

        info!("Processing {} keywords for clustering", keywords.len());
        let clusters = self.cluster_keywords(&keywords)?;
        if let Some(pb) = &main_pb {
            pb.inc(1);
            pb.set_message("Storing clusters...");
        }

        if persist && !clusters.is_empty() {
            self.store
                .store_keyword_clusters(&scope, &clusters)
                .await
                .context("Failed to save keyword clusters")?;
        } else if !persist {
            info!("Dry run: {} clusters computed, nothing persisted", clusters.len());
        }
        if let Some(pb) = &main_pb {
            pb.inc(1);
            pb.finish_with_message(format!("Created {} clusters", clusters.len()));
        }

        log_cluster_statistics(&clusters);
        Ok(ClusteringSummary::from_clusters(keywords.len(), &clusters))
    }

    /// Embeds the terms, selects k by the elbow heuristic and partitions.
    ///
    /// Returns no clusters, without touching the embedding stage, when there
    /// are fewer keywords than `min_cluster_size`.
    pub fn cluster_keywords(&self, keywords: &[KeywordRecord]) -> Result<Vec<KeywordCluster>> {
        if keywords.len() < self.config.min_cluster_size {
            info!("Not enough keywords ({}) for clustering", keywords.len());
            return Ok(Vec::new());
        }

        let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
        let embedding = create_embeddings(&terms, self.config.max_features)
            .context("Failed to create keyword embeddings")?;

        let selection = select_cluster_count(embedding.matrix.view(), &self.config)?;
        build_clusters(
            keywords,
            embedding.matrix.view(),
            selection.k,
            &self.config,
            &new_run_tag(),
            Utc::now(),
        )
    }
}

/// Short per-run tag appended to cluster ids so runs in the same second never collide.
pub fn new_run_tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Partitions keywords with k-means at the given k and turns every group of at
/// least `min_cluster_size` members into a [`KeywordCluster`]. Smaller groups
/// are dropped and their keywords stay unclustered.
pub fn build_clusters(
    keywords: &[KeywordRecord],
    embeddings: ArrayView2<f64>,
    k: usize,
    config: &ClusteringConfig,
    run_tag: &str,
    created_at: DateTime<Utc>,
) -> Result<Vec<KeywordCluster>> {
    let kmeans = fit(embeddings, &KMeansParams::from_config(k, config))
        .context("Final k-means partitioning failed")?;
    let timestamp = created_at.format("%Y%m%d_%H%M%S");

    let mut clusters = Vec::new();
    for label in 0..k {
        let members: Vec<usize> = kmeans
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect();

        if members.len() < config.min_cluster_size {
            continue;
        }

        let member_keywords: Vec<&KeywordRecord> = members.iter().map(|&i| &keywords[i]).collect();
        let terms: Vec<&str> = member_keywords.iter().map(|k| k.term.as_str()).collect();
        let centroid = kmeans.centroids.row(label);
        let size = member_keywords.len() as f64;

        let cohesion = members
            .iter()
            .map(|&i| cosine_similarity(embeddings.row(i), centroid))
            .sum::<f64>()
            / size;

        clusters.push(KeywordCluster {
            id: format!("cluster_{}_{}_{}", label, timestamp, run_tag),
            name: generate_cluster_name(&terms),
            description: generate_cluster_description(&terms),
            keyword_ids: member_keywords.iter().map(|k| k.id).collect(),
            keywords: terms.iter().map(|t| t.to_string()).collect(),
            centroid: centroid.to_vec(),
            size: member_keywords.len(),
            avg_search_volume: member_keywords.iter().map(|k| k.search_volume as f64).sum::<f64>() / size,
            avg_difficulty: member_keywords.iter().map(|k| k.difficulty as f64).sum::<f64>() / size,
            avg_cpc: member_keywords.iter().map(|k| k.cpc).sum::<f64>() / size,
            cohesion,
        });
    }

    Ok(clusters)
}

fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Logs summary statistics about the cohesion of the generated clusters.
fn log_cluster_statistics(clusters: &[KeywordCluster]) {
    if clusters.is_empty() {
        info!("No keyword clusters to report statistics for.");
        return;
    }

    let cohesion: Vec<f64> = clusters.iter().map(|c| c.cohesion).collect();
    let avg = cohesion.iter().sum::<f64>() / cohesion.len() as f64;
    let max = cohesion.iter().fold(0.0f64, |a, &b| a.max(b));
    let min = cohesion.iter().fold(1.0f64, |a, &b| a.min(b));
    let clustered: usize = clusters.iter().map(|c| c.size).sum();

    info!("Keyword Cluster Statistics:");
    info!("  Clusters: {}, keywords clustered: {}", clusters.len(), clustered);
    info!("  Cohesion average: {:.3}", avg);
    info!("  Cohesion maximum: {:.3}", max);
    info!("  Cohesion minimum: {:.3}", min);
    for cluster in clusters {
        info!(
            "  {} ({} keywords, avg volume {:.1}, avg difficulty {:.1}, avg cpc {:.2})",
            cluster.name, cluster.size, cluster.avg_search_volume, cluster.avg_difficulty, cluster.avg_cpc
        );
    }
}
