// src/clustering/db.rs

use anyhow::{bail, Context, Result};
use indicatif::MultiProgress;
use log::info;
use pgvector::Vector;
use postgres_types::ToSql;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::models::{KeywordCluster, KeywordRecord, KeywordScope};
use crate::utils::db_connect::PgPool;
use crate::utils::progress_config::{stage_bar, stage_spinner};

// Configuration
const BATCH_SIZE_DB_OPS: usize = 500; // keyword ids per UPDATE statement
const CLUSTER_INSERT_BATCH: usize = 100; // cluster rows per INSERT statement
const CLUSTER_INSERT_PARAMS: usize = 7;

/// Where keywords are read from and clusters are written to.
#[allow(async_fn_in_trait)]
pub trait KeywordStore {
    /// Keywords in scope without a cluster, by descending search volume.
    /// An empty result means there is nothing to do.
    async fn fetch_unclustered_keywords(&self, scope: &KeywordScope) -> Result<Vec<KeywordRecord>>;

    /// Persists new clusters and points every member keyword at its cluster.
    async fn store_keyword_clusters(
        &self,
        scope: &KeywordScope,
        clusters: &[KeywordCluster],
    ) -> Result<()>;
}

/// PostgreSQL-backed [`KeywordStore`].
#[derive(Clone)]
pub struct PgKeywordStore {
    pool: PgPool,
    multi_progress: Option<MultiProgress>,
}

impl PgKeywordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            multi_progress: None,
        }
    }

    pub fn with_progress(mut self, multi_progress: Option<MultiProgress>) -> Self {
        self.multi_progress = multi_progress;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl KeywordStore for PgKeywordStore {
    async fn fetch_unclustered_keywords(&self, scope: &KeywordScope) -> Result<Vec<KeywordRecord>> {
        fetch_unclustered_keywords(&self.pool, scope, self.multi_progress.clone()).await
    }

    async fn store_keyword_clusters(
        &self,
        scope: &KeywordScope,
        clusters: &[KeywordCluster],
    ) -> Result<()> {
        store_keyword_clusters(&self.pool, scope, clusters, self.multi_progress.clone()).await
    }
}

/// Fetches every keyword of the organization (and project, when given) that
/// has no cluster yet, ordered by descending search volume with NULLs last.
pub async fn fetch_unclustered_keywords(
    pool: &PgPool,
    scope: &KeywordScope,
    multi_progress: Option<MultiProgress>,
) -> Result<Vec<KeywordRecord>> {
    let conn = pool.get().await.context("Failed to get DB connection")?;
    let fetch_pb = stage_spinner(&multi_progress, "Querying unclustered keywords...");

    let query = "
        SELECT id, term,
               search_volume::bigint AS search_volume,
               difficulty::integer AS difficulty,
               cpc::double precision AS cpc,
               settings::text AS settings
        FROM keywords
        WHERE org_id = $1
          AND ($2::uuid IS NULL OR project_id = $2)
          AND cluster_id IS NULL
        ORDER BY search_volume DESC NULLS LAST, term
    ";

    let rows = conn
        .query(query, &[&scope.org_id, &scope.project_id])
        .await
        .context("Failed to query keywords for clustering")?;

    let mut keywords = Vec::with_capacity(rows.len());
    for row in &rows {
        keywords.push(keyword_from_row(row)?);
    }

    if let Some(pb) = &fetch_pb {
        pb.finish_with_message(format!("Fetched {} unclustered keywords", keywords.len()));
    }
    info!(
        "Fetched {} unclustered keywords for org {} (project: {:?})",
        keywords.len(),
        scope.org_id,
        scope.project_id
    );

    Ok(keywords)
}

fn keyword_from_row(row: &Row) -> Result<KeywordRecord> {
    let id: Uuid = row.try_get("id").context("keywords.id")?;
    let term: String = row.try_get("term").context("keywords.term")?;
    let raw_settings: Option<String> = row.try_get("settings").context("keywords.settings")?;
    let settings = KeywordRecord::settings_from_raw(raw_settings.as_deref());

    Ok(KeywordRecord::from_nullable(
        id,
        term,
        row.try_get("search_volume").context("keywords.search_volume")?,
        row.try_get("difficulty").context("keywords.difficulty")?,
        row.try_get("cpc").context("keywords.cpc")?,
        Some(settings),
    ))
}

/// Stores clusters and back-fills `keywords.cluster_id` in a single transaction.
///
/// Either every cluster row and every keyword reference of the run is written,
/// or nothing is. Keyword updates are restricted to the run's scope and to
/// rows that are still unclustered.
pub async fn store_keyword_clusters(
    pool: &PgPool,
    scope: &KeywordScope,
    clusters: &[KeywordCluster],
    multi_progress: Option<MultiProgress>,
) -> Result<()> {
    if clusters.is_empty() {
        info!("No keyword clusters to store.");
        return Ok(());
    }

    let storage_pb = stage_bar(
        &multi_progress,
        2,
        "    {spinner:.red} [{elapsed_precise}] {bar:25.green/blue} {pos}/{len} {msg}",
        "Inserting cluster records...",
    );

    let mut client = pool
        .get()
        .await
        .context("Failed to get DB client for storing keyword clusters")?;
    let transaction = client
        .transaction()
        .await
        .context("Failed to start transaction for keyword cluster storage")?;

    // --- 1. Insert cluster records ---
    info!("Batch inserting {} cluster records...", clusters.len());
    for batch in clusters.chunks(CLUSTER_INSERT_BATCH) {
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();
        let mut values_str = Vec::new();
        let mut i = 1;

        for cluster in batch {
            values_str.push(format!(
                "(${}, ${}, ${}, ${}, ${}, ${}, ${}, NOW(), NOW())",
                i,
                i + 1,
                i + 2,
                i + 3,
                i + 4,
                i + 5,
                i + 6
            ));
            let centroid: Vec<f32> = cluster.centroid.iter().map(|&v| v as f32).collect();
            params.push(Box::new(cluster.id.clone()));
            params.push(Box::new(cluster.name.clone()));
            params.push(Box::new(cluster.description.clone()));
            params.push(Box::new(cluster.keywords.clone()));
            params.push(Box::new(Vector::from(centroid)));
            params.push(Box::new(scope.org_id));
            params.push(Box::new(scope.project_id));
            i += CLUSTER_INSERT_PARAMS;
        }

        let insert_query = format!(
            "INSERT INTO clusters (id, name, description, keywords, embedding, org_id, project_id, created_at, updated_at) VALUES {}",
            values_str.join(", ")
        );
        let params_slice: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();

        transaction
            .execute(&insert_query, &params_slice[..])
            .await
            .context("Failed to batch insert cluster records")?;
    }

    if let Some(pb) = &storage_pb {
        pb.inc(1);
        pb.set_message("Updating keyword cluster references...");
    }

    // --- 2. Point member keywords at their cluster ---
    let update_query = "
        UPDATE keywords
        SET cluster_id = $1, updated_at = NOW()
        WHERE id = ANY($2)
          AND org_id = $3
          AND ($4::uuid IS NULL OR project_id = $4)
          AND cluster_id IS NULL
    ";
    let mut updated_total = 0u64;
    for cluster in clusters {
        let mut updated = 0u64;
        for chunk in cluster.keyword_ids.chunks(BATCH_SIZE_DB_OPS) {
            updated += transaction
                .execute(
                    update_query,
                    &[&cluster.id, &chunk, &scope.org_id, &scope.project_id],
                )
                .await
                .context(format!(
                    "Failed to update keywords for cluster {}",
                    cluster.id
                ))?;
        }
        // Dropping the uncommitted transaction rolls the whole run back.
        check_member_update(&cluster.id, updated, cluster.keyword_ids.len())?;
        updated_total += updated;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit keyword cluster storage")?;
    info!(
        "Saved {} clusters and assigned {} keywords.",
        clusters.len(),
        updated_total
    );

    if let Some(pb) = &storage_pb {
        pb.inc(1);
        pb.finish_with_message("Keyword cluster storage complete");
    }

    Ok(())
}

/// Every member keyword must have been assigned, otherwise the stored cluster
/// would list terms that do not point at it.
fn check_member_update(cluster_id: &str, updated: u64, expected: usize) -> Result<()> {
    if updated as usize != expected {
        bail!(
            "Cluster {}: updated {} of {} member keywords (others were clustered concurrently or left scope); rolling back",
            cluster_id,
            updated,
            expected
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_member_update_passes() {
        assert!(check_member_update("cluster_0_20240101_000000_abcd1234", 3, 3).is_ok());
    }

    #[test]
    fn test_partial_member_update_fails() {
        let err = check_member_update("cluster_1_20240101_000000_abcd1234", 2, 3).unwrap_err();
        assert!(err.to_string().contains("updated 2 of 3"));
        assert!(check_member_update("cluster_1_20240101_000000_abcd1234", 0, 3).is_err());
    }
}
