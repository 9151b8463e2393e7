// src/main.rs

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use uuid::Uuid;

use cluster_lib::utils::{
    cluster_config::ClusteringConfig,
    db_connect::{connect, get_pool_status},
    env::{load_env, load_env_from_file},
    get_memory_usage,
    progress_config::ProgressConfig,
};
use cluster_lib::{KeywordClusterer, PgKeywordStore};

#[derive(Parser)]
#[command(author, version, about = "Cluster an organization's unclustered keywords", long_about = None)]
struct ClusterArgs {
    /// Organization whose keywords are clustered
    #[arg(long)]
    org_id: Uuid,

    /// Restrict the run to one project
    #[arg(long)]
    project_id: Option<Uuid>,

    /// Compute clusters without writing them
    #[arg(long)]
    dry_run: bool,

    /// Env file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClusterArgs::parse();

    env_logger::init();
    info!("Starting keyword clustering worker");
    match &args.env_file {
        Some(path) => load_env_from_file(path),
        None => load_env(),
    }

    let config = ClusteringConfig::from_env();
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();
    let detailed_progress = if progress_config.should_show_detailed() {
        multi_progress.clone()
    } else {
        None
    };

    let pool = connect().await.context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let store = PgKeywordStore::new(pool).with_progress(detailed_progress);
    let clusterer = KeywordClusterer::new(store, config)?.with_progress(multi_progress);

    let start = Instant::now();
    let result = if args.dry_run {
        info!("Dry run enabled - clusters will not be persisted");
        clusterer.preview_keywords(args.org_id, args.project_id).await
    } else {
        clusterer.process_keywords(args.org_id, args.project_id).await
    };
    let summary = result.context("Keyword clustering failed")?;

    info!(
        "Clustering completed. Created {} clusters from {} keywords in {:.2?}.",
        summary.clusters_created,
        summary.keywords_processed,
        start.elapsed()
    );

    if progress_config.should_show_memory() {
        info!("Memory usage: {} MB", get_memory_usage().await);
    }
    let (pool_size, available_connections, in_use_connections) = get_pool_status(clusterer.store().pool());
    info!(
        "Final DB Connection Pool Status: Total: {}, Available: {}, In Use: {}",
        pool_size, available_connections, in_use_connections
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize clustering summary")?
    );
    Ok(())
}
