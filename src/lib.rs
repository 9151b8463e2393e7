pub mod clustering;
pub mod models;
pub mod utils;

pub use clustering::create_clusters::KeywordClusterer;
pub use clustering::db::{KeywordStore, PgKeywordStore};
pub use models::{ClusteringSummary, KeywordCluster, KeywordRecord, KeywordScope};
pub use utils::cluster_config::ClusteringConfig;
