pub mod create_clusters;
pub mod db;
pub mod embedding;
pub mod kmeans;
pub mod naming;
pub mod selection;
