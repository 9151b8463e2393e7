pub mod cluster;
pub mod keyword;

pub use cluster::{ClusterSummary, ClusteringSummary, KeywordCluster};
pub use keyword::{KeywordRecord, KeywordScope};
