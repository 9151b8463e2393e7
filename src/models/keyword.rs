// src/models/keyword.rs

use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Search volume used when the `keywords.search_volume` column is NULL.
pub const DEFAULT_SEARCH_VOLUME: i64 = 0;
/// Difficulty used when the `keywords.difficulty` column is NULL (midpoint of 0-100).
pub const DEFAULT_DIFFICULTY: i32 = 50;
/// Cost per click used when the `keywords.cpc` column is NULL.
pub const DEFAULT_CPC: f64 = 0.0;

/// Organization (and optional project) a clustering run is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordScope {
    pub org_id: Uuid,
    pub project_id: Option<Uuid>,
}

impl KeywordScope {
    pub fn new(org_id: Uuid, project_id: Option<Uuid>) -> Self {
        Self { org_id, project_id }
    }
}

/// A keyword row waiting to be clustered.
///
/// Built once at the data-access boundary; every nullable column has already
/// been replaced by its documented default so the clustering code never sees
/// a NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: Uuid,
    pub term: String,
    /// Monthly search volume. NULL becomes [`DEFAULT_SEARCH_VOLUME`].
    pub search_volume: i64,
    /// Ranking difficulty on a 0-100 scale. NULL becomes [`DEFAULT_DIFFICULTY`].
    pub difficulty: i32,
    /// Cost per click. NULL becomes [`DEFAULT_CPC`].
    pub cpc: f64,
    /// Free-form per-keyword settings. NULL or unparseable JSON becomes `{}`.
    pub settings: serde_json::Value,
}

impl KeywordRecord {
    /// Applies the per-field NULL defaults to raw column values.
    pub fn from_nullable(
        id: Uuid,
        term: String,
        search_volume: Option<i64>,
        difficulty: Option<i32>,
        cpc: Option<f64>,
        settings: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id,
            term,
            search_volume: search_volume.unwrap_or(DEFAULT_SEARCH_VOLUME),
            difficulty: difficulty.unwrap_or(DEFAULT_DIFFICULTY),
            cpc: cpc.unwrap_or(DEFAULT_CPC),
            settings: settings.unwrap_or_else(|| serde_json::json!({})),
        }
    }

    /// Parses the raw `keywords.settings` text. NULL or unparseable JSON becomes `{}`.
    pub fn settings_from_raw(raw: Option<&str>) -> serde_json::Value {
        match raw {
            Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
                warn!("Unparseable keyword settings ({}), using {{}}", e);
                serde_json::json!({})
            }),
            None => serde_json::json!({}),
        }
    }
}
