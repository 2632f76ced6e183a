use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::ops::filters::{FilterCatalog, FilterDef, builtin_filters};

// ============================================================================
// EDITOR CONFIG
// ============================================================================

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Session-wide settings. Missing keys fall back to their defaults, so
/// `{}` is a valid config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of history entries kept; oldest are evicted.
    pub history_limit: usize,
    /// Quiet period before a burst of slider changes is committed.
    pub debounce_ms: u64,
    /// Filters selectable by name.
    pub filters: Vec<FilterDef>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            filters: builtin_filters(),
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject settings a session cannot run with.
    pub fn validate(&self) -> EditorResult<()> {
        if self.history_limit == 0 {
            return Err(EditorError::config("history_limit must be at least 1"));
        }
        self.catalog().map(|_| ())
    }

    /// Catalog built from `filters`. Kernel problems surface as `Config`.
    pub fn catalog(&self) -> EditorResult<FilterCatalog> {
        FilterCatalog::new(self.filters.clone()).map_err(|e| match e {
            EditorError::UnsupportedFilter(msg) => EditorError::config(msg),
            other => other,
        })
    }

    /// Parse JSON, clamp filter intensities into [0, 1] and validate.
    pub fn from_json_str(json: &str) -> EditorResult<Self> {
        let mut config: EditorConfig = serde_json::from_str(json)
            .map_err(|e| EditorError::config(format!("malformed config: {}", e)))?;
        for filter in &mut config.filters {
            if filter.intensity.is_finite() {
                filter.intensity = filter.intensity.clamp(0.0, 1.0);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> EditorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        crate::log_info!(
            "config: loaded {} (history_limit={}, debounce_ms={}, {} filters)",
            path.display(),
            config.history_limit,
            config.debounce_ms,
            config.filters.len()
        );
        Ok(config)
    }

    pub fn to_json_string(&self) -> EditorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EditorError::config(format!("cannot serialize config: {}", e)))
    }

    pub fn save(&self, path: &Path) -> EditorResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.debounce(), Duration::from_secs(1));
        assert_eq!(config.filters.len(), 10);
        config.validate().unwrap();
    }

    #[test]
    fn empty_object_uses_defaults() {
        assert_eq!(EditorConfig::from_json_str("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = EditorConfig::from_json_str(r#"{ "history_limit": 5, "debounce_ms": 250 }"#).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.filters, builtin_filters());
    }

    #[test]
    fn custom_filters_and_intensity_clamp() {
        let json = r#"{
            "filters": [
                { "name": "Original", "matrix": [0,0,0, 0,1,0, 0,0,0] },
                { "name": "Hot", "matrix": [1,0,0, 0,1,0, 0,0,1], "intensity": 4.0 }
            ]
        }"#;
        let config = EditorConfig::from_json_str(json).unwrap();
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].intensity, 1.0);
        assert_eq!(config.filters[1].intensity, 1.0);
        assert!(config.catalog().unwrap().get("Hot").is_ok());
    }

    #[test]
    fn rejects_zero_history_limit() {
        let err = EditorConfig::from_json_str(r#"{ "history_limit": 0 }"#).unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn rejects_bad_kernels_and_duplicates() {
        let short = r#"{ "filters": [ { "name": "Bad", "matrix": [1, 2, 3] } ] }"#;
        assert!(matches!(EditorConfig::from_json_str(short), Err(EditorError::Config(_))));

        let dup = r#"{ "filters": [
            { "name": "A", "matrix": [0,0,0, 0,1,0, 0,0,0] },
            { "name": "A", "matrix": [0,0,0, 0,1,0, 0,0,0] }
        ] }"#;
        assert!(matches!(EditorConfig::from_json_str(dup), Err(EditorError::Config(_))));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EditorConfig::from_json_str("{ history_limit: "),
            Err(EditorError::Config(_))
        ));
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("snapforge-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = EditorConfig {
            history_limit: 7,
            ..EditorConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EditorConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EditorError::Io(_)));
    }
}
