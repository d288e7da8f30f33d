//! Application configuration. Store backend, paths, catalog defaults.

use crate::usecases::DEFAULT_SEMESTER;
use serde::Deserialize;
use std::path::PathBuf;

/// Entity store backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Directory holding catalog.db / catalog.json. Read from COURSES_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Store backend: "sqlite" (default) or "json". Read from COURSES_STORE.
    #[serde(default)]
    pub store: Option<StoreKind>,

    /// Optional catalog snapshot (JSON) imported at startup. Read from COURSES_SEED_PATH.
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Semester listed when none is given. Read from COURSES_DEFAULT_SEMESTER.
    #[serde(default)]
    pub default_semester: Option<String>,
}

impl AppConfig {
    /// Load from `.env`, `COURSES_*` environment variables and the optional file named by COURSES_CONFIG.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("COURSES_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        // Environment wins over the file.
        c = c.add_source(config::Environment::with_prefix("COURSES"));
        c.build()?.try_deserialize()
    }

    /// Returns the data directory. Defaults to ./data.
    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    pub fn store_or_default(&self) -> StoreKind {
        self.store.unwrap_or_default()
    }

    pub fn seed_path(&self) -> Option<PathBuf> {
        self.seed_path
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Returns the default semester. Blank values fall back to DEFAULT_SEMESTER.
    pub fn default_semester_or_default(&self) -> String {
        self.default_semester
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SEMESTER)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.data_dir_or_default(), PathBuf::from("./data"));
        assert_eq!(cfg.store_or_default(), StoreKind::Sqlite);
        assert_eq!(cfg.seed_path(), None);
        assert_eq!(cfg.default_semester_or_default(), "20153");
    }

    #[test]
    fn deserializes_from_config_sources() {
        let cfg: AppConfig = config::Config::builder()
            .set_override("store", "json")
            .unwrap()
            .set_override("default_semester", " 20161 ")
            .unwrap()
            .set_override("seed_path", "seed.json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.store_or_default(), StoreKind::Json);
        assert_eq!(cfg.default_semester_or_default(), "20161");
        assert_eq!(cfg.seed_path(), Some(PathBuf::from("seed.json")));
    }
}
