use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "MEAL_MAP_DATA_DIR";

/// Where the JSON record store and the lot/unit catalog live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub records_file: String,
    pub lots_file: String,
    pub units_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("dados"),
            records_file: "mapas.json".to_string(),
            lots_file: "lotes.json".to_string(),
            units_file: "unidades.json".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the data directory taken from `MEAL_MAP_DATA_DIR` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::with_data_dir(dir),
            _ => Self::default(),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(&self.records_file)
    }

    pub fn lots_path(&self) -> PathBuf {
        self.data_dir.join(&self.lots_file)
    }

    pub fn units_path(&self) -> PathBuf {
        self.data_dir.join(&self.units_file)
    }
}
