use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::{FlatrestError, FlatrestResult};

/// Store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub file_extension: String,
    pub pretty: bool,
    /// table -> relation name -> how to resolve it
    pub relations: HashMap<String, HashMap<String, RelationConfig>>,
}

/// How a relation term embedded in a select resolves to a related row
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RelationConfig {
    /// Column on the embedding row holding the related row's `id`
    pub foreign_key: String,
    /// Related table; defaults to the relation name
    #[serde(default)]
    pub table: Option<String>,
}

impl RelationConfig {
    pub fn new(foreign_key: &str) -> Self {
        Self {
            foreign_key: foreign_key.to_string(),
            table: None,
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Table to look the related row up in
    pub fn target_table<'a>(&'a self, relation: &'a str) -> &'a str {
        self.table.as_deref().unwrap_or(relation)
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file
    pub fn from_file(path: &Path) -> FlatrestResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FlatrestError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            FlatrestError::Configuration(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.file_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Register a relation that rows of `table` can embed
    pub fn with_relation(mut self, table: &str, relation: &str, config: RelationConfig) -> Self {
        self.relations
            .entry(table.to_string())
            .or_default()
            .insert(relation.to_string(), config);
        self
    }

    pub fn relation(&self, table: &str, relation: &str) -> Option<&RelationConfig> {
        self.relations.get(table).and_then(|rels| rels.get(relation))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            file_extension: "json".to_string(),
            pretty: true,
            relations: HashMap::new(),
        }
    }
}
