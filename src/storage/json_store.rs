use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::TableQuery;
use crate::utils::{
    config::StoreConfig,
    error::{FlatrestResult, StorageError},
    types::{LoadOutcome, Row},
};

/// File-backed table store: one JSON array of row objects per table.
///
/// Cloning is cheap and every clone shares the same lock registry, so a single
/// store built at startup can be handed to every caller.
#[derive(Clone)]
pub struct JsonStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Access to one table while its lock is held
pub struct TableHandle<'a> {
    store: &'a JsonStore,
    table: &'a str,
    path: PathBuf,
}

impl JsonStore {
    /// Open a store over `config.data_dir`, creating the directory if needed
    pub fn open(config: StoreConfig) -> FlatrestResult<Self> {
        fs::create_dir_all(&config.data_dir).map_err(|e| {
            StorageError::DataDirUnavailable(format!("{}: {}", config.data_dir.display(), e))
        })?;

        tracing::debug!("Opened store at {}", config.data_dir.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                locks: DashMap::new(),
            }),
        })
    }

    /// Open a store with default settings over `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> FlatrestResult<Self> {
        Self::open(StoreConfig::new(data_dir))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.config.data_dir
    }

    /// Start a query against `table`
    pub fn table(&self, table: &str) -> TableQuery {
        TableQuery::new(self.clone(), table)
    }

    /// Path of the file backing `table`
    pub fn table_path(&self, table: &str) -> FlatrestResult<PathBuf> {
        if !is_valid_table_name(table) {
            return Err(StorageError::InvalidTableName(table.to_string()).into());
        }
        Ok(self
            .data_dir()
            .join(format!("{}.{}", table, self.inner.config.file_extension)))
    }

    /// The lock guarding `table`. The map entry is created atomically, so
    /// concurrent first use of a table still yields a single lock.
    fn table_lock(&self, table: &str) -> Arc<Mutex<()>> {
        self.inner
            .locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` with `table`'s lock held for its whole duration
    pub fn with_table<R, F>(&self, table: &str, f: F) -> FlatrestResult<R>
    where
        F: FnOnce(&TableHandle<'_>) -> FlatrestResult<R>,
    {
        let path = self.table_path(table)?;
        let lock = self.table_lock(table);
        // The mutex guards no data, so a panic in another holder leaves nothing inconsistent
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let handle = TableHandle {
            store: self,
            table,
            path,
        };
        f(&handle)
    }

    /// Load a table under its lock
    pub fn load(&self, table: &str) -> FlatrestResult<LoadOutcome> {
        self.with_table(table, |handle| Ok(handle.load()))
    }

    /// Overwrite a table under its lock
    pub fn save(&self, table: &str, rows: &[Row]) -> FlatrestResult<()> {
        self.with_table(table, |handle| handle.save(rows))
    }

    /// Read a table without taking its lock. Saves replace the file by rename,
    /// so this observes either the previous or the next committed state.
    pub fn read_snapshot(&self, table: &str) -> FlatrestResult<LoadOutcome> {
        let path = self.table_path(table)?;
        Ok(self.read_table_file(table, &path))
    }

    /// Names of the tables that currently have a file in the data directory
    pub fn tables(&self) -> FlatrestResult<Vec<String>> {
        let entries = fs::read_dir(self.data_dir()).map_err(|e| {
            StorageError::DataDirUnavailable(format!("{}: {}", self.data_dir().display(), e))
        })?;

        let extension = &self.inner.config.file_extension;
        let mut tables: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().to_string()))
            .filter(|name| is_valid_table_name(name))
            .collect();

        tables.sort();
        Ok(tables)
    }

    fn read_table_file(&self, table: &str, path: &Path) -> LoadOutcome {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
            Err(e) => {
                return self.corrupt(table, format!("Failed to read table file: {}", e));
            }
        };

        match serde_json::from_str::<Vec<Row>>(&content) {
            Ok(rows) => LoadOutcome::Loaded(rows),
            Err(e) => self.corrupt(table, format!("Failed to parse table file: {}", e)),
        }
    }

    fn corrupt(&self, table: &str, reason: String) -> LoadOutcome {
        tracing::warn!("Table '{}' is unreadable, treating it as empty: {}", table, reason);
        LoadOutcome::Corrupt { reason }
    }

    fn write_table_file(&self, table: &str, path: &Path, rows: &[Row]) -> FlatrestResult<()> {
        let body = if self.inner.config.pretty {
            serde_json::to_string_pretty(rows)
        } else {
            serde_json::to_string(rows)
        }
        .map_err(|e| StorageError::Serialization {
            table: table.to_string(),
            reason: e.to_string(),
        })?;

        let tmp_path = path.with_extension(format!("{}.tmp", self.inner.config.file_extension));
        let write_failed = |e: std::io::Error| {
            tracing::error!("Failed to write table '{}': {}", table, e);
            StorageError::WriteFailed {
                table: table.to_string(),
                reason: e.to_string(),
            }
        };

        fs::write(&tmp_path, body).map_err(write_failed)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_failed(e).into());
        }

        tracing::debug!("Saved {} rows to table '{}'", rows.len(), table);
        Ok(())
    }
}

impl TableHandle<'_> {
    pub fn load(&self) -> LoadOutcome {
        self.store.read_table_file(self.table, &self.path)
    }

    pub fn save(&self, rows: &[Row]) -> FlatrestResult<()> {
        self.store.write_table_file(self.table, &self.path, rows)
    }
}

/// Table names become file names, so only a conservative character set is allowed
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
