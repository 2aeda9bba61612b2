//! Durable, scope-partitioned key/value settings (JSON file on disk).

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::Result;

type Scopes = BTreeMap<String, BTreeMap<String, String>>;

/// A JSON-file-backed settings store. Every instance reads and writes a single scope.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    scope: String,
    data: Scopes,
}

impl ConfigStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, scope: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(txt) if !txt.trim().is_empty() => serde_json::from_str::<Scopes>(&txt)?,
            Ok(_) => Scopes::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Scopes::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            scope: scope.into(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .get(&self.scope)
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.data
            .entry(self.scope.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.flush()
    }

    /// Return the stored value, persisting `default` first if the key is unset.
    pub fn get_or_init(&mut self, key: &str, default: &str) -> Result<String> {
        if let Some(v) = self.get(key) {
            return Ok(v.to_string());
        }
        debug!(scope = %self.scope, key, "initializing setting with default");
        self.set(key, default)?;
        Ok(default.to_string())
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
