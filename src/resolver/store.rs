//! Disk persistence for the hostname cache
//!
//! The store is a JSON array of `[ip, {"hostNames": [...], "timestamp": secs}]`
//! pairs. Older stores kept a bare hostname per IP; those entries load with a
//! zero timestamp and are re-resolved on first use.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name of the store inside the data directory
pub const STORE_FILE_NAME: &str = "ipToHostNameMap.json";

/// Cached reverse lookup result of one IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNameCacheEntry {
    #[serde(rename = "hostNames")]
    pub host_names: Vec<String>,
    /// Resolution time in epoch seconds
    #[serde(rename = "timestamp")]
    pub resolved_at: i64,
}

impl HostNameCacheEntry {
    pub fn new(host_names: Vec<String>, resolved_at: i64) -> Self {
        Self {
            host_names,
            resolved_at,
        }
    }

    /// The name reported for this IP: the last one the resolver returned
    pub fn host_name(&self) -> Option<&str> {
        self.host_names.last().map(String::as_str)
    }

    pub fn is_valid_at(&self, now: i64, lease_secs: i64) -> bool {
        now.saturating_sub(self.resolved_at) < lease_secs
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Current(HostNameCacheEntry),
    Legacy(String),
}

impl From<StoredEntry> for HostNameCacheEntry {
    fn from(stored: StoredEntry) -> Self {
        match stored {
            StoredEntry::Current(entry) => entry,
            StoredEntry::Legacy(name) => HostNameCacheEntry::new(vec![name], 0),
        }
    }
}

/// Cache entries keyed by IP, iterated in first-insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostNameMap {
    entries: Vec<(String, HostNameCacheEntry)>,
    index: HashMap<String, usize>,
}

impl HostNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: &str) -> Option<&HostNameCacheEntry> {
        self.index.get(ip).map(|&pos| &self.entries[pos].1)
    }

    /// Insert or replace the entry of `ip`. A replaced entry keeps its position.
    pub fn insert(&mut self, ip: String, entry: HostNameCacheEntry) {
        match self.index.get(&ip) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.index.insert(ip.clone(), self.entries.len());
                self.entries.push((ip, entry));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostNameCacheEntry)> {
        self.entries.iter().map(|(ip, entry)| (ip.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, HostNameCacheEntry)> for HostNameMap {
    fn from_iter<I: IntoIterator<Item = (String, HostNameCacheEntry)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (ip, entry) in iter {
            map.insert(ip, entry);
        }
        map
    }
}

/// JSON file holding the cache between runs
#[derive(Debug, Clone)]
pub struct HostNameStore {
    path: PathBuf,
}

impl HostNameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all entries; a missing file is an empty store
    pub async fn load(&self) -> Result<HostNameMap> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HostNameMap::new()),
            Err(e) => return Err(e.into()),
        };

        let pairs: Vec<(String, StoredEntry)> = serde_json::from_str(&json)?;
        Ok(pairs
            .into_iter()
            .map(|(ip, stored)| (ip, stored.into()))
            .collect())
    }

    pub async fn save(&self, entries: &HostNameMap) -> Result<()> {
        let pairs: Vec<(&str, &HostNameCacheEntry)> = entries.iter().collect();
        let json = serde_json::to_string(&pairs)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}
