//! Leased reverse-DNS cache for local addresses
//!
//! Resolved names are kept in memory and written to the store after every
//! resolution that changed the cache. An entry is reused while its lease has
//! not expired; afterwards the IP is looked up again. Failed lookups are
//! cached as `"unresolved"` and retried once their lease expires.
//!
//! Batches are resolved one IP at a time so that every store write sees the
//! complete in-memory state without any locking.

pub mod dns;
pub mod store;

use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub use dns::DnsReverseLookup;
pub use store::{HostNameCacheEntry, HostNameMap, HostNameStore, STORE_FILE_NAME};

pub const UNRESOLVED: &str = "unresolved";
pub const UNKNOWN: &str = "unknown";

/// Reverse lookup backend
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    /// All names the backend reports for `ip`, in backend order
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>>;
}

/// Hostname cache with a time-based lease
pub struct HostNameResolver<L> {
    lookup: L,
    store: Option<HostNameStore>,
    entries: HostNameMap,
    lease_secs: i64,
}

impl<L: ReverseLookup> HostNameResolver<L> {
    /// Create a resolver, loading previously resolved names from `store`
    pub async fn open(lookup: L, store: Option<HostNameStore>, lease_time: Duration) -> Result<Self> {
        let entries = match &store {
            Some(store) => store.load().await?,
            None => HostNameMap::new(),
        };

        debug!("Loaded {} cached host names", entries.len());

        Ok(Self {
            lookup,
            store,
            entries,
            lease_secs: i64::try_from(lease_time.as_secs()).unwrap_or(i64::MAX),
        })
    }

    /// Resolve one IP, using the cache while the lease is valid
    pub async fn resolve_ip(&mut self, ip: &str) -> Result<String> {
        let now = Utc::now().timestamp();

        if let Some(name) = self
            .entries
            .get(ip)
            .filter(|entry| entry.is_valid_at(now, self.lease_secs))
            .and_then(HostNameCacheEntry::host_name)
        {
            return Ok(name.to_string());
        }

        let host_names = self.reverse(ip).await;
        let entry = HostNameCacheEntry::new(host_names, now);
        let name = entry.host_name().unwrap_or(UNRESOLVED).to_string();
        debug!("Resolved {} to {}", ip, name);

        self.entries.insert(ip.to_string(), entry);
        if let Some(store) = &self.store {
            store.save(&self.entries).await?;
        }

        Ok(name)
    }

    /// Resolve a batch sequentially, returning names in input order
    pub async fn resolve_ips<I, S>(&mut self, ips: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        for ip in ips {
            names.push(self.resolve_ip(ip.as_ref()).await?);
        }
        Ok(names)
    }

    /// Cached name of `ip` without any lookup, `"unknown"` if never resolved
    pub fn get_host_name(&self, ip: &str) -> String {
        self.entries
            .get(ip)
            .and_then(HostNameCacheEntry::host_name)
            .unwrap_or(UNKNOWN)
            .to_string()
    }

    /// Number of cached IPs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn reverse(&self, ip: &str) -> Vec<String> {
        let addr = match ip.parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => return vec![UNRESOLVED.to_string()],
        };

        match self.lookup.reverse(addr).await {
            Ok(names) if !names.is_empty() => names,
            Ok(_) => vec![UNRESOLVED.to_string()],
            Err(e) => {
                debug!("{}", e);
                vec![UNRESOLVED.to_string()]
            }
        }
    }
}
