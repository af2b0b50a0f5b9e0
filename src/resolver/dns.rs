//! Reverse lookups against a configured DNS server

use crate::resolver::ReverseLookup;
use crate::{CaptureError, Result};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;

const DNS_PORT: u16 = 53;
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// PTR lookups sent to a single name server (typically the home router)
pub struct DnsReverseLookup {
    resolver: TokioAsyncResolver,
}

impl DnsReverseLookup {
    pub fn new(server: IpAddr) -> Self {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&[server], DNS_PORT, true),
        );

        let mut opts = ResolverOpts::default();
        opts.timeout = LOOKUP_TIMEOUT;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl ReverseLookup for DnsReverseLookup {
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>> {
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| CaptureError::DnsError {
                ip: ip.to_string(),
                reason: e.to_string(),
            })?;

        Ok(lookup
            .iter()
            .map(|name| name.to_utf8().trim_end_matches('.').to_string())
            .collect())
    }
}
