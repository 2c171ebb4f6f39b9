// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - DNS Resolution Layer
 * Shared resolver seam for brute force, wildcard detection and CNAME checks
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use rand::Rng;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Well-known recursive resolvers used for the rotation fallback
const FALLBACK_RESOLVERS: &[&str] = &[
    "8.8.8.8",         // Google
    "1.1.1.1",         // Cloudflare
    "9.9.9.9",         // Quad9
    "8.8.4.4",         // Google secondary
    "1.0.0.1",         // Cloudflare secondary
    "208.67.222.222",  // OpenDNS
];

/// Resolver abstraction so modules can be exercised against a simulated DNS
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolve A/AAAA records; empty vec means NXDOMAIN / no records
    async fn lookup_ips(&self, host: &str) -> Result<Vec<IpAddr>>;

    /// Resolve the CNAME chain tail, if any
    async fn lookup_cname(&self, host: &str) -> Result<Option<String>>;
}

/// System-configured resolver backed by hickory
pub struct SystemDns {
    resolver: TokioResolver,
}

impl SystemDns {
    pub fn new() -> Result<Self> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .context("Failed to create system resolver")?
            .build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl DnsResolver for SystemDns {
    async fn lookup_ips(&self, host: &str) -> Result<Vec<IpAddr>> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .with_context(|| format!("lookup_ip failed for {host}"))?;
        Ok(lookup.iter().collect())
    }

    async fn lookup_cname(&self, host: &str) -> Result<Option<String>> {
        use hickory_resolver::proto::rr::RecordType;
        let lookup = match self.resolver.lookup(host, RecordType::CNAME).await {
            Ok(l) => l,
            Err(_) => return Ok(None),
        };
        let cname = lookup.iter().find_map(|rdata| {
            rdata
                .as_cname()
                .map(|c| c.0.to_string().trim_end_matches('.').to_string())
        });
        Ok(cname)
    }
}

/// Fallback resolution against six public recursives in random rotation.
///
/// Each server gets a 3 second budget; the first answer wins. Used when the
/// brute-forcer returns a hostname without addresses and `resolve_ip` is set.
pub struct RotatingDns {
    resolvers: Vec<TokioResolver>,
}

impl RotatingDns {
    pub fn new() -> Result<Self> {
        let mut resolvers = Vec::with_capacity(FALLBACK_RESOLVERS.len());
        for ip in FALLBACK_RESOLVERS {
            let addr: IpAddr = ip.parse().context("invalid fallback resolver address")?;
            let servers = NameServerConfigGroup::from_ips_clear(&[addr], 53, true);
            let config = ResolverConfig::from_parts(None, Vec::new(), servers);
            let mut builder =
                TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
            let opts: &mut ResolverOpts = builder.options_mut();
            opts.timeout = Duration::from_secs(3);
            opts.attempts = 1;
            resolvers.push(builder.build());
        }
        Ok(Self { resolvers })
    }

    /// Try every resolver starting at a random offset; first success wins
    pub async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        let start = rand::rng().random_range(0..self.resolvers.len());
        for i in 0..self.resolvers.len() {
            let resolver = &self.resolvers[(start + i) % self.resolvers.len()];
            if let Ok(lookup) = resolver.lookup_ip(host).await {
                let ips: Vec<IpAddr> = lookup.iter().collect();
                if !ips.is_empty() {
                    return ips;
                }
            }
        }
        debug!("No fallback resolver returned records for {}", host);
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory resolver used across the pipeline test-suite
    pub struct FakeDns {
        records: Mutex<HashMap<String, Vec<IpAddr>>>,
        cnames: Mutex<HashMap<String, String>>,
        wildcard: Option<IpAddr>,
    }

    impl FakeDns {
        pub fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                cnames: Mutex::new(HashMap::new()),
                wildcard: None,
            }
        }

        pub fn insert(&self, host: &str, ip: &str) {
            self.records
                .lock()
                .unwrap()
                .entry(host.to_string())
                .or_default()
                .push(ip.parse().unwrap());
        }
    }

    #[async_trait]
    impl DnsResolver for FakeDns {
        async fn lookup_ips(&self, host: &str) -> Result<Vec<IpAddr>> {
            if let Some(ips) = self.records.lock().unwrap().get(host) {
                return Ok(ips.clone());
            }
            if let Some(ip) = self.wildcard {
                return Ok(vec![ip]);
            }
            Ok(Vec::new())
        }

        async fn lookup_cname(&self, host: &str) -> Result<Option<String>> {
            Ok(self.cnames.lock().unwrap().get(host).cloned())
        }
    }

    #[tokio::test]
    async fn test_fake_dns_lookup() {
        let dns = FakeDns::new();
        dns.insert("www.example.com", "93.184.216.34");
        let ips = dns.lookup_ips("www.example.com").await.unwrap();
        assert_eq!(ips.len(), 1);
        assert!(dns.lookup_ips("missing.example.com").await.unwrap().is_empty());
    }

    #[test]
    fn test_rotating_dns_construction() {
        let rotating = RotatingDns::new().unwrap();
        assert_eq!(rotating.resolvers.len(), FALLBACK_RESOLVERS.len());
    }
}
