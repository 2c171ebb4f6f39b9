// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Subdomain Scan Module
 * Wildcard-filtered brute force, third-party sources and HTTP enrichment
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::TaskConfig;
use crate::dns::{DnsResolver, RotatingDns};
use crate::pipeline::module::{ModuleContext, PipelineModule};
use crate::records::{ScanRecord, SubdomainResult, Target};
use crate::scanners::httpx::HttpProber;
use crate::scanners::subdomain_tools::{BruteTool, PassiveTool};
use crate::scanners::thirdparty::ApiManager;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MODULE: &str = "SubdomainScan";

/// A discovered subdomain candidate, before dedup and enrichment
struct Candidate {
    host: String,
    ips: Vec<String>,
    source: &'static str,
}

pub struct SubdomainScanModule {
    dns: Arc<dyn DnsResolver>,
    brute: Arc<dyn BruteTool>,
    passive: Arc<dyn PassiveTool>,
    prober: Arc<dyn HttpProber>,
    api: Arc<ApiManager>,
    api_sources: Vec<String>,
    wordlist: Arc<Vec<String>>,
    brute_concurrency: usize,
    resolve_ip: bool,
    http_probe: bool,
    max_enum_time: Duration,
}

impl SubdomainScanModule {
    pub fn new(
        config: &TaskConfig,
        dns: Arc<dyn DnsResolver>,
        brute: Arc<dyn BruteTool>,
        passive: Arc<dyn PassiveTool>,
        prober: Arc<dyn HttpProber>,
        wordlist: Vec<String>,
    ) -> Self {
        Self {
            dns,
            brute,
            passive,
            prober,
            api: Arc::new(ApiManager::new(config.api.clone())),
            api_sources: config.subdomain_api_sources.clone(),
            wordlist: Arc::new(wordlist),
            brute_concurrency: config.brute_concurrency.max(1),
            resolve_ip: config.subdomain_resolve_ip,
            http_probe: config.subdomain_http_probe,
            max_enum_time: Duration::from_secs(config.subdomain_max_enum_time * 60),
        }
    }

    /// Resolve three random labels; any IP answered at least twice is part
    /// of a wildcard configuration and brute results made only of such IPs
    /// are dropped. A probe failure disables filtering but never the scan.
    async fn detect_wildcard(&self, domain: &str) -> HashSet<String> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..3 {
            let nonce: u64 = rand::rng().random();
            let probe = format!("wc-{nonce:016x}.{domain}");
            match self.dns.lookup_ips(&probe).await {
                Ok(ips) => {
                    for ip in ips {
                        *counts.entry(ip.to_string()).or_default() += 1;
                    }
                }
                Err(e) => debug!("Wildcard probe failed for {}: {}", domain, e),
            }
        }

        let wildcard: HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count >= 2)
            .map(|(ip, _)| ip)
            .collect();
        if !wildcard.is_empty() {
            info!("Wildcard DNS detected for {}: {:?}", domain, wildcard);
        }
        wildcard
    }

    /// Dictionary brute force. Prefers the external packet brute-forcer;
    /// falls back to in-process resolver fan-out when it is absent.
    async fn run_brute(
        &self,
        ctx: &ModuleContext,
        domain: &str,
        wildcard: &HashSet<String>,
        candidates: &mpsc::Sender<Candidate>,
    ) {
        let mut resolved = 0usize;
        let mut filtered = 0usize;

        if self.brute.is_available() {
            match self
                .brute
                .enumerate(&ctx.cancel, domain, &self.wordlist)
                .await
            {
                Ok(results) => {
                    for (host, ips) in results {
                        if is_all_wildcard(&ips, wildcard) {
                            filtered += 1;
                            continue;
                        }
                        resolved += 1;
                        let _ = candidates
                            .send(Candidate {
                                host,
                                ips,
                                source: "bruteforce",
                            })
                            .await;
                    }
                }
                Err(e) => warn!("Packet brute force failed for {}: {}", domain, e),
            }
        } else {
            // In-process fallback: bounded resolver fan-out over the dictionary
            let dns = Arc::clone(&self.dns);
            let domain = domain.to_string();
            let results = stream::iter(self.wordlist.iter().cloned())
                .map(|prefix| {
                    let dns = Arc::clone(&dns);
                    let full = format!("{prefix}.{domain}");
                    let cancel = ctx.cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        let ips = dns.lookup_ips(&full).await.ok()?;
                        if ips.is_empty() {
                            return None;
                        }
                        Some((full, ips.iter().map(IpAddr::to_string).collect::<Vec<_>>()))
                    }
                })
                .buffer_unordered(self.brute_concurrency)
                .collect::<Vec<_>>()
                .await;

            for (host, ips) in results.into_iter().flatten() {
                if is_all_wildcard(&ips, wildcard) {
                    filtered += 1;
                    continue;
                }
                resolved += 1;
                let _ = candidates
                    .send(Candidate {
                        host,
                        ips,
                        source: "bruteforce",
                    })
                    .await;
            }
        }

        info!(
            "Brute force stats for {}: dict={}, resolved={}, filtered(wildcard)={}",
            domain,
            self.wordlist.len(),
            resolved,
            filtered
        );
    }

    async fn run_passive(
        &self,
        ctx: &ModuleContext,
        domain: &str,
        candidates: &mpsc::Sender<Candidate>,
    ) {
        if !self.passive.is_available() {
            return;
        }
        match self.passive.enumerate(&ctx.cancel, domain).await {
            Ok(hosts) => {
                for host in hosts {
                    let _ = candidates
                        .send(Candidate {
                            host,
                            ips: Vec::new(),
                            source: "subfinder",
                        })
                        .await;
                }
            }
            Err(e) => warn!("Passive enumeration failed for {}: {}", domain, e),
        }
    }

    async fn run_apis(
        &self,
        ctx: &ModuleContext,
        domain: &str,
        candidates: &mpsc::Sender<Candidate>,
    ) {
        let mut tasks = Vec::new();
        for source in &self.api_sources {
            let api = Arc::clone(&self.api);
            let source = source.clone();
            let domain = domain.to_string();
            let candidates = candidates.clone();
            let cancel = ctx.cancel.clone();
            tasks.push(tokio::spawn(async move {
                if cancel.is_cancelled() {
                    return;
                }
                let static_source: &'static str = match source.as_str() {
                    "fofa" => "fofa",
                    "hunter" => "hunter",
                    "quake" => "quake",
                    "securitytrails" => "securitytrails",
                    _ => "api",
                };
                for asset in api.search(&source, &domain).await {
                    let _ = candidates
                        .send(Candidate {
                            host: asset.host,
                            ips: asset.ip.into_iter().collect(),
                            source: static_source,
                        })
                        .await;
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Enumerate one root domain: brute + passive + APIs in parallel, all
    /// feeding a single candidate collector that owns dedup and emission.
    async fn scan_domain(
        &self,
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        domain: String,
    ) {
        info!("Starting subdomain enumeration for {}", domain);

        let wildcard = self.detect_wildcard(&domain).await;
        let (cand_tx, mut cand_rx) = mpsc::channel::<Candidate>(1024);

        let producers = async {
            tokio::join!(
                self.run_brute(ctx, &domain, &wildcard, &cand_tx),
                self.run_passive(ctx, &domain, &cand_tx),
                self.run_apis(ctx, &domain, &cand_tx),
            );
            drop(cand_tx);
        };

        let rotating = if self.resolve_ip {
            RotatingDns::new().ok()
        } else {
            None
        };

        let collector = async {
            let mut collected: Vec<SubdomainResult> = Vec::new();
            while let Some(candidate) = cand_rx.recv().await {
                ctx.progress.processed_inc(MODULE, 1);

                let host = candidate.host.trim().trim_end_matches('.').to_lowercase();
                if host.is_empty() || !host.ends_with(domain.as_str()) {
                    continue;
                }
                if ctx.dedup.check_subdomain(&host) {
                    continue;
                }

                let mut ips = candidate.ips;
                if ips.is_empty() {
                    if let Some(rotating) = &rotating {
                        ips = rotating
                            .resolve(&host)
                            .await
                            .iter()
                            .map(IpAddr::to_string)
                            .collect();
                    }
                }

                let result = SubdomainResult {
                    host,
                    root_domain: domain.clone(),
                    source: candidate.source.to_string(),
                    ips,
                    ..Default::default()
                };

                if self.http_probe && self.prober.is_available() {
                    collected.push(result);
                } else {
                    ctx.progress.output_inc(MODULE, 1);
                    if !ctx.send(output, ScanRecord::Subdomain(result)).await {
                        return;
                    }
                }
            }

            // Batch HTTP enrichment once every source has drained
            if !collected.is_empty() {
                self.probe_and_emit(ctx, output, collected).await;
            }
        };

        let enumeration = async {
            tokio::join!(producers, collector);
        };

        // The whole enumeration honors the configured ceiling
        if tokio::time::timeout(self.max_enum_time, enumeration)
            .await
            .is_err()
        {
            warn!(
                "Subdomain enumeration for {} hit the {}s ceiling",
                domain,
                self.max_enum_time.as_secs()
            );
        }

        info!("Subdomain enumeration completed for {}", domain);
    }

    async fn probe_and_emit(
        &self,
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        collected: Vec<SubdomainResult>,
    ) {
        let hosts: Vec<String> = collected.iter().map(|r| r.host.clone()).collect();
        info!("HTTP probing {} discovered subdomains", hosts.len());

        let probe_results = match self.prober.probe(&ctx.cancel, &hosts).await {
            Ok(results) => results,
            Err(e) => {
                warn!("HTTP probe failed, emitting unenriched results: {}", e);
                Vec::new()
            }
        };

        let by_host: HashMap<String, _> = probe_results
            .into_iter()
            .map(|r| (r.host().to_string(), r))
            .collect();

        for mut result in collected {
            if let Some(probe) = by_host.get(&result.host) {
                if !probe.ips.is_empty() {
                    result.ips = probe.ips.clone();
                }
                result.title = (!probe.title.is_empty()).then(|| probe.title.clone());
                result.status_code = probe.status_code;
                result.web_server = (!probe.web_server.is_empty()).then(|| probe.web_server.clone());
                result.technologies = probe.technologies.clone();
                result.cdn = probe.cdn;
                result.cdn_name = (!probe.cdn_name.is_empty()).then(|| probe.cdn_name.clone());
                result.url = (!probe.url.is_empty()).then(|| probe.url.clone());
                result.source = "httpx".to_string();
            }

            ctx.progress.output_inc(MODULE, 1);
            if !ctx.send(output, ScanRecord::Subdomain(result)).await {
                return;
            }
        }
    }
}

fn is_all_wildcard(ips: &[String], wildcard: &HashSet<String>) -> bool {
    !wildcard.is_empty() && !ips.is_empty() && ips.iter().all(|ip| wildcard.contains(ip))
}

#[async_trait]
impl PipelineModule for SubdomainScanModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        mut input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()> {
        ctx.progress.module_start(MODULE, 0);

        while let Some(record) = ctx.recv(&mut input).await {
            match record {
                ScanRecord::Target(Target { ref host, .. }) if is_domain(host) => {
                    // Domains are consumed here; enumeration runs per target
                    // so one slow domain cannot starve the rest of the chain
                    let domain = host.clone();
                    self.scan_domain(&ctx, &output, domain).await;
                    // The root itself still flows downstream for port work
                    if !ctx.send(&output, record).await {
                        break;
                    }
                }
                other => {
                    if !ctx.send(&output, other).await {
                        break;
                    }
                }
            }
        }

        ctx.progress.module_complete(MODULE);
        Ok(())
    }
}

/// A target is a brute-forceable domain when it is neither an address nor a
/// CIDR expression
pub fn is_domain(host: &str) -> bool {
    !host.contains('/') && host.parse::<IpAddr>().is_err() && host.contains('.')
}
