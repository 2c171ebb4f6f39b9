// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Domain Verify Module
 * DNS verification, CDN classification and takeover detection
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::dns::DnsResolver;
use crate::pipeline::module::{ModuleContext, PipelineModule};
use crate::records::{DomainResolve, DomainSkip, ScanRecord, SubdomainResult};
use crate::scanners::takeover::TakeoverScanner;
use anyhow::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info};

const MODULE: &str = "DomainVerify";

/// CNAME suffixes that mark a host as CDN-served
const CDN_CNAME_SUFFIXES: &[(&str, &str)] = &[
    ("cloudflare.net", "Cloudflare"),
    ("cloudflare.com", "Cloudflare"),
    ("cloudfront.net", "AWS CloudFront"),
    ("akamaiedge.net", "Akamai"),
    ("akamaitechnologies.com", "Akamai"),
    ("edgekey.net", "Akamai"),
    ("fastly.net", "Fastly"),
    ("fastlylb.net", "Fastly"),
    ("azureedge.net", "Azure CDN"),
    ("azurefd.net", "Azure Front Door"),
    ("cdn77.org", "CDN77"),
    ("incapdns.net", "Imperva"),
    ("wscloudcdn.com", "ChinaNetCenter"),
    ("cdngslb.com", "Alibaba CDN"),
    ("alikunlun.com", "Alibaba CDN"),
    ("bsclink.cn", "Baishan"),
    ("qiniudns.com", "Qiniu"),
];

/// Classify a host as CDN-backed from its CNAME tail
pub fn classify_cdn(cname: &str) -> Option<&'static str> {
    let cname = cname.to_lowercase();
    CDN_CNAME_SUFFIXES
        .iter()
        .find(|(suffix, _)| cname.ends_with(suffix))
        .map(|(_, name)| *name)
}

pub struct DomainVerifyModule {
    dns: Arc<dyn DnsResolver>,
    takeover: Option<Arc<TakeoverScanner>>,
    concurrency: usize,
}

impl DomainVerifyModule {
    pub fn new(dns: Arc<dyn DnsResolver>, check_takeover: bool, concurrency: usize) -> Self {
        let takeover = check_takeover.then(|| Arc::new(TakeoverScanner::new(Arc::clone(&dns))));
        Self {
            dns,
            takeover,
            concurrency: concurrency.max(1),
        }
    }

    async fn verify(
        dns: Arc<dyn DnsResolver>,
        takeover: Option<Arc<TakeoverScanner>>,
        ctx: ModuleContext,
        output: mpsc::Sender<ScanRecord>,
        result: SubdomainResult,
    ) {
        let host = result.host.clone();

        // CDN classification: trust the probe's verdict when present,
        // otherwise fall back to the CNAME tail heuristic
        let mut cdn_name = result.cdn.then(|| result.cdn_name.clone().unwrap_or_default());
        let cname = dns.lookup_cname(&host).await.ok().flatten();
        if cdn_name.is_none() {
            if let Some(cname) = &cname {
                cdn_name = classify_cdn(cname).map(|n| n.to_string());
            }
        }

        if let Some(provider) = cdn_name {
            debug!("{} classified as CDN ({})", host, provider);
            ctx.progress.output_inc(MODULE, 1);
            let skip = DomainSkip {
                domain: host.clone(),
                is_cdn: true,
                cdn_name: (!provider.is_empty()).then_some(provider),
            };
            if !ctx.send(&output, ScanRecord::DomainSkip(skip)).await {
                return;
            }
        }

        // Fresh resolution enriches records that arrived without addresses
        let mut ips = result.ips.clone();
        if let Ok(resolved) = dns.lookup_ips(&host).await {
            if !resolved.is_empty() {
                ips = resolved.iter().map(IpAddr::to_string).collect();
            }
        }
        ctx.progress.output_inc(MODULE, 1);
        let resolve = DomainResolve {
            domain: host.clone(),
            ips,
        };
        if !ctx.send(&output, ScanRecord::DomainResolve(resolve)).await {
            return;
        }

        if let Some(takeover) = takeover {
            match takeover.scan(&host).await {
                Ok(Some(finding)) => {
                    info!(
                        "Subdomain takeover candidate: {} via {}",
                        host, finding.service
                    );
                    ctx.progress.output_inc(MODULE, 1);
                    let _ = ctx.send(&output, ScanRecord::Takeover(finding)).await;
                }
                Ok(None) => {}
                Err(e) => debug!("Takeover check failed for {}: {}", host, e),
            }
        }
    }
}

#[async_trait]
impl PipelineModule for DomainVerifyModule {
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

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        while let Some(record) = ctx.recv(&mut input).await {
            match record {
                ScanRecord::Subdomain(result) => {
                    ctx.progress.processed_inc(MODULE, 1);

                    // The original record goes downstream before any derived
                    // records so the sink always sees it
                    if !ctx
                        .send(&output, ScanRecord::Subdomain(result.clone()))
                        .await
                    {
                        break;
                    }

                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let dns = Arc::clone(&self.dns);
                    let takeover = self.takeover.clone();
                    let ctx = ctx.clone();
                    let output = output.clone();
                    workers.spawn(async move {
                        let _permit = permit;
                        Self::verify(dns, takeover, ctx, output, result).await;
                    });
                }
                other => {
                    if !ctx.send(&output, other).await {
                        break;
                    }
                }
            }
        }

        while workers.join_next().await.is_some() {}
        ctx.progress.module_complete(MODULE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdn_classification() {
        assert_eq!(classify_cdn("abc.cloudfront.net"), Some("AWS CloudFront"));
        assert_eq!(classify_cdn("x.y.CLOUDFLARE.net"), Some("Cloudflare"));
        assert_eq!(classify_cdn("edge.akamaiedge.net"), Some("Akamai"));
        assert_eq!(classify_cdn("origin.example.com"), None);
    }

    #[test]
    fn test_cdn_suffix_must_be_tail() {
        // A suffix appearing mid-name must not classify
        assert_eq!(classify_cdn("cloudflare.net.evil.com"), None);
    }
}
