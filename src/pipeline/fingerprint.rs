// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Fingerprint Module
 * Enriches HTTP assets through the DSL fingerprint engine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::fingerprint::{FingerprintOutcome, FingerprintScanner};
use crate::pipeline::module::{ModuleContext, PipelineModule};
use crate::pipeline::port::is_http_port;
use crate::records::{AssetHttp, ScanRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

const MODULE: &str = "Fingerprint";

pub struct FingerprintModule {
    scanner: Arc<FingerprintScanner>,
    concurrency: usize,
    /// Without a preceding port stage, HTTP-port PortAlive records are
    /// promoted to assets here
    standalone: bool,
}

impl FingerprintModule {
    pub fn new(scanner: Arc<FingerprintScanner>, concurrency: usize, standalone: bool) -> Self {
        Self {
            scanner,
            concurrency: concurrency.max(1),
            standalone,
        }
    }

    /// Merge a scan outcome into the asset: fill gaps, append fingerprints,
    /// never overwrite upstream facts that are already present
    fn merge(mut asset: AssetHttp, outcome: FingerprintOutcome) -> AssetHttp {
        if asset.title.is_empty() {
            asset.title = outcome.title;
        }
        if asset.server.is_empty() {
            asset.server = outcome.server;
        }
        if asset.status_code == 0 {
            asset.status_code = outcome.status_code;
        }
        for tech in outcome.technologies {
            if !asset.technologies.contains(&tech) {
                asset.technologies.push(tech);
            }
        }
        for fp in outcome.fingerprints {
            if !asset.fingerprints.contains(&fp) {
                asset.fingerprints.push(fp);
            }
        }
        asset
    }

    async fn enrich(
        scanner: Arc<FingerprintScanner>,
        ctx: ModuleContext,
        output: mpsc::Sender<ScanRecord>,
        mut asset: AssetHttp,
    ) {
        if asset.url.is_empty() {
            asset.url = format!("http://{}:{}", asset.host, asset.port);
        }

        let outcome = scanner.scan(&asset.url).await;
        debug!(
            "Fingerprinted {}: status={}, {} technologies",
            asset.url,
            outcome.status_code,
            outcome.technologies.len()
        );

        let enriched = Self::merge(asset, outcome);
        ctx.progress.output_inc(MODULE, 1);
        let _ = ctx.send(&output, ScanRecord::AssetHttp(enriched)).await;
    }
}

#[async_trait]
impl PipelineModule for FingerprintModule {
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
            let asset = match record {
                ScanRecord::AssetHttp(asset) => {
                    ctx.progress.processed_inc(MODULE, 1);
                    Some(asset)
                }
                ScanRecord::PortAlive(ref alive)
                    if self.standalone && is_http_port(alive.port) =>
                {
                    ctx.progress.processed_inc(MODULE, 1);
                    // Keep the port record flowing, then synthesize an asset
                    let synthesized = AssetHttp {
                        url: String::new(),
                        host: alive.host.clone(),
                        ip: alive.ip.clone(),
                        port: alive.port,
                        ..Default::default()
                    };
                    if !ctx.send(&output, record).await {
                        break;
                    }
                    Some(synthesized)
                }
                other => {
                    if !ctx.send(&output, other).await {
                        break;
                    }
                    None
                }
            };

            if let Some(asset) = asset {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let scanner = Arc::clone(&self.scanner);
                let ctx = ctx.clone();
                let output = output.clone();
                workers.spawn(async move {
                    let _permit = permit;
                    Self::enrich(scanner, ctx, output, asset).await;
                });
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
    fn test_merge_fills_gaps_only() {
        let asset = AssetHttp {
            url: "http://x:80".into(),
            host: "x".into(),
            port: 80,
            title: "from-scanner".into(),
            technologies: vec!["Nginx".into()],
            ..Default::default()
        };
        let outcome = FingerprintOutcome {
            url: "http://x:80".into(),
            status_code: 200,
            title: "from-probe".into(),
            server: "nginx/1.20".into(),
            technologies: vec!["Nginx".into(), "PHP".into()],
            fingerprints: vec!["Nginx".into(), "PHP".into()],
            icon_hash: String::new(),
        };

        let merged = FingerprintModule::merge(asset, outcome);
        assert_eq!(merged.title, "from-scanner", "existing title kept");
        assert_eq!(merged.server, "nginx/1.20", "empty server filled");
        assert_eq!(merged.status_code, 200);
        assert_eq!(merged.technologies, vec!["Nginx", "PHP"], "no duplicates");
    }
}
