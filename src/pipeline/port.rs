// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Port Scan Module
 * Target preparation, CDN skips, external scanning and HTTP asset synthesis
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::{PortScanMode, PortServiceMap, TaskConfig};
use crate::pipeline::module::{ModuleContext, PipelineModule};
use crate::records::{AssetHttp, PortAlive, ScanRecord};
use crate::scanners::portscan::PortScanTool;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const PREP_MODULE: &str = "PortPrep";
const SCAN_MODULE: &str = "PortScan";

/// Ports treated as HTTP services and promoted to assets
const HTTP_PORTS: &[u16] = &[80, 443, 8080, 8443, 8000, 8888, 9000, 9090, 3000, 5000, 8001, 8002];

pub fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.contains(&port)
}

fn http_scheme(port: u16) -> &'static str {
    if port == 443 || port == 8443 {
        "https"
    } else {
        "http"
    }
}

pub struct PortScanModule {
    scanner: Arc<dyn PortScanTool>,
    services: Arc<PortServiceMap>,
    mode: PortScanMode,
    custom_ports: String,
    skip_cdn: bool,
}

impl PortScanModule {
    pub fn new(
        config: &TaskConfig,
        scanner: Arc<dyn PortScanTool>,
        services: Arc<PortServiceMap>,
    ) -> Self {
        Self {
            scanner,
            services,
            mode: config.port_scan_mode,
            custom_ports: config.port_range.clone(),
            skip_cdn: config.skip_cdn,
        }
    }

    async fn scan_target(
        &self,
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        target: &str,
    ) {
        let deadline = Duration::from_secs(self.mode.deadline_minutes() * 60);
        let scan = self
            .scanner
            .scan(&ctx.cancel, target, self.mode, &self.custom_ports);

        let open_ports = match tokio::time::timeout(deadline, scan).await {
            Ok(Ok(ports)) => ports,
            Ok(Err(e)) => {
                warn!("Port scan failed for {}: {}", target, e);
                return;
            }
            Err(_) => {
                warn!(
                    "Port scan of {} hit the {}-minute deadline",
                    target,
                    self.mode.deadline_minutes()
                );
                return;
            }
        };

        for open in open_ports {
            if ctx.dedup.check_port(&open.ip, open.port) {
                continue;
            }

            let mut service = if open.protocol.is_empty() || open.protocol == "tcp" {
                self.services.service_for(open.port).to_string()
            } else {
                open.protocol.clone()
            };
            if service == "unknown" && is_http_port(open.port) {
                service = http_scheme(open.port).to_string();
            }

            ctx.progress.output_inc(SCAN_MODULE, 1);
            let alive = PortAlive {
                host: target.to_string(),
                ip: open.ip.clone(),
                port: open.port,
                service,
            };
            if !ctx.send(output, ScanRecord::PortAlive(alive)).await {
                return;
            }

            if is_http_port(open.port) {
                let url = format!("{}://{}:{}", http_scheme(open.port), target, open.port);
                if ctx.dedup.check_asset(&crate::records::normalize_url(&url)) {
                    continue;
                }
                ctx.progress.output_inc(SCAN_MODULE, 1);
                let asset = AssetHttp {
                    url,
                    host: target.to_string(),
                    ip: open.ip,
                    port: open.port,
                    title: open.title,
                    server: open.midware,
                    fingerprints: open.frameworks,
                    ..Default::default()
                };
                if !ctx.send(output, ScanRecord::AssetHttp(asset)).await {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl PipelineModule for PortScanModule {
    fn name(&self) -> &'static str {
        SCAN_MODULE
    }

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        mut input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()> {
        // Preparation phase: forward everything, collect hosts and CDN skips
        ctx.progress.module_start(PREP_MODULE, 0);

        let mut targets: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut skips: HashSet<String> = HashSet::new();

        while let Some(record) = ctx.recv(&mut input).await {
            ctx.progress.processed_inc(PREP_MODULE, 1);
            match &record {
                ScanRecord::Target(t) => {
                    if seen.insert(t.host.clone()) {
                        targets.push(t.host.clone());
                    }
                }
                ScanRecord::Subdomain(r) => {
                    if seen.insert(r.host.clone()) {
                        targets.push(r.host.clone());
                    }
                }
                ScanRecord::DomainResolve(r) => {
                    if seen.insert(r.domain.clone()) {
                        targets.push(r.domain.clone());
                    }
                }
                ScanRecord::DomainSkip(r) => {
                    if r.is_cdn && self.skip_cdn {
                        info!(
                            "Skipping CDN host {} ({})",
                            r.domain,
                            r.cdn_name.as_deref().unwrap_or("unknown")
                        );
                        skips.insert(r.domain.clone());
                    }
                }
                _ => {}
            }
            if !ctx.send(&output, record).await {
                break;
            }
        }
        ctx.progress.module_complete(PREP_MODULE);

        if !self.scanner.is_available() {
            warn!("Port scanner binary missing, skipping port scan stage");
            ctx.progress.module_start(SCAN_MODULE, 0);
            ctx.progress.module_complete(SCAN_MODULE);
            return Ok(());
        }

        let scan_targets: Vec<String> = targets
            .into_iter()
            .filter(|t| !skips.contains(t))
            .collect();

        info!(
            "Port scanning {} targets (mode {:?})",
            scan_targets.len(),
            self.mode
        );
        ctx.progress.module_start(SCAN_MODULE, scan_targets.len());

        for target in scan_targets {
            if ctx.is_cancelled() {
                break;
            }
            self.scan_target(&ctx, &output, &target).await;
            ctx.progress.processed_inc(SCAN_MODULE, 1);
        }

        ctx.progress.module_complete(SCAN_MODULE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_port_set() {
        for port in [80, 443, 8080, 8443, 8000, 8888, 9000, 9090, 3000, 5000, 8001, 8002] {
            assert!(is_http_port(port), "{port} should be an HTTP port");
        }
        assert!(!is_http_port(22));
        assert!(!is_http_port(3306));
    }

    #[test]
    fn test_scheme_by_port() {
        assert_eq!(http_scheme(443), "https");
        assert_eq!(http_scheme(8443), "https");
        assert_eq!(http_scheme(80), "http");
        assert_eq!(http_scheme(8080), "http");
    }
}
