// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Streaming Pipeline Orchestrator
 * Builds the module chain from the task configuration and owns its lifecycle
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::{load_port_services, load_wordlist, TaskConfig};
use crate::errors::PipelineError;
use crate::fingerprint::FingerprintScanner;
use crate::pipeline::dedup::DuplicateChecker;
use crate::pipeline::fingerprint::FingerprintModule;
use crate::pipeline::module::{
    ModuleContext, PipelineModule, SinkStage, CHANNEL_CAPACITY, SUBDOMAIN_CHANNEL_CAPACITY,
};
use crate::pipeline::port::PortScanModule;
use crate::pipeline::progress::{ProgressCallback, ProgressReport, ProgressTracker};
use crate::pipeline::subdomain::SubdomainScanModule;
use crate::pipeline::verify::DomainVerifyModule;
use crate::pipeline::vuln::{SensitiveModule, VulnScanModule};
use crate::pipeline::webscan::{CrawlerModule, DirScanModule};
use crate::records::{ScanRecord, Target};
use crate::scanners::ToolSet;
use anyhow::Result;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CIDRs larger than a /16 pass through unexpanded
const MAX_CIDR_EXPANSION: u64 = 65_536;

/// One streaming scan pipeline, owned by one task for one run
pub struct StreamingPipeline {
    config: TaskConfig,
    tools: ToolSet,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
    dedup: Arc<DuplicateChecker>,
    started: bool,
}

impl StreamingPipeline {
    pub fn new(config: TaskConfig, tools: ToolSet, total_targets: usize) -> Self {
        Self::with_progress_callback(config, tools, total_targets, None)
    }

    pub fn with_progress_callback(
        config: TaskConfig,
        tools: ToolSet,
        total_targets: usize,
        callback: Option<ProgressCallback>,
    ) -> Self {
        let progress = Arc::new(ProgressTracker::new(total_targets, callback));
        progress.set_enabled_modules(&config.enabled_modules());
        Self {
            config,
            tools,
            cancel: CancellationToken::new(),
            progress,
            dedup: Arc::new(DuplicateChecker::new()),
            started: false,
        }
    }

    /// Trip cancellation. Every module observes the token at its blocking
    /// points and at each external-tool boundary; the result stream closes
    /// once in-flight records drain.
    pub fn stop(&self) {
        info!("Pipeline stop requested");
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressReport {
        self.progress.report()
    }

    /// Build the chain, spawn every module and start feeding targets.
    /// Idempotent per instance: a second call fails.
    pub fn start(&mut self, targets: &[String]) -> Result<mpsc::Receiver<ScanRecord>> {
        if self.started {
            return Err(PipelineError::Lifecycle("pipeline already started".into()).into());
        }
        self.started = true;

        let parsed = parse_targets(targets)?;
        if parsed.is_empty() {
            return Err(PipelineError::Configuration("no valid targets".into()).into());
        }
        info!("Pipeline starting with {} targets", parsed.len());

        let modules = self.build_chain();
        let ctx = ModuleContext {
            cancel: self.cancel.clone(),
            progress: Arc::clone(&self.progress),
            dedup: Arc::clone(&self.dedup),
        };

        // Wire the chain: each module's output sender is the next module's
        // input. Dropping a sender closes the downstream receiver, so module
        // completion cascades to the sink without explicit close calls.
        let (results_tx, results_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (first_tx, mut next_rx) = mpsc::channel(CHANNEL_CAPACITY);

        for module in modules {
            let capacity = if module.name() == "SubdomainScan" {
                SUBDOMAIN_CHANNEL_CAPACITY
            } else {
                CHANNEL_CAPACITY
            };
            let (tx, rx) = mpsc::channel(capacity);
            let input = std::mem::replace(&mut next_rx, rx);
            let name = module.name();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Err(e) = module.run(ctx, input, tx).await {
                    warn!("Module {} terminated with error: {}", name, e);
                }
            });
        }

        // Terminal stage pumps into the externally consumed results channel
        let sink_ctx = ctx.clone();
        tokio::spawn(async move {
            let _ = Box::new(SinkStage).run(sink_ctx, next_rx, results_tx).await;
        });

        // Feed classified targets, then drop the sender to begin shutdown
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            for target in parsed {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = first_tx.send(ScanRecord::Target(target)) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(results_rx)
    }

    /// Assemble enabled modules in chain order
    fn build_chain(&self) -> Vec<Box<dyn PipelineModule>> {
        let config = &self.config;
        let tools = &self.tools;
        let mut modules: Vec<Box<dyn PipelineModule>> = Vec::new();

        if config.subdomain_scan {
            let wordlist = load_wordlist(None);
            modules.push(Box::new(SubdomainScanModule::new(
                config,
                Arc::clone(&tools.dns),
                Arc::clone(&tools.brute),
                Arc::clone(&tools.passive),
                Arc::clone(&tools.http_prober),
                wordlist,
            )));
            modules.push(Box::new(DomainVerifyModule::new(
                Arc::clone(&tools.dns),
                config.subdomain_check_takeover,
                config.verify_concurrency,
            )));
        }

        if config.port_scan {
            let services = Arc::new(load_port_services(None));
            modules.push(Box::new(PortScanModule::new(
                config,
                Arc::clone(&tools.port_scanner),
                services,
            )));
        }

        if config.fingerprint {
            modules.push(Box::new(FingerprintModule::new(
                Arc::new(FingerprintScanner::new()),
                config.fingerprint_concurrency,
                !config.port_scan,
            )));
        }

        if config.web_crawler {
            modules.push(Box::new(CrawlerModule::new(
                Arc::clone(&tools.crawler),
                Some(Arc::clone(&tools.rad)),
                config.crawler_concurrency,
                config.batch_mode,
            )));
        }

        if config.dir_scan {
            modules.push(Box::new(DirScanModule::new(
                Arc::clone(&tools.dir_scanner),
                config.dirscan_concurrency,
                config.batch_mode,
            )));
        }

        if config.vuln_scan {
            modules.push(Box::new(VulnScanModule::new(Arc::clone(
                &tools.vuln_scanner,
            ))));
        }

        if config.sensitive_scan {
            modules.push(Box::new(SensitiveModule::new(10)));
        }

        modules
    }
}

/// Classify raw targets: IPs and domains pass as-is, URLs keep both forms,
/// CIDRs expand in place up to the cap.
pub fn parse_targets(raw: &[String]) -> Result<Vec<Target>, PipelineError> {
    let mut targets = Vec::new();

    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        if entry.contains("://") {
            let parsed = url::Url::parse(entry).map_err(|e| {
                PipelineError::Configuration(format!("invalid target URL {entry}: {e}"))
            })?;
            let host = parsed
                .host_str()
                .ok_or_else(|| {
                    PipelineError::Configuration(format!("target URL {entry} has no host"))
                })?
                .to_string();
            targets.push(Target {
                host,
                url: Some(entry.to_string()),
            });
            continue;
        }

        if entry.contains('/') {
            targets.extend(expand_cidr(entry)?);
            continue;
        }

        targets.push(Target {
            host: entry.to_string(),
            url: None,
        });
    }

    Ok(targets)
}

/// Expand an IPv4 CIDR into host targets, in lexicographic IP order.
/// Networks larger than the cap are forwarded unexpanded for the scanner to
/// handle; a malformed CIDR is a configuration error.
fn expand_cidr(cidr: &str) -> Result<Vec<Target>, PipelineError> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| PipelineError::Configuration(format!("invalid CIDR {cidr}")))?;

    let base: Ipv4Addr = addr
        .parse()
        .map_err(|_| PipelineError::Configuration(format!("invalid CIDR address in {cidr}")))?;
    let prefix: u32 = prefix
        .parse()
        .ok()
        .filter(|p| *p <= 32)
        .ok_or_else(|| PipelineError::Configuration(format!("invalid CIDR prefix in {cidr}")))?;

    let count = 1u64 << (32 - prefix);
    if count > MAX_CIDR_EXPANSION {
        warn!("CIDR {} too large ({} addresses), keeping as-is", cidr, count);
        return Ok(vec![Target {
            host: cidr.to_string(),
            url: None,
        }]);
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u32::from(base) & mask;

    let targets = (0..count)
        .map(|offset| Target {
            host: Ipv4Addr::from(network + offset as u32).to_string(),
            url: None,
        })
        .collect();
    Ok(targets)
}
