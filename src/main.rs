// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Harrier Scanner CLI
 * Runs one scan task from the command line against the in-memory sink
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use clap::Parser;
use harrier_scanner::config::{PortScanMode, TaskConfig};
use harrier_scanner::executor::{ScanTask, TaskExecutor};
use harrier_scanner::scanners::ToolSet;
use harrier_scanner::sink::MemoryStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harrier", version, about = "Streaming attack-surface scan pipeline")]
struct Args {
    /// Targets: domains, IPs, CIDRs or URLs
    #[arg(required = true)]
    targets: Vec<String>,

    /// Scan types to enable (subdomain, takeover, port_scan, fingerprint,
    /// crawler, dir_scan, vuln_scan, sensitive); default is a full scan
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    scan_types: Vec<String>,

    /// Port scan mode: quick, top1000, full, custom
    #[arg(long, default_value = "top1000")]
    port_mode: String,

    /// Custom port range for --port-mode custom (e.g. 80,443,8000-9000)
    #[arg(long, default_value = "")]
    ports: String,

    /// Scan CDN-classified hosts instead of skipping them
    #[arg(long)]
    no_skip_cdn: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = if args.scan_types.is_empty() {
        TaskConfig::full()
    } else {
        TaskConfig::from_scan_types(&args.scan_types)
    };
    if let Some(mode) = PortScanMode::parse(&args.port_mode) {
        config.port_scan_mode = mode;
    }
    config.port_range = args.ports.clone();
    config.skip_cdn = !args.no_skip_cdn;

    let task = ScanTask {
        id: uuid::Uuid::new_v4().to_string(),
        workspace_id: "default".to_string(),
        name: "cli scan".to_string(),
        targets: args.targets.clone(),
        config,
    };

    let store = Arc::new(MemoryStore::new());
    let executor = TaskExecutor::new(Arc::clone(&store) as _, ToolSet::discover()?);

    let summary = executor.execute(&task).await?;

    info!(
        "Scan complete: {} results in {:?}",
        summary.results, summary.elapsed
    );
    for doc in store.documents().await {
        println!(
            "{}",
            serde_json::to_string(&doc).unwrap_or_else(|_| "<unserializable>".into())
        );
    }

    Ok(())
}
