// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! External tool wrappers. Every scanner binary is opaque: the wrapper owns
//! process lifecycle, deadline, cancellation and output parsing, and exposes
//! a trait seam the pipeline modules consume.

pub mod crawl;
pub mod dirscan;
pub mod httpx;
pub mod portscan;
pub mod subdomain_tools;
pub mod takeover;
pub mod thirdparty;
pub mod tools;
pub mod vulnscan;

use crate::dns::{DnsResolver, SystemDns};
use anyhow::Result;
use std::sync::Arc;

/// The full set of tool seams a pipeline instance runs against.
///
/// Production uses the real wrappers; tests swap individual fields for mocks.
#[derive(Clone)]
pub struct ToolSet {
    pub dns: Arc<dyn DnsResolver>,
    pub port_scanner: Arc<dyn portscan::PortScanTool>,
    pub brute: Arc<dyn subdomain_tools::BruteTool>,
    pub passive: Arc<dyn subdomain_tools::PassiveTool>,
    pub http_prober: Arc<dyn httpx::HttpProber>,
    pub crawler: Arc<dyn crawl::CrawlTool>,
    pub rad: Arc<dyn crawl::CrawlTool>,
    pub dir_scanner: Arc<dyn dirscan::DirScanTool>,
    pub vuln_scanner: Arc<dyn vulnscan::VulnScanTool>,
}

impl ToolSet {
    pub fn discover() -> Result<Self> {
        let dns: Arc<dyn DnsResolver> = Arc::new(SystemDns::new()?);
        Ok(Self {
            dns,
            port_scanner: Arc::new(portscan::GogoScanner::new()),
            brute: Arc::new(subdomain_tools::KsubdomainTool::new()),
            passive: Arc::new(subdomain_tools::SubfinderTool::new()),
            http_prober: Arc::new(httpx::HttpxProber::new()),
            crawler: Arc::new(crawl::KatanaScanner::new()),
            rad: Arc::new(crawl::RadScanner::new()),
            dir_scanner: Arc::new(dirscan::SprayScanner::new()),
            vuln_scanner: Arc::new(vulnscan::NucleiScanner::new()),
        })
    }
}
