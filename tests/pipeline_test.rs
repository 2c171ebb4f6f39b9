// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Streaming Pipeline Integration Tests
 * End-to-end pipeline flows against mocked tool seams
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use async_trait::async_trait;
use harrier_scanner::config::{PortScanMode, TaskConfig};
use harrier_scanner::dns::DnsResolver;
use harrier_scanner::executor::{ScanTask, TaskExecutor};
use harrier_scanner::pipeline::StreamingPipeline;
use harrier_scanner::records::ScanRecord;
use harrier_scanner::scanners::crawl::{CrawlTool, CrawledUrl};
use harrier_scanner::scanners::dirscan::{DirEntry, DirScanTool};
use harrier_scanner::scanners::httpx::{HttpProbeResult, HttpProber};
use harrier_scanner::scanners::portscan::{OpenPort, PortScanTool};
use harrier_scanner::scanners::subdomain_tools::{BruteTool, PassiveTool};
use harrier_scanner::scanners::vulnscan::{VulnFinding, VulnScanTool};
use harrier_scanner::scanners::ToolSet;
use harrier_scanner::sink::{MemoryStore, ResultKind};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Mock tool seams

/// In-memory DNS; optionally answers every name with one wildcard address
struct FakeDns {
    records: HashMap<String, Vec<IpAddr>>,
    cnames: HashMap<String, String>,
    wildcard: Option<IpAddr>,
}

impl FakeDns {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            cnames: HashMap::new(),
            wildcard: None,
        }
    }

    fn with_record(mut self, host: &str, ip: &str) -> Self {
        self.records
            .entry(host.to_string())
            .or_default()
            .push(ip.parse().unwrap());
        self
    }

    fn with_wildcard(mut self, ip: &str) -> Self {
        self.wildcard = Some(ip.parse().unwrap());
        self
    }
}

#[async_trait]
impl DnsResolver for FakeDns {
    async fn lookup_ips(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Some(ips) = self.records.get(host) {
            return Ok(ips.clone());
        }
        if let Some(ip) = self.wildcard {
            return Ok(vec![ip]);
        }
        Ok(Vec::new())
    }

    async fn lookup_cname(&self, host: &str) -> Result<Option<String>> {
        Ok(self.cnames.get(host).cloned())
    }
}

struct MockBrute {
    results: HashMap<String, Vec<String>>,
}

#[async_trait]
impl BruteTool for MockBrute {
    fn is_available(&self) -> bool {
        true
    }

    async fn enumerate(
        &self,
        _cancel: &CancellationToken,
        _domain: &str,
        _dict: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(self.results.clone())
    }
}

struct NoBrute;

#[async_trait]
impl BruteTool for NoBrute {
    fn is_available(&self) -> bool {
        false
    }

    async fn enumerate(
        &self,
        _cancel: &CancellationToken,
        _domain: &str,
        _dict: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        anyhow::bail!("unavailable")
    }
}

struct MockPassive {
    hosts: Vec<String>,
}

#[async_trait]
impl PassiveTool for MockPassive {
    fn is_available(&self) -> bool {
        !self.hosts.is_empty()
    }

    async fn enumerate(&self, _cancel: &CancellationToken, _domain: &str) -> Result<Vec<String>> {
        Ok(self.hosts.clone())
    }
}

struct NoProber;

#[async_trait]
impl HttpProber for NoProber {
    fn is_available(&self) -> bool {
        false
    }

    async fn probe(
        &self,
        _cancel: &CancellationToken,
        _hosts: &[String],
    ) -> Result<Vec<HttpProbeResult>> {
        Ok(Vec::new())
    }
}

/// Records scanned targets; answers from a fixed port table
struct MockPortScanner {
    open_ports: Vec<OpenPort>,
    scanned: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PortScanTool for MockPortScanner {
    fn is_available(&self) -> bool {
        true
    }

    async fn scan(
        &self,
        _cancel: &CancellationToken,
        target: &str,
        _mode: PortScanMode,
        _custom_ports: &str,
    ) -> Result<Vec<OpenPort>> {
        self.scanned.lock().unwrap().push(target.to_string());
        Ok(self
            .open_ports
            .iter()
            .map(|p| OpenPort {
                ip: if p.ip.is_empty() {
                    target.to_string()
                } else {
                    p.ip.clone()
                },
                port: p.port,
                protocol: p.protocol.clone(),
                title: p.title.clone(),
                midware: p.midware.clone(),
                frameworks: p.frameworks.clone(),
            })
            .collect())
    }
}

struct NoPortScanner;

#[async_trait]
impl PortScanTool for NoPortScanner {
    fn is_available(&self) -> bool {
        false
    }

    async fn scan(
        &self,
        _cancel: &CancellationToken,
        _target: &str,
        _mode: PortScanMode,
        _custom_ports: &str,
    ) -> Result<Vec<OpenPort>> {
        anyhow::bail!("unavailable")
    }
}

/// Batch crawl blocks until cancellation, simulating a long tool run
struct BlockingCrawler {
    invoked: Arc<Mutex<bool>>,
}

#[async_trait]
impl CrawlTool for BlockingCrawler {
    fn is_available(&self) -> bool {
        true
    }

    fn supports_list(&self) -> bool {
        true
    }

    async fn crawl(
        &self,
        _cancel: &CancellationToken,
        _url: &str,
        _deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        Ok(Vec::new())
    }

    async fn crawl_list(
        &self,
        cancel: &CancellationToken,
        _urls: &[String],
        _deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        *self.invoked.lock().unwrap() = true;
        cancel.cancelled().await;
        // Child received TERM; partial output so far is empty
        Ok(Vec::new())
    }
}

struct NoCrawler;

#[async_trait]
impl CrawlTool for NoCrawler {
    fn is_available(&self) -> bool {
        false
    }

    fn supports_list(&self) -> bool {
        false
    }

    async fn crawl(
        &self,
        _cancel: &CancellationToken,
        _url: &str,
        _deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        anyhow::bail!("unavailable")
    }

    async fn crawl_list(
        &self,
        _cancel: &CancellationToken,
        _urls: &[String],
        _deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        anyhow::bail!("unavailable")
    }
}

struct NoDirScanner;

#[async_trait]
impl DirScanTool for NoDirScanner {
    fn is_available(&self) -> bool {
        false
    }

    async fn scan_batch(
        &self,
        _cancel: &CancellationToken,
        _urls: &[String],
        _deadline: Duration,
    ) -> Result<Vec<DirEntry>> {
        anyhow::bail!("unavailable")
    }

    async fn scan(
        &self,
        _cancel: &CancellationToken,
        _url: &str,
        _deadline: Duration,
    ) -> Result<Vec<DirEntry>> {
        anyhow::bail!("unavailable")
    }
}

struct NoVulnScanner;

#[async_trait]
impl VulnScanTool for NoVulnScanner {
    fn is_available(&self) -> bool {
        false
    }

    async fn scan_list(
        &self,
        _cancel: &CancellationToken,
        _urls: &[String],
        _deadline: Duration,
    ) -> Result<Vec<VulnFinding>> {
        anyhow::bail!("unavailable")
    }
}

/// A tool set with nothing available, to be overridden per test
fn bare_tools(dns: Arc<dyn DnsResolver>) -> ToolSet {
    ToolSet {
        dns,
        port_scanner: Arc::new(NoPortScanner),
        brute: Arc::new(NoBrute),
        passive: Arc::new(MockPassive { hosts: Vec::new() }),
        http_prober: Arc::new(NoProber),
        crawler: Arc::new(NoCrawler),
        rad: Arc::new(NoCrawler),
        dir_scanner: Arc::new(NoDirScanner),
        vuln_scanner: Arc::new(NoVulnScanner),
    }
}

async fn collect_records(mut rx: tokio::sync::mpsc::Receiver<ScanRecord>) -> Vec<ScanRecord> {
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    records
}

// ---------------------------------------------------------------------------
// Scenarios

#[tokio::test]
async fn test_subdomain_only_flow() {
    // Brute fallback resolves against the fake DNS: only www and mail exist
    let dns = Arc::new(
        FakeDns::new()
            .with_record("www.example.com", "93.184.216.34")
            .with_record("mail.example.com", "93.184.216.35"),
    );
    let tools = bare_tools(dns);

    let mut config = TaskConfig::subdomain_only();
    config.subdomain_http_probe = false;
    config.subdomain_resolve_ip = false;
    config.subdomain_max_enum_time = 1;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["example.com".to_string()]).unwrap();
    let records = collect_records(rx).await;

    let subdomains: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            ScanRecord::Subdomain(s) => Some(s),
            _ => None,
        })
        .collect();

    assert_eq!(subdomains.len(), 2);
    for sub in &subdomains {
        assert!(
            sub.host == "www.example.com" || sub.host == "mail.example.com",
            "unexpected host {}",
            sub.host
        );
        assert!(!sub.ips.is_empty(), "resolved hosts carry their addresses");
        assert_eq!(sub.root_domain, "example.com");
    }
}

#[tokio::test]
async fn test_wildcard_filtering_suppresses_brute_results() {
    // Every name resolves to the same address: a wildcard configuration
    let dns = Arc::new(FakeDns::new().with_wildcard("1.2.3.4"));
    let tools = bare_tools(dns);

    let mut config = TaskConfig::subdomain_only();
    config.subdomain_http_probe = false;
    config.subdomain_resolve_ip = false;
    config.subdomain_max_enum_time = 1;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["wildcard.test".to_string()]).unwrap();
    let records = collect_records(rx).await;

    let subdomains = records
        .iter()
        .filter(|r| matches!(r, ScanRecord::Subdomain(_)))
        .count();
    assert_eq!(
        subdomains, 0,
        "all brute results sit on the wildcard address and must be dropped"
    );
}

#[tokio::test]
async fn test_port_scan_http_asset_synthesis() {
    let scanned = Arc::new(Mutex::new(Vec::new()));
    let mut tools = bare_tools(Arc::new(FakeDns::new()));
    tools.port_scanner = Arc::new(MockPortScanner {
        open_ports: vec![
            OpenPort {
                ip: String::new(),
                port: 80,
                protocol: "http".to_string(),
                title: "Welcome".to_string(),
                midware: "nginx".to_string(),
                frameworks: vec![],
            },
            OpenPort {
                ip: String::new(),
                port: 22,
                protocol: String::new(),
                title: String::new(),
                midware: String::new(),
                frameworks: vec![],
            },
        ],
        scanned: Arc::clone(&scanned),
    });

    let mut config = TaskConfig::from_scan_types(&["port_scan".to_string()]);
    config.port_scan_mode = PortScanMode::Quick;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["10.0.0.1".to_string()]).unwrap();
    let records = collect_records(rx).await;

    let ports: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            ScanRecord::PortAlive(p) => Some(p),
            _ => None,
        })
        .collect();
    let assets: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            ScanRecord::AssetHttp(a) => Some(a),
            _ => None,
        })
        .collect();

    assert_eq!(ports.len(), 2);
    assert!(ports.iter().any(|p| p.port == 22 && p.service == "ssh"));
    assert_eq!(assets.len(), 1, "only the HTTP port becomes an asset");
    assert_eq!(assets[0].url, "http://10.0.0.1:80");
    assert_eq!(assets[0].port, 80);
}

#[tokio::test]
async fn test_cross_source_dedup_single_acceptance() {
    // The same host arrives from brute force and from passive enumeration
    let dns = Arc::new(FakeDns::new());
    let mut tools = bare_tools(dns);
    tools.brute = Arc::new(MockBrute {
        results: [("api.x.com".to_string(), vec!["1.2.3.4".to_string()])]
            .into_iter()
            .collect(),
    });
    tools.passive = Arc::new(MockPassive {
        hosts: vec!["api.x.com".to_string()],
    });

    let mut config = TaskConfig::subdomain_only();
    config.subdomain_http_probe = false;
    config.subdomain_resolve_ip = false;
    config.subdomain_max_enum_time = 1;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["x.com".to_string()]).unwrap();

    let records = collect_records(rx).await;
    let subdomains = records
        .iter()
        .filter(|r| matches!(r, ScanRecord::Subdomain(_)))
        .count();
    assert_eq!(subdomains, 1, "duplicate host accepted exactly once");

    let report = pipeline.progress();
    let module = &report.modules["SubdomainScan"];
    assert_eq!(module.processed, 2, "both discovery events counted");
    assert_eq!(module.output, 1, "one emission counted");
}

#[tokio::test]
async fn test_cancellation_mid_crawl_closes_stream() {
    let invoked = Arc::new(Mutex::new(false));
    let mut tools = bare_tools(Arc::new(FakeDns::new()));
    tools.port_scanner = Arc::new(MockPortScanner {
        open_ports: vec![OpenPort {
            ip: String::new(),
            port: 80,
            protocol: "http".to_string(),
            title: String::new(),
            midware: String::new(),
            frameworks: vec![],
        }],
        scanned: Arc::new(Mutex::new(Vec::new())),
    });
    tools.crawler = Arc::new(BlockingCrawler {
        invoked: Arc::clone(&invoked),
    });

    let config = TaskConfig {
        port_scan: true,
        port_scan_mode: PortScanMode::Quick,
        web_crawler: true,
        ..TaskConfig::default()
    };

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["10.0.0.9".to_string()]).unwrap();

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let records = tokio::time::timeout(Duration::from_secs(10), collect_records(rx))
        .await
        .expect("result stream must close within the cancellation bound");

    assert!(*invoked.lock().unwrap(), "batch crawl was started");
    assert!(
        !records.iter().any(|r| matches!(r, ScanRecord::Url(_))),
        "no URL results after cancellation"
    );
}

#[tokio::test]
async fn test_oversized_cidr_passes_through_to_scanner() {
    let scanned = Arc::new(Mutex::new(Vec::new()));
    let mut tools = bare_tools(Arc::new(FakeDns::new()));
    tools.port_scanner = Arc::new(MockPortScanner {
        open_ports: vec![],
        scanned: Arc::clone(&scanned),
    });

    let mut config = TaskConfig::from_scan_types(&["port_scan".to_string()]);
    config.port_scan_mode = PortScanMode::Quick;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["10.0.0.0/8".to_string()]).unwrap();
    let _ = collect_records(rx).await;

    let targets = scanned.lock().unwrap().clone();
    assert_eq!(targets, vec!["10.0.0.0/8".to_string()]);
}

#[tokio::test]
async fn test_start_is_idempotent_per_instance() {
    let tools = bare_tools(Arc::new(FakeDns::new()));
    let mut config = TaskConfig::subdomain_only();
    config.subdomain_max_enum_time = 1;
    config.subdomain_resolve_ip = false;

    let mut pipeline = StreamingPipeline::new(config, tools, 1);
    let rx = pipeline.start(&["example.com".to_string()]).unwrap();
    assert!(pipeline.start(&["example.com".to_string()]).is_err());
    drop(rx);
}

#[tokio::test]
async fn test_executor_persists_to_store() {
    let dns = Arc::new(FakeDns::new().with_record("www.example.com", "93.184.216.34"));
    let tools = bare_tools(dns);

    let mut config = TaskConfig::subdomain_only();
    config.subdomain_http_probe = false;
    config.subdomain_resolve_ip = false;
    config.subdomain_max_enum_time = 1;

    let task = ScanTask {
        id: "task-int-1".to_string(),
        workspace_id: "ws-1".to_string(),
        name: "integration".to_string(),
        targets: vec!["example.com".to_string()],
        config,
    };

    let store = Arc::new(MemoryStore::new());
    let executor = TaskExecutor::new(Arc::clone(&store) as _, tools);
    let summary = executor.execute(&task).await.unwrap();

    assert_eq!(summary.subdomains, 1);
    assert_eq!(store.count(ResultKind::Subdomain).await, 1);

    let docs = store.documents().await;
    let doc = docs
        .iter()
        .find(|d| d.kind == ResultKind::Subdomain)
        .unwrap();
    assert_eq!(doc.task_id, "task-int-1");
    assert_eq!(doc.data["subdomain"], "www.example.com");
    assert_eq!(doc.data["root_domain"], "example.com");
}
