// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Crawler and Directory Scan Modules
 * Batch-collect-then-invoke integration of list-driven external tools
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::pipeline::module::{ModuleContext, PipelineModule};
use crate::records::{ScanRecord, UrlResult, UrlSource};
use crate::scanners::crawl::{batch_deadline, CrawlTool};
use crate::scanners::dirscan::DirScanTool;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

const CRAWLER_MODULE: &str = "Crawler";
const DIRSCAN_MODULE: &str = "DirScan";

const CRAWLER_DEADLINE_CAP: Duration = Duration::from_secs(30 * 60);
const DIRSCAN_DEADLINE_CAP: Duration = Duration::from_secs(60 * 60);
/// Per-URL budget in streaming fallback mode
const STREAM_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// Collect-then-invoke crawler. Assets are forwarded the moment they arrive
/// so later stages never stall behind the batch; the tool runs once over the
/// unique URL list after the input closes.
pub struct CrawlerModule {
    crawler: Arc<dyn CrawlTool>,
    rad: Option<Arc<dyn CrawlTool>>,
    concurrency: usize,
    batch_mode: bool,
}

impl CrawlerModule {
    pub fn new(
        crawler: Arc<dyn CrawlTool>,
        rad: Option<Arc<dyn CrawlTool>>,
        concurrency: usize,
        batch_mode: bool,
    ) -> Self {
        Self {
            crawler,
            rad,
            concurrency: concurrency.max(1),
            batch_mode,
        }
    }

    async fn emit_crawled(
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        module: &'static str,
        source: UrlSource,
        input_url: String,
        found: Vec<crate::scanners::crawl::CrawledUrl>,
    ) {
        for crawled in found {
            if ctx.dedup.check_url(&crawled.url) {
                continue;
            }
            ctx.progress.output_inc(module, 1);
            let record = UrlResult {
                input: if crawled.source_url.is_empty() {
                    input_url.clone()
                } else {
                    crawled.source_url
                },
                output: crawled.url,
                source,
                method: crawled.method,
                status_code: crawled.status_code,
                content_type: String::new(),
                length: 0,
            };
            if !ctx.send(output, ScanRecord::Url(record)).await {
                return;
            }
        }
    }

    async fn run_batch(
        &self,
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        urls: Vec<String>,
    ) {
        if urls.is_empty() {
            info!("No URLs collected for crawling");
            return;
        }

        let deadline = batch_deadline(urls.len(), CRAWLER_DEADLINE_CAP);
        info!("Batch crawling {} URLs", urls.len());

        match self.crawler.crawl_list(&ctx.cancel, &urls, deadline).await {
            Ok(found) => {
                Self::emit_crawled(
                    ctx,
                    output,
                    CRAWLER_MODULE,
                    UrlSource::Katana,
                    "list".to_string(),
                    found,
                )
                .await;
            }
            Err(e) => warn!("Batch crawl failed: {}", e),
        }

        // Secondary crawler runs per-URL; it has no list mode but finds
        // URLs the primary misses
        if let Some(rad) = &self.rad {
            if rad.is_available() {
                for url in &urls {
                    if ctx.is_cancelled() {
                        return;
                    }
                    match rad.crawl(&ctx.cancel, url, STREAM_DEADLINE).await {
                        Ok(found) => {
                            Self::emit_crawled(
                                ctx,
                                output,
                                CRAWLER_MODULE,
                                UrlSource::Rad,
                                url.clone(),
                                found,
                            )
                            .await;
                        }
                        Err(e) => warn!("Secondary crawl failed for {}: {}", url, e),
                    }
                }
            }
        }
    }

    async fn run_stream(
        &self,
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        urls: Vec<String>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        for url in urls {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let crawler = Arc::clone(&self.crawler);
            let ctx = ctx.clone();
            let output = output.clone();
            workers.spawn(async move {
                let _permit = permit;
                match crawler.crawl(&ctx.cancel, &url, STREAM_DEADLINE).await {
                    Ok(found) => {
                        Self::emit_crawled(
                            &ctx,
                            &output,
                            CRAWLER_MODULE,
                            UrlSource::Katana,
                            url,
                            found,
                        )
                        .await;
                    }
                    Err(e) => warn!("Crawl failed for {}: {}", url, e),
                }
            });
        }
        while workers.join_next().await.is_some() {}
    }
}

#[async_trait]
impl PipelineModule for CrawlerModule {
    fn name(&self) -> &'static str {
        CRAWLER_MODULE
    }

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        mut input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()> {
        ctx.progress.module_start(CRAWLER_MODULE, 0);

        if !self.crawler.is_available() {
            warn!("Crawler binary missing, passing records through");
            while let Some(record) = ctx.recv(&mut input).await {
                if !ctx.send(&output, record).await {
                    break;
                }
            }
            ctx.progress.module_complete(CRAWLER_MODULE);
            return Ok(());
        }

        // Collection phase: forward immediately, remember unique URLs
        let mut url_set = HashSet::new();
        let mut urls = Vec::new();

        while let Some(record) = ctx.recv(&mut input).await {
            if let ScanRecord::AssetHttp(asset) = &record {
                ctx.progress.processed_inc(CRAWLER_MODULE, 1);
                if !asset.url.is_empty() && url_set.insert(asset.url.clone()) {
                    urls.push(asset.url.clone());
                }
            }
            if !ctx.send(&output, record).await {
                ctx.progress.module_complete(CRAWLER_MODULE);
                return Ok(());
            }
        }

        info!("Input closed, collected {} URLs to crawl", urls.len());
        ctx.progress.module_total_update(CRAWLER_MODULE, urls.len());

        if !ctx.is_cancelled() {
            if self.batch_mode && self.crawler.supports_list() {
                self.run_batch(&ctx, &output, urls).await;
            } else {
                self.run_stream(&ctx, &output, urls).await;
            }
        }

        ctx.progress.module_complete(CRAWLER_MODULE);
        Ok(())
    }
}

/// Keep 2xx/3xx plus the auth-flavored 401 and 403; everything else is noise
fn dirscan_status_ok(status: u16) -> bool {
    (200..400).contains(&status) || status == 401 || status == 403
}

/// Root paths carry no discovery value
fn is_root_path(path: &str) -> bool {
    path.is_empty() || path == "/"
}

pub struct DirScanModule {
    scanner: Arc<dyn DirScanTool>,
    concurrency: usize,
    batch_mode: bool,
}

impl DirScanModule {
    pub fn new(scanner: Arc<dyn DirScanTool>, concurrency: usize, batch_mode: bool) -> Self {
        Self {
            scanner,
            concurrency: concurrency.max(1),
            batch_mode,
        }
    }

    async fn emit_entries(
        ctx: &ModuleContext,
        output: &mpsc::Sender<ScanRecord>,
        entries: Vec<crate::scanners::dirscan::DirEntry>,
    ) {
        for entry in entries {
            if !dirscan_status_ok(entry.status_code) || is_root_path(&entry.path) {
                continue;
            }
            if ctx.dedup.check_url(&entry.url) {
                continue;
            }
            ctx.progress.output_inc(DIRSCAN_MODULE, 1);
            let record = UrlResult {
                input: entry.host,
                output: entry.url,
                source: UrlSource::Dirscan,
                method: "GET".to_string(),
                status_code: entry.status_code,
                content_type: entry.content_type,
                length: entry.body_length,
            };
            if !ctx.send(output, ScanRecord::Url(record)).await {
                return;
            }
        }
    }
}

#[async_trait]
impl PipelineModule for DirScanModule {
    fn name(&self) -> &'static str {
        DIRSCAN_MODULE
    }

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        mut input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()> {
        ctx.progress.module_start(DIRSCAN_MODULE, 0);

        if !self.scanner.is_available() {
            warn!("Directory scanner binary missing, passing records through");
            while let Some(record) = ctx.recv(&mut input).await {
                if !ctx.send(&output, record).await {
                    break;
                }
            }
            ctx.progress.module_complete(DIRSCAN_MODULE);
            return Ok(());
        }

        let mut url_set = HashSet::new();
        let mut urls = Vec::new();

        while let Some(record) = ctx.recv(&mut input).await {
            if let ScanRecord::AssetHttp(asset) = &record {
                ctx.progress.processed_inc(DIRSCAN_MODULE, 1);
                if !asset.url.is_empty() && url_set.insert(asset.url.clone()) {
                    urls.push(asset.url.clone());
                }
            }
            if !ctx.send(&output, record).await {
                ctx.progress.module_complete(DIRSCAN_MODULE);
                return Ok(());
            }
        }

        info!("Input closed, collected {} URLs for directory scan", urls.len());
        ctx.progress.module_total_update(DIRSCAN_MODULE, urls.len());

        if !urls.is_empty() && !ctx.is_cancelled() {
            if self.batch_mode {
                let deadline = batch_deadline(urls.len(), DIRSCAN_DEADLINE_CAP);
                match self.scanner.scan_batch(&ctx.cancel, &urls, deadline).await {
                    Ok(entries) => Self::emit_entries(&ctx, &output, entries).await,
                    Err(e) => warn!("Batch directory scan failed: {}", e),
                }
            } else {
                let semaphore = Arc::new(Semaphore::new(self.concurrency));
                let mut workers = JoinSet::new();
                for url in urls {
                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let scanner = Arc::clone(&self.scanner);
                    let ctx = ctx.clone();
                    let output = output.clone();
                    workers.spawn(async move {
                        let _permit = permit;
                        match scanner.scan(&ctx.cancel, &url, Duration::from_secs(15 * 60)).await {
                            Ok(entries) => Self::emit_entries(&ctx, &output, entries).await,
                            Err(e) => warn!("Directory scan failed for {}: {}", url, e),
                        }
                    });
                }
                while workers.join_next().await.is_some() {}
            }
        }

        ctx.progress.module_complete(DIRSCAN_MODULE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirscan_status_filter() {
        assert!(dirscan_status_ok(200));
        assert!(dirscan_status_ok(301));
        assert!(dirscan_status_ok(401));
        assert!(dirscan_status_ok(403));
        assert!(!dirscan_status_ok(404));
        assert!(!dirscan_status_ok(500));
        assert!(!dirscan_status_ok(100));
    }

    #[test]
    fn test_root_path_suppression() {
        assert!(is_root_path(""));
        assert!(is_root_path("/"));
        assert!(!is_root_path("/admin"));
    }
}
