// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Web Crawler Wrappers
 * katana (list + single) and rad (single) subprocess drivers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CrawledUrl {
    pub url: String,
    pub source_url: String,
    pub method: String,
    pub status_code: u16,
}

/// Crawler seam; list-capable tools get a single batch invocation, the rest
/// run per-URL in streaming fallback mode
#[async_trait]
pub trait CrawlTool: Send + Sync {
    fn is_available(&self) -> bool;

    fn supports_list(&self) -> bool;

    async fn crawl(
        &self,
        cancel: &CancellationToken,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<CrawledUrl>>;

    async fn crawl_list(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<CrawledUrl>>;
}

/// JSON-lines schema the crawler writes to its output file
#[derive(Debug, Deserialize)]
struct KatanaLine {
    #[serde(default)]
    request: KatanaRequest,
    #[serde(default)]
    response: KatanaResponse,
}

#[derive(Debug, Default, Deserialize)]
struct KatanaRequest {
    #[serde(default)]
    method: String,
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Default, Deserialize)]
struct KatanaResponse {
    #[serde(default)]
    status_code: u16,
}

pub struct KatanaScanner {
    bin_path: Option<PathBuf>,
    depth: u32,
    concurrency: usize,
    request_timeout_secs: u64,
    rate_limit: u32,
}

impl KatanaScanner {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("katana"),
            depth: 3,
            concurrency: 10,
            request_timeout_secs: 30,
            rate_limit: 150,
        }
    }

    fn ensure_scheme(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }

    async fn run_and_parse(
        &self,
        cancel: &CancellationToken,
        mut args: Vec<String>,
        output_path: &Path,
        deadline: Duration,
        fallback_source: &str,
    ) -> Result<Vec<CrawledUrl>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("katana binary not available")?;

        args.extend([
            "-d".to_string(),
            self.depth.to_string(),
            "-c".to_string(),
            self.concurrency.to_string(),
            "-timeout".to_string(),
            self.request_timeout_secs.to_string(),
            "-rl".to_string(),
            self.rate_limit.to_string(),
            "-silent".to_string(),
            "-jsonl".to_string(),
            "-o".to_string(),
            output_path.to_string_lossy().to_string(),
        ]);

        let mut child = Command::new(bin)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .context("failed to start katana")?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            _ = tokio::time::sleep(deadline) => {
                warn!("Crawler deadline ({:?}) reached, collecting partial output", deadline);
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() && !cancel.is_cancelled() {
                        warn!("katana exited with {}", status);
                    }
                }
            }
        }

        Ok(Self::parse_output(output_path, fallback_source).await)
    }

    /// Parse JSON lines, falling back to treating a line as a bare URL
    async fn parse_output(path: &Path, fallback_source: &str) -> Vec<CrawledUrl> {
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Ok(parsed) = serde_json::from_str::<KatanaLine>(line) {
                let url = parsed.request.endpoint;
                if !url.is_empty() && seen.insert(url.clone()) {
                    urls.push(CrawledUrl {
                        url,
                        source_url: if parsed.request.source.is_empty() {
                            fallback_source.to_string()
                        } else {
                            parsed.request.source
                        },
                        method: parsed.request.method,
                        status_code: parsed.response.status_code,
                    });
                }
            } else if seen.insert(line.to_string()) {
                urls.push(CrawledUrl {
                    url: line.to_string(),
                    source_url: fallback_source.to_string(),
                    method: String::new(),
                    status_code: 0,
                });
            }
        }

        urls
    }
}

impl Default for KatanaScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrawlTool for KatanaScanner {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    fn supports_list(&self) -> bool {
        true
    }

    async fn crawl(
        &self,
        cancel: &CancellationToken,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        let target = Self::ensure_scheme(url);
        let output_path =
            std::env::temp_dir().join(format!("katana_output_{}.json", uuid::Uuid::new_v4()));

        let result = self
            .run_and_parse(
                cancel,
                vec!["-u".to_string(), target.clone()],
                &output_path,
                deadline,
                &target,
            )
            .await;

        tokio::fs::remove_file(&output_path).await.ok();
        let urls = result?;
        info!("Crawler found {} URLs for {}", urls.len(), target);
        Ok(urls)
    }

    async fn crawl_list(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let stamp = uuid::Uuid::new_v4();
        let input_path = std::env::temp_dir().join(format!("katana_input_{stamp}.txt"));
        let output_path = std::env::temp_dir().join(format!("katana_output_{stamp}.json"));

        let list: String = urls
            .iter()
            .map(|u| Self::ensure_scheme(u))
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&input_path, list)
            .await
            .context("failed to write crawler URL list")?;

        info!("Batch crawling {} URLs (deadline {:?})", urls.len(), deadline);

        let result = self
            .run_and_parse(
                cancel,
                vec!["-list".to_string(), input_path.to_string_lossy().to_string()],
                &output_path,
                deadline,
                "list",
            )
            .await;

        tokio::fs::remove_file(&input_path).await.ok();
        tokio::fs::remove_file(&output_path).await.ok();
        let found = result?;
        info!("Batch crawl found {} URLs from {} targets", found.len(), urls.len());
        Ok(found)
    }
}

/// rad has no list mode; it is driven one URL at a time after the batch pass
pub struct RadScanner {
    bin_path: Option<PathBuf>,
}

impl RadScanner {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("rad"),
        }
    }
}

impl Default for RadScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrawlTool for RadScanner {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    fn supports_list(&self) -> bool {
        false
    }

    async fn crawl(
        &self,
        cancel: &CancellationToken,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        let bin = self.bin_path.as_ref().context("rad binary not available")?;
        let target = KatanaScanner::ensure_scheme(url);
        let output_path =
            std::env::temp_dir().join(format!("rad_output_{}.txt", uuid::Uuid::new_v4()));

        let mut child = Command::new(bin)
            .args([
                "-t",
                &target,
                "-text-output",
                &output_path.to_string_lossy(),
            ])
            .kill_on_drop(true)
            .spawn()
            .context("failed to start rad")?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            _ = tokio::time::sleep(deadline) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            _ = child.wait() => {}
        }

        let mut urls = Vec::new();
        if let Ok(content) = tokio::fs::read_to_string(&output_path).await {
            let mut seen = HashSet::new();
            for line in content.lines() {
                // rad lines are `METHOD url`
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (method, url) = match line.split_once(' ') {
                    Some((m, u)) => (m.to_string(), u.trim().to_string()),
                    None => (String::new(), line.to_string()),
                };
                if !url.is_empty() && seen.insert(url.clone()) {
                    urls.push(CrawledUrl {
                        url,
                        source_url: target.clone(),
                        method,
                        status_code: 0,
                    });
                }
            }
        }
        tokio::fs::remove_file(&output_path).await.ok();

        info!("rad found {} URLs for {}", urls.len(), target);
        Ok(urls)
    }

    async fn crawl_list(
        &self,
        _cancel: &CancellationToken,
        _urls: &[String],
        _deadline: Duration,
    ) -> Result<Vec<CrawledUrl>> {
        anyhow::bail!("rad does not support list mode")
    }
}

/// Deadline for a batch crawl: three minutes per URL, clamped
pub fn batch_deadline(url_count: usize, cap: Duration) -> Duration {
    let per_url = Duration::from_secs(180).saturating_mul(url_count as u32);
    per_url.max(Duration::from_secs(300)).min(cap)
}
