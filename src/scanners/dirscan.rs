// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Directory Brute-Force Wrapper
 * spray-style batch directory scanning over a URL list file
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
pub struct DirEntry {
    pub url: String,
    pub path: String,
    pub host: String,
    pub status_code: u16,
    pub body_length: u64,
    pub content_type: String,
    pub title: String,
}

/// Seam over the external directory brute-forcer
#[async_trait]
pub trait DirScanTool: Send + Sync {
    fn is_available(&self) -> bool;

    async fn scan_batch(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<DirEntry>>;

    async fn scan(
        &self,
        cancel: &CancellationToken,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<DirEntry>>;
}

/// JSON output line written by the tool
#[derive(Debug, Deserialize)]
struct SprayLine {
    #[serde(default)]
    url: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    body_length: u64,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    title: String,
}

pub struct SprayScanner {
    bin_path: Option<PathBuf>,
    concurrency: usize,
    scan_backup: bool,
    scan_common: bool,
}

impl SprayScanner {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("spray"),
            concurrency: 50,
            scan_backup: true,
            scan_common: true,
        }
    }

    fn base_args(&self, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            self.concurrency.to_string(),
            "-j".to_string(),
            "-f".to_string(),
            output_path.to_string_lossy().to_string(),
            "--no-color".to_string(),
            "--no-bar".to_string(),
            "-D".to_string(),
        ];
        if self.scan_backup {
            args.push("--bak".to_string());
        }
        if self.scan_common {
            args.push("--common".to_string());
        }
        args
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        args: Vec<String>,
        output_path: &Path,
        deadline: Duration,
    ) -> Result<Vec<DirEntry>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("spray binary not available")?;

        let mut child = Command::new(bin)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .context("failed to start spray")?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            _ = tokio::time::sleep(deadline) => {
                warn!("Directory scan deadline ({:?}) reached, collecting partial output", deadline);
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() && !cancel.is_cancelled() {
                        warn!("spray exited with {}", status);
                    }
                }
            }
        }

        Ok(Self::parse_output(output_path).await)
    }

    async fn parse_output(path: &Path) -> Vec<DirEntry> {
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(parsed) = serde_json::from_str::<SprayLine>(line) else {
                continue;
            };

            // Dedup on url+path; some versions repeat entries across depths
            let key = format!("{}{}", parsed.url, parsed.path);
            if key.is_empty() || !seen.insert(key) {
                continue;
            }

            entries.push(DirEntry {
                url: parsed.url,
                path: parsed.path,
                host: parsed.host,
                status_code: parsed.status,
                body_length: parsed.body_length,
                content_type: parsed.content_type,
                title: parsed.title,
            });
        }

        entries
    }
}

impl Default for SprayScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirScanTool for SprayScanner {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn scan_batch(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<DirEntry>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let stamp = uuid::Uuid::new_v4();
        let input_path = std::env::temp_dir().join(format!("spray_targets_{stamp}.txt"));
        let output_path = std::env::temp_dir().join(format!("spray_output_{stamp}.json"));

        let list: String = urls
            .iter()
            .map(|u| {
                if u.starts_with("http://") || u.starts_with("https://") {
                    u.clone()
                } else {
                    format!("https://{u}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&input_path, list)
            .await
            .context("failed to write dirscan target list")?;

        info!(
            "Batch directory scan over {} URLs (deadline {:?})",
            urls.len(),
            deadline
        );

        let mut args = vec![
            "-l".to_string(),
            input_path.to_string_lossy().to_string(),
        ];
        args.extend(self.base_args(&output_path));

        let result = self.run(cancel, args, &output_path, deadline).await;

        tokio::fs::remove_file(&input_path).await.ok();
        tokio::fs::remove_file(&output_path).await.ok();

        let entries = result?;
        info!("Directory scan found {} entries", entries.len());
        Ok(entries)
    }

    async fn scan(
        &self,
        cancel: &CancellationToken,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<DirEntry>> {
        let output_path =
            std::env::temp_dir().join(format!("spray_output_{}.json", uuid::Uuid::new_v4()));

        let mut args = vec!["-u".to_string(), url.to_string()];
        args.extend(self.base_args(&output_path));

        let result = self.run(cancel, args, &output_path, deadline).await;
        tokio::fs::remove_file(&output_path).await.ok();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_output_dedups_url_path() {
        let path = std::env::temp_dir().join(format!("spray_test_{}.json", uuid::Uuid::new_v4()));
        let content = concat!(
            r#"{"url":"https://x.com/admin","path":"/admin","host":"x.com","status":401,"body_length":120,"content_type":"text/html","title":"Login"}"#,
            "\n",
            r#"{"url":"https://x.com/admin","path":"/admin","host":"x.com","status":401,"body_length":120,"content_type":"text/html","title":"Login"}"#,
            "\n",
            r#"{"url":"https://x.com/backup.zip","path":"/backup.zip","host":"x.com","status":200,"body_length":9000,"content_type":"application/zip","title":""}"#,
            "\n",
            "not json\n",
        );
        tokio::fs::write(&path, content).await.unwrap();

        let entries = SprayScanner::parse_output(&path).await;
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status_code, 401);
        assert_eq!(entries[1].path, "/backup.zip");
    }
}
