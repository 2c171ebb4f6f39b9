// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Batch HTTP prober wrapper. Hosts go in as a list file, enrichment comes
//! back as JSON lines: status, title, server, technologies, IPs and CDN
//! classification. Used by the subdomain stage when http_probe is enabled.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpProbeResult {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default, rename = "webserver")]
    pub web_server: String,
    #[serde(default, rename = "tech")]
    pub technologies: Vec<String>,
    #[serde(default, rename = "a")]
    pub ips: Vec<String>,
    #[serde(default)]
    pub cdn: bool,
    #[serde(default)]
    pub cdn_name: String,
}

impl HttpProbeResult {
    /// Bare host the probe was pointed at
    pub fn host(&self) -> &str {
        if !self.input.is_empty() {
            return &self.input;
        }
        let mut host = self.url.as_str();
        if let Some(rest) = host.strip_prefix("https://") {
            host = rest;
        } else if let Some(rest) = host.strip_prefix("http://") {
            host = rest;
        }
        host.split(['/', ':']).next().unwrap_or(host)
    }
}

/// Seam over the batch HTTP prober
#[async_trait]
pub trait HttpProber: Send + Sync {
    fn is_available(&self) -> bool;

    /// Probe a host list; hosts that did not answer are simply absent
    async fn probe(
        &self,
        cancel: &CancellationToken,
        hosts: &[String],
    ) -> Result<Vec<HttpProbeResult>>;
}

pub struct HttpxProber {
    bin_path: Option<PathBuf>,
    threads: usize,
}

impl HttpxProber {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("httpx"),
            threads: 30,
        }
    }
}

impl Default for HttpxProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpProber for HttpxProber {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn probe(
        &self,
        cancel: &CancellationToken,
        hosts: &[String],
    ) -> Result<Vec<HttpProbeResult>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("httpx binary not available")?;
        if hosts.is_empty() {
            return Ok(Vec::new());
        }

        let temp_dir = std::env::temp_dir();
        let stamp = uuid::Uuid::new_v4();
        let input_path = temp_dir.join(format!("httpx_input_{stamp}.txt"));
        let output_path = temp_dir.join(format!("httpx_output_{stamp}.json"));

        tokio::fs::write(&input_path, hosts.join("\n"))
            .await
            .context("failed to write probe input list")?;

        info!("HTTP probing {} hosts", hosts.len());

        let mut child = Command::new(bin)
            .args([
                "-l",
                &input_path.to_string_lossy(),
                "-json",
                "-o",
                &output_path.to_string_lossy(),
                "-silent",
                "-title",
                "-status-code",
                "-web-server",
                "-tech-detect",
                "-ip",
                "-cdn",
                "-threads",
                &self.threads.to_string(),
            ])
            .kill_on_drop(true)
            .spawn()
            .context("failed to start httpx")?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() {
                        warn!("httpx exited with {}", status);
                    }
                }
            }
        }

        // Parse whatever was written, even after cancellation
        let mut results = Vec::new();
        if let Ok(content) = tokio::fs::read_to_string(&output_path).await {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HttpProbeResult>(line) {
                    Ok(result) => results.push(result),
                    Err(e) => warn!("Unparseable httpx line: {}", e),
                }
            }
        }

        tokio::fs::remove_file(&input_path).await.ok();
        tokio::fs::remove_file(&output_path).await.ok();

        info!("HTTP probe returned {} live hosts", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_result_host_extraction() {
        let from_input = HttpProbeResult {
            input: "www.example.com".into(),
            url: "https://www.example.com".into(),
            ..Default::default()
        };
        assert_eq!(from_input.host(), "www.example.com");

        let from_url = HttpProbeResult {
            url: "https://api.example.com:8443/path".into(),
            ..Default::default()
        };
        assert_eq!(from_url.host(), "api.example.com");
    }

    #[test]
    fn test_probe_result_deserialization() {
        let line = r#"{"input":"www.x.com","url":"https://www.x.com","title":"Home","status_code":200,"webserver":"nginx","tech":["React"],"a":["1.2.3.4"],"cdn":true,"cdn_name":"cloudflare"}"#;
        let result: HttpProbeResult = serde_json::from_str(line).unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.web_server, "nginx");
        assert_eq!(result.technologies, vec!["React"]);
        assert!(result.cdn);
        assert_eq!(result.cdn_name, "cloudflare");
    }
}
