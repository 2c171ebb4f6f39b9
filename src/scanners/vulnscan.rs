// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vulnerability Matcher Wrapper
 * nuclei-style template execution over a batched URL list
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One template match reported by the matcher
#[derive(Debug, Clone)]
pub struct VulnFinding {
    pub template_id: String,
    pub name: String,
    pub severity: String,
    pub host: String,
    pub matched_at: String,
    pub description: String,
    pub remediation: String,
    pub reference: String,
    pub extracted: Vec<String>,
}

#[async_trait]
pub trait VulnScanTool: Send + Sync {
    fn is_available(&self) -> bool;

    async fn scan_list(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<VulnFinding>>;
}

#[derive(Debug, Deserialize)]
struct NucleiLine {
    #[serde(default, rename = "template-id")]
    template_id: String,
    #[serde(default)]
    info: NucleiInfo,
    #[serde(default)]
    host: String,
    #[serde(default, rename = "matched-at")]
    matched_at: String,
    #[serde(default, rename = "extracted-results")]
    extracted_results: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NucleiInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    remediation: String,
    #[serde(default)]
    reference: Vec<String>,
}

pub struct NucleiScanner {
    bin_path: Option<PathBuf>,
    concurrency: usize,
    rate_limit: u32,
}

impl NucleiScanner {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("nuclei"),
            concurrency: 25,
            rate_limit: 150,
        }
    }
}

impl Default for NucleiScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnScanTool for NucleiScanner {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn scan_list(
        &self,
        cancel: &CancellationToken,
        urls: &[String],
        deadline: Duration,
    ) -> Result<Vec<VulnFinding>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("nuclei binary not available")?;
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let stamp = uuid::Uuid::new_v4();
        let input_path = std::env::temp_dir().join(format!("nuclei_targets_{stamp}.txt"));
        let output_path = std::env::temp_dir().join(format!("nuclei_output_{stamp}.json"));

        tokio::fs::write(&input_path, urls.join("\n"))
            .await
            .context("failed to write vuln scan target list")?;

        info!(
            "Vulnerability matching over {} targets (deadline {:?})",
            urls.len(),
            deadline
        );

        let mut child = Command::new(bin)
            .args([
                "-l",
                &input_path.to_string_lossy(),
                "-jsonl",
                "-o",
                &output_path.to_string_lossy(),
                "-silent",
                "-nc",
                "-c",
                &self.concurrency.to_string(),
                "-rl",
                &self.rate_limit.to_string(),
            ])
            .kill_on_drop(true)
            .spawn()
            .context("failed to start nuclei")?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            _ = tokio::time::sleep(deadline) => {
                warn!("Vulnerability scan deadline reached, collecting partial output");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() && !cancel.is_cancelled() {
                        warn!("nuclei exited with {}", status);
                    }
                }
            }
        }

        let mut findings = Vec::new();
        if let Ok(content) = tokio::fs::read_to_string(&output_path).await {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<NucleiLine>(line) {
                    Ok(parsed) => findings.push(VulnFinding {
                        template_id: parsed.template_id,
                        name: parsed.info.name,
                        severity: parsed.info.severity,
                        host: parsed.host,
                        matched_at: parsed.matched_at,
                        description: parsed.info.description,
                        remediation: parsed.info.remediation,
                        reference: parsed.info.reference.join(", "),
                        extracted: parsed.extracted_results,
                    }),
                    Err(e) => warn!("Unparseable matcher line: {}", e),
                }
            }
        }

        tokio::fs::remove_file(&input_path).await.ok();
        tokio::fs::remove_file(&output_path).await.ok();

        info!("Vulnerability matcher reported {} findings", findings.len());
        Ok(findings)
    }
}
