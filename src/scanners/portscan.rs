// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Port Scanner Wrapper
 * Drives the external packet port scanner and parses its JSON-lines stream
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::PortScanMode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One open port reported by the scanner
#[derive(Debug, Clone)]
pub struct OpenPort {
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    /// Page title or banner excerpt
    pub title: String,
    /// Middleware / server product string
    pub midware: String,
    /// Framework names the scanner already recognized
    pub frameworks: Vec<String>,
}

/// Seam over the external port scanner so the pipeline can be exercised
/// against a mock in tests
#[async_trait]
pub trait PortScanTool: Send + Sync {
    fn is_available(&self) -> bool;

    /// Scan one target; partial results are valid on cancellation
    async fn scan(
        &self,
        cancel: &CancellationToken,
        target: &str,
        mode: PortScanMode,
        custom_ports: &str,
    ) -> Result<Vec<OpenPort>>;
}

/// JSON line shape written by the scanner on stdout
#[derive(Debug, Deserialize)]
struct ScannerLine {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    midware: String,
    #[serde(default)]
    frameworks: HashMap<String, serde_json::Value>,
}

/// Wrapper around the `gogo` packet scanner binary
pub struct GogoScanner {
    bin_path: Option<PathBuf>,
    threads: usize,
    timeout_secs: u64,
}

impl GogoScanner {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("gogo"),
            threads: 1000,
            timeout_secs: 10,
        }
    }

    fn ports_arg(mode: PortScanMode, custom: &str) -> String {
        match mode {
            // top1 / top2 are the scanner's aliases for its top100/top1000 sets
            PortScanMode::Quick => "top1".to_string(),
            PortScanMode::Top1000 => "top2".to_string(),
            PortScanMode::Full => "1-65535".to_string(),
            PortScanMode::Custom => {
                if custom.is_empty() {
                    "1-1000".to_string()
                } else {
                    custom.to_string()
                }
            }
        }
    }

    fn parse_line(line: &str, seen: &mut HashSet<(String, u16)>) -> Option<OpenPort> {
        let line = line.trim();
        // Tool log lines are bracket-prefixed; results are bare JSON objects
        if line.is_empty() || line.starts_with('[') {
            return None;
        }

        let parsed: ScannerLine = serde_json::from_str(line).ok()?;
        if parsed.status == "closed" || parsed.status.is_empty() {
            return None;
        }
        let port: u16 = parsed.port.parse().ok().filter(|p| *p > 0)?;

        if !seen.insert((parsed.ip.clone(), port)) {
            return None;
        }

        Some(OpenPort {
            ip: parsed.ip,
            port,
            protocol: parsed.protocol,
            title: parsed.title,
            midware: parsed.midware,
            frameworks: parsed.frameworks.into_keys().collect(),
        })
    }
}

impl Default for GogoScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortScanTool for GogoScanner {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn scan(
        &self,
        cancel: &CancellationToken,
        target: &str,
        mode: PortScanMode,
        custom_ports: &str,
    ) -> Result<Vec<OpenPort>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("gogo binary not available")?;
        let ports = Self::ports_arg(mode, custom_ports);

        info!("Port scanning {} (ports: {})", target, ports);

        let mut child = Command::new(bin)
            .args([
                "-i",
                target,
                "-p",
                &ports,
                "-o",
                "jl",
                "-t",
                &self.threads.to_string(),
                "-d",
                &self.timeout_secs.to_string(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start gogo")?;

        let stdout = child.stdout.take().context("no stdout pipe")?;
        let mut lines = BufReader::new(stdout).lines();

        let mut seen = HashSet::new();
        let mut results = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Propagate the signal to the child; whatever was parsed
                    // so far is a valid partial result.
                    let _ = child.start_kill();
                    debug!("Port scan of {} cancelled with {} results", target, results.len());
                    break;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(open) = Self::parse_line(&line, &mut seen) {
                                results.push(open);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Error reading gogo output for {}: {}", target, e);
                            break;
                        }
                    }
                }
            }
        }

        match child.wait().await {
            Ok(status) if !status.success() && !cancel.is_cancelled() => {
                // Treat accumulated stdout as valid even on a dirty exit
                warn!("gogo exited with {} on {}", status, target);
            }
            Err(e) => warn!("gogo wait error on {}: {}", target, e),
            _ => {}
        }

        info!("Found {} open ports on {}", results.len(), target);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_skips_log_lines() {
        let mut seen = HashSet::new();
        assert!(GogoScanner::parse_line("[*] starting scan", &mut seen).is_none());
        assert!(GogoScanner::parse_line("[-] error", &mut seen).is_none());
        assert!(GogoScanner::parse_line("", &mut seen).is_none());
    }

    #[test]
    fn test_parse_line_valid_result() {
        let mut seen = HashSet::new();
        let line = r#"{"ip":"10.0.0.1","port":"80","protocol":"http","status":"open","title":"Welcome","midware":"nginx/1.20","frameworks":{"nginx":{}}}"#;
        let open = GogoScanner::parse_line(line, &mut seen).unwrap();
        assert_eq!(open.ip, "10.0.0.1");
        assert_eq!(open.port, 80);
        assert_eq!(open.midware, "nginx/1.20");
        assert_eq!(open.frameworks, vec!["nginx".to_string()]);
    }

    #[test]
    fn test_parse_line_dedups_ip_port() {
        let mut seen = HashSet::new();
        let line = r#"{"ip":"10.0.0.1","port":"80","protocol":"http","status":"open","title":"","midware":"","frameworks":{}}"#;
        assert!(GogoScanner::parse_line(line, &mut seen).is_some());
        assert!(GogoScanner::parse_line(line, &mut seen).is_none());
    }

    #[test]
    fn test_parse_line_skips_closed_and_invalid() {
        let mut seen = HashSet::new();
        let closed = r#"{"ip":"10.0.0.1","port":"81","status":"closed"}"#;
        assert!(GogoScanner::parse_line(closed, &mut seen).is_none());
        let bad_port = r#"{"ip":"10.0.0.1","port":"notaport","status":"open"}"#;
        assert!(GogoScanner::parse_line(bad_port, &mut seen).is_none());
        assert!(GogoScanner::parse_line("not json at all", &mut seen).is_none());
    }

    #[test]
    fn test_ports_arg_modes() {
        assert_eq!(GogoScanner::ports_arg(PortScanMode::Quick, ""), "top1");
        assert_eq!(GogoScanner::ports_arg(PortScanMode::Top1000, ""), "top2");
        assert_eq!(GogoScanner::ports_arg(PortScanMode::Full, ""), "1-65535");
        assert_eq!(
            GogoScanner::ports_arg(PortScanMode::Custom, "80,443"),
            "80,443"
        );
        assert_eq!(GogoScanner::ports_arg(PortScanMode::Custom, ""), "1-1000");
    }
}
