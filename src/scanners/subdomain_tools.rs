// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Subdomain Tool Wrappers
 * Packet brute-forcer and passive enumeration subprocess drivers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Packet-based DNS brute-forcer seam
#[async_trait]
pub trait BruteTool: Send + Sync {
    fn is_available(&self) -> bool;

    /// Brute the dictionary against the domain; returns host -> answers
    async fn enumerate(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        dict: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;
}

/// Wrapper around the ksubdomain-style raw-socket brute-forcer.
/// Needs root for raw sockets; absence falls back to in-process resolution.
pub struct KsubdomainTool {
    bin_path: Option<PathBuf>,
}

impl KsubdomainTool {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("ksubdomain"),
        }
    }

    /// Result lines come as `host => ip1,ip2` or `host ip`
    fn parse_line(line: &str) -> Option<(String, Vec<String>)> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('[') {
            return None;
        }
        if let Some((host, answers)) = line.split_once("=>") {
            let ips = answers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            return Some((host.trim().to_string(), ips));
        }
        let mut parts = line.split_whitespace();
        let host = parts.next()?.to_string();
        let ips: Vec<String> = parts.map(|s| s.to_string()).collect();
        Some((host, ips))
    }
}

impl Default for KsubdomainTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BruteTool for KsubdomainTool {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn enumerate(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        dict: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("ksubdomain binary not available")?;

        info!(
            "Starting packet brute force for {} ({} dictionary entries)",
            domain,
            dict.len()
        );

        let mut child = Command::new(bin)
            .args(["verify", "--stdin", "--silent", "--retry", "3", "--timeout", "6"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start ksubdomain")?;

        // Feed generated candidates on stdin
        let mut stdin = child.stdin.take().context("no stdin pipe")?;
        let candidates: Vec<String> = dict
            .iter()
            .map(|prefix| format!("{}.{}\n", prefix, domain))
            .collect();
        tokio::spawn(async move {
            for candidate in candidates {
                if stdin.write_all(candidate.as_bytes()).await.is_err() {
                    break;
                }
            }
            // Dropping stdin closes the pipe, letting the tool finish
        });

        let stdout = child.stdout.take().context("no stdout pipe")?;
        let mut lines = BufReader::new(stdout).lines();
        let mut results = HashMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    debug!("Brute force of {} cancelled", domain);
                    break;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some((host, ips)) = Self::parse_line(&line) {
                                results.insert(host, ips);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Error reading ksubdomain output: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        let _ = child.wait().await;
        info!("Brute force found {} hosts for {}", results.len(), domain);
        Ok(results)
    }
}

/// Passive enumeration seam (subfinder-style aggregator)
#[async_trait]
pub trait PassiveTool: Send + Sync {
    fn is_available(&self) -> bool;

    async fn enumerate(&self, cancel: &CancellationToken, domain: &str) -> Result<Vec<String>>;
}

pub struct SubfinderTool {
    bin_path: Option<PathBuf>,
}

impl SubfinderTool {
    pub fn new() -> Self {
        Self {
            bin_path: super::tools::find_tool("subfinder"),
        }
    }
}

impl Default for SubfinderTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassiveTool for SubfinderTool {
    fn is_available(&self) -> bool {
        self.bin_path.is_some()
    }

    async fn enumerate(&self, cancel: &CancellationToken, domain: &str) -> Result<Vec<String>> {
        let bin = self
            .bin_path
            .as_ref()
            .context("subfinder binary not available")?;

        let mut child = Command::new(bin)
            .args(["-d", domain, "-silent"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start subfinder")?;

        let stdout = child.stdout.take().context("no stdout pipe")?;
        let mut lines = BufReader::new(stdout).lines();
        let mut subdomains = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    break;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if !line.is_empty() && line.ends_with(domain) {
                                subdomains.push(line.to_string());
                            }
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
            }
        }

        let _ = child.wait().await;
        info!("Passive enumeration found {} subdomains for {}", subdomains.len(), domain);
        Ok(subdomains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arrow_format() {
        let (host, ips) =
            KsubdomainTool::parse_line("www.example.com => 1.2.3.4,5.6.7.8").unwrap();
        assert_eq!(host, "www.example.com");
        assert_eq!(ips, vec!["1.2.3.4", "5.6.7.8"]);
    }

    #[test]
    fn test_parse_space_format() {
        let (host, ips) = KsubdomainTool::parse_line("mail.example.com 9.9.9.9").unwrap();
        assert_eq!(host, "mail.example.com");
        assert_eq!(ips, vec!["9.9.9.9"]);
    }

    #[test]
    fn test_parse_skips_noise() {
        assert!(KsubdomainTool::parse_line("[*] progress 50%").is_none());
        assert!(KsubdomainTool::parse_line("").is_none());
    }
}
