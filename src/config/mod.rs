// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Task Configuration
 * Task options, scan-type presets and data-driven dictionaries
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

mod dicts;

pub use dicts::{load_port_services, load_wordlist, PortServiceMap, DEFAULT_SUBDOMAIN_WORDLIST};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Port scan intensity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortScanMode {
    Quick,
    #[default]
    Top1000,
    Full,
    Custom,
}

impl PortScanMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "quick" => Some(PortScanMode::Quick),
            "top1000" => Some(PortScanMode::Top1000),
            "full" => Some(PortScanMode::Full),
            "custom" => Some(PortScanMode::Custom),
            _ => None,
        }
    }

    /// Module-level deadline in minutes, distinct from per-connection timeouts
    pub fn deadline_minutes(&self) -> u64 {
        match self {
            PortScanMode::Quick => 10,
            PortScanMode::Top1000 => 30,
            PortScanMode::Full => 60,
            PortScanMode::Custom => 30,
        }
    }
}

/// Credentials for third-party subdomain sources. A missing credential
/// disables only that source, never the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiCredentials {
    pub fofa_email: Option<String>,
    pub fofa_key: Option<String>,
    pub hunter_key: Option<String>,
    pub quake_key: Option<String>,
    pub securitytrails_key: Option<String>,
}

/// Recognized task configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub subdomain_scan: bool,
    pub subdomain_max_enum_time: u64,
    pub subdomain_resolve_ip: bool,
    pub subdomain_check_takeover: bool,
    pub subdomain_http_probe: bool,
    /// Third-party API sources to query (fofa, hunter, quake, securitytrails)
    pub subdomain_api_sources: Vec<String>,

    pub port_scan: bool,
    pub port_scan_mode: PortScanMode,
    /// Ports/ranges for custom mode, comma-separated
    pub port_range: String,
    pub skip_cdn: bool,

    pub fingerprint: bool,
    pub web_crawler: bool,
    pub dir_scan: bool,
    pub vuln_scan: bool,
    pub sensitive_scan: bool,

    /// Per-URL tool invocation instead of list mode, for tools without list support
    pub batch_mode: bool,

    pub brute_concurrency: usize,
    pub verify_concurrency: usize,
    pub fingerprint_concurrency: usize,
    pub crawler_concurrency: usize,
    pub dirscan_concurrency: usize,

    pub api: ApiCredentials,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            subdomain_scan: false,
            subdomain_max_enum_time: 15,
            subdomain_resolve_ip: true,
            subdomain_check_takeover: false,
            subdomain_http_probe: false,
            subdomain_api_sources: Vec::new(),
            port_scan: false,
            port_scan_mode: PortScanMode::Top1000,
            port_range: String::new(),
            skip_cdn: true,
            fingerprint: false,
            web_crawler: false,
            dir_scan: false,
            vuln_scan: false,
            sensitive_scan: false,
            batch_mode: true,
            brute_concurrency: 500,
            verify_concurrency: 50,
            fingerprint_concurrency: 10,
            crawler_concurrency: 5,
            dirscan_concurrency: 20,
            api: ApiCredentials::default(),
        }
    }
}

impl TaskConfig {
    /// Full scan: every stage enabled
    pub fn full() -> Self {
        Self {
            subdomain_scan: true,
            subdomain_resolve_ip: true,
            subdomain_check_takeover: true,
            subdomain_http_probe: true,
            port_scan: true,
            port_scan_mode: PortScanMode::Top1000,
            skip_cdn: true,
            fingerprint: true,
            vuln_scan: true,
            web_crawler: true,
            dir_scan: true,
            sensitive_scan: true,
            ..Self::default()
        }
    }

    /// Subdomain discovery only
    pub fn subdomain_only() -> Self {
        Self {
            subdomain_scan: true,
            subdomain_max_enum_time: 10,
            subdomain_http_probe: true,
            ..Self::default()
        }
    }

    /// Build a config from a user-selected scan-type set.
    ///
    /// Later stages are appended only if selected or required by a selected
    /// stage: takeover implies subdomain; crawler, dirscan, vuln and
    /// sensitive imply port + fingerprint; fingerprint implies port.
    /// Unknown scan types are ignored.
    pub fn from_scan_types(types: &[String]) -> Self {
        let selected: HashSet<&str> = types.iter().map(|s| s.as_str()).collect();
        let mut config = Self::default();

        if selected.contains("subdomain") {
            config.subdomain_scan = true;
            config.subdomain_resolve_ip = true;
            config.subdomain_http_probe = true;
        }

        if selected.contains("takeover") {
            config.subdomain_scan = true;
            config.subdomain_check_takeover = true;
        }

        if selected.contains("port_scan") {
            config.port_scan = true;
        }

        if selected.contains("fingerprint") || selected.contains("service_detect") {
            config.port_scan = true;
            config.fingerprint = true;
        }

        let mut require_http_stage = |config: &mut Self| {
            if !config.port_scan {
                config.port_scan = true;
                config.port_scan_mode = PortScanMode::Quick;
            }
            config.fingerprint = true;
        };

        if selected.contains("crawler") {
            config.web_crawler = true;
            require_http_stage(&mut config);
        }
        if selected.contains("dir_scan") {
            config.dir_scan = true;
            require_http_stage(&mut config);
        }
        if selected.contains("vuln_scan") {
            config.vuln_scan = true;
            require_http_stage(&mut config);
        }
        if selected.contains("sensitive") {
            config.sensitive_scan = true;
            require_http_stage(&mut config);
        }

        config
    }

    /// Names of enabled modules in chain order, used for progress weighting
    pub fn enabled_modules(&self) -> Vec<&'static str> {
        let mut modules = Vec::new();
        if self.subdomain_scan {
            modules.push("SubdomainScan");
            modules.push("DomainVerify");
        }
        if self.port_scan {
            modules.push("PortPrep");
            modules.push("PortScan");
        }
        if self.fingerprint {
            modules.push("Fingerprint");
        }
        if self.web_crawler {
            modules.push("Crawler");
        }
        if self.dir_scan {
            modules.push("DirScan");
        }
        if self.vuln_scan {
            modules.push("VulnScan");
        }
        if self.sensitive_scan {
            modules.push("Sensitive");
        }
        modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_dependencies() {
        let config = TaskConfig::from_scan_types(&["crawler".to_string()]);
        assert!(config.web_crawler);
        assert!(config.port_scan, "crawler implies port scan");
        assert!(config.fingerprint, "crawler implies fingerprint");
        assert_eq!(config.port_scan_mode, PortScanMode::Quick);

        let config = TaskConfig::from_scan_types(&["takeover".to_string()]);
        assert!(config.subdomain_scan, "takeover implies subdomain");
        assert!(config.subdomain_check_takeover);
        assert!(!config.port_scan);
    }

    #[test]
    fn test_unknown_scan_types_ignored() {
        let config =
            TaskConfig::from_scan_types(&["warp_drive".to_string(), "port_scan".to_string()]);
        assert!(config.port_scan);
        assert!(!config.subdomain_scan);
        assert!(!config.web_crawler);
    }

    #[test]
    fn test_fingerprint_implies_port() {
        let config = TaskConfig::from_scan_types(&["fingerprint".to_string()]);
        assert!(config.port_scan);
        assert!(config.fingerprint);
    }

    #[test]
    fn test_enabled_modules_order() {
        let modules = TaskConfig::full().enabled_modules();
        assert_eq!(
            modules,
            vec![
                "SubdomainScan",
                "DomainVerify",
                "PortPrep",
                "PortScan",
                "Fingerprint",
                "Crawler",
                "DirScan",
                "VulnScan",
                "Sensitive"
            ]
        );
    }

    #[test]
    fn test_mode_deadlines() {
        assert_eq!(PortScanMode::Quick.deadline_minutes(), 10);
        assert_eq!(PortScanMode::Top1000.deadline_minutes(), 30);
        assert_eq!(PortScanMode::Full.deadline_minutes(), 60);
        assert_eq!(PortScanMode::Custom.deadline_minutes(), 30);
    }
}
