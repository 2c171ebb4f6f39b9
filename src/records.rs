// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Pipeline Record Model
 * Tagged record variants flowing between pipeline modules
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity levels, normalized across all finding sources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    Info,
}

impl Severity {
    /// Parse a severity string from an external tool, defaulting to Info
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw scan target fed into the pipeline after classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Host, IP or CIDR string (larger-than-cap CIDRs pass through unexpanded)
    pub host: String,
    /// Original URL when the target was given in URL form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubdomainResult {
    /// Full subdomain name
    pub host: String,
    /// Root domain it was discovered under
    pub root_domain: String,
    /// Discovery source (bruteforce, subfinder, fofa, hunter, quake, securitytrails, httpx)
    pub source: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub cnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_server: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub cdn: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// DNS enrichment produced by the domain-verify stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainResolve {
    pub domain: String,
    pub ips: Vec<String>,
}

/// Marks a host as CDN-backed so the port scanner leaves it alone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSkip {
    pub domain: String,
    pub is_cdn: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverResult {
    pub domain: String,
    pub cname: String,
    pub service: String,
    pub vulnerable: bool,
    #[serde(default)]
    pub fingerprints: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAlive {
    pub host: String,
    pub ip: String,
    pub port: u16,
    pub service: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetHttp {
    pub url: String,
    pub host: String,
    #[serde(default)]
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub fingerprints: Vec<String>,
}

/// Source tool that produced a discovered URL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UrlSource {
    Katana,
    Rad,
    Dirscan,
}

impl UrlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlSource::Katana => "katana",
            UrlSource::Rad => "rad",
            UrlSource::Dirscan => "dirscan",
        }
    }
}

impl fmt::Display for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResult {
    /// URL the tool was pointed at
    pub input: String,
    /// URL it discovered
    pub output: String,
    pub source: UrlSource,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub length: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnResult {
    pub vuln_id: String,
    pub name: String,
    pub target: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub matched_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveInfoResult {
    pub target: String,
    pub url: String,
    /// Rule type, e.g. aws-access-key
    #[serde(rename = "type")]
    pub info_type: String,
    pub pattern: String,
    pub matches: Vec<String>,
    #[serde(default)]
    pub location: String,
    pub severity: Severity,
    /// 0-100
    pub confidence: u8,
}

/// Closed variant type for all inter-module traffic.
///
/// Stages pattern-match on the variant and either consume it or forward it
/// untouched, which keeps the forward-vs-produce protocol a one-line default.
/// Records are immutable once sent; enrichment emits a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanRecord {
    Target(Target),
    Subdomain(SubdomainResult),
    DomainResolve(DomainResolve),
    DomainSkip(DomainSkip),
    Takeover(TakeoverResult),
    PortAlive(PortAlive),
    AssetHttp(AssetHttp),
    Url(UrlResult),
    Vuln(VulnResult),
    Sensitive(SensitiveInfoResult),
}

impl ScanRecord {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScanRecord::Target(_) => "target",
            ScanRecord::Subdomain(_) => "subdomain",
            ScanRecord::DomainResolve(_) => "domain_resolve",
            ScanRecord::DomainSkip(_) => "domain_skip",
            ScanRecord::Takeover(_) => "takeover",
            ScanRecord::PortAlive(_) => "port",
            ScanRecord::AssetHttp(_) => "service",
            ScanRecord::Url(_) => "url",
            ScanRecord::Vuln(_) => "vuln",
            ScanRecord::Sensitive(_) => "sensitive",
        }
    }
}

/// Normalize a URL by removing default ports (:80 for http, :443 for https).
///
/// Idempotent; used both for in-pipeline dedup keys and sink upsert filters.
pub fn normalize_url(raw: &str) -> String {
    if raw.is_empty() {
        return raw.to_string();
    }

    let mut out = raw.to_string();
    if out.starts_with("https://") {
        out = out.replacen(":443/", "/", 1);
        if let Some(stripped) = out.strip_suffix(":443") {
            out = stripped.to_string();
        }
    } else if out.starts_with("http://") {
        out = out.replacen(":80/", "/", 1);
        if let Some(stripped) = out.strip_suffix(":80") {
            out = stripped.to_string();
        }
    }
    out
}

/// Extract the bare host from a URL, dropping scheme, path and default ports.
///
/// Used for the service dedup key so https://x:443/ and http://x:80/ collapse
/// onto one row.
pub fn dedup_host(raw: &str) -> String {
    let mut host = raw;
    if let Some(rest) = host.strip_prefix("https://") {
        host = rest;
    } else if let Some(rest) = host.strip_prefix("http://") {
        host = rest;
    }
    if let Some(idx) = host.find('/') {
        host = &host[..idx];
    }
    let host = host
        .strip_suffix(":443")
        .or_else(|| host.strip_suffix(":80"))
        .unwrap_or(host);
    host.to_string()
}
