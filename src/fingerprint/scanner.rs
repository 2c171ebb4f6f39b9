// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Fingerprint Scanner
 * Fetches a target, hashes its favicon and runs the DSL rule engine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::fingerprint::dsl::{DslEngine, HttpResponseFacts};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Body read cap per request
const MAX_BODY_BYTES: usize = 1024 * 1024;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").unwrap());

/// Built-in rules shipped with the crate; a rules directory can extend them
const DEFAULT_RULES: &str = include_str!("rules/finger.yaml");

/// Header-based fallback identifications applied after the DSL pass
const SERVER_FALLBACKS: &[(&str, &str, &str)] = &[
    ("nginx", "Nginx", "WebServer"),
    ("apache", "Apache", "WebServer"),
    ("iis", "IIS", "WebServer"),
    ("tomcat", "Tomcat", "WebServer"),
    ("openresty", "OpenResty", "WebServer"),
];

const POWERED_BY_FALLBACKS: &[(&str, &str, &str)] = &[
    ("php", "PHP", "Language"),
    ("asp.net", "ASP.NET", "Framework"),
    ("express", "Express", "Framework"),
    ("servlet", "Java Servlet", "Framework"),
];

/// What one fingerprint pass learned about a URL
#[derive(Debug, Clone, Default)]
pub struct FingerprintOutcome {
    pub url: String,
    pub status_code: u16,
    pub title: String,
    pub server: String,
    pub technologies: Vec<String>,
    pub fingerprints: Vec<String>,
    pub icon_hash: String,
}

pub struct FingerprintScanner {
    http: reqwest::Client,
    engine: DslEngine,
}

impl FingerprintScanner {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .unwrap_or_default();

        let mut engine = DslEngine::new();
        if let Err(e) = engine.load_rules_str(DEFAULT_RULES) {
            warn!("Failed to load built-in fingerprint rules: {}", e);
        }
        Self { http, engine }
    }

    /// Extend the built-in rules from a directory of YAML files
    pub fn load_rules_dir(&mut self, dir: &Path) -> usize {
        let loaded = self.engine.load_rules_dir(dir);
        debug!("Loaded {} fingerprint rules from {}", loaded, dir.display());
        loaded
    }

    /// Fingerprint a host, preferring HTTPS and falling back to HTTP
    pub async fn scan(&self, target: &str) -> FingerprintOutcome {
        let bare = target
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{bare}");
            if let Some(outcome) = self.scan_url(&url).await {
                return outcome;
            }
        }

        FingerprintOutcome {
            url: format!("https://{bare}"),
            ..Default::default()
        }
    }

    async fn scan_url(&self, url: &str) -> Option<FingerprintOutcome> {
        let resp = self.http.get(url).send().await.ok()?;
        let status_code = resp.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in resp.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }

        let body_bytes = resp.bytes().await.ok()?;
        let body = String::from_utf8_lossy(&body_bytes[..body_bytes.len().min(MAX_BODY_BYTES)])
            .to_string();

        let title = extract_title(&body);
        let (icon_hash, icon_md5) = self.favicon_hash(url).await;

        let facts = HttpResponseFacts {
            url: url.to_string(),
            status_code,
            title: title.clone(),
            body,
            headers: headers.clone(),
            icon_hash: icon_hash.clone(),
            icon_md5,
        };

        let mut technologies = Vec::new();
        let mut fingerprints = Vec::new();

        let mut matches = self.engine.analyze(&facts);
        matches.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        for m in matches {
            if !technologies.contains(&m.technology) {
                fingerprints.push(m.technology.clone());
                technologies.push(m.technology);
            }
        }

        let server = facts
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("server"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let powered_by = facts
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("x-powered-by"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        apply_fallbacks(&server, SERVER_FALLBACKS, &mut technologies, &mut fingerprints);
        apply_fallbacks(
            &powered_by,
            POWERED_BY_FALLBACKS,
            &mut technologies,
            &mut fingerprints,
        );

        Some(FingerprintOutcome {
            url: url.to_string(),
            status_code,
            title,
            server,
            technologies,
            fingerprints,
            icon_hash,
        })
    }

    /// Shodan-compatible favicon hash: mmh3_32 over the base64-encoded body
    async fn favicon_hash(&self, base_url: &str) -> (String, String) {
        let base = base_url.trim_end_matches('/');
        for path in ["/favicon.ico", "/favicon.png"] {
            let url = format!("{base}{path}");
            let Ok(resp) = self.http.get(&url).send().await else {
                continue;
            };
            if resp.status().as_u16() != 200 {
                continue;
            }
            let Ok(body) = resp.bytes().await else {
                continue;
            };
            if body.is_empty() || body.len() > MAX_BODY_BYTES {
                continue;
            }

            let encoded = BASE64.encode(&body);
            let hash = murmur3_32(encoded.as_bytes(), 0) as i32;
            let md5ish = format!("{:08x}", murmur3_32(&body, 0x9747b28c));
            return (hash.to_string(), md5ish);
        }
        (String::new(), String::new())
    }
}

impl Default for FingerprintScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_fallbacks(
    header_value: &str,
    table: &[(&str, &str, &str)],
    technologies: &mut Vec<String>,
    fingerprints: &mut Vec<String>,
) {
    if header_value.is_empty() {
        return;
    }
    let lower = header_value.to_lowercase();
    for (needle, name, _category) in table {
        if lower.contains(needle) && !technologies.iter().any(|t| t == name) {
            technologies.push(name.to_string());
            fingerprints.push(name.to_string());
        }
    }
}

/// Extract and clean the page title, capped at 200 chars
pub fn extract_title(html: &str) -> String {
    let Some(captures) = TITLE_RE.captures(html) else {
        return String::new();
    };
    let title = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .trim()
        .replace(['\n', '\r', '\t'], " ");
    if title.len() > 200 {
        let mut end = 200;
        while !title.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &title[..end])
    } else {
        title
    }
}

/// MurmurHash3 32-bit
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h1 = seed;
    let n_blocks = data.len() / 4;

    for i in 0..n_blocks {
        let i4 = i * 4;
        let mut k1 = u32::from_le_bytes([data[i4], data[i4 + 1], data[i4 + 2], data[i4 + 3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = &data[n_blocks * 4..];
    let mut k1: u32 = 0;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85ebca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2ae35);
    h1 ^= h1 >> 16;
    h1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_extraction() {
        assert_eq!(
            extract_title("<html><title>  My\nSite </title></html>"),
            "My Site"
        );
        assert_eq!(extract_title("<html><body>no title</body></html>"), "");
        assert_eq!(
            extract_title("<TITLE class=\"x\">Upper</TITLE>"),
            "Upper"
        );
    }

    #[test]
    fn test_title_length_cap() {
        let html = format!("<title>{}</title>", "a".repeat(300));
        let title = extract_title(&html);
        assert_eq!(title.len(), 203);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_murmur3_reference_vectors() {
        // Reference values for the canonical x86 32-bit variant
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"hello", 0), 0x248bfa47);
        assert_eq!(murmur3_32(b"hello, world", 0), 0x149bbb7f);
        assert_eq!(murmur3_32(b"The quick brown fox jumps over the lazy dog", 0), 0x2e4ff723);
    }

    #[test]
    fn test_shodan_style_hash_is_signed() {
        // The favicon hash must be interpreted as i32 for Shodan parity
        let encoded = BASE64.encode(b"fake-favicon-bytes");
        let hash = murmur3_32(encoded.as_bytes(), 0) as i32;
        let _ = hash.to_string();
    }

    #[test]
    fn test_header_fallbacks() {
        let mut tech = Vec::new();
        let mut fps = Vec::new();
        apply_fallbacks("nginx/1.20", SERVER_FALLBACKS, &mut tech, &mut fps);
        assert_eq!(tech, vec!["Nginx"]);

        // No duplicate when already matched by the DSL pass
        apply_fallbacks("nginx", SERVER_FALLBACKS, &mut tech, &mut fps);
        assert_eq!(tech.len(), 1);

        apply_fallbacks("PHP/8.1", POWERED_BY_FALLBACKS, &mut tech, &mut fps);
        assert!(tech.contains(&"PHP".to_string()));
    }

    #[test]
    fn test_builtin_rules_load() {
        let scanner = FingerprintScanner::new();
        assert!(scanner.engine.rules_count() > 0);
    }
}
