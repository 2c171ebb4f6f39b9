// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Data-driven dictionaries: the subdomain brute-force wordlist and the
//! canonical port -> service map. Both ship with built-in defaults and can
//! be overridden from files on disk.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Built-in brute-force wordlist, used when no dictionary file is configured
pub const DEFAULT_SUBDOMAIN_WORDLIST: &[&str] = &[
    "www", "api", "admin", "dev", "staging", "test", "qa", "uat",
    "mail", "smtp", "pop", "imap", "webmail",
    "ftp", "sftp", "ssh",
    "vpn", "remote", "access",
    "blog", "forum", "shop", "store",
    "cdn", "static", "assets", "media", "images",
    "m", "mobile", "app",
    "portal", "dashboard", "panel",
    "beta", "alpha", "demo",
    "git", "gitlab", "jenkins", "ci",
    "jira", "confluence", "wiki",
    "status", "monitor", "metrics",
    "db", "database", "mysql", "postgres", "mongo",
    "cache", "redis",
    "backup", "backups",
    "old", "new", "legacy",
    "v1", "v2", "api-v1", "api-v2",
    "ws", "grpc", "graphql", "rest",
    "docs", "help", "support",
    "secure", "login", "auth", "oauth",
    "pay", "checkout",
    "internal", "corp", "intranet",
];

/// Load a wordlist file (one label per line, # comments allowed); falls back
/// to the built-in list when the path is absent.
pub fn load_wordlist(path: Option<&Path>) -> Vec<String> {
    if let Some(path) = path {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let words: Vec<String> = content
                    .lines()
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(|l| l.to_string())
                    .collect();
                info!("Loaded {} entries from wordlist {}", words.len(), path.display());
                if !words.is_empty() {
                    return words;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read wordlist {}: {}, using built-in", path.display(), e);
            }
        }
    }
    DEFAULT_SUBDOMAIN_WORDLIST
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Canonical port -> service names
#[derive(Debug, Clone)]
pub struct PortServiceMap {
    services: HashMap<u16, String>,
}

#[derive(Debug, Deserialize)]
struct PortEntry {
    service: String,
}

impl PortServiceMap {
    /// Built-in canonical map covering the common service ports
    pub fn builtin() -> Self {
        let table: &[(u16, &str)] = &[
            (21, "ftp"),
            (22, "ssh"),
            (23, "telnet"),
            (25, "smtp"),
            (53, "dns"),
            (80, "http"),
            (110, "pop3"),
            (111, "rpcbind"),
            (135, "msrpc"),
            (139, "netbios"),
            (143, "imap"),
            (443, "https"),
            (445, "smb"),
            (587, "smtp"),
            (993, "imaps"),
            (995, "pop3s"),
            (1433, "mssql"),
            (1521, "oracle"),
            (2049, "nfs"),
            (3000, "http"),
            (3306, "mysql"),
            (3389, "rdp"),
            (5000, "http"),
            (5432, "postgresql"),
            (5672, "amqp"),
            (5900, "vnc"),
            (6379, "redis"),
            (8000, "http"),
            (8001, "http"),
            (8002, "http"),
            (8080, "http-proxy"),
            (8443, "https-alt"),
            (8888, "http"),
            (9000, "http"),
            (9090, "http"),
            (9200, "elasticsearch"),
            (11211, "memcached"),
            (27017, "mongodb"),
        ];
        Self {
            services: table.iter().map(|(p, s)| (*p, s.to_string())).collect(),
        }
    }

    /// Load `port: {service: name}` entries from a YAML file and merge them
    /// over the built-in table.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read port map {}", path.display()))?;
        let raw: HashMap<u16, PortEntry> =
            serde_yaml::from_str(&data).context("failed to parse port service map")?;

        let mut map = Self::builtin();
        for (port, entry) in raw {
            if !entry.service.is_empty() {
                map.services.insert(port, entry.service);
            }
        }
        Ok(map)
    }

    pub fn service_for(&self, port: u16) -> &str {
        self.services.get(&port).map(|s| s.as_str()).unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Convenience wrapper matching the wordlist loader shape
pub fn load_port_services(path: Option<&Path>) -> PortServiceMap {
    if let Some(path) = path {
        match PortServiceMap::load(path) {
            Ok(map) => {
                info!("Loaded {} port service entries from {}", map.len(), path.display());
                return map;
            }
            Err(e) => {
                tracing::warn!("Failed to load port map: {}, using built-in", e);
            }
        }
    }
    PortServiceMap::builtin()
}
