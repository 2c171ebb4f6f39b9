// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Pipeline-scoped duplicate checker.
//!
//! One accept-set per key space, all guarded by a single mutex. Sets live for
//! exactly one pipeline run; cross-run idempotence is the sink's job.

use crate::records::normalize_url;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct DedupSets {
    subdomains: HashSet<String>,
    urls: HashSet<String>,
    ports: HashSet<(String, u16)>,
    assets: HashSet<String>,
    vulns: HashSet<(String, String)>,
    sensitive: HashSet<(String, String, String)>,
}

/// Guarantees at most one accept per (record kind, dedup key) within a run.
///
/// Every `check_*` inserts and reports: `true` means the key was already
/// present and the record must be suppressed.
pub struct DuplicateChecker {
    sets: Mutex<DedupSets>,
}

impl DuplicateChecker {
    pub fn new() -> Self {
        Self {
            sets: Mutex::new(DedupSets::default()),
        }
    }

    pub fn check_subdomain(&self, host: &str) -> bool {
        !self
            .sets
            .lock()
            .unwrap()
            .subdomains
            .insert(host.to_lowercase())
    }

    /// URL keys are normalized before hashing so :80/:443 variants collapse
    pub fn check_url(&self, url: &str) -> bool {
        !self.sets.lock().unwrap().urls.insert(normalize_url(url))
    }

    pub fn check_port(&self, ip: &str, port: u16) -> bool {
        !self
            .sets
            .lock()
            .unwrap()
            .ports
            .insert((ip.to_string(), port))
    }

    pub fn check_asset(&self, dedup_host: &str) -> bool {
        !self
            .sets
            .lock()
            .unwrap()
            .assets
            .insert(dedup_host.to_string())
    }

    pub fn check_vuln(&self, vuln_id: &str, target: &str) -> bool {
        !self
            .sets
            .lock()
            .unwrap()
            .vulns
            .insert((vuln_id.to_string(), target.to_string()))
    }

    pub fn check_sensitive(&self, target: &str, url: &str, info_type: &str) -> bool {
        !self.sets.lock().unwrap().sensitive.insert((
            target.to_string(),
            url.to_string(),
            info_type.to_string(),
        ))
    }
}

impl Default for DuplicateChecker {
    fn default() -> Self {
        Self::new()
    }
}
