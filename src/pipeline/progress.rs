// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Pipeline Progress Tracker
 * Per-module counters, weighted overall percentage and ETA
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default per-module weights, normalized over the enabled set at start
const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    ("SubdomainScan", 20.0),
    ("DomainVerify", 5.0),
    ("PortPrep", 5.0),
    ("PortScan", 25.0),
    ("Fingerprint", 15.0),
    ("VulnScan", 15.0),
    ("Crawler", 5.0),
    ("DirScan", 5.0),
    ("Sensitive", 5.0),
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Pending,
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleProgress {
    pub name: String,
    pub status: ModuleStatus,
    pub total: usize,
    pub processed: usize,
    pub output: usize,
    /// 0-100
    pub progress: f64,
    #[serde(skip)]
    pub started: Option<Instant>,
    #[serde(skip)]
    pub ended: Option<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub overall_progress: u8,
    pub current_module: Option<String>,
    pub modules: HashMap<String, ModuleProgress>,
    pub total_targets: usize,
    pub total_results: usize,
    pub elapsed_time: String,
    pub estimated_time_left: String,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressReport) + Send + Sync>;

struct TrackerState {
    modules: HashMap<String, ModuleProgress>,
    weights: HashMap<String, f64>,
}

/// Tracks per-module counters under one lock. The callback is dispatched on
/// a spawned task so no I/O ever runs while the lock is held.
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    total_targets: usize,
    started: Instant,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(total_targets: usize, callback: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                modules: HashMap::new(),
                weights: DEFAULT_WEIGHTS
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            }),
            total_targets,
            started: Instant::now(),
            callback,
        }
    }

    /// Renormalize weights over the enabled modules so they sum to 100
    pub fn set_enabled_modules(&self, enabled: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let total: f64 = enabled
            .iter()
            .filter_map(|m| {
                DEFAULT_WEIGHTS
                    .iter()
                    .find(|(name, _)| name == m)
                    .map(|(_, w)| *w)
            })
            .sum();
        if total <= 0.0 {
            return;
        }
        state.weights = enabled
            .iter()
            .filter_map(|m| {
                DEFAULT_WEIGHTS
                    .iter()
                    .find(|(name, _)| name == m)
                    .map(|(_, w)| (m.to_string(), w / total * 100.0))
            })
            .collect();
    }

    pub fn module_start(&self, name: &str, total: usize) {
        {
            let mut state = self.state.lock().unwrap();
            state.modules.insert(
                name.to_string(),
                ModuleProgress {
                    name: name.to_string(),
                    status: ModuleStatus::Running,
                    total,
                    processed: 0,
                    output: 0,
                    progress: 0.0,
                    started: Some(Instant::now()),
                    ended: None,
                },
            );
        }
        self.notify();
    }

    /// Update a dynamically discovered total (e.g. subdomain count feeding
    /// the port scanner)
    pub fn module_total_update(&self, name: &str, total: usize) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(mp) = state.modules.get_mut(name) {
                mp.total = total;
            }
        }
        self.notify();
    }

    pub fn processed_inc(&self, name: &str, count: usize) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(mp) = state.modules.get_mut(name) {
                mp.processed += count;
                if mp.total > 0 {
                    mp.progress = (mp.processed as f64 / mp.total as f64 * 100.0).min(100.0);
                }
            }
        }
        self.notify();
    }

    pub fn output_inc(&self, name: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(mp) = state.modules.get_mut(name) {
            mp.output += count;
        }
    }

    pub fn module_complete(&self, name: &str) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(mp) = state.modules.get_mut(name) {
                mp.status = ModuleStatus::Completed;
                mp.progress = 100.0;
                mp.ended = Some(Instant::now());
            }
        }
        self.notify();
    }

    pub fn overall_progress(&self) -> u8 {
        let state = self.state.lock().unwrap();
        Self::overall_locked(&state)
    }

    fn overall_locked(state: &TrackerState) -> u8 {
        let mut weighted = 0.0;
        let mut active_weight = 0.0;
        for (name, mp) in &state.modules {
            let weight = state.weights.get(name).copied().unwrap_or(10.0);
            active_weight += weight;
            weighted += mp.progress / 100.0 * weight;
        }
        if active_weight == 0.0 {
            return 0;
        }
        ((weighted / active_weight * 100.0) as u8).min(100)
    }

    pub fn report(&self) -> ProgressReport {
        let state = self.state.lock().unwrap();
        self.report_locked(&state)
    }

    fn report_locked(&self, state: &TrackerState) -> ProgressReport {
        let overall = Self::overall_locked(state);
        let elapsed = self.started.elapsed();

        let estimated = if overall == 0 {
            "computing...".to_string()
        } else if overall >= 100 {
            "done".to_string()
        } else {
            let total_secs = elapsed.as_secs_f64() / (overall as f64 / 100.0);
            let left = (total_secs - elapsed.as_secs_f64()).max(0.0);
            format_duration_secs(left as u64)
        };

        let current_module = state
            .modules
            .values()
            .find(|mp| mp.status == ModuleStatus::Running)
            .map(|mp| mp.name.clone());

        let total_results = state.modules.values().map(|mp| mp.output).sum();

        ProgressReport {
            overall_progress: overall,
            current_module,
            modules: state.modules.clone(),
            total_targets: self.total_targets,
            total_results,
            elapsed_time: format_duration_secs(elapsed.as_secs()),
            estimated_time_left: estimated,
        }
    }

    /// Build the report under the lock, invoke the callback outside it
    fn notify(&self) {
        let Some(callback) = &self.callback else {
            return;
        };
        let report = {
            let state = self.state.lock().unwrap();
            self.report_locked(&state)
        };
        let callback = Arc::clone(callback);
        tokio::spawn(async move {
            callback(report);
        });
    }
}

/// `Hh Mm Ss` formatting, dropping leading zero units
fn format_duration_secs(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
