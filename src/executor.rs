// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Task Executor
 * Runs one pipeline per task, persists its results and tracks its status
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::TaskConfig;
use crate::pipeline::{ProgressReport, StreamingPipeline};
use crate::records::ScanRecord;
use crate::scanners::ToolSet;
use crate::sink::{ResultStore, ResultWriter};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// External task state the executor polls while a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

/// Task-service seam; `None` means the task record was deleted
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn status(&self, task_id: &str) -> Option<TaskStatus>;
}

/// One scan task as handed over by the task service
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub targets: Vec<String>,
    pub config: TaskConfig,
}

/// Final accounting for a completed run
#[derive(Debug, Default, Clone)]
pub struct TaskSummary {
    pub results: u64,
    pub subdomains: u64,
    pub ports: u64,
    pub assets: u64,
    pub urls: u64,
    pub vulns: u64,
    pub sensitive: u64,
    pub dropped_writes: u64,
    pub elapsed: Duration,
}

/// How often the status monitor polls the task service
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Minimum spacing between persisted progress snapshots
const PROGRESS_PERSIST_INTERVAL: Duration = Duration::from_secs(3);

pub struct TaskExecutor {
    store: Arc<dyn ResultStore>,
    tools: ToolSet,
    status_source: Option<Arc<dyn TaskStatusSource>>,
    on_progress: Option<Arc<dyn Fn(&ProgressReport) + Send + Sync>>,
}

impl TaskExecutor {
    pub fn new(store: Arc<dyn ResultStore>, tools: ToolSet) -> Self {
        Self {
            store,
            tools,
            status_source: None,
            on_progress: None,
        }
    }

    pub fn with_status_source(mut self, source: Arc<dyn TaskStatusSource>) -> Self {
        self.status_source = Some(source);
        self
    }

    pub fn with_progress_handler(
        mut self,
        handler: Arc<dyn Fn(&ProgressReport) + Send + Sync>,
    ) -> Self {
        self.on_progress = Some(handler);
        self
    }

    /// Run the pipeline for one task to completion.
    ///
    /// Zero persisted records is not a failure: unreachable targets are a
    /// legitimate outcome.
    pub async fn execute(&self, task: &ScanTask) -> Result<TaskSummary> {
        let started = Instant::now();
        info!("Executing task {} ({})", task.id, task.name);

        let mut pipeline =
            StreamingPipeline::new(task.config.clone(), self.tools.clone(), task.targets.len());

        // Status monitor: a deleted, cancelled or paused task trips the
        // pipeline's cancellation token within one poll interval
        let monitor = self.status_source.as_ref().map(|source| {
            let source = Arc::clone(source);
            let task_id = task.id.clone();
            let cancel = pipeline.cancellation_token();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    match source.status(&task_id).await {
                        None => {
                            warn!("Task {} deleted, cancelling pipeline", task_id);
                            cancel.cancel();
                            break;
                        }
                        Some(TaskStatus::Cancelled) | Some(TaskStatus::Paused) => {
                            info!("Task {} stopped externally, cancelling pipeline", task_id);
                            cancel.cancel();
                            break;
                        }
                        _ => {}
                    }
                }
            })
        });

        let mut results = pipeline.start(&task.targets)?;

        let writer = ResultWriter::new(Arc::clone(&self.store), &task.id, &task.workspace_id);
        let mut summary = TaskSummary::default();
        let mut cdn_info: Vec<(String, String)> = Vec::new();
        let mut last_progress_persist = Instant::now() - PROGRESS_PERSIST_INTERVAL;

        while let Some(record) = results.recv().await {
            match &record {
                ScanRecord::Subdomain(_) => summary.subdomains += 1,
                ScanRecord::PortAlive(_) => summary.ports += 1,
                ScanRecord::AssetHttp(_) => summary.assets += 1,
                ScanRecord::Url(_) => summary.urls += 1,
                ScanRecord::Vuln(_) => summary.vulns += 1,
                ScanRecord::Sensitive(_) => summary.sensitive += 1,
                ScanRecord::DomainSkip(skip) if skip.is_cdn => {
                    cdn_info.push((
                        skip.domain.clone(),
                        skip.cdn_name.clone().unwrap_or_default(),
                    ));
                }
                _ => {}
            }

            if writer.write(&record).await {
                summary.results += 1;
            }

            if let Some(handler) = &self.on_progress {
                if last_progress_persist.elapsed() >= PROGRESS_PERSIST_INTERVAL {
                    last_progress_persist = Instant::now();
                    handler(&pipeline.progress());
                }
            }
        }

        // Results channel closed: all modules drained. Apply the CDN info
        // learned during the run to the already-persisted subdomain rows.
        if !cdn_info.is_empty() {
            info!("Applying CDN classification to {} hosts", cdn_info.len());
            writer.apply_cdn_updates(&cdn_info).await;
        }

        if let Some(handler) = &self.on_progress {
            handler(&pipeline.progress());
        }
        if let Some(monitor) = monitor {
            pipeline.stop();
            let _ = monitor.await;
        }

        summary.dropped_writes = writer.dropped();
        summary.elapsed = started.elapsed();
        info!(
            "Task {} finished: {} results ({} subdomains, {} ports, {} assets, {} urls, {} vulns, {} sensitive), {} dropped writes, took {:?}",
            task.id,
            summary.results,
            summary.subdomains,
            summary.ports,
            summary.assets,
            summary.urls,
            summary.vulns,
            summary.sensitive,
            summary.dropped_writes,
            summary.elapsed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_default_is_zeroed() {
        let summary = TaskSummary::default();
        assert_eq!(summary.results, 0);
        assert_eq!(summary.dropped_writes, 0);
    }
}
