// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Base Module Runtime
 * Channel plumbing, cancellation and the forward-or-produce protocol
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::pipeline::dedup::DuplicateChecker;
use crate::pipeline::progress::ProgressTracker;
use crate::records::ScanRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded capacity for coarse-grained result channels
pub const CHANNEL_CAPACITY: usize = 500;
/// Subdomain enumeration produces bursts, so its output channel is wider
pub const SUBDOMAIN_CHANNEL_CAPACITY: usize = 2000;

/// Shared per-pipeline state handed to every module
#[derive(Clone)]
pub struct ModuleContext {
    pub cancel: CancellationToken,
    pub progress: Arc<ProgressTracker>,
    pub dedup: Arc<DuplicateChecker>,
}

impl ModuleContext {
    /// Receive the next record, observing cancellation.
    ///
    /// Returns None when the input is closed or the pipeline is cancelled;
    /// either way the module must drain in-flight work and terminate.
    pub async fn recv(&self, input: &mut mpsc::Receiver<ScanRecord>) -> Option<ScanRecord> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            record = input.recv() => record,
        }
    }

    /// Send a record downstream, observing cancellation and backpressure.
    ///
    /// Returns false when the send could not complete; callers stop
    /// producing at that point.
    pub async fn send(&self, output: &mpsc::Sender<ScanRecord>, record: ScanRecord) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = output.send(record) => sent.is_ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A long-lived pipeline stage.
///
/// Modules consume records from `input`, produce zero or more records on
/// `output`, and forward every variant they do not consume unchanged.
/// Termination: when `input` yields None the module finishes its in-flight
/// work and returns; dropping `output` closes the next stage's input,
/// cascading shutdown down the chain.
#[async_trait]
pub trait PipelineModule: Send {
    fn name(&self) -> &'static str;

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()>;
}

/// Terminal stage that pumps everything into the pipeline results channel
pub(crate) struct SinkStage;

#[async_trait]
impl PipelineModule for SinkStage {
    fn name(&self) -> &'static str {
        "Sink"
    }

    async fn run(
        self: Box<Self>,
        ctx: ModuleContext,
        mut input: mpsc::Receiver<ScanRecord>,
        output: mpsc::Sender<ScanRecord>,
    ) -> Result<()> {
        while let Some(record) = ctx.recv(&mut input).await {
            if !ctx.send(&output, record).await {
                break;
            }
        }
        debug!("Result stream drained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Target;

    fn test_ctx() -> ModuleContext {
        ModuleContext {
            cancel: CancellationToken::new(),
            progress: Arc::new(ProgressTracker::new(0, None)),
            dedup: Arc::new(DuplicateChecker::new()),
        }
    }

    #[tokio::test]
    async fn test_recv_none_on_close() {
        let ctx = test_ctx();
        let (tx, mut rx) = mpsc::channel(4);
        drop(tx);
        assert!(ctx.recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_recv_none_on_cancel() {
        let ctx = test_ctx();
        let (_tx, mut rx) = mpsc::channel::<ScanRecord>(4);
        ctx.cancel.cancel();
        assert!(ctx.recv(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_send_fails_after_cancel() {
        let ctx = test_ctx();
        let (tx, _rx) = mpsc::channel(4);
        ctx.cancel.cancel();
        let sent = ctx
            .send(
                &tx,
                ScanRecord::Target(Target {
                    host: "example.com".into(),
                    url: None,
                }),
            )
            .await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_sink_stage_forwards_all() {
        let ctx = test_ctx();
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let handle = tokio::spawn(Box::new(SinkStage).run(ctx, in_rx, out_tx));

        for host in ["a.com", "b.com"] {
            in_tx
                .send(ScanRecord::Target(Target {
                    host: host.into(),
                    url: None,
                }))
                .await
                .unwrap();
        }
        drop(in_tx);

        let mut seen = 0;
        while out_rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        handle.await.unwrap().unwrap();
    }
}
