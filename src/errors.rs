// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Pipeline Error Types
 * Error taxonomy for the streaming scan pipeline
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Main pipeline error type
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid task configuration; surfaced from start() and fails the task fast
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External tool binary could not be located; the owning module is skipped
    #[error("External tool not available: {tool}")]
    ToolUnavailable { tool: String },

    /// External tool died mid-run; accumulated output is still parsed
    #[error("External tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Per-target transient failure (DNS timeout, connection reset, HTTP 5xx)
    #[error("Transient failure for {target}: {reason}")]
    Transient { target: String, reason: String },

    /// DNS resolution failure
    #[error("DNS resolution failed for {host}: {reason}")]
    Dns { host: String, reason: String },

    /// Result sink write failure
    #[error("Sink write failed: {0}")]
    Sink(#[from] SinkError),

    /// Graceful termination; never treated as a failure
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation exceeded its deadline
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Pipeline lifecycle misuse (e.g. start() called twice)
    #[error("Pipeline error: {0}")]
    Lifecycle(String),
}

/// Result sink errors, classified for retry
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Duplicate key for ({kind}, {key})")]
    DuplicateKey { kind: String, key: String },

    #[error("Sink write timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },

    #[error("Sink error: {0}")]
    Other(String),
}

impl SinkError {
    /// Duplicate keys are expected under at-least-once delivery and are not retried
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::ConnectionFailed { .. } => true,
            SinkError::WriteTimeout { .. } => true,
            SinkError::DuplicateKey { .. } => false,
            SinkError::Other(_) => false,
        }
    }
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transient { .. } => true,
            PipelineError::Timeout { .. } => true,
            PipelineError::Sink(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Cancellation is graceful termination, not a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let target = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            PipelineError::Timeout {
                duration: Duration::from_secs(10),
            }
        } else if err.is_connect() {
            PipelineError::Transient {
                target,
                reason: "connection failed".to_string(),
            }
        } else {
            PipelineError::Transient {
                target,
                reason: err.to_string(),
            }
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::Transient {
            target: "a".into(),
            reason: "reset".into()
        }
        .is_retryable());
        assert!(!PipelineError::Configuration("bad cidr".into()).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
        assert!(PipelineError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_sink_duplicate_not_retryable() {
        let err = SinkError::DuplicateKey {
            kind: "subdomain".into(),
            key: "www.example.com".into(),
        };
        assert!(!err.is_retryable());
        assert!(SinkError::ConnectionFailed {
            reason: "refused".into()
        }
        .is_retryable());
    }
}
