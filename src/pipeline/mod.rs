// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! The streaming scan pipeline: a linear chain of long-lived modules moving
//! typed records over bounded channels, with shared dedup, progress tracking
//! and cancellation.

pub mod dedup;
pub mod fingerprint;
pub mod module;
pub mod orchestrator;
pub mod port;
pub mod progress;
pub mod subdomain;
pub mod verify;
pub mod vuln;
pub mod webscan;

pub use dedup::DuplicateChecker;
pub use module::{ModuleContext, PipelineModule};
pub use orchestrator::{parse_targets, StreamingPipeline};
pub use progress::{ModuleStatus, ProgressCallback, ProgressReport, ProgressTracker};
