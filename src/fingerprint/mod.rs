// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! DSL-driven HTTP fingerprinting: rule engine plus the scanner that feeds
//! it live responses.

pub mod dsl;
pub mod scanner;

pub use dsl::{DslEngine, FingerprintMatch, FingerprintRule, HttpResponseFacts};
pub use scanner::{FingerprintScanner, FingerprintOutcome};
