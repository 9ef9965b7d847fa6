//! Result oracle integration.
//!
//! Defines the `ResultOracle` trait and the verification service that
//! turns oracle verdicts into settlements. Implementations judge stream
//! outcomes from submitted evidence; the stub backend keeps the crate
//! runnable with no external calls.

pub mod stub;
pub mod verify;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::types::{OracleVerdict, Stream};

pub use stub::StubOracle;
pub use verify::VerificationService;

/// Abstraction over result oracles.
///
/// Implementors judge a stream outcome from submitted evidence and
/// self-report a confidence in `0.0..=1.0`. Callers decide what to do
/// with low-confidence verdicts; the oracle never settles anything
/// itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultOracle: Send + Sync {
    /// Judge the final result of a stream from evidence.
    async fn evaluate_result(&self, stream: &Stream, evidence: &Value) -> Result<OracleVerdict>;

    /// Check that the broadcast is a genuine live stream of the claimed
    /// game. Result stays `Pending`; only `success` and `confidence` carry
    /// meaning.
    async fn verify_live(&self, stream: &Stream) -> Result<OracleVerdict>;

    /// Screen a stream for manipulation. The verdict's `success` flag
    /// means "cheating suspected" here, with `confidence` qualifying it.
    async fn detect_cheating(&self, stream: &Stream) -> Result<OracleVerdict>;

    /// Backend identifier string.
    fn name(&self) -> &str;
}
