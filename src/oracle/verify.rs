//! Verification service — oracle verdicts applied to the betting window.
//!
//! A verdict only settles when the oracle is both successful and confident
//! past the configured threshold. Anything weaker is surfaced as an error
//! and the window stays closed for the manual confirmation path. Oracle
//! faults never leave the window half-settled.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::OracleConfig;
use crate::engine::{SettleRequest, SettleResponse, SettlementEngine};
use crate::events::Event;
use crate::oracle::ResultOracle;
use crate::store::Store;
use crate::types::{BetError, OracleVerdict, Stream, StreamResult};

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

pub struct VerificationService {
    store: Arc<Store>,
    settlement: SettlementEngine,
    oracle: Arc<dyn ResultOracle>,
    config: OracleConfig,
}

impl VerificationService {
    pub fn new(
        store: Arc<Store>,
        settlement: SettlementEngine,
        oracle: Arc<dyn ResultOracle>,
        config: OracleConfig,
    ) -> Self {
        Self {
            store,
            settlement,
            oracle,
            config,
        }
    }

    fn stream_snapshot(&self, stream_id: Uuid) -> Result<Stream, BetError> {
        let row = self.store.stream(stream_id)?;
        let stream = row.lock().map_err(|_| poisoned("stream"))?.clone();
        Ok(stream)
    }

    /// Ask the oracle to judge a stream result and settle on its verdict.
    ///
    /// Only the stream owner may trigger verification. Settles only when
    /// the verdict is successful, non-pending, and above the confidence
    /// threshold. A timeout or backend fault surfaces as
    /// `OracleUnavailable` with the window untouched.
    pub async fn verify_game_result(
        &self,
        stream_id: Uuid,
        caller_id: Uuid,
        evidence: &Value,
    ) -> Result<(OracleVerdict, SettleResponse), BetError> {
        let stream = self.stream_snapshot(stream_id)?;

        let verdict = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.oracle.evaluate_result(&stream, evidence),
        )
        .await
        .map_err(|_| {
            warn!(%stream_id, timeout_secs = self.config.timeout_secs, "Oracle timed out");
            BetError::OracleUnavailable(format!(
                "no verdict within {}s",
                self.config.timeout_secs
            ))
        })?
        .map_err(|e| BetError::OracleUnavailable(e.to_string()))?;

        info!(
            %stream_id,
            backend = self.oracle.name(),
            result = %verdict.result,
            confidence = verdict.confidence,
            "Oracle verdict received"
        );

        if !verdict.success
            || verdict.result == StreamResult::Pending
            || verdict.confidence <= self.config.result_confidence_threshold
        {
            return Err(BetError::LowConfidence {
                confidence: verdict.confidence,
                threshold: self.config.result_confidence_threshold,
            });
        }

        let response = self.settlement.settle(SettleRequest {
            stream_id,
            caller_id,
            result: verdict.result,
        })?;
        self.store.push_event(Event::ResultVerified {
            stream_id,
            result: verdict.result,
            confidence: verdict.confidence,
        })?;
        Ok((verdict, response))
    }

    /// Confirm that the broadcast is genuinely live. Read-only: the
    /// verdict is returned to the caller and nothing changes.
    pub async fn verify_live_stream(&self, stream_id: Uuid) -> Result<OracleVerdict, BetError> {
        let stream = self.stream_snapshot(stream_id)?;
        tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.oracle.verify_live(&stream),
        )
        .await
        .map_err(|_| {
            BetError::OracleUnavailable(format!(
                "no verdict within {}s",
                self.config.timeout_secs
            ))
        })?
        .map_err(|e| BetError::OracleUnavailable(e.to_string()))
    }

    /// Screen a stream for manipulation. Emits a `cheating-detected` event
    /// only past the fraud threshold; the verdict is returned either way
    /// and nothing about the window changes.
    pub async fn detect_cheating(&self, stream_id: Uuid) -> Result<OracleVerdict, BetError> {
        let stream = self.stream_snapshot(stream_id)?;

        let verdict = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.oracle.detect_cheating(&stream),
        )
        .await
        .map_err(|_| {
            BetError::OracleUnavailable(format!(
                "no verdict within {}s",
                self.config.timeout_secs
            ))
        })?
        .map_err(|e| BetError::OracleUnavailable(e.to_string()))?;

        if verdict.success && verdict.confidence > self.config.fraud_confidence_threshold {
            warn!(
                %stream_id,
                streamer_id = %stream.streamer_id,
                confidence = verdict.confidence,
                "Cheating suspected"
            );
            self.store.push_event(Event::CheatingDetected {
                stream_id,
                streamer_id: stream.streamer_id,
                confidence: verdict.confidence,
            })?;
        }
        Ok(verdict)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
