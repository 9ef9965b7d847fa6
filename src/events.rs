//! Outbound notification events.
//!
//! The core appends events to the store's outbox inside the same mutation
//! that changes state; a delivery loop drains the outbox and fans out to
//! subscribers (fire-and-forget, at-least-once — consumers must be
//! idempotent). Correctness of the core never depends on delivery.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::{BetType, StreamResult};

/// A notification destined for the pub/sub side channel.
///
/// Settlement events carry only the aggregate stream result; per-bet
/// outcomes are never broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    StreamStarted {
        stream_id: Uuid,
        streamer_id: Uuid,
        title: String,
        game: String,
    },
    StreamEnded {
        stream_id: Uuid,
        duration_minutes: i64,
    },
    BettingOpened {
        stream_id: Uuid,
        odds: Decimal,
        duration_minutes: Option<u64>,
    },
    BettingClosed {
        stream_id: Uuid,
    },
    NewBet {
        stream_id: Uuid,
        bet_id: Uuid,
        username: String,
        amount: Decimal,
        bet_type: BetType,
    },
    ResultConfirmed {
        stream_id: Uuid,
        result: StreamResult,
    },
    ResultVerified {
        stream_id: Uuid,
        result: StreamResult,
        confidence: f64,
    },
    CheatingDetected {
        stream_id: Uuid,
        streamer_id: Uuid,
        confidence: f64,
    },
    BetsRefunded {
        stream_id: Uuid,
        count: usize,
    },
}

impl Event {
    /// Wire name of the event, matching the pub/sub topic vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StreamStarted { .. } => "stream-started",
            Event::StreamEnded { .. } => "stream-ended",
            Event::BettingOpened { .. } => "betting-opened",
            Event::BettingClosed { .. } => "betting-closed",
            Event::NewBet { .. } => "new-bet",
            Event::ResultConfirmed { .. } => "result-confirmed",
            Event::ResultVerified { .. } => "result-verified",
            Event::CheatingDetected { .. } => "cheating-detected",
            Event::BetsRefunded { .. } => "bets-refunded",
        }
    }

    pub fn stream_id(&self) -> Uuid {
        match self {
            Event::StreamStarted { stream_id, .. }
            | Event::StreamEnded { stream_id, .. }
            | Event::BettingOpened { stream_id, .. }
            | Event::BettingClosed { stream_id }
            | Event::NewBet { stream_id, .. }
            | Event::ResultConfirmed { stream_id, .. }
            | Event::ResultVerified { stream_id, .. }
            | Event::CheatingDetected { stream_id, .. }
            | Event::BetsRefunded { stream_id, .. } => *stream_id,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [stream {}]", self.name(), self.stream_id())
    }
}

/// An event with its enqueue timestamp, as stored in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub event: Event,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            enqueued_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
