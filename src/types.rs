//! Shared types for the STREAMBET core.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the ledger, store, engine,
//! and oracle modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What the viewer is wagering on: the streamer winning or losing the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Win,
    Lose,
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Win => write!(f, "win"),
            BetType::Lose => write!(f, "lose"),
        }
    }
}

impl BetType {
    /// Whether this bet pays out for the given final result.
    pub fn matches(&self, result: StreamResult) -> bool {
        matches!(
            (self, result),
            (BetType::Win, StreamResult::Win) | (BetType::Lose, StreamResult::Lose)
        )
    }
}

/// Final outcome of a stream, as reported by the streamer or the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamResult {
    Pending,
    Win,
    Lose,
}

impl fmt::Display for StreamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamResult::Pending => write!(f, "pending"),
            StreamResult::Win => write!(f, "win"),
            StreamResult::Lose => write!(f, "lose"),
        }
    }
}

impl std::str::FromStr for StreamResult {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StreamResult::Pending),
            "win" | "won" => Ok(StreamResult::Win),
            "lose" | "lost" | "loss" => Ok(StreamResult::Lose),
            _ => Err(anyhow::anyhow!("Unknown stream result: {s}")),
        }
    }
}

/// Per-stream betting window state machine.
///
/// `Closed` (initial) → `Open` → `Closed` → `Settled` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BettingStatus {
    Open,
    Closed,
    Settled,
}

impl fmt::Display for BettingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BettingStatus::Open => write!(f, "open"),
            BettingStatus::Closed => write!(f, "closed"),
            BettingStatus::Settled => write!(f, "settled"),
        }
    }
}

/// Lifecycle of a single bet. All transitions out of `Active` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Active,
    Won,
    Lost,
    Cancelled,
    Refunded,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Active => write!(f, "active"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Cancelled => write!(f, "cancelled"),
            BetStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// Ledger transaction vocabulary.
///
/// `Commission` is part of the vocabulary but no component currently
/// produces one — a platform cut is a product decision, not a core one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Bet,
    Win,
    Commission,
    Transfer,
}

impl TransactionKind {
    /// Credit kinds increase the balance; the rest debit it.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Deposit | TransactionKind::Win | TransactionKind::Commission
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
            TransactionKind::Bet => write!(f, "bet"),
            TransactionKind::Win => write!(f, "win"),
            TransactionKind::Commission => write!(f, "commission"),
            TransactionKind::Transfer => write!(f, "transfer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A single ledger entry. Immutable once appended to a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    /// Positive magnitude; the sign is derived from the kind.
    pub amount: Decimal,
    pub description: String,
    /// Idempotency key, e.g. `WIN-<bet id>`.
    pub reference: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(kind: TransactionKind, amount: Decimal, description: &str, reference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            description: description.to_string(),
            reference: reference.to_string(),
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }

    /// The amount signed by kind: credits positive, debits negative.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:+.2} [{}] {}",
            self.kind,
            self.signed_amount(),
            self.reference,
            self.description,
        )
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A single wager. Created at placement, mutated exactly once by
/// settlement (or cancellation/refund), never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stream_id: Uuid,
    pub amount: Decimal,
    /// Odds copied from the stream at placement time — never recomputed.
    pub odds: Decimal,
    pub bet_type: BetType,
    pub status: BetStatus,
    pub potential_winnings: Decimal,
    pub actual_winnings: Decimal,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub fn new(
        user_id: Uuid,
        stream_id: Uuid,
        amount: Decimal,
        odds: Decimal,
        bet_type: BetType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            stream_id,
            amount,
            odds,
            bet_type,
            status: BetStatus::Active,
            potential_winnings: amount * odds,
            actual_winnings: Decimal::ZERO,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BetStatus::Active
    }

    /// Mark the bet as won. Winnings equal the amount quoted at placement.
    pub fn mark_won(&mut self) -> Result<(), BetError> {
        self.transition(BetStatus::Won, self.potential_winnings)
    }

    pub fn mark_lost(&mut self) -> Result<(), BetError> {
        self.transition(BetStatus::Lost, Decimal::ZERO)
    }

    pub fn cancel(&mut self) -> Result<(), BetError> {
        self.transition(BetStatus::Cancelled, Decimal::ZERO)
    }

    /// Refund returns the original stake, not the potential winnings.
    pub fn refund(&mut self) -> Result<(), BetError> {
        self.transition(BetStatus::Refunded, self.amount)
    }

    fn transition(&mut self, to: BetStatus, winnings: Decimal) -> Result<(), BetError> {
        if !self.is_active() {
            return Err(BetError::BetNotActive {
                bet_id: self.id,
                status: self.status,
            });
        }
        self.status = to;
        self.actual_winnings = winnings;
        self.settled_at = Some(Utc::now());
        Ok(())
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bet {} on {}: {:.2} @ {:.2} (pays {:.2}) [{}]",
            self.id, self.bet_type, self.amount, self.odds, self.potential_winnings, self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A live broadcast with its betting window.
///
/// The window transition methods validate the prior state and return a
/// domain error on violation; they never silently no-op. The caller owns
/// locking — these are pure state-machine steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub streamer_id: Uuid,
    pub title: String,
    pub game: String,
    pub is_live: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Minutes, filled in when the stream ends.
    pub duration_minutes: i64,
    pub betting_status: BettingStatus,
    pub current_odds: Decimal,
    pub total_bets: u64,
    pub total_bet_amount: Decimal,
    pub result: StreamResult,
}

impl Stream {
    pub fn new(streamer_id: Uuid, title: &str, game: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            streamer_id,
            title: title.to_string(),
            game: game.to_string(),
            is_live: true,
            started_at: Utc::now(),
            ended_at: None,
            duration_minutes: 0,
            betting_status: BettingStatus::Closed,
            current_odds: Decimal::TWO,
            total_bets: 0,
            total_bet_amount: Decimal::ZERO,
            result: StreamResult::Pending,
        }
    }

    /// Open the betting window with the given odds.
    pub fn open_betting(&mut self, odds: Decimal) -> Result<(), BetError> {
        if !self.is_live {
            return Err(BetError::NotLive { stream_id: self.id });
        }
        match self.betting_status {
            BettingStatus::Open => return Err(BetError::AlreadyOpen { stream_id: self.id }),
            BettingStatus::Settled => return Err(BetError::AlreadySettled { stream_id: self.id }),
            BettingStatus::Closed => {}
        }
        if odds < Decimal::ONE {
            return Err(BetError::InvalidOdds { odds });
        }
        self.betting_status = BettingStatus::Open;
        self.current_odds = odds;
        Ok(())
    }

    /// Close the betting window. Only valid while open on a live stream.
    pub fn close_betting(&mut self) -> Result<(), BetError> {
        if !self.is_live {
            return Err(BetError::NotLive { stream_id: self.id });
        }
        if self.betting_status != BettingStatus::Open {
            return Err(BetError::WindowNotOpen { stream_id: self.id });
        }
        self.betting_status = BettingStatus::Closed;
        Ok(())
    }

    /// Record the final result and move the window to `Settled`.
    ///
    /// This is the single serialization point for settlement: callers must
    /// hold the stream lock, so two racing settle calls cannot both pass.
    /// The liveness check under the same lock also excludes settlement
    /// racing the end-of-stream refund sweep: once a stream has ended,
    /// its escrow belongs to the refund path alone.
    pub fn set_result(&mut self, result: StreamResult) -> Result<(), BetError> {
        if !self.is_live {
            return Err(BetError::NotLive { stream_id: self.id });
        }
        if result == StreamResult::Pending {
            return Err(BetError::InvalidResult { result });
        }
        match self.betting_status {
            BettingStatus::Settled => return Err(BetError::AlreadySettled { stream_id: self.id }),
            BettingStatus::Open => return Err(BetError::WindowNotClosed { stream_id: self.id }),
            BettingStatus::Closed => {}
        }
        self.result = result;
        self.betting_status = BettingStatus::Settled;
        Ok(())
    }

    /// End the broadcast and record its duration.
    pub fn end_stream(&mut self) -> Result<(), BetError> {
        if !self.is_live {
            return Err(BetError::NotLive { stream_id: self.id });
        }
        let ended = Utc::now();
        self.is_live = false;
        self.ended_at = Some(ended);
        self.duration_minutes = (ended - self.started_at).num_minutes();
        Ok(())
    }

    pub fn record_bet(&mut self, amount: Decimal) {
        self.total_bets += 1;
        self.total_bet_amount += amount;
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) live={} betting={} odds={:.2} bets={} staked={:.2}",
            self.id,
            self.title,
            self.game,
            self.is_live,
            self.betting_status,
            self.current_odds,
            self.total_bets,
            self.total_bet_amount,
        )
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Per-user aggregate statistics. Bettor counters and streamer counters
/// live on the same profile since any account can be either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    // Bettor side
    pub total_bets: u64,
    pub total_wagered: Decimal,
    pub won_bets: u64,
    pub total_won: Decimal,
    // Streamer side
    pub total_streams: u64,
    pub total_stream_time: i64,
    pub is_streaming: bool,
    pub win_rate: f64,
}

impl Profile {
    pub fn new(user_id: Uuid, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            total_bets: 0,
            total_wagered: Decimal::ZERO,
            won_bets: 0,
            total_won: Decimal::ZERO,
            total_streams: 0,
            total_stream_time: 0,
            is_streaming: false,
            win_rate: 0.0,
        }
    }

    pub fn record_bet_placed(&mut self, amount: Decimal) {
        self.total_bets += 1;
        self.total_wagered += amount;
    }

    pub fn record_bet_won(&mut self, winnings: Decimal) {
        self.won_bets += 1;
        self.total_won += winnings;
    }

    /// Fold a stream outcome into the streamer's running win rate.
    ///
    /// Known defect, preserved as observed: the average is re-derived from
    /// the current `total_streams` counter without incrementing it here,
    /// so settling results for two streams between counter bumps (or any
    /// repeat on the same stream) skews the statistic.
    pub fn record_stream_result(&mut self, is_win: bool) {
        let n = self.total_streams as f64;
        let point = if is_win { 100.0 } else { 0.0 };
        self.win_rate = (self.win_rate * n + point) / (n + 1.0);
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | bets={} wagered={:.2} won={} payout={:.2} | streams={} win_rate={:.1}%",
            self.username,
            self.total_bets,
            self.total_wagered,
            self.won_bets,
            self.total_won,
            self.total_streams,
            self.win_rate,
        )
    }
}

// ---------------------------------------------------------------------------
// Oracle verdict
// ---------------------------------------------------------------------------

/// Verdict returned by the result oracle for a piece of evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub success: bool,
    pub result: StreamResult,
    /// 0.0–1.0 self-reported confidence.
    pub confidence: f64,
    pub details: serde_json::Value,
}

impl fmt::Display for OracleVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (conf={:.0}%, success={})",
            self.result,
            self.confidence * 100.0,
            self.success,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for STREAMBET.
///
/// Every variant maps to a stable machine-readable kind so the transport
/// layer can translate without string matching.
#[derive(Debug, thiserror::Error)]
pub enum BetError {
    #[error("Amount must be greater than zero: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Odds must be at least 1.0: {odds}")]
    InvalidOdds { odds: Decimal },

    #[error("Insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("User {user_id} is not the owner of stream {stream_id}")]
    NotOwner { user_id: Uuid, stream_id: Uuid },

    #[error("Stream {stream_id} is not live")]
    NotLive { stream_id: Uuid },

    #[error("Streamer {user_id} already has a live stream")]
    AlreadyLive { user_id: Uuid },

    #[error("Betting is already open for stream {stream_id}")]
    AlreadyOpen { stream_id: Uuid },

    #[error("Betting window is not open for stream {stream_id}")]
    WindowNotOpen { stream_id: Uuid },

    #[error("Betting must be closed before settling stream {stream_id}")]
    WindowNotClosed { stream_id: Uuid },

    #[error("Stream {stream_id} is already settled")]
    AlreadySettled { stream_id: Uuid },

    #[error("Streamers cannot bet on their own stream")]
    SelfBet,

    #[error("Cannot transfer funds to yourself")]
    SelfTransfer,

    #[error("Settlement result must be win or lose, got {result}")]
    InvalidResult { result: StreamResult },

    #[error("Stream not found: {0}")]
    StreamNotFound(Uuid),

    #[error("Bet not found: {0}")]
    BetNotFound(Uuid),

    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Bet {bet_id} is not active (status: {status})")]
    BetNotActive { bet_id: Uuid, status: BetStatus },

    #[error("Duplicate transaction reference: {reference}")]
    DuplicateReference { reference: String },

    #[error("Oracle confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BetError {
    /// Stable machine-readable kind for the transport layer.
    pub fn kind(&self) -> &'static str {
        match self {
            BetError::InvalidAmount { .. } => "invalid_amount",
            BetError::InvalidOdds { .. } => "invalid_odds",
            BetError::InsufficientFunds { .. } => "insufficient_funds",
            BetError::NotOwner { .. } => "not_owner",
            BetError::NotLive { .. } => "not_live",
            BetError::AlreadyLive { .. } => "already_live",
            BetError::AlreadyOpen { .. } => "already_open",
            BetError::WindowNotOpen { .. } => "window_not_open",
            BetError::WindowNotClosed { .. } => "window_not_closed",
            BetError::AlreadySettled { .. } => "already_settled",
            BetError::SelfBet => "self_bet",
            BetError::SelfTransfer => "self_transfer",
            BetError::InvalidResult { .. } => "invalid_result",
            BetError::StreamNotFound(_) => "stream_not_found",
            BetError::BetNotFound(_) => "bet_not_found",
            BetError::WalletNotFound(_) => "wallet_not_found",
            BetError::UserNotFound(_) => "user_not_found",
            BetError::BetNotActive { .. } => "bet_not_active",
            BetError::DuplicateReference { .. } => "duplicate_reference",
            BetError::LowConfidence { .. } => "low_confidence",
            BetError::OracleUnavailable(_) => "oracle_unavailable",
            BetError::Storage(_) => "storage",
        }
    }

    /// Whether this error is retryable infrastructure trouble rather than
    /// a terminal validation/authorization/state failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BetError::OracleUnavailable(_) | BetError::Storage(_))
    }

    /// Bad input: the request itself is malformed or unaffordable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BetError::InvalidAmount { .. }
                | BetError::InvalidOdds { .. }
                | BetError::InsufficientFunds { .. }
                | BetError::InvalidResult { .. }
                | BetError::SelfBet
                | BetError::SelfTransfer
        )
    }

    /// Well-formed request arriving in the wrong lifecycle state. Safe to
    /// surface to the caller as "too late / too early", never retried blindly.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            BetError::NotLive { .. }
                | BetError::AlreadyLive { .. }
                | BetError::AlreadyOpen { .. }
                | BetError::WindowNotOpen { .. }
                | BetError::WindowNotClosed { .. }
                | BetError::AlreadySettled { .. }
                | BetError::BetNotActive { .. }
                | BetError::DuplicateReference { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
