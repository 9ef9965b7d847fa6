//! Core engine — stream lifecycle, bet placement, and settlement.
//!
//! Each service owns a shared handle to the store and exposes typed
//! request/response operations; the transport layer validates payloads
//! into these structs before anything reaches the core.

pub mod betting;
pub mod settlement;
pub mod streams;
pub mod wallets;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::store::Store;
use crate::types::{BetStatus, BettingStatus, BetType, StreamResult};

pub use betting::BettingDesk;
pub use settlement::SettlementEngine;
pub use streams::StreamDirector;
pub use wallets::WalletService;

// ---------------------------------------------------------------------------
// Request / response contracts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenBettingRequest {
    pub stream_id: Uuid,
    pub caller_id: Uuid,
    pub odds: Decimal,
    /// If set, the window auto-closes after this many minutes.
    pub duration_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenBettingResponse {
    pub betting_status: BettingStatus,
    pub current_odds: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub stream_id: Uuid,
    pub bettor_id: Uuid,
    pub amount: Decimal,
    pub bet_type: BetType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetResponse {
    pub bet_id: Uuid,
    pub odds: Decimal,
    pub potential_winnings: Decimal,
    pub status: BetStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseBettingRequest {
    pub stream_id: Uuid,
    pub caller_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseBettingResponse {
    pub betting_status: BettingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    pub stream_id: Uuid,
    pub caller_id: Uuid,
    pub result: StreamResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub result: StreamResult,
    pub betting_status: BettingStatus,
    /// Bets resolved (won or lost) in this pass.
    pub settled_count: usize,
}

/// Aggregate bet statistics across a streamer's streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BetStats {
    pub total_bets: usize,
    pub total_bet_amount: Decimal,
    pub won_bets: usize,
    pub lost_bets: usize,
    pub active_bets: usize,
    pub total_payout: Decimal,
}

// ---------------------------------------------------------------------------
// Engine facade
// ---------------------------------------------------------------------------

/// Bundles the four services over one shared store.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<Store>,
    pub wallets: WalletService,
    pub streams: StreamDirector,
    pub betting: BettingDesk,
    pub settlement: SettlementEngine,
}

impl Engine {
    pub fn new(store: Arc<Store>, config: &AppConfig) -> Self {
        Self {
            wallets: WalletService::new(Arc::clone(&store), config.platform.signup_balance),
            streams: StreamDirector::new(Arc::clone(&store)),
            betting: BettingDesk::new(Arc::clone(&store), config.betting.clone()),
            settlement: SettlementEngine::new(Arc::clone(&store)),
            store,
        }
    }
}
