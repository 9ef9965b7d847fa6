//! Betting desk — window control and bet placement.
//!
//! The stream row lock is the serialization point for the window: opening,
//! closing, placing, and the settlement transition all contend on it, so a
//! bet can never slip in after the window has moved on.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BettingConfig;
use crate::engine::{
    BetStats, CloseBettingRequest, CloseBettingResponse, OpenBettingRequest, OpenBettingResponse,
    PlaceBetRequest, PlaceBetResponse,
};
use crate::events::Event;
use crate::store::Store;
use crate::types::{Bet, BetError, BetStatus, BettingStatus};

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

#[derive(Clone)]
pub struct BettingDesk {
    store: Arc<Store>,
    config: BettingConfig,
}

impl BettingDesk {
    pub fn new(store: Arc<Store>, config: BettingConfig) -> Self {
        Self { store, config }
    }

    /// Open the betting window. An optional duration schedules a
    /// fire-and-forget auto-close that no-ops if the window already moved.
    pub fn open_betting(&self, req: OpenBettingRequest) -> Result<OpenBettingResponse, BetError> {
        let stream_row = self.store.stream(req.stream_id)?;

        let duration = req.duration_minutes.map(|m| {
            if m > self.config.max_window_minutes {
                warn!(
                    requested = m,
                    max = self.config.max_window_minutes,
                    "Auto-close duration clamped"
                );
                self.config.max_window_minutes
            } else {
                m
            }
        });

        let response = {
            let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
            if stream.streamer_id != req.caller_id {
                return Err(BetError::NotOwner {
                    user_id: req.caller_id,
                    stream_id: req.stream_id,
                });
            }
            stream.open_betting(req.odds)?;
            self.store.push_event(Event::BettingOpened {
                stream_id: stream.id,
                odds: stream.current_odds,
                duration_minutes: duration,
            })?;
            OpenBettingResponse {
                betting_status: stream.betting_status,
                current_odds: stream.current_odds,
            }
        };

        info!(
            stream_id = %req.stream_id,
            odds = %response.current_odds,
            duration_minutes = ?duration,
            "Betting opened"
        );

        if let Some(minutes) = duration {
            let desk = self.clone();
            let stream_id = req.stream_id;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
                if let Err(e) = desk.auto_close(stream_id) {
                    warn!(%stream_id, error = %e, "Auto-close failed");
                }
            });
        }

        Ok(response)
    }

    /// Close the betting window manually.
    pub fn close_betting(&self, req: CloseBettingRequest) -> Result<CloseBettingResponse, BetError> {
        let stream_row = self.store.stream(req.stream_id)?;
        let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
        if stream.streamer_id != req.caller_id {
            return Err(BetError::NotOwner {
                user_id: req.caller_id,
                stream_id: req.stream_id,
            });
        }
        if !stream.is_live {
            return Err(BetError::NotLive { stream_id: req.stream_id });
        }
        stream.close_betting()?;
        self.store.push_event(Event::BettingClosed { stream_id: stream.id })?;
        info!(stream_id = %req.stream_id, "Betting closed");
        Ok(CloseBettingResponse {
            betting_status: stream.betting_status,
        })
    }

    /// Timer body for scheduled closes: re-checks state under the stream
    /// lock and degrades to a no-op if the window already transitioned.
    /// Returns whether this call actually closed the window.
    pub fn auto_close(&self, stream_id: Uuid) -> Result<bool, BetError> {
        let stream_row = self.store.stream(stream_id)?;
        let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
        if !stream.is_live || stream.betting_status != BettingStatus::Open {
            debug!(%stream_id, status = %stream.betting_status, "Auto-close fired stale, no-op");
            return Ok(false);
        }
        stream.close_betting()?;
        self.store.push_event(Event::BettingClosed { stream_id })?;
        info!(%stream_id, "Betting auto-closed");
        Ok(true)
    }

    /// Place a bet. The stake is escrowed immediately: debit, bet row,
    /// and stream counters are applied under the stream lock so a racing
    /// close or settle cannot interleave.
    pub fn place_bet(&self, req: PlaceBetRequest) -> Result<PlaceBetResponse, BetError> {
        if req.amount <= Decimal::ZERO || req.amount < self.config.min_bet_amount {
            return Err(BetError::InvalidAmount { amount: req.amount });
        }

        // Username for the notification; short lock, not held past here.
        let username = {
            let profile_row = self.store.profile(req.bettor_id)?;
            let profile = profile_row.lock().map_err(|_| poisoned("profile"))?;
            profile.username.clone()
        };
        let wallet_row = self.store.wallet(req.bettor_id)?;
        let stream_row = self.store.stream(req.stream_id)?;

        let (bet_id, response) = {
            let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
            if !stream.is_live {
                return Err(BetError::NotLive { stream_id: req.stream_id });
            }
            if stream.betting_status != BettingStatus::Open {
                return Err(BetError::WindowNotOpen { stream_id: req.stream_id });
            }
            if stream.streamer_id == req.bettor_id {
                return Err(BetError::SelfBet);
            }

            let bet = Bet::new(
                req.bettor_id,
                req.stream_id,
                req.amount,
                stream.current_odds,
                req.bet_type,
            );

            // Funds re-checked and escrowed under the wallet lock; the
            // failed path leaves no trace anywhere.
            {
                let mut wallet = wallet_row.lock().map_err(|_| poisoned("wallet"))?;
                wallet.place_bet_hold(
                    req.amount,
                    &format!("Bet on stream {}", stream.title),
                    &format!("BET-{}", bet.id),
                )?;
            }

            let response = PlaceBetResponse {
                bet_id: bet.id,
                odds: bet.odds,
                potential_winnings: bet.potential_winnings,
                status: BetStatus::Active,
            };
            let bet_id = bet.id;

            stream.record_bet(req.amount);
            self.store.push_event(Event::NewBet {
                stream_id: req.stream_id,
                bet_id,
                username,
                amount: req.amount,
                bet_type: req.bet_type,
            })?;
            self.store.insert_bet(bet)?;

            (bet_id, response)
        };

        // Bettor stats, after the stream lock is released.
        let profile_row = self.store.profile(req.bettor_id)?;
        profile_row
            .lock()
            .map_err(|_| poisoned("profile"))?
            .record_bet_placed(req.amount);

        info!(
            %bet_id,
            stream_id = %req.stream_id,
            bettor_id = %req.bettor_id,
            amount = %req.amount,
            odds = %response.odds,
            "Bet placed"
        );

        Ok(response)
    }

    // -- Reads ------------------------------------------------------------

    /// A user's bets that are still active.
    pub fn active_bets(&self, user_id: Uuid) -> Result<Vec<Bet>, BetError> {
        Ok(self
            .store
            .bets_for_user(user_id)?
            .into_iter()
            .filter(|b| b.is_active())
            .collect())
    }

    /// A user's resolved bets, newest first.
    pub fn bet_history(&self, user_id: Uuid) -> Result<Vec<Bet>, BetError> {
        Ok(self
            .store
            .bets_for_user(user_id)?
            .into_iter()
            .filter(|b| !b.is_active())
            .collect())
    }

    /// A single bet, visible only to its owner.
    pub fn bet_by_id(&self, bet_id: Uuid, caller_id: Uuid) -> Result<Bet, BetError> {
        let row = self.store.bet(bet_id)?;
        let bet = row.lock().map_err(|_| poisoned("bet"))?.clone();
        if bet.user_id != caller_id {
            return Err(BetError::NotOwner {
                user_id: caller_id,
                stream_id: bet.stream_id,
            });
        }
        Ok(bet)
    }

    /// Aggregate bet statistics across all of a streamer's streams.
    pub fn bet_stats(&self, streamer_id: Uuid) -> Result<BetStats, BetError> {
        let stream_ids: Vec<Uuid> = self
            .store
            .streams_by_owner(streamer_id)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let bets = self.store.bets_for_streams(&stream_ids)?;

        let mut stats = BetStats::default();
        for bet in &bets {
            stats.total_bets += 1;
            stats.total_bet_amount += bet.amount;
            match bet.status {
                BetStatus::Won => {
                    stats.won_bets += 1;
                    stats.total_payout += bet.actual_winnings;
                }
                BetStatus::Lost => stats.lost_bets += 1,
                BetStatus::Active => stats.active_bets += 1,
                BetStatus::Cancelled | BetStatus::Refunded => {}
            }
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
