//! Settlement — the closed-to-settled transition and payout fan-out.
//!
//! The stream lock is the only serialization needed: `set_result` flips the
//! window to settled exactly once, so a racing duplicate settle fails there
//! and never reaches the payout loop. Payouts themselves are idempotent
//! through the `WIN-<bet_id>` ledger reference, so a retry after a partial
//! fault credits each winner at most once.

use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{SettleRequest, SettleResponse};
use crate::events::Event;
use crate::store::{Row, Store};
use crate::types::{Bet, BetError, StreamResult};

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<Store>,
}

impl SettlementEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Confirm a stream result and settle every active bet against it.
    ///
    /// A bet that fails to settle is logged and skipped; the remaining bets
    /// still settle, and a later retry of the failed one is safe.
    pub fn settle(&self, req: SettleRequest) -> Result<SettleResponse, BetError> {
        let stream_row = self.store.stream(req.stream_id)?;

        let betting_status = {
            let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
            if stream.streamer_id != req.caller_id {
                return Err(BetError::NotOwner {
                    user_id: req.caller_id,
                    stream_id: req.stream_id,
                });
            }
            stream.set_result(req.result)?;
            self.store.push_event(Event::ResultConfirmed {
                stream_id: req.stream_id,
                result: req.result,
            })?;
            stream.betting_status
        };

        let mut settled_count = 0;
        for bet_row in self.store.active_bets_for_stream(req.stream_id)? {
            let bet_id = {
                let bet = bet_row.lock().map_err(|_| poisoned("bet"))?;
                bet.id
            };
            match self.settle_one(&bet_row, req.result) {
                Ok(()) => settled_count += 1,
                Err(e) => {
                    warn!(%bet_id, stream_id = %req.stream_id, error = %e, "Bet settlement failed, skipping");
                }
            }
        }

        // Streamer record: a stream counts as a win when the confirmed
        // result is a win.
        let profile_row = self.store.profile(req.caller_id)?;
        profile_row
            .lock()
            .map_err(|_| poisoned("profile"))?
            .record_stream_result(req.result == StreamResult::Win);

        info!(
            stream_id = %req.stream_id,
            result = %req.result,
            settled_count,
            "Stream settled"
        );

        Ok(SettleResponse {
            result: req.result,
            betting_status,
            settled_count,
        })
    }

    /// Settle a single bet: credit first, then flip the bet row, so a crash
    /// between the two is healed by the duplicate-reference guard on retry.
    fn settle_one(
        &self,
        bet_row: &Row<Bet>,
        result: StreamResult,
    ) -> Result<(), BetError> {
        let (bet_id, user_id, won, winnings) = {
            let bet = bet_row.lock().map_err(|_| poisoned("bet"))?;
            (
                bet.id,
                bet.user_id,
                bet.bet_type.matches(result),
                bet.potential_winnings,
            )
        };

        if won {
            let wallet_row = self.store.wallet(user_id)?;
            let credit = {
                let mut wallet = wallet_row.lock().map_err(|_| poisoned("wallet"))?;
                wallet
                    .settle_win(winnings, "Winnings", &format!("WIN-{bet_id}"))
                    .map(|_| ())
            };
            match credit {
                Ok(()) => {}
                // Already credited by an earlier partial run; finishing the
                // bet-row flip is the remaining work.
                Err(BetError::DuplicateReference { .. }) => {
                    warn!(%bet_id, "Winnings already credited, completing settlement");
                }
                Err(e) => return Err(e),
            }
            bet_row.lock().map_err(|_| poisoned("bet"))?.mark_won()?;
            let profile_row = self.store.profile(user_id)?;
            profile_row
                .lock()
                .map_err(|_| poisoned("profile"))?
                .record_bet_won(winnings);
        } else {
            bet_row.lock().map_err(|_| poisoned("bet"))?.mark_lost()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
