//! Stream lifecycle — going live, ending, and the refund sweep.
//!
//! Ending a stream with an unsettled window refunds every still-active bet
//! so escrowed stakes never strand. The refund reference `REFUND-<bet_id>`
//! makes the sweep idempotent under retry.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::Event;
use crate::store::Store;
use crate::types::{BetError, BettingStatus, Stream};

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

#[derive(Clone)]
pub struct StreamDirector {
    store: Arc<Store>,
}

impl StreamDirector {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Go live. One live stream per streamer at a time.
    pub fn start_stream(
        &self,
        streamer_id: Uuid,
        title: &str,
        game: &str,
    ) -> Result<Stream, BetError> {
        if self.store.has_live_stream(streamer_id)? {
            return Err(BetError::AlreadyLive { user_id: streamer_id });
        }

        let stream = Stream::new(streamer_id, title, game);
        let snapshot = stream.clone();
        self.store.insert_stream(stream)?;

        {
            let profile_row = self.store.profile(streamer_id)?;
            let mut profile = profile_row.lock().map_err(|_| poisoned("profile"))?;
            profile.is_streaming = true;
            profile.total_streams += 1;
        }

        self.store.push_event(Event::StreamStarted {
            stream_id: snapshot.id,
            streamer_id,
            title: snapshot.title.clone(),
            game: snapshot.game.clone(),
        })?;
        info!(stream_id = %snapshot.id, %streamer_id, game, "Stream started");
        Ok(snapshot)
    }

    /// End a live stream. Bets in a window that never settled are refunded
    /// in full; settled and already-resolved bets are left alone.
    pub fn end_stream(&self, stream_id: Uuid, caller_id: Uuid) -> Result<Stream, BetError> {
        let stream_row = self.store.stream(stream_id)?;

        let (snapshot, needs_refunds) = {
            let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
            if stream.streamer_id != caller_id {
                return Err(BetError::NotOwner {
                    user_id: caller_id,
                    stream_id,
                });
            }
            stream.end_stream()?;
            let needs_refunds = stream.betting_status != BettingStatus::Settled;
            (stream.clone(), needs_refunds)
        };

        let refunded = if needs_refunds {
            self.refund_active_bets(stream_id)?
        } else {
            0
        };

        {
            let profile_row = self.store.profile(caller_id)?;
            let mut profile = profile_row.lock().map_err(|_| poisoned("profile"))?;
            profile.is_streaming = false;
            profile.total_stream_time += snapshot.duration_minutes;
        }

        if refunded > 0 {
            self.store.push_event(Event::BetsRefunded {
                stream_id,
                count: refunded,
            })?;
        }
        self.store.push_event(Event::StreamEnded {
            stream_id,
            duration_minutes: snapshot.duration_minutes,
        })?;

        info!(
            %stream_id,
            duration_minutes = snapshot.duration_minutes,
            refunded,
            "Stream ended"
        );
        Ok(snapshot)
    }

    fn refund_active_bets(&self, stream_id: Uuid) -> Result<usize, BetError> {
        let mut refunded = 0;
        for bet_row in self.store.active_bets_for_stream(stream_id)? {
            let (bet_id, user_id, amount) = {
                let bet = bet_row.lock().map_err(|_| poisoned("bet"))?;
                (bet.id, bet.user_id, bet.amount)
            };

            let result: Result<(), BetError> = (|| {
                let wallet_row = self.store.wallet(user_id)?;
                let credit = {
                    let mut wallet = wallet_row.lock().map_err(|_| poisoned("wallet"))?;
                    wallet
                        .refund_stake(
                            amount,
                            "Stake refund, stream ended unsettled",
                            &format!("REFUND-{bet_id}"),
                        )
                        .map(|_| ())
                };
                match credit {
                    Ok(()) => {}
                    Err(BetError::DuplicateReference { .. }) => {
                        warn!(%bet_id, "Stake already refunded, completing");
                    }
                    Err(e) => return Err(e),
                }
                bet_row.lock().map_err(|_| poisoned("bet"))?.refund()
            })();

            match result {
                Ok(()) => refunded += 1,
                Err(e) => warn!(%bet_id, %stream_id, error = %e, "Refund failed, skipping"),
            }
        }
        Ok(refunded)
    }

    /// Touch a live stream's metadata.
    pub fn update_stream(
        &self,
        stream_id: Uuid,
        caller_id: Uuid,
        title: Option<&str>,
        game: Option<&str>,
    ) -> Result<Stream, BetError> {
        let stream_row = self.store.stream(stream_id)?;
        let mut stream = stream_row.lock().map_err(|_| poisoned("stream"))?;
        if stream.streamer_id != caller_id {
            return Err(BetError::NotOwner {
                user_id: caller_id,
                stream_id,
            });
        }
        if !stream.is_live {
            return Err(BetError::NotLive { stream_id });
        }
        if let Some(t) = title {
            stream.title = t.to_string();
        }
        if let Some(g) = game {
            stream.game = g.to_string();
        }
        Ok(stream.clone())
    }

    pub fn get_stream(&self, stream_id: Uuid) -> Result<Stream, BetError> {
        let row = self.store.stream(stream_id)?;
        let stream = row.lock().map_err(|_| poisoned("stream"))?.clone();
        Ok(stream)
    }

    pub fn streams_by_owner(&self, streamer_id: Uuid) -> Result<Vec<Stream>, BetError> {
        self.store.streams_by_owner(streamer_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
