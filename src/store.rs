//! In-memory transactional store.
//!
//! Entities live behind per-row locks: each wallet, stream, bet, and
//! profile is an `Arc<Mutex<_>>` in a table guarded by an outer `RwLock`.
//! Mutation flows lock the owning row; compound flows take locks in the
//! fixed order stream → bet → wallet → profile so they cannot deadlock.
//! Critical sections are short and never held across an await point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::events::{Event, OutboxEntry};
use crate::ledger::Wallet;
use crate::types::{Bet, BetError, Profile, Stream};

/// Shared handle to one entity row.
pub type Row<T> = Arc<Mutex<T>>;

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Store {
    wallets: RwLock<HashMap<Uuid, Row<Wallet>>>,
    streams: RwLock<HashMap<Uuid, Row<Stream>>>,
    bets: RwLock<HashMap<Uuid, Row<Bet>>>,
    profiles: RwLock<HashMap<Uuid, Row<Profile>>>,
    outbox: Mutex<Vec<OutboxEntry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Users & wallets --------------------------------------------------

    /// Register a user: creates the profile and an empty wallet.
    pub fn register_user(&self, username: &str) -> Result<Uuid, BetError> {
        let user_id = Uuid::new_v4();
        self.profiles
            .write()
            .map_err(|_| poisoned("profiles"))?
            .insert(user_id, Arc::new(Mutex::new(Profile::new(user_id, username))));
        self.wallets
            .write()
            .map_err(|_| poisoned("wallets"))?
            .insert(user_id, Arc::new(Mutex::new(Wallet::new(user_id))));
        Ok(user_id)
    }

    /// Fetch a user's wallet, creating it lazily if the user exists but
    /// never touched their balance.
    pub fn wallet(&self, user_id: Uuid) -> Result<Row<Wallet>, BetError> {
        if let Some(w) = self
            .wallets
            .read()
            .map_err(|_| poisoned("wallets"))?
            .get(&user_id)
        {
            return Ok(Arc::clone(w));
        }
        // Lazy creation only for known users.
        if !self
            .profiles
            .read()
            .map_err(|_| poisoned("profiles"))?
            .contains_key(&user_id)
        {
            return Err(BetError::WalletNotFound(user_id));
        }
        let mut wallets = self.wallets.write().map_err(|_| poisoned("wallets"))?;
        let row = wallets
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(user_id))));
        Ok(Arc::clone(row))
    }

    pub fn profile(&self, user_id: Uuid) -> Result<Row<Profile>, BetError> {
        self.profiles
            .read()
            .map_err(|_| poisoned("profiles"))?
            .get(&user_id)
            .cloned()
            .ok_or(BetError::UserNotFound(user_id))
    }

    // -- Streams ----------------------------------------------------------

    pub fn insert_stream(&self, stream: Stream) -> Result<Row<Stream>, BetError> {
        let id = stream.id;
        let row = Arc::new(Mutex::new(stream));
        self.streams
            .write()
            .map_err(|_| poisoned("streams"))?
            .insert(id, Arc::clone(&row));
        Ok(row)
    }

    pub fn stream(&self, stream_id: Uuid) -> Result<Row<Stream>, BetError> {
        self.streams
            .read()
            .map_err(|_| poisoned("streams"))?
            .get(&stream_id)
            .cloned()
            .ok_or(BetError::StreamNotFound(stream_id))
    }

    /// Whether the streamer currently has a live stream.
    pub fn has_live_stream(&self, streamer_id: Uuid) -> Result<bool, BetError> {
        let streams = self.streams.read().map_err(|_| poisoned("streams"))?;
        for row in streams.values() {
            let s = row.lock().map_err(|_| poisoned("stream row"))?;
            if s.streamer_id == streamer_id && s.is_live {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All streams owned by a streamer (snapshot copies).
    pub fn streams_by_owner(&self, streamer_id: Uuid) -> Result<Vec<Stream>, BetError> {
        let streams = self.streams.read().map_err(|_| poisoned("streams"))?;
        let mut out = Vec::new();
        for row in streams.values() {
            let s = row.lock().map_err(|_| poisoned("stream row"))?;
            if s.streamer_id == streamer_id {
                out.push(s.clone());
            }
        }
        Ok(out)
    }

    // -- Bets -------------------------------------------------------------

    pub fn insert_bet(&self, bet: Bet) -> Result<Row<Bet>, BetError> {
        let id = bet.id;
        let row = Arc::new(Mutex::new(bet));
        self.bets
            .write()
            .map_err(|_| poisoned("bets"))?
            .insert(id, Arc::clone(&row));
        Ok(row)
    }

    pub fn bet(&self, bet_id: Uuid) -> Result<Row<Bet>, BetError> {
        self.bets
            .read()
            .map_err(|_| poisoned("bets"))?
            .get(&bet_id)
            .cloned()
            .ok_or(BetError::BetNotFound(bet_id))
    }

    /// Rows for all bets on a stream that are still active.
    pub fn active_bets_for_stream(&self, stream_id: Uuid) -> Result<Vec<Row<Bet>>, BetError> {
        let bets = self.bets.read().map_err(|_| poisoned("bets"))?;
        let mut out = Vec::new();
        for row in bets.values() {
            let b = row.lock().map_err(|_| poisoned("bet row"))?;
            if b.stream_id == stream_id && b.is_active() {
                out.push(Arc::clone(row));
            }
        }
        Ok(out)
    }

    /// Snapshot copies of a user's bets, newest first.
    pub fn bets_for_user(&self, user_id: Uuid) -> Result<Vec<Bet>, BetError> {
        let bets = self.bets.read().map_err(|_| poisoned("bets"))?;
        let mut out = Vec::new();
        for row in bets.values() {
            let b = row.lock().map_err(|_| poisoned("bet row"))?;
            if b.user_id == user_id {
                out.push(b.clone());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    /// Snapshot copies of every bet on any of the given streams.
    pub fn bets_for_streams(&self, stream_ids: &[Uuid]) -> Result<Vec<Bet>, BetError> {
        let bets = self.bets.read().map_err(|_| poisoned("bets"))?;
        let mut out = Vec::new();
        for row in bets.values() {
            let b = row.lock().map_err(|_| poisoned("bet row"))?;
            if stream_ids.contains(&b.stream_id) {
                out.push(b.clone());
            }
        }
        Ok(out)
    }

    // -- Outbox -----------------------------------------------------------

    /// Append an event to the outbox. Callers do this while still holding
    /// the row lock of the entity whose state change the event describes,
    /// so the event cannot be observed without the change.
    pub fn push_event(&self, event: Event) -> Result<(), BetError> {
        self.outbox
            .lock()
            .map_err(|_| poisoned("outbox"))?
            .push(OutboxEntry::new(event));
        Ok(())
    }

    /// Drain all pending events for delivery.
    pub fn drain_events(&self) -> Result<Vec<OutboxEntry>, BetError> {
        let mut outbox = self.outbox.lock().map_err(|_| poisoned("outbox"))?;
        Ok(std::mem::take(&mut *outbox))
    }

    pub fn pending_events(&self) -> Result<usize, BetError> {
        Ok(self.outbox.lock().map_err(|_| poisoned("outbox"))?.len())
    }

    // -- Audit & snapshot -------------------------------------------------

    /// Verify the balance invariant across every wallet.
    pub fn audit_all(&self) -> Result<bool, BetError> {
        let wallets = self.wallets.read().map_err(|_| poisoned("wallets"))?;
        for row in wallets.values() {
            let w = row.lock().map_err(|_| poisoned("wallet row"))?;
            if !w.audit() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sum of all wallet balances — useful for conservation checks.
    pub fn total_balance(&self) -> Result<Decimal, BetError> {
        let wallets = self.wallets.read().map_err(|_| poisoned("wallets"))?;
        let mut total = Decimal::ZERO;
        for row in wallets.values() {
            total += row.lock().map_err(|_| poisoned("wallet row"))?.balance();
        }
        Ok(total)
    }

    /// Deep copy of the whole store for persistence.
    pub fn snapshot(&self) -> Result<StoreSnapshot, BetError> {
        let wallets = self
            .wallets
            .read()
            .map_err(|_| poisoned("wallets"))?
            .values()
            .map(|r| r.lock().map(|g| g.clone()).map_err(|_| poisoned("wallet row")))
            .collect::<Result<Vec<_>, _>>()?;

        let streams = self
            .streams
            .read()
            .map_err(|_| poisoned("streams"))?
            .values()
            .map(|r| r.lock().map(|g| g.clone()).map_err(|_| poisoned("stream row")))
            .collect::<Result<Vec<_>, _>>()?;
        let bets = self
            .bets
            .read()
            .map_err(|_| poisoned("bets"))?
            .values()
            .map(|r| r.lock().map(|g| g.clone()).map_err(|_| poisoned("bet row")))
            .collect::<Result<Vec<_>, _>>()?;
        let profiles = self
            .profiles
            .read()
            .map_err(|_| poisoned("profiles"))?
            .values()
            .map(|r| r.lock().map(|g| g.clone()).map_err(|_| poisoned("profile row")))
            .collect::<Result<Vec<_>, _>>()?;
        let outbox = self.outbox.lock().map_err(|_| poisoned("outbox"))?.clone();

        Ok(StoreSnapshot {
            wallets,
            streams,
            bets,
            profiles,
            outbox,
        })
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Store::new();
        {
            let mut wallets = store.wallets.write().unwrap_or_else(|e| e.into_inner());
            for w in snapshot.wallets {
                wallets.insert(w.user_id, Arc::new(Mutex::new(w)));
            }
            let mut streams = store.streams.write().unwrap_or_else(|e| e.into_inner());
            for s in snapshot.streams {
                streams.insert(s.id, Arc::new(Mutex::new(s)));
            }
            let mut bets = store.bets.write().unwrap_or_else(|e| e.into_inner());
            for b in snapshot.bets {
                bets.insert(b.id, Arc::new(Mutex::new(b)));
            }
            let mut profiles = store.profiles.write().unwrap_or_else(|e| e.into_inner());
            for p in snapshot.profiles {
                profiles.insert(p.user_id, Arc::new(Mutex::new(p)));
            }
            let mut outbox = store.outbox.lock().unwrap_or_else(|e| e.into_inner());
            *outbox = snapshot.outbox;
        }
        store
    }
}

/// Serializable deep copy of the store contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub wallets: Vec<Wallet>,
    pub streams: Vec<Stream>,
    pub bets: Vec<Bet>,
    pub profiles: Vec<Profile>,
    pub outbox: Vec<OutboxEntry>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
