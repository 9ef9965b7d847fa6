//! Wallet service — deposits, withdrawals, transfers, and balance reads.
//!
//! Thin orchestration over the ledger: resolves the wallet rows, takes
//! their locks, and delegates to the wallet operations so every balance
//! change lands with exactly one transaction record.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::store::Store;
use crate::types::{BetError, Transaction};

fn poisoned(what: &str) -> BetError {
    BetError::Storage(format!("{what} lock poisoned"))
}

#[derive(Clone)]
pub struct WalletService {
    store: Arc<Store>,
    signup_balance: Decimal,
}

impl WalletService {
    pub fn new(store: Arc<Store>, signup_balance: Decimal) -> Self {
        Self {
            store,
            signup_balance,
        }
    }

    /// Register a user and grant the configured signup balance.
    pub fn register_user(&self, username: &str) -> Result<Uuid, BetError> {
        let user_id = self.store.register_user(username)?;
        if self.signup_balance > Decimal::ZERO {
            let wallet = self.store.wallet(user_id)?;
            wallet.lock().map_err(|_| poisoned("wallet"))?.deposit(
                self.signup_balance,
                "Signup grant",
                &format!("DEP-{}", Uuid::new_v4()),
            )?;
        }
        info!(%user_id, username, "User registered");
        Ok(user_id)
    }

    pub fn deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: &str,
    ) -> Result<Decimal, BetError> {
        let wallet = self.store.wallet(user_id)?;
        let mut w = wallet.lock().map_err(|_| poisoned("wallet"))?;
        w.deposit(
            amount,
            &format!("Deposit via {payment_method}"),
            &format!("DEP-{}", Uuid::new_v4()),
        )?;
        info!(%user_id, %amount, balance = %w.balance(), "Deposit completed");
        Ok(w.balance())
    }

    pub fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        withdrawal_method: &str,
    ) -> Result<Decimal, BetError> {
        let wallet = self.store.wallet(user_id)?;
        let mut w = wallet.lock().map_err(|_| poisoned("wallet"))?;
        w.withdraw(
            amount,
            &format!("Withdrawal via {withdrawal_method}"),
            &format!("WIT-{}", Uuid::new_v4()),
        )?;
        info!(%user_id, %amount, balance = %w.balance(), "Withdrawal completed");
        Ok(w.balance())
    }

    /// Move funds between two users. The sender is debited and the
    /// recipient credited under both wallet locks, taken in a stable
    /// order so two opposite transfers cannot deadlock.
    pub fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        message: Option<&str>,
    ) -> Result<Decimal, BetError> {
        if sender_id == recipient_id {
            return Err(BetError::SelfTransfer);
        }
        let sender_row = self.store.wallet(sender_id)?;
        let recipient_row = self.store.wallet(recipient_id)?;

        let reference = format!("TRF-{}", Uuid::new_v4());
        let suffix = message.map(|m| format!(": {m}")).unwrap_or_default();

        // Lock order by user id keeps concurrent A→B and B→A transfers safe.
        let (mut first, mut second) = if sender_id < recipient_id {
            (
                sender_row.lock().map_err(|_| poisoned("wallet"))?,
                recipient_row.lock().map_err(|_| poisoned("wallet"))?,
            )
        } else {
            let r = recipient_row.lock().map_err(|_| poisoned("wallet"))?;
            let s = sender_row.lock().map_err(|_| poisoned("wallet"))?;
            (s, r)
        };
        let (sender, recipient) = if first.user_id == sender_id {
            (&mut first, &mut second)
        } else {
            (&mut second, &mut first)
        };

        sender.transfer_out(
            amount,
            &format!("Transfer to {recipient_id}{suffix}"),
            &reference,
        )?;
        recipient.transfer_in(
            amount,
            &format!("Transfer from {sender_id}{suffix}"),
            &reference,
        )?;

        info!(%sender_id, %recipient_id, %amount, "Transfer completed");
        Ok(sender.balance())
    }

    pub fn get_balance(&self, user_id: Uuid) -> Result<Decimal, BetError> {
        let wallet = self.store.wallet(user_id)?;
        let balance = wallet.lock().map_err(|_| poisoned("wallet"))?.balance();
        Ok(balance)
    }

    /// Transaction history, most recent first.
    pub fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, BetError> {
        let wallet = self.store.wallet(user_id)?;
        let txs = wallet.lock().map_err(|_| poisoned("wallet"))?.transactions();
        Ok(txs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
