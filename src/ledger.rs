//! Wallet ledger — append-only transaction log plus derived balance.
//!
//! Every mutating call appends exactly one transaction and updates the
//! balance in the same `&mut self` call, so the two writes are indivisible
//! under the wallet's lock. No balance change happens without a matching
//! ledger entry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::{BetError, Transaction, TransactionKind};

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// One user's wallet: non-negative balance plus its transaction history.
///
/// Mutated only through the operations below; callers hold the wallet's
/// row lock for the duration of a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: Uuid,
    balance: Decimal,
    transactions: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: Decimal::ZERO,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Transactions, most recent first.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut txs = self.transactions.clone();
        txs.reverse();
        txs
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Credit the wallet.
    pub fn deposit(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Deposit, amount, description, reference)
    }

    /// Debit the wallet; fails if funds are insufficient.
    pub fn withdraw(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Withdraw, amount, description, reference)
    }

    /// Escrow a stake at bet placement. The amount is debited immediately,
    /// not reserved-then-captured.
    pub fn place_bet_hold(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Bet, amount, description, reference)
    }

    /// Credit winnings after settlement. Losses have no ledger effect —
    /// the stake was already captured at placement.
    pub fn settle_win(
        &mut self,
        winnings: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Win, winnings, description, reference)
    }

    /// Return an escrowed stake, e.g. when a stream ends with the window
    /// never settled. Recorded as a deposit so the signed sum stays honest.
    pub fn refund_stake(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Deposit, amount, description, reference)
    }

    /// Debit side of a peer-to-peer transfer.
    pub fn transfer_out(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Transfer, amount, description, reference)
    }

    /// Credit side of a peer-to-peer transfer.
    pub fn transfer_in(
        &mut self,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        self.append(TransactionKind::Deposit, amount, description, reference)
    }

    /// Verify the balance invariant: balance == Σ signed transaction amounts.
    pub fn audit(&self) -> bool {
        let sum: Decimal = self.transactions.iter().map(|t| t.signed_amount()).sum();
        sum == self.balance
    }

    /// Append one transaction and move the balance, atomically with respect
    /// to the wallet lock the caller holds.
    fn append(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<&Transaction, BetError> {
        if amount <= Decimal::ZERO {
            return Err(BetError::InvalidAmount { amount });
        }
        if !kind.is_credit() && !self.has_sufficient_funds(amount) {
            return Err(BetError::InsufficientFunds {
                needed: amount,
                available: self.balance,
            });
        }
        // A reference seen before means a duplicate of an already-applied
        // operation (e.g. a retried settlement credit): reject it so the
        // wallet cannot be paid twice.
        if !reference.is_empty() && self.transactions.iter().any(|t| t.reference == reference) {
            return Err(BetError::DuplicateReference {
                reference: reference.to_string(),
            });
        }

        let tx = Transaction::new(kind, amount, description, reference);
        self.balance += tx.signed_amount();
        self.updated_at = Utc::now();
        self.transactions.push(tx);

        let tx = self
            .transactions
            .last()
            .ok_or_else(|| BetError::Storage("transaction vanished after append".into()))?;

        debug!(
            user_id = %self.user_id,
            kind = %tx.kind,
            amount = %tx.amount,
            reference = %tx.reference,
            balance = %self.balance,
            "Ledger entry appended"
        );

        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded_wallet(amount: Decimal) -> Wallet {
        let mut w = Wallet::new(Uuid::new_v4());
        w.deposit(amount, "initial", "DEP-0").unwrap();
        w
    }

    #[test]
    fn test_deposit_credits_balance() {
        let mut w = Wallet::new(Uuid::new_v4());
        let tx = w.deposit(dec!(100), "top-up", "DEP-1").unwrap();
        assert_eq!(tx.kind, TransactionKind::Deposit);
        assert_eq!(w.balance(), dec!(100));
        assert_eq!(w.transaction_count(), 1);
        assert!(w.audit());
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut w = Wallet::new(Uuid::new_v4());
        assert_eq!(w.deposit(dec!(0), "zero", "DEP-1").unwrap_err().kind(), "invalid_amount");
        assert_eq!(w.deposit(dec!(-5), "neg", "DEP-2").unwrap_err().kind(), "invalid_amount");
        assert_eq!(w.balance(), Decimal::ZERO);
        assert_eq!(w.transaction_count(), 0);
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let mut w = funded_wallet(dec!(100));
        let err = w.withdraw(dec!(150), "cash out", "WIT-1").unwrap_err();
        match err {
            BetError::InsufficientFunds { needed, available } => {
                assert_eq!(needed, dec!(150));
                assert_eq!(available, dec!(100));
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        // Failed op leaves no trace.
        assert_eq!(w.balance(), dec!(100));
        assert_eq!(w.transaction_count(), 1);
        assert!(w.audit());
    }

    #[test]
    fn test_withdraw_exact_balance() {
        let mut w = funded_wallet(dec!(100));
        w.withdraw(dec!(100), "all of it", "WIT-1").unwrap();
        assert_eq!(w.balance(), Decimal::ZERO);
        assert!(w.audit());
    }

    #[test]
    fn test_place_bet_hold_escrows_stake() {
        let mut w = funded_wallet(dec!(100));
        w.place_bet_hold(dec!(10), "stake", "BET-1").unwrap();
        assert_eq!(w.balance(), dec!(90));
        assert!(w.audit());
    }

    #[test]
    fn test_settle_win_credits_winnings() {
        let mut w = funded_wallet(dec!(90));
        w.settle_win(dec!(20), "payout", "WIN-1").unwrap();
        assert_eq!(w.balance(), dec!(110));
        assert!(w.audit());
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let mut w = funded_wallet(dec!(100));
        w.settle_win(dec!(20), "payout", "WIN-abc").unwrap();
        let err = w.settle_win(dec!(20), "payout again", "WIN-abc").unwrap_err();
        assert_eq!(err.kind(), "duplicate_reference");
        // Only the first credit applied.
        assert_eq!(w.balance(), dec!(120));
        assert!(w.audit());
    }

    #[test]
    fn test_empty_reference_not_deduplicated() {
        let mut w = funded_wallet(dec!(100));
        w.deposit(dec!(5), "tip", "").unwrap();
        w.deposit(dec!(5), "tip", "").unwrap();
        assert_eq!(w.balance(), dec!(110));
    }

    #[test]
    fn test_transfer_pair_conserves_money() {
        let mut sender = funded_wallet(dec!(100));
        let mut recipient = Wallet::new(Uuid::new_v4());

        sender.transfer_out(dec!(30), "to friend", "TRF-1").unwrap();
        recipient.transfer_in(dec!(30), "from friend", "TRF-1").unwrap();

        assert_eq!(sender.balance(), dec!(70));
        assert_eq!(recipient.balance(), dec!(30));
        assert!(sender.audit());
        assert!(recipient.audit());
    }

    #[test]
    fn test_refund_stake_restores_balance() {
        let mut w = funded_wallet(dec!(100));
        w.place_bet_hold(dec!(25), "stake", "BET-1").unwrap();
        w.refund_stake(dec!(25), "stream ended unsettled", "REFUND-1").unwrap();
        assert_eq!(w.balance(), dec!(100));
        assert!(w.audit());
    }

    #[test]
    fn test_transactions_most_recent_first() {
        let mut w = Wallet::new(Uuid::new_v4());
        w.deposit(dec!(10), "first", "DEP-1").unwrap();
        w.deposit(dec!(20), "second", "DEP-2").unwrap();
        w.withdraw(dec!(5), "third", "WIT-1").unwrap();

        let txs = w.transactions();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].reference, "WIT-1");
        assert_eq!(txs[2].reference, "DEP-1");
    }

    #[test]
    fn test_audit_over_mixed_history() {
        let mut w = Wallet::new(Uuid::new_v4());
        w.deposit(dec!(100), "seed", "DEP-1").unwrap();
        w.place_bet_hold(dec!(10), "stake", "BET-1").unwrap();
        w.settle_win(dec!(20), "payout", "WIN-1").unwrap();
        w.withdraw(dec!(50), "cash out", "WIT-1").unwrap();
        w.transfer_out(dec!(15), "gift", "TRF-1").unwrap();

        assert_eq!(w.balance(), dec!(45));
        assert!(w.audit());

        let signed: Decimal = w.transactions().iter().map(|t| t.signed_amount()).sum();
        assert_eq!(signed, w.balance());
    }

    #[test]
    fn test_balance_never_negative() {
        let mut w = funded_wallet(dec!(10));
        assert!(w.place_bet_hold(dec!(10.01), "too much", "BET-1").is_err());
        assert!(w.transfer_out(dec!(11), "too much", "TRF-1").is_err());
        assert_eq!(w.balance(), dec!(10));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut w = funded_wallet(dec!(42));
        w.place_bet_hold(dec!(2), "stake", "BET-1").unwrap();
        let json = serde_json::to_string(&w).unwrap();
        let parsed: Wallet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.balance(), dec!(40));
        assert_eq!(parsed.transaction_count(), 2);
        assert!(parsed.audit());
    }
}
