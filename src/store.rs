use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::{
    Error, LedgerEntry, Money, Notification, NotificationSink, RewardStore, WithdrawalRequest,
    WithdrawalStatus,
};

/// In-memory store backing the service. Stands in for the hosted
/// relational store; each trait method maps to what would be a single
/// atomic statement there (unique-index insert, atomic increment,
/// conditional update).
#[derive(Default, Debug)]
pub struct MemoryStore {
    ledger: DashMap<(String, String), LedgerEntry>,
    balances: DashMap<String, Money>,
    withdrawals: DashMap<u64, WithdrawalRequest>,
    next_withdrawal_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardStore for MemoryStore {
    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), Error> {
        // The entry API holds the shard lock across the vacancy check and
        // the insert, which is what makes the idempotency key race-free.
        match self.ledger.entry(entry.key()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
            Entry::Occupied(_) => Err(Error::DuplicateEvent {
                user_id: entry.user_id,
                external_transaction_id: entry.external_transaction_id,
            }),
        }
    }

    async fn claim_unapplied(
        &self,
        user_id: &str,
        external_transaction_id: &str,
    ) -> Result<bool, Error> {
        let key = (user_id.to_string(), external_transaction_id.to_string());
        // get_mut holds the shard lock, so the check-and-flip is one
        // atomic step and racing claimants settle with one winner.
        let mut entry = self
            .ledger
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}/{}", user_id, external_transaction_id)))?;
        if entry.applied {
            return Ok(false);
        }
        entry.applied = true;
        Ok(true)
    }

    async fn entries_for(&self, user_id: &str) -> Result<Vec<LedgerEntry>, Error> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.value().clone())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn unapplied_entries(&self) -> Result<Vec<LedgerEntry>, Error> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|row| !row.applied)
            .map(|row| row.value().clone())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn apply_delta(
        &self,
        user_id: &str,
        delta: Money,
        enforce_non_negative: bool,
    ) -> Result<Money, Error> {
        // Entry keeps the shard write-locked for the whole read-modify-
        // write, so concurrent deltas for one user serialize here.
        match self.balances.entry(user_id.to_string()) {
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                let updated = current
                    .checked_add(delta)
                    .ok_or_else(|| Error::invalid("balance overflow"))?;
                if enforce_non_negative && updated.is_negative() {
                    return Err(Error::InsufficientFunds {
                        balance: current,
                        requested: -delta,
                    });
                }
                *slot.get_mut() = updated;
                Ok(updated)
            }
            Entry::Vacant(slot) => {
                if delta.is_negative() {
                    return Err(Error::NotFound(format!("user {}", user_id)));
                }
                slot.insert(delta);
                Ok(delta)
            }
        }
    }

    async fn balance_of(&self, user_id: &str) -> Result<Option<Money>, Error> {
        Ok(self.balances.get(user_id).map(|b| *b))
    }

    async fn insert_withdrawal(
        &self,
        user_id: &str,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<WithdrawalRequest, Error> {
        let id = self.next_withdrawal_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = WithdrawalRequest {
            id,
            user_id: user_id.to_string(),
            amount,
            method: method.to_string(),
            destination: destination.to_string(),
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.withdrawals.insert(id, request.clone());
        Ok(request)
    }

    async fn get_withdrawal(&self, id: u64) -> Result<Option<WithdrawalRequest>, Error> {
        Ok(self.withdrawals.get(&id).map(|r| r.clone()))
    }

    async fn transition_withdrawal(
        &self,
        id: u64,
        to: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, Error> {
        let mut request = self
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("withdrawal request {}", id)))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(Error::InvalidState(format!(
                "withdrawal request {} is already {}",
                id, request.status
            )));
        }
        request.status = to;
        request.processed_at = Some(processed_at);
        Ok(request.clone())
    }
}

/// Notification sink that keeps the emitted rows in memory. Delivery is
/// an external collaborator's job; tests read the rows back directly.
#[derive(Default, Debug)]
pub struct MemoryNotifier {
    rows: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn push(&self, notification: Notification) -> Result<(), Error> {
        self.rows
            .lock()
            .map_err(|_| Error::StoreUnavailable("notifier lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use futures::future::join_all;

    use super::MemoryStore;
    use crate::domain::{Error, LedgerEntry, Money, RewardEvent, RewardStore, WithdrawalStatus};

    fn money(s: &str) -> Money {
        Money::from_decimal_str(s).unwrap()
    }

    fn entry(user: &str, tx: &str, payout: &str) -> LedgerEntry {
        let event = RewardEvent {
            user_id: user.to_string(),
            external_transaction_id: tx.to_string(),
            payout: money(payout),
            ..RewardEvent::default()
        };
        LedgerEntry::from_event(event, Utc::now())
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let store = MemoryStore::new();
        store.insert_entry(entry("u1", "t1", "2.5")).await.unwrap();
        let err = store.insert_entry(entry("u1", "t1", "2.5")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateEvent { .. }));
        // Same transaction id under another user is a distinct key.
        store.insert_entry(entry("u2", "t1", "2.5")).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_settle_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_entry(entry("u1", "t1", "2.5")).await })
            })
            .collect();
        let mut accepted = 0;
        let mut duplicates = 0;
        for result in join_all(handles).await {
            match result.unwrap() {
                Ok(()) => accepted += 1,
                Err(Error::DuplicateEvent { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 1);
    }

    #[tokio::test]
    async fn apply_delta_upserts_on_credit_only() {
        let store = MemoryStore::new();
        let err = store.apply_delta("ghost", money("-1"), false).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let balance = store.apply_delta("u1", money("2.5"), false).await.unwrap();
        assert_eq!(balance, money("2.5"));
        let balance = store.apply_delta("u1", money("-1.5"), true).await.unwrap();
        assert_eq!(balance, money("1"));
    }

    #[tokio::test]
    async fn enforced_debit_never_goes_negative() {
        let store = MemoryStore::new();
        store.apply_delta("u1", money("10"), false).await.unwrap();
        let err = store.apply_delta("u1", money("-10.0001"), true).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(store.balance_of("u1").await.unwrap(), Some(money("10")));

        // Without enforcement the same debit is allowed (admin correction).
        let balance = store.apply_delta("u1", money("-10.0001"), false).await.unwrap();
        assert_eq!(balance, money("-0.0001"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_credits_lose_no_updates() {
        for n in [2usize, 10, 100] {
            let store = Arc::new(MemoryStore::new());
            let handles: Vec<_> = (0..n)
                .map(|_| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store.apply_delta("u1", money("1"), false).await.unwrap()
                    })
                })
                .collect();
            for result in join_all(handles).await {
                result.unwrap();
            }
            let expected = Money::new(rust_decimal::Decimal::from(n as i64));
            assert_eq!(store.balance_of("u1").await.unwrap(), Some(expected));
        }
    }

    #[tokio::test]
    async fn withdrawal_transitions_exactly_once() {
        let store = MemoryStore::new();
        let request = store
            .insert_withdrawal("u1", money("5"), "paypal", "u1@example.com")
            .await
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Pending);

        let decided = store
            .transition_withdrawal(request.id, WithdrawalStatus::Approved, Utc::now())
            .await
            .unwrap();
        assert_eq!(decided.status, WithdrawalStatus::Approved);
        assert!(decided.processed_at.is_some());

        let err = store
            .transition_withdrawal(request.id, WithdrawalStatus::Rejected, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let err = store
            .transition_withdrawal(9999, WithdrawalStatus::Approved, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unapplied_entries_surface_until_claimed() {
        let store = MemoryStore::new();
        store.insert_entry(entry("u1", "t1", "2.5")).await.unwrap();
        assert_eq!(store.unapplied_entries().await.unwrap().len(), 1);
        assert!(store.claim_unapplied("u1", "t1").await.unwrap());
        assert!(store.unapplied_entries().await.unwrap().is_empty());

        let err = store.claim_unapplied("u1", "missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_claims_have_one_winner_per_entry() {
        let store = Arc::new(MemoryStore::new());
        store.insert_entry(entry("u1", "t1", "2.5")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.claim_unapplied("u1", "t1").await.unwrap() })
            })
            .collect();
        let winners = join_all(handles)
            .await
            .into_iter()
            .filter(|result| *result.as_ref().unwrap())
            .count();
        assert_eq!(winners, 1);
    }
}
