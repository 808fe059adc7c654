use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Error, LedgerEntry, Money, Notification, WithdrawalRequest, WithdrawalStatus};

/// Storage seam for the rewards core. Every method is a single atomic
/// round trip against the backing store; no method may be implemented as
/// an application-level read-then-write of contended state.
#[async_trait]
pub trait RewardStore: Send + Sync {
    /// Inserts a ledger row if and only if no row with the same
    /// `(user_id, external_transaction_id)` key exists. The uniqueness
    /// check and the insert are one atomic step; a conflict fails with
    /// [`Error::DuplicateEvent`].
    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), Error>;

    /// Atomically claims the credit for a ledger row by flipping its
    /// `applied` flag from false to true. Returns whether this caller
    /// won the claim; exactly one of any number of racing claimants
    /// gets `true`, and only the winner may apply the credit. Fails with
    /// [`Error::NotFound`] for an unknown row.
    async fn claim_unapplied(
        &self,
        user_id: &str,
        external_transaction_id: &str,
    ) -> Result<bool, Error>;

    /// Ledger rows for one user, oldest first.
    async fn entries_for(&self, user_id: &str) -> Result<Vec<LedgerEntry>, Error>;

    /// Ledger rows whose balance credit has not been carried out yet.
    async fn unapplied_entries(&self) -> Result<Vec<LedgerEntry>, Error>;

    /// Applies a signed delta to a user's balance and returns the new
    /// balance. Linearizable per user: two concurrent calls for the same
    /// user never both observe the pre-update balance.
    ///
    /// A positive delta against an unknown user creates the balance row
    /// (upsert); a negative delta against an unknown user fails with
    /// [`Error::NotFound`]. With `enforce_non_negative`, a debit that
    /// would push the balance below zero fails with
    /// [`Error::InsufficientFunds`] and leaves the balance unchanged.
    async fn apply_delta(
        &self,
        user_id: &str,
        delta: Money,
        enforce_non_negative: bool,
    ) -> Result<Money, Error>;

    /// Current balance, `None` if the user has no balance row.
    async fn balance_of(&self, user_id: &str) -> Result<Option<Money>, Error>;

    /// Inserts a withdrawal request in `pending` state and assigns its id.
    async fn insert_withdrawal(
        &self,
        user_id: &str,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<WithdrawalRequest, Error>;

    async fn get_withdrawal(&self, id: u64) -> Result<Option<WithdrawalRequest>, Error>;

    /// Atomically transitions a `pending` request to a decided status.
    /// Fails with [`Error::NotFound`] for an unknown id and
    /// [`Error::InvalidState`] if the request is no longer pending, so
    /// two racing decisions settle with exactly one winner.
    async fn transition_withdrawal(
        &self,
        id: u64,
        to: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, Error>;
}

/// Sink for user-facing notification records.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, notification: Notification) -> Result<(), Error>;
}
