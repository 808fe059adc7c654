use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{
    Decision, Error, LedgerEntry, Money, Notification, NotificationSink, RewardEvent, RewardStore,
    Tier, WithdrawalRequest,
};

/// Balance, tier and progress snapshot for one user.
#[derive(Debug, Clone)]
pub struct Standing {
    pub balance: Money,
    pub tier: Tier,
    pub commission_rate: Decimal,
    pub next_threshold: Option<Money>,
}

/// Orchestrates reward ingestion, withdrawals and balance adjustments
/// over the storage seam. The engine itself holds no state; every
/// operation is a short sequence of atomic store calls.
#[derive(Debug)]
pub struct Engine<S, N>
where
    S: RewardStore,
    N: NotificationSink,
{
    store: S,
    notifier: N,
}

impl<S, N> Engine<S, N>
where
    S: RewardStore,
    N: NotificationSink,
{
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Records one external reward event and credits the user's balance.
    /// At-most-once per `(user_id, external_transaction_id)`: a repeat of
    /// an already-recorded event fails with [`Error::DuplicateEvent`] and
    /// touches no balance. Returns the balance after the credit.
    pub async fn ingest_reward(&self, event: RewardEvent) -> Result<Money, Error> {
        if event.user_id.trim().is_empty() {
            return Err(Error::invalid("player_id is required"));
        }
        if event.external_transaction_id.trim().is_empty() {
            return Err(Error::invalid("transaction_id is required"));
        }
        if !event.payout.is_positive() {
            return Err(Error::invalid(format!(
                "payout must be positive, got {}",
                event.payout
            )));
        }

        let entry = LedgerEntry::from_event(event, Utc::now());
        let user_id = entry.user_id.clone();
        let external_transaction_id = entry.external_transaction_id.clone();
        let payout = entry.payout;

        // Ledger first: on a crash between these steps the row is the
        // source of truth and reconcile() finishes the credit. The claim
        // decides who credits, so a reconcile pass racing this ingest
        // cannot double-apply the same entry.
        self.store.insert_entry(entry).await?;
        let balance = if self
            .store
            .claim_unapplied(&user_id, &external_transaction_id)
            .await?
        {
            self.store.apply_delta(&user_id, payout, false).await?
        } else {
            // A concurrent reconcile pass claimed the credit already.
            self.store
                .balance_of(&user_id)
                .await?
                .unwrap_or_else(Money::zero)
        };

        info!(
            user_id = %user_id,
            transaction_id = %external_transaction_id,
            payout = %payout,
            balance = %balance,
            "reward recorded"
        );
        Ok(balance)
    }

    /// Credits recorded-but-unapplied ledger entries. Safe to run
    /// concurrently with other reconcile passes and with in-flight
    /// ingests: each entry's credit is guarded by the atomic claim, so
    /// it is applied at most once no matter how many passes scan it.
    /// Returns how many entries this pass applied.
    pub async fn reconcile(&self) -> Result<usize, Error> {
        let pending = self.store.unapplied_entries().await?;
        let mut applied = 0;
        for entry in pending {
            if !self
                .store
                .claim_unapplied(&entry.user_id, &entry.external_transaction_id)
                .await?
            {
                // Another pass or the original ingest claimed it.
                continue;
            }
            self.store
                .apply_delta(&entry.user_id, entry.payout, false)
                .await?;
            applied += 1;
            debug!(
                user_id = %entry.user_id,
                transaction_id = %entry.external_transaction_id,
                "reconciled unapplied reward"
            );
        }
        if applied > 0 {
            info!(applied, "reconcile pass finished");
        }
        Ok(applied)
    }

    /// Creates a pending withdrawal request. The sufficiency check is a
    /// fresh read and intentionally not serialized against concurrent
    /// requests; approval re-checks with enforcement.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<WithdrawalRequest, Error> {
        if !amount.is_positive() {
            return Err(Error::invalid(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }
        if method.trim().is_empty() || destination.trim().is_empty() {
            return Err(Error::invalid("method and destination are required"));
        }

        let balance = self
            .store
            .balance_of(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        if balance < amount {
            return Err(Error::InsufficientFunds {
                balance,
                requested: amount,
            });
        }

        let request = self
            .store
            .insert_withdrawal(user_id, amount, method, destination)
            .await?;
        info!(
            user_id = %user_id,
            request_id = request.id,
            amount = %amount,
            method = %method,
            "withdrawal requested"
        );
        Ok(request)
    }

    /// Applies an admin decision to a pending withdrawal. Approval debits
    /// the balance with non-negativity enforcement; if the balance
    /// dropped below the amount since the request was made, the decision
    /// fails with [`Error::InsufficientFunds`] and the request stays
    /// pending. Deciding a non-pending request fails with
    /// [`Error::InvalidState`].
    pub async fn decide_withdrawal(
        &self,
        request_id: u64,
        decision: Decision,
    ) -> Result<WithdrawalRequest, Error> {
        let request = self
            .store
            .get_withdrawal(request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("withdrawal request {}", request_id)))?;
        if request.status != crate::domain::WithdrawalStatus::Pending {
            return Err(Error::InvalidState(format!(
                "withdrawal request {} is already {}",
                request.id, request.status
            )));
        }

        let now = Utc::now();
        let decided = match decision {
            Decision::Reject => {
                let decided = self
                    .store
                    .transition_withdrawal(request.id, decision.target_status(), now)
                    .await?;
                self.notify(Notification::withdrawal_rejected(&decided, decided.amount, now))
                    .await;
                decided
            }
            Decision::Approve => {
                self.store
                    .apply_delta(&request.user_id, -request.amount, true)
                    .await?;
                match self
                    .store
                    .transition_withdrawal(request.id, decision.target_status(), now)
                    .await
                {
                    Ok(decided) => {
                        self.notify(Notification::withdrawal_approved(
                            &decided,
                            decided.amount,
                            now,
                        ))
                        .await;
                        decided
                    }
                    Err(err) => {
                        // Lost the decision race after debiting; put the
                        // funds back before surfacing the conflict.
                        self.store
                            .apply_delta(&request.user_id, request.amount, false)
                            .await?;
                        return Err(err);
                    }
                }
            }
        };

        info!(
            request_id = decided.id,
            user_id = %decided.user_id,
            status = %decided.status,
            amount = %decided.amount,
            "withdrawal decided"
        );
        Ok(decided)
    }

    /// Admin credit path. Positive amounts only; the debit side of admin
    /// corrections goes through withdrawals or a future compensation
    /// entry, never through here.
    pub async fn adjust_balance(&self, user_id: &str, amount: Money) -> Result<Money, Error> {
        if !amount.is_positive() {
            return Err(Error::invalid(format!(
                "adjustment amount must be positive, got {}",
                amount
            )));
        }
        let balance = self.store.apply_delta(user_id, amount, false).await?;
        info!(user_id = %user_id, amount = %amount, balance = %balance, "balance adjusted");
        Ok(balance)
    }

    pub async fn balance_of(&self, user_id: &str) -> Result<Money, Error> {
        self.store
            .balance_of(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Balance plus derived tier information for display.
    pub async fn standing_of(&self, user_id: &str) -> Result<Standing, Error> {
        let balance = self.balance_of(user_id).await?;
        let tier = Tier::of(balance)?;
        Ok(Standing {
            balance,
            tier,
            commission_rate: tier.commission_rate(),
            next_threshold: tier.next_threshold(),
        })
    }

    /// Reward history for display, oldest first. Unknown users (no
    /// balance row and no ledger rows) fail with [`Error::NotFound`].
    pub async fn history_of(&self, user_id: &str) -> Result<Vec<LedgerEntry>, Error> {
        let entries = self.store.entries_for(user_id).await?;
        if entries.is_empty() && self.store.balance_of(user_id).await?.is_none() {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(entries)
    }

    async fn notify(&self, notification: Notification) {
        // A lost notification must not fail a committed decision.
        if let Err(err) = self.notifier.push(notification).await {
            warn!(error = %err, "failed to emit notification");
        }
    }
}
