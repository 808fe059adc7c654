use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Approved => write!(f, "approved"),
            WithdrawalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Admin verdict on a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            Decision::Approve => WithdrawalStatus::Approved,
            Decision::Reject => WithdrawalStatus::Rejected,
        }
    }
}

/// A user's request to convert balance into an external payout.
///
/// Transitions one way only: pending -> approved | rejected, exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRequest {
    pub id: u64,
    pub user_id: String,
    pub amount: Money,
    pub method: String,
    pub destination: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
