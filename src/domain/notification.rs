use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Money, WithdrawalRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WithdrawalApproved,
    WithdrawalRejected,
}

/// User-facing notification record. Delivery and display belong to an
/// external collaborator; we only emit the rows.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn withdrawal_approved(request: &WithdrawalRequest, amount: Money, at: DateTime<Utc>) -> Self {
        Self {
            user_id: request.user_id.clone(),
            kind: NotificationKind::WithdrawalApproved,
            title: "Withdrawal approved".to_string(),
            message: format!(
                "Your withdrawal of {} via {} has been approved.",
                amount, request.method
            ),
            created_at: at,
        }
    }

    pub fn withdrawal_rejected(request: &WithdrawalRequest, amount: Money, at: DateTime<Utc>) -> Self {
        Self {
            user_id: request.user_id.clone(),
            kind: NotificationKind::WithdrawalRejected,
            title: "Withdrawal rejected".to_string(),
            message: format!(
                "Your withdrawal of {} via {} has been rejected. The funds remain in your balance.",
                amount, request.method
            ),
            created_at: at,
        }
    }
}
