use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Money;

/// One inbound reward event as reported by an offer network postback or
/// an admin action, before it has been recorded.
#[derive(Debug, Clone, Default)]
pub struct RewardEvent {
    pub user_id: String,
    pub external_transaction_id: String,
    pub payout: Money,
    pub currency_code: Option<String>,
    pub status: Option<String>,
    pub program_id: Option<String>,
    pub program_name: Option<String>,
    pub goal_id: Option<String>,
    pub goal_name: Option<String>,
    pub country_code: Option<String>,
    pub source_ip: Option<String>,
    /// Everything the source sent, captured verbatim for audit.
    pub raw_parameters: HashMap<String, String>,
}

/// Immutable ledger row for one recorded reward. Never updated after
/// creation except for the `applied` flag, which records whether the
/// balance credit for this row has been carried out.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub user_id: String,
    pub external_transaction_id: String,
    pub payout: Money,
    pub currency_code: Option<String>,
    pub status: Option<String>,
    pub program_id: Option<String>,
    pub program_name: Option<String>,
    pub goal_id: Option<String>,
    pub goal_name: Option<String>,
    pub country_code: Option<String>,
    pub source_ip: Option<String>,
    pub raw_parameters: HashMap<String, String>,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds the row to insert for an event. The credit has not happened
    /// yet, so `applied` starts out false.
    pub fn from_event(event: RewardEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: event.user_id,
            external_transaction_id: event.external_transaction_id,
            payout: event.payout,
            currency_code: event.currency_code,
            status: event.status,
            program_id: event.program_id,
            program_name: event.program_name,
            goal_id: event.goal_id,
            goal_name: event.goal_name,
            country_code: event.country_code,
            source_ip: event.source_ip,
            raw_parameters: event.raw_parameters,
            applied: false,
            created_at,
        }
    }

    /// Idempotency key of this entry.
    pub fn key(&self) -> (String, String) {
        (self.user_id.clone(), self.external_transaction_id.clone())
    }
}
