use crate::domain::Money;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transaction {external_transaction_id} already recorded for user {user_id}")]
    DuplicateEvent {
        user_id: String,
        external_transaction_id: String,
    },

    #[error("insufficient funds: balance {balance} is below {requested}")]
    InsufficientFunds { balance: Money, requested: Money },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::DuplicateEvent { .. } => "duplicate_event",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::NotFound(_) => "not_found",
            Error::InvalidState(_) => "invalid_state",
            Error::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
