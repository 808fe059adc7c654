pub mod error;
pub mod money;
pub mod notification;
pub mod reward;
pub mod tier;
pub mod traits;
pub mod withdrawal;

pub use error::Error;
pub use money::Money;
pub use notification::{Notification, NotificationKind};
pub use reward::{LedgerEntry, RewardEvent};
pub use tier::Tier;
pub use traits::{NotificationSink, RewardStore};
pub use withdrawal::{Decision, WithdrawalRequest, WithdrawalStatus};
