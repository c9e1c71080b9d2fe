pub mod account;
pub mod address;
pub mod notification;
pub mod otp;
pub mod repository;
pub mod settings;
pub mod wallet;
pub mod withdrawal;

pub use account::{NewUser, Place, User};
pub use address::{Address, AddressInput};
pub use notification::{NewNotification, Notification, NotificationType};
pub use repository::{require_place, AccountRepository, WalletRepository};
pub use settings::{PlatformSettings, SettingsUpdate};
pub use wallet::{
    Account, Credit, PeriodTotals, Reference, ReferenceKind, TransactionFilter, TransactionStatus,
    TransactionType, WalletTransaction,
};
pub use withdrawal::{Withdrawal, WithdrawalDesk, WithdrawalError, WithdrawalStatus};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{} {}", what, id))
    }
}
