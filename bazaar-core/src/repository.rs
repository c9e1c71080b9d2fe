use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::address::Address;
use crate::notification::Notification;
use crate::otp::OtpChallenge;
use crate::settings::PlatformSettings;
use crate::wallet::{Account, TransactionFilter, WalletTransaction};
use crate::withdrawal::{ApprovalStatus, PaymentSetting, Withdrawal, WithdrawalStatus};
use crate::{CoreError, CoreResult, Place, User};

/// Users, login challenges, places and platform-level settings.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn find_user_by_phone(&self, phone: &str) -> CoreResult<Option<User>>;

    /// Fails with `Conflict` when the phone is already registered.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    /// Updates profile fields and role flags. The balance is never written here.
    async fn update_user(&self, user: &User) -> CoreResult<()>;

    async fn save_otp(&self, challenge: &OtpChallenge) -> CoreResult<()>;

    /// Removes and returns the latest challenge for the phone.
    async fn take_otp(&self, phone: &str) -> CoreResult<Option<OtpChallenge>>;

    async fn get_settings(&self) -> CoreResult<PlatformSettings>;

    /// Persists the commission rates. The system balance is left alone.
    async fn save_commission_rates(&self, settings: &PlatformSettings) -> CoreResult<()>;

    async fn create_payment_setting(&self, setting: &PaymentSetting) -> CoreResult<()>;

    async fn get_payment_setting(&self, id: Uuid) -> CoreResult<Option<PaymentSetting>>;

    async fn list_payment_settings(&self, user_id: Option<Uuid>) -> CoreResult<Vec<PaymentSetting>>;

    async fn approved_payment_setting(&self, user_id: Uuid) -> CoreResult<Option<PaymentSetting>>;

    async fn set_payment_setting_status(&self, id: Uuid, status: ApprovalStatus) -> CoreResult<PaymentSetting>;

    /// Fails with `Conflict` when a place with the same name exists.
    async fn create_place(&self, place: &Place) -> CoreResult<()>;

    async fn list_places(&self) -> CoreResult<Vec<Place>>;

    async fn get_place(&self, id: Uuid) -> CoreResult<Option<Place>>;

    /// Default first, then newest.
    async fn list_addresses(&self, user_id: Uuid) -> CoreResult<Vec<Address>>;

    async fn get_address(&self, id: Uuid) -> CoreResult<Option<Address>>;

    /// Inserts or replaces the address. Saving a default clears the flag on
    /// the user's other addresses.
    async fn save_address(&self, address: &Address) -> CoreResult<()>;

    async fn delete_address(&self, id: Uuid) -> CoreResult<()>;

    async fn create_notification(&self, notification: &Notification) -> CoreResult<()>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> CoreResult<Vec<Notification>>;

    /// Marks the user's unread notifications read, or only the given one.
    /// Returns how many changed.
    async fn mark_notifications_read(&self, user_id: Uuid, id: Option<Uuid>) -> CoreResult<u64>;
}

/// Resolve a place reference from a request, rejecting unknown ids.
pub async fn require_place(accounts: &dyn AccountRepository, id: Uuid, field: &str) -> CoreResult<Place> {
    accounts
        .get_place(id)
        .await?
        .ok_or_else(|| CoreError::ValidationError(format!("Unknown place {} for {}", id, field)))
}

/// Balances, the ledger and withdrawal requests.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn balance(&self, account: Account) -> CoreResult<Decimal>;

    async fn list_transactions(&self, filter: &TransactionFilter) -> CoreResult<Vec<WalletTransaction>>;

    /// Sum of the user's pending and processing withdrawals, optionally
    /// leaving one request out.
    async fn outstanding_withdrawals(&self, user_id: Uuid, exclude: Option<Uuid>) -> CoreResult<Decimal>;

    /// Stores the request and its pending ledger line together, re-checking
    /// the available balance under lock.
    async fn create_withdrawal(&self, withdrawal: &Withdrawal, pending: &WalletTransaction) -> CoreResult<()>;

    async fn get_withdrawal(&self, id: Uuid) -> CoreResult<Option<Withdrawal>>;

    async fn list_withdrawals(
        &self,
        merchant_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
    ) -> CoreResult<Vec<Withdrawal>>;

    async fn mark_withdrawal_processing(&self, id: Uuid) -> CoreResult<Withdrawal>;

    /// Deducts the balance and settles the ledger line in one transaction.
    async fn approve_withdrawal(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Withdrawal>;

    async fn reject_withdrawal(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> CoreResult<Withdrawal>;
}
