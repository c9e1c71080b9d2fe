use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_shared::{round_money, Masked};

use crate::repository::{AccountRepository, WalletRepository};
use crate::wallet::{Account, Reference, TransactionStatus, TransactionType, WalletTransaction};
use crate::{CoreError, CoreResult, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    /// Requested but not yet paid out or refused.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_holder_name: String,
    pub bank_name: String,
    pub account_number: Masked<String>,
    pub ifsc: String,
}

impl BankDetails {
    pub fn validate(&self) -> Result<(), WithdrawalError> {
        if self.account_holder_name.trim().is_empty()
            || self.bank_name.trim().is_empty()
            || self.account_number.expose().trim().is_empty()
            || self.ifsc.trim().is_empty()
        {
            return Err(WithdrawalError::MissingBankDetails);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub bank: BankDetails,
    pub payment_setting_id: Option<Uuid>,
    pub status: WithdrawalStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    BankAccount,
    Upi,
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A merchant's payout destination, reviewed by an admin before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSetting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: PaymentMethodType,
    pub details: serde_json::Value,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentSetting {
    /// Bank details from an approved bank-account setting.
    pub fn bank_details(&self) -> Result<BankDetails, WithdrawalError> {
        if self.method != PaymentMethodType::BankAccount {
            return Err(WithdrawalError::UnsupportedPaymentMethod);
        }
        let field = |key: &str| {
            self.details
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let bank = BankDetails {
            account_holder_name: field("account_holder_name"),
            bank_name: field("bank_name"),
            account_number: Masked(field("account_number")),
            ifsc: field("ifsc"),
        };
        bank.validate()?;
        Ok(bank)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WithdrawalError {
    #[error("Withdrawal amount must be greater than 0")]
    InvalidAmount,
    #[error("Insufficient balance. Available: {available}, Requested: {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },
    #[error("Withdrawal is already approved")]
    AlreadyApproved,
    #[error("Withdrawal is already rejected")]
    AlreadyRejected,
    #[error("Merchant does not have an approved payment setting")]
    NoApprovedPaymentSetting,
    #[error("Withdrawals only support bank account payment methods")]
    UnsupportedPaymentMethod,
    #[error("Bank details are incomplete")]
    MissingBankDetails,
    #[error("Rejection reason is required")]
    ReasonRequired,
    #[error("Only merchants can request withdrawals")]
    NotMerchant,
}

impl From<WithdrawalError> for CoreError {
    fn from(err: WithdrawalError) -> Self {
        match err {
            WithdrawalError::NotMerchant => CoreError::Forbidden(err.to_string()),
            WithdrawalError::AlreadyApproved | WithdrawalError::AlreadyRejected => {
                CoreError::Conflict(err.to_string())
            }
            _ => CoreError::ValidationError(err.to_string()),
        }
    }
}

/// Balance a merchant can still request: wallet minus outstanding requests.
pub fn available_balance(balance: Decimal, outstanding: Decimal) -> Decimal {
    round_money(balance - outstanding)
}

impl Withdrawal {
    /// Validate a new request and build it together with its pending ledger line.
    pub fn request(
        merchant: &User,
        amount: Decimal,
        bank: BankDetails,
        payment_setting_id: Option<Uuid>,
        outstanding: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Self, WalletTransaction), WithdrawalError> {
        if !merchant.is_merchant {
            return Err(WithdrawalError::NotMerchant);
        }
        let amount = round_money(amount);
        if amount <= Decimal::ZERO {
            return Err(WithdrawalError::InvalidAmount);
        }
        bank.validate()?;

        let available = available_balance(merchant.balance, outstanding);
        if amount > available {
            return Err(WithdrawalError::InsufficientBalance { available, requested: amount });
        }

        let withdrawal = Self {
            id: Uuid::new_v4(),
            merchant_id: merchant.id,
            amount,
            bank,
            payment_setting_id,
            status: WithdrawalStatus::Pending,
            rejection_reason: None,
            created_at: now,
            reviewed_at: None,
        };

        let pending = WalletTransaction {
            id: Uuid::new_v4(),
            account: Account::User(merchant.id),
            transaction_type: TransactionType::Withdrawal,
            amount,
            status: TransactionStatus::Pending,
            description: format!("Withdrawal request #{}", withdrawal.id),
            reference: Some(Reference::withdrawal(withdrawal.id)),
            wallet_before: None,
            wallet_after: None,
            created_at: now,
        };

        Ok((withdrawal, pending))
    }

    pub fn check_reviewable(&self) -> Result<(), WithdrawalError> {
        match self.status {
            WithdrawalStatus::Approved => Err(WithdrawalError::AlreadyApproved),
            WithdrawalStatus::Rejected => Err(WithdrawalError::AlreadyRejected),
            WithdrawalStatus::Pending | WithdrawalStatus::Processing => Ok(()),
        }
    }

    /// Approval needs an approved payment setting and enough balance once
    /// every other outstanding request is set aside.
    pub fn check_approvable(
        &self,
        setting: Option<&PaymentSetting>,
        balance: Decimal,
        other_outstanding: Decimal,
    ) -> Result<(), WithdrawalError> {
        self.check_reviewable()?;
        match setting {
            Some(s) if s.status == ApprovalStatus::Approved => {}
            _ => return Err(WithdrawalError::NoApprovedPaymentSetting),
        }
        let available = available_balance(balance, other_outstanding);
        if self.amount > available {
            return Err(WithdrawalError::InsufficientBalance { available, requested: self.amount });
        }
        Ok(())
    }

    /// Mark approved and turn the pending ledger line into the processed
    /// debit. Returns the merchant's new balance.
    pub fn approve(
        &mut self,
        ledger: &mut WalletTransaction,
        balance_before: Decimal,
        now: DateTime<Utc>,
    ) -> Decimal {
        let before = round_money(balance_before);
        let after = round_money(before - self.amount);

        self.status = WithdrawalStatus::Approved;
        self.reviewed_at = Some(now);

        ledger.transaction_type = TransactionType::WithdrawalProcessed;
        ledger.status = TransactionStatus::Completed;
        ledger.description = format!("Withdrawal #{} processed", self.id);
        ledger.wallet_before = Some(before);
        ledger.wallet_after = Some(after);

        after
    }

    pub fn reject(
        &mut self,
        ledger: &mut WalletTransaction,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WithdrawalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WithdrawalError::ReasonRequired);
        }
        self.check_reviewable()?;

        self.status = WithdrawalStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.reviewed_at = Some(now);

        let short: String = reason.chars().take(100).collect();
        ledger.status = TransactionStatus::Cancelled;
        ledger.description = format!("Withdrawal #{} rejected: {}", self.id, short);
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub bank: Option<BankDetails>,
}

/// Merchant withdrawals and their admin review.
pub struct WithdrawalDesk {
    accounts: Arc<dyn AccountRepository>,
    wallet: Arc<dyn WalletRepository>,
}

impl WithdrawalDesk {
    pub fn new(accounts: Arc<dyn AccountRepository>, wallet: Arc<dyn WalletRepository>) -> Self {
        Self { accounts, wallet }
    }

    /// An approved payment setting supplies the bank details. Without one the
    /// request must carry them.
    pub async fn request(&self, user_id: Uuid, input: WithdrawalRequest) -> CoreResult<Withdrawal> {
        let merchant = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;

        let setting = self.accounts.approved_payment_setting(user_id).await?;
        let (bank, setting_id) = match (&setting, input.bank) {
            (Some(s), _) => (s.bank_details()?, Some(s.id)),
            (None, Some(bank)) => (bank, None),
            (None, None) => return Err(WithdrawalError::NoApprovedPaymentSetting.into()),
        };

        let outstanding = self.wallet.outstanding_withdrawals(user_id, None).await?;
        let (withdrawal, pending) =
            Withdrawal::request(&merchant, input.amount, bank, setting_id, outstanding, Utc::now())?;

        self.wallet.create_withdrawal(&withdrawal, &pending).await?;
        tracing::info!(
            withdrawal_id = %withdrawal.id,
            merchant_id = %user_id,
            amount = %withdrawal.amount,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    pub async fn approve(&self, id: Uuid) -> CoreResult<Withdrawal> {
        let withdrawal = self.wallet.approve_withdrawal(id, Utc::now()).await?;
        tracing::info!(withdrawal_id = %id, amount = %withdrawal.amount, "Withdrawal approved");
        Ok(withdrawal)
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> CoreResult<Withdrawal> {
        if reason.trim().is_empty() {
            return Err(WithdrawalError::ReasonRequired.into());
        }
        let withdrawal = self.wallet.reject_withdrawal(id, reason, Utc::now()).await?;
        tracing::info!(withdrawal_id = %id, "Withdrawal rejected");
        Ok(withdrawal)
    }

    pub async fn mark_processing(&self, id: Uuid) -> CoreResult<Withdrawal> {
        self.wallet.mark_withdrawal_processing(id).await
    }

    pub async fn list_for(&self, user_id: Uuid, status: Option<WithdrawalStatus>) -> CoreResult<Vec<Withdrawal>> {
        self.wallet.list_withdrawals(Some(user_id), status).await
    }

    pub async fn list_all(&self, status: Option<WithdrawalStatus>) -> CoreResult<Vec<Withdrawal>> {
        self.wallet.list_withdrawals(None, status).await
    }

    pub async fn get_for(&self, user_id: Uuid, id: Uuid) -> CoreResult<Withdrawal> {
        match self.wallet.get_withdrawal(id).await? {
            Some(w) if w.merchant_id == user_id => Ok(w),
            _ => Err(CoreError::not_found("withdrawal", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn merchant(balance: Decimal) -> User {
        User {
            id: Uuid::new_v4(),
            phone: "9800000002".into(),
            name: "Ram Traders".into(),
            email: None,
            country_code: "+977".into(),
            country: "Nepal".into(),
            is_merchant: true,
            is_driver: false,
            is_admin: false,
            balance,
            created_at: Utc::now(),
        }
    }

    fn bank() -> BankDetails {
        BankDetails {
            account_holder_name: "Ram".into(),
            bank_name: "NIC Asia".into(),
            account_number: Masked("0011223344".into()),
            ifsc: "NICA0001".into(),
        }
    }

    fn approved_setting(user_id: Uuid) -> PaymentSetting {
        PaymentSetting {
            id: Uuid::new_v4(),
            user_id,
            method: PaymentMethodType::BankAccount,
            details: serde_json::json!({
                "account_holder_name": "Ram",
                "bank_name": "NIC Asia",
                "account_number": "0011223344",
                "ifsc": "NICA0001"
            }),
            status: ApprovalStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_respects_outstanding() {
        let m = merchant(dec!(100));
        let err = Withdrawal::request(&m, dec!(60), bank(), None, dec!(50), Utc::now()).unwrap_err();
        assert!(matches!(err, WithdrawalError::InsufficientBalance { .. }));

        let (w, tx) = Withdrawal::request(&m, dec!(49.999), bank(), None, dec!(50), Utc::now()).unwrap();
        assert_eq!(w.amount, dec!(50.00));
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.reference, Some(Reference::withdrawal(w.id)));
    }

    #[test]
    fn test_request_rejects_non_positive_and_non_merchant() {
        let m = merchant(dec!(100));
        assert!(matches!(
            Withdrawal::request(&m, dec!(0.001), bank(), None, Decimal::ZERO, Utc::now()),
            Err(WithdrawalError::InvalidAmount)
        ));

        let mut customer = merchant(dec!(100));
        customer.is_merchant = false;
        assert!(matches!(
            Withdrawal::request(&customer, dec!(10), bank(), None, Decimal::ZERO, Utc::now()),
            Err(WithdrawalError::NotMerchant)
        ));
    }

    #[test]
    fn test_approve_deducts_and_records_balances() {
        let m = merchant(dec!(100));
        let (mut w, mut tx) = Withdrawal::request(&m, dec!(40), bank(), None, Decimal::ZERO, Utc::now()).unwrap();
        let setting = approved_setting(m.id);

        w.check_approvable(Some(&setting), dec!(100), Decimal::ZERO).unwrap();
        let after = w.approve(&mut tx, dec!(100), Utc::now());

        assert_eq!(after, dec!(60));
        assert_eq!(w.status, WithdrawalStatus::Approved);
        assert_eq!(tx.transaction_type, TransactionType::WithdrawalProcessed);
        assert_eq!(tx.wallet_before, Some(dec!(100)));
        assert_eq!(tx.wallet_after, Some(dec!(60)));

        assert!(matches!(
            w.check_approvable(Some(&setting), dec!(60), Decimal::ZERO),
            Err(WithdrawalError::AlreadyApproved)
        ));
        assert!(matches!(w.reject(&mut tx, "late", Utc::now()), Err(WithdrawalError::AlreadyApproved)));
    }

    #[test]
    fn test_approve_requires_approved_setting() {
        let m = merchant(dec!(100));
        let (w, _) = Withdrawal::request(&m, dec!(10), bank(), None, Decimal::ZERO, Utc::now()).unwrap();
        let mut setting = approved_setting(m.id);
        setting.status = ApprovalStatus::Pending;

        assert!(matches!(
            w.check_approvable(Some(&setting), dec!(100), Decimal::ZERO),
            Err(WithdrawalError::NoApprovedPaymentSetting)
        ));
        assert!(matches!(
            w.check_approvable(None, dec!(100), Decimal::ZERO),
            Err(WithdrawalError::NoApprovedPaymentSetting)
        ));
    }

    #[test]
    fn test_reject_needs_reason_and_cancels_ledger_line() {
        let m = merchant(dec!(100));
        let (mut w, mut tx) = Withdrawal::request(&m, dec!(10), bank(), None, Decimal::ZERO, Utc::now()).unwrap();

        assert!(matches!(w.reject(&mut tx, "  ", Utc::now()), Err(WithdrawalError::ReasonRequired)));
        w.reject(&mut tx, "Bank details mismatch", Utc::now()).unwrap();
        assert_eq!(w.status, WithdrawalStatus::Rejected);
        assert_eq!(tx.status, TransactionStatus::Cancelled);
        assert!(matches!(w.reject(&mut tx, "again", Utc::now()), Err(WithdrawalError::AlreadyRejected)));
    }

    #[test]
    fn test_upi_setting_cannot_fund_withdrawal() {
        let mut setting = approved_setting(Uuid::new_v4());
        setting.method = PaymentMethodType::Upi;
        assert!(matches!(setting.bank_details(), Err(WithdrawalError::UnsupportedPaymentMethod)));
    }
}
