use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_shared::round_money;

/// Owner of a balance. The platform's own balance is the `System` account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Account {
    User(Uuid),
    System,
}

impl Account {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Account::User(id) => Some(*id),
            Account::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Commission,
    CommissionDeduction,
    ShippingChargeDeduction,
    Withdrawal,
    WithdrawalProcessed,
    Payout,
    TravelBookingRevenue,
    TravelBookingCommission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    TravelBooking,
    Order,
    Withdrawal,
}

/// The business record a ledger line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: Uuid,
}

impl Reference {
    pub fn travel_booking(id: Uuid) -> Self {
        Self { kind: ReferenceKind::TravelBooking, id }
    }

    pub fn order(id: Uuid) -> Self {
        Self { kind: ReferenceKind::Order, id }
    }

    pub fn withdrawal(id: Uuid) -> Self {
        Self { kind: ReferenceKind::Withdrawal, id }
    }
}

/// One line of the wallet ledger. Never deleted; status moves instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub account: Account,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub reference: Option<Reference>,
    pub wallet_before: Option<Decimal>,
    pub wallet_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// An amount to add to an account's balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub account: Account,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub reference: Option<Reference>,
}

impl Credit {
    /// Apply the credit on top of `balance_before`, returning the new balance
    /// and the completed ledger line that records the move.
    pub fn settle(&self, balance_before: Decimal, at: DateTime<Utc>) -> (Decimal, WalletTransaction) {
        let before = round_money(balance_before);
        let amount = round_money(self.amount);
        let after = round_money(before + amount);

        let transaction = WalletTransaction {
            id: Uuid::new_v4(),
            account: self.account,
            transaction_type: self.transaction_type,
            amount,
            status: TransactionStatus::Completed,
            description: self.description.clone(),
            reference: self.reference,
            wallet_before: Some(before),
            wallet_after: Some(after),
            created_at: at,
        };

        (after, transaction)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub account: Option<Account>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub reference: Option<Reference>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.account.map_or(true, |a| a == tx.account)
            && self.transaction_type.map_or(true, |t| t == tx.transaction_type)
            && self.status.map_or(true, |s| s == tx.status)
            && self.reference.map_or(true, |r| Some(r) == tx.reference)
            && self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at <= to)
    }
}

/// Totals bucketed the way dashboards report them: today, trailing 7, 30
/// and 365 days, and all time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub total: Decimal,
    pub today: Decimal,
    pub week: Decimal,
    pub month: Decimal,
    pub year: Decimal,
}

impl PeriodTotals {
    pub fn collect<I>(entries: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Decimal)>,
    {
        let week_ago = today - Duration::days(7);
        let month_ago = today - Duration::days(30);
        let year_ago = today - Duration::days(365);

        let mut totals = PeriodTotals::default();
        for (day, amount) in entries {
            totals.total += amount;
            if day == today {
                totals.today += amount;
            }
            if day >= week_ago {
                totals.week += amount;
            }
            if day >= month_ago {
                totals.month += amount;
            }
            if day >= year_ago {
                totals.year += amount;
            }
        }

        Self {
            total: round_money(totals.total),
            today: round_money(totals.today),
            week: round_money(totals.week),
            month: round_money(totals.month),
            year: round_money(totals.year),
        }
    }

    pub fn from_transactions(transactions: &[WalletTransaction], today: NaiveDate) -> Self {
        Self::collect(
            transactions.iter().map(|tx| (tx.created_at.date_naive(), tx.amount)),
            today,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_settle_records_balances() {
        let user = Uuid::new_v4();
        let credit = Credit {
            account: Account::User(user),
            amount: dec!(12.345),
            transaction_type: TransactionType::TravelBookingRevenue,
            description: "Travel booking revenue".into(),
            reference: None,
        };

        let (after, tx) = credit.settle(dec!(100), Utc::now());
        assert_eq!(after, dec!(112.35));
        assert_eq!(tx.amount, dec!(12.35));
        assert_eq!(tx.wallet_before, Some(dec!(100.00)));
        assert_eq!(tx.wallet_after, Some(dec!(112.35)));
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_period_totals_buckets() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let entries = vec![
            (today, dec!(10)),
            (today - Duration::days(3), dec!(5)),
            (today - Duration::days(20), dec!(2.5)),
            (today - Duration::days(200), dec!(1)),
            (today - Duration::days(400), dec!(100)),
        ];

        let totals = PeriodTotals::collect(entries, today);
        assert_eq!(totals.today, dec!(10));
        assert_eq!(totals.week, dec!(15));
        assert_eq!(totals.month, dec!(17.5));
        assert_eq!(totals.year, dec!(18.5));
        assert_eq!(totals.total, dec!(118.5));
    }

    #[test]
    fn test_filter_matches_reference() {
        let booking = Uuid::new_v4();
        let credit = Credit {
            account: Account::System,
            amount: dec!(1),
            transaction_type: TransactionType::TravelBookingCommission,
            description: String::new(),
            reference: Some(Reference::travel_booking(booking)),
        };
        let (_, tx) = credit.settle(Decimal::ZERO, Utc::now());

        let filter = TransactionFilter {
            reference: Some(Reference::travel_booking(booking)),
            status: Some(TransactionStatus::Completed),
            ..Default::default()
        };
        assert!(filter.matches(&tx));

        let other = TransactionFilter {
            account: Some(Account::User(booking)),
            ..Default::default()
        };
        assert!(!other.matches(&tx));
    }
}
