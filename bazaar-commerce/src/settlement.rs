use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use bazaar_core::{Account, Credit, Reference, TransactionType, WalletTransaction};
use bazaar_shared::{percent_of, round_money};

use crate::models::Order;

/// The platform's cut of a delivered order and the merchant's remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Split {
    pub commission: Decimal,
    pub payout: Decimal,
}

impl Split {
    /// Commission is taken on the subtotal, before any coupon discount.
    pub fn of(order: &Order, sales_commission: Decimal) -> Self {
        let commission = percent_of(order.subtotal, sales_commission);
        let payout = round_money(order.subtotal - commission);
        Self { commission, payout }
    }

    pub fn credits(&self, order: &Order, store_owner: Uuid) -> Vec<Credit> {
        let reference = Some(Reference::order(order.id));
        vec![
            Credit {
                account: Account::System,
                amount: self.commission,
                transaction_type: TransactionType::Commission,
                description: format!("Sales commission for order #{}", order.order_number),
                reference,
            },
            Credit {
                account: Account::User(store_owner),
                amount: self.payout,
                transaction_type: TransactionType::Payout,
                description: format!("Payout for order #{}", order.order_number),
                reference,
            },
        ]
    }
}

/// What a settlement run wrote.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub order_id: Uuid,
    #[serde(flatten)]
    pub split: Split,
    pub transactions: Vec<WalletTransaction>,
}
