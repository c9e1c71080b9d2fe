use chrono::{DateTime, Utc};

use crate::models::{Order, OrderPaymentStatus, OrderStatus};
use crate::{CommerceError, CommerceResult};

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Delivered, Refunded)
        )
    }

    pub fn is_customer_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

/// Order lifecycle transitions.
///
/// ```text
/// Pending -> Confirmed -> Processing -> Shipped -> Delivered -> Refunded
///    \           \
///     +-----------+--> Cancelled
/// ```
pub struct OrderManager;

impl OrderManager {
    pub fn transition(order: &mut Order, to: OrderStatus, now: DateTime<Utc>) -> CommerceResult<()> {
        if !order.status.can_transition_to(to) {
            return Err(CommerceError::InvalidTransition { from: order.status, to });
        }
        order.status = to;
        order.updated_at = now;
        Ok(())
    }

    /// Customers may only withdraw orders that have not started processing.
    pub fn cancel_by_customer(order: &mut Order, now: DateTime<Utc>) -> CommerceResult<()> {
        if !order.status.is_customer_cancellable() {
            return Err(CommerceError::NotCancellable(order.status));
        }
        Self::transition(order, OrderStatus::Cancelled, now)
    }

    pub fn record_payment(order: &mut Order, status: OrderPaymentStatus, now: DateTime<Utc>) {
        order.payment_status = status;
        order.updated_at = now;
    }

    /// Delivered, paid, and not yet settled.
    pub fn needs_settlement(order: &Order) -> bool {
        order.status == OrderStatus::Delivered
            && order.payment_status == OrderPaymentStatus::Success
            && !order.commission_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, ShippingDetails};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "AB12CD34".into(),
            user_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            status,
            payment_method: PaymentMethod::Cod,
            payment_status: OrderPaymentStatus::Success,
            subtotal: dec!(100),
            discount: dec!(0),
            total: dec!(100),
            coupon_id: None,
            shipping: ShippingDetails {
                shipping_address: "x".into(),
                billing_address: None,
                phone: "1".into(),
                email: None,
                notes: None,
            },
            commission_processed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut o = order(OrderStatus::Pending);
        for next in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            OrderManager::transition(&mut o, next, Utc::now()).unwrap();
        }
        assert!(OrderManager::needs_settlement(&o));
        OrderManager::transition(&mut o, OrderStatus::Refunded, Utc::now()).unwrap();
    }

    #[test]
    fn test_invalid_transitions() {
        let mut o = order(OrderStatus::Pending);
        let err = OrderManager::transition(&mut o, OrderStatus::Shipped, Utc::now()).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Shipped }));

        let mut o = order(OrderStatus::Cancelled);
        assert!(OrderManager::transition(&mut o, OrderStatus::Confirmed, Utc::now()).is_err());
    }

    #[test]
    fn test_customer_cancel() {
        let mut o = order(OrderStatus::Confirmed);
        OrderManager::cancel_by_customer(&mut o, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);

        let mut o = order(OrderStatus::Processing);
        assert!(matches!(
            OrderManager::cancel_by_customer(&mut o, Utc::now()),
            Err(CommerceError::NotCancellable(OrderStatus::Processing))
        ));
    }

    #[test]
    fn test_settlement_requires_payment_and_runs_once() {
        let mut o = order(OrderStatus::Delivered);
        o.payment_status = OrderPaymentStatus::Pending;
        assert!(!OrderManager::needs_settlement(&o));

        o.payment_status = OrderPaymentStatus::Success;
        o.commission_processed = true;
        assert!(!OrderManager::needs_settlement(&o));
    }
}
