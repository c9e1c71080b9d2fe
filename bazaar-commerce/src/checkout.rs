use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_shared::{round_money, sum_money};

use crate::models::{
    CartItem, Coupon, Order, OrderItem, OrderPaymentStatus, OrderStatus, PaymentMethod, PlacedOrder, Product,
    ShippingDetails,
};
use crate::{CommerceError, CommerceResult};

/// A cart row joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        round_money(self.product.price * Decimal::from(self.item.quantity))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: i32,
    pub subtotal: Decimal,
}

impl CartView {
    pub fn new(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| l.item.quantity).sum();
        let subtotal = cart_subtotal(&lines);
        Self { lines, item_count, subtotal }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Cod
}

/// Eight upper-case hex characters.
pub fn order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_uppercase()
}

pub fn cart_subtotal(lines: &[CartLine]) -> Decimal {
    let totals: Vec<Decimal> = lines.iter().map(CartLine::line_total).collect();
    sum_money(&totals)
}

/// Every line must point at an active product with enough stock.
pub fn check_lines(lines: &[CartLine]) -> CommerceResult<()> {
    if lines.is_empty() {
        return Err(CommerceError::EmptyCart);
    }
    for line in lines {
        if !line.product.is_active {
            return Err(CommerceError::ProductUnavailable(line.product.name.clone()));
        }
        if line.item.quantity < 1 {
            return Err(CommerceError::InvalidQuantity);
        }
        if line.product.stock_quantity < line.item.quantity {
            return Err(CommerceError::InsufficientStock {
                product: line.product.name.clone(),
                available: line.product.stock_quantity,
                requested: line.item.quantity,
            });
        }
    }
    Ok(())
}

/// Share `discount` across `subtotals` in proportion. Each share stays within
/// `[0, subtotal]` and never exceeds what is left to allocate; the last share
/// takes the remainder so the shares sum to `discount`.
pub fn split_discount(subtotals: &[Decimal], discount: Decimal) -> Vec<Decimal> {
    let total: Decimal = subtotals.iter().copied().sum();
    if subtotals.is_empty() {
        return Vec::new();
    }
    if total.is_zero() || discount.is_zero() {
        return vec![round_money(Decimal::ZERO); subtotals.len()];
    }

    let mut shares = Vec::with_capacity(subtotals.len());
    let mut remaining = round_money(discount);
    for (i, subtotal) in subtotals.iter().enumerate() {
        let wanted = if i + 1 == subtotals.len() {
            remaining
        } else {
            round_money(discount * *subtotal / total).min(remaining)
        };
        let share = wanted.clamp(Decimal::ZERO, round_money(*subtotal));
        remaining -= share;
        shares.push(share);
    }
    shares
}

fn initial_status(method: PaymentMethod) -> (OrderStatus, OrderPaymentStatus) {
    match method {
        PaymentMethod::Cod => (OrderStatus::Confirmed, OrderPaymentStatus::Success),
        PaymentMethod::Online => (OrderStatus::Pending, OrderPaymentStatus::Pending),
    }
}

/// Turn a cart into one order per store.
pub fn plan(
    user_id: Uuid,
    lines: &[CartLine],
    coupon: Option<&Coupon>,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> CommerceResult<Vec<PlacedOrder>> {
    check_lines(lines)?;

    let mut by_store: BTreeMap<Uuid, Vec<&CartLine>> = BTreeMap::new();
    for line in lines {
        by_store.entry(line.product.store_id).or_default().push(line);
    }

    let subtotals: Vec<Decimal> = by_store
        .values()
        .map(|group| {
            let totals: Vec<Decimal> = group.iter().map(|l| l.line_total()).collect();
            sum_money(&totals)
        })
        .collect();

    let discount = match coupon {
        Some(c) => c.discount_for(sum_money(&subtotals), now)?,
        None => Decimal::ZERO,
    };
    let shares = split_discount(&subtotals, discount);
    let (status, payment_status) = initial_status(request.payment_method);

    let placed = by_store
        .into_iter()
        .zip(subtotals.into_iter().zip(shares))
        .map(|((store_id, group), (subtotal, share))| {
            let order_id = Uuid::new_v4();
            let items = group
                .iter()
                .map(|l| OrderItem {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: l.product.id,
                    store_id,
                    product_name: l.product.name.clone(),
                    quantity: l.item.quantity,
                    price: round_money(l.product.price),
                    total: l.line_total(),
                })
                .collect();

            PlacedOrder {
                order: Order {
                    id: order_id,
                    order_number: order_number(),
                    user_id,
                    store_id,
                    status,
                    payment_method: request.payment_method,
                    payment_status,
                    subtotal,
                    discount: share,
                    total: round_money(subtotal - share),
                    coupon_id: coupon.map(|c| c.id),
                    shipping: request.shipping.clone(),
                    commission_processed: false,
                    created_at: now,
                    updated_at: now,
                },
                items,
            }
        })
        .collect();

    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiscountType;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn line(store_id: Uuid, price: Decimal, qty: i32, stock: i32) -> CartLine {
        let product = Product {
            id: Uuid::new_v4(),
            store_id,
            category_id: Uuid::new_v4(),
            name: format!("item-{}", price),
            description: String::new(),
            price,
            compare_price: None,
            sku: Uuid::new_v4().to_string(),
            stock_quantity: stock,
            is_active: true,
            is_featured: false,
            created_at: Utc::now(),
        };
        CartLine {
            item: CartItem {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                product_id: product.id,
                quantity: qty,
                created_at: Utc::now(),
            },
            product,
        }
    }

    fn request(method: PaymentMethod, code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            shipping: ShippingDetails {
                shipping_address: "12 Lake Road".into(),
                billing_address: None,
                phone: "9800000000".into(),
                email: None,
                notes: None,
            },
            payment_method: method,
            coupon_code: code.map(String::from),
        }
    }

    #[test]
    fn test_order_number_shape() {
        let n = order_number();
        assert_eq!(n.len(), 8);
        assert!(n.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_split_discount_sums_exactly() {
        let shares = split_discount(&[dec!(100), dec!(100), dec!(100)], dec!(10));
        assert_eq!(shares, vec![dec!(3.33), dec!(3.33), dec!(3.34)]);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec!(10));
    }

    #[test]
    fn test_split_discount_never_negative() {
        // each proportional share rounds up to 0.01, which would leave -0.01 for the last store
        let shares = split_discount(&[dec!(1), dec!(1), dec!(1), dec!(1)], dec!(0.02));
        assert!(shares.iter().all(|s| *s >= Decimal::ZERO));
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec!(0.02));

        let shares = split_discount(&[dec!(0.01), dec!(50)], dec!(5));
        assert!(shares[0] <= dec!(0.01));
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec!(5));
    }

    #[test]
    fn test_split_discount_nothing_to_share() {
        assert_eq!(split_discount(&[dec!(40), dec!(60)], Decimal::ZERO), vec![dec!(0.00), dec!(0.00)]);
        assert!(split_discount(&[], dec!(5)).is_empty());
    }

    #[test]
    fn test_plan_splits_per_store() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![line(a, dec!(50), 2, 5), line(b, dec!(20), 1, 5), line(a, dec!(10), 1, 5)];
        let orders = plan(Uuid::new_v4(), &lines, None, &request(PaymentMethod::Cod, None), Utc::now()).unwrap();

        assert_eq!(orders.len(), 2);
        let for_a = orders.iter().find(|o| o.order.store_id == a).unwrap();
        assert_eq!(for_a.items.len(), 2);
        assert_eq!(for_a.order.subtotal, dec!(110));
        assert_eq!(for_a.order.total, dec!(110));
        assert_eq!(for_a.order.status, OrderStatus::Confirmed);
        assert_eq!(for_a.order.payment_status, OrderPaymentStatus::Success);
        assert!(for_a.items.iter().all(|i| i.order_id == for_a.order.id));
    }

    #[test]
    fn test_plan_prorates_coupon() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![line(a, dec!(300), 1, 1), line(b, dec!(100), 1, 1)];
        let now = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: "FLAT40".into(),
            description: String::new(),
            discount_type: DiscountType::Fixed,
            discount_value: dec!(40),
            minimum_amount: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            valid_from: now - Duration::hours(1),
            valid_until: now + Duration::hours(1),
        };

        let orders = plan(Uuid::new_v4(), &lines, Some(&coupon), &request(PaymentMethod::Online, Some("FLAT40")), now).unwrap();
        let discounts: Decimal = orders.iter().map(|o| o.order.discount).sum();
        assert_eq!(discounts, dec!(40));
        let for_a = orders.iter().find(|o| o.order.store_id == a).unwrap();
        assert_eq!(for_a.order.discount, dec!(30));
        assert_eq!(for_a.order.total, dec!(270));
        assert_eq!(for_a.order.status, OrderStatus::Pending);
        assert_eq!(for_a.order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(for_a.order.coupon_id, Some(coupon.id));
    }

    #[test]
    fn test_plan_rejects_bad_carts() {
        let req = request(PaymentMethod::Cod, None);
        assert!(matches!(plan(Uuid::new_v4(), &[], None, &req, Utc::now()), Err(CommerceError::EmptyCart)));

        let short = vec![line(Uuid::new_v4(), dec!(5), 4, 3)];
        assert!(matches!(
            plan(Uuid::new_v4(), &short, None, &req, Utc::now()),
            Err(CommerceError::InsufficientStock { available: 3, requested: 4, .. })
        ));

        let mut inactive = vec![line(Uuid::new_v4(), dec!(5), 1, 3)];
        inactive[0].product.is_active = false;
        assert!(matches!(
            plan(Uuid::new_v4(), &inactive, None, &req, Utc::now()),
            Err(CommerceError::ProductUnavailable(_))
        ));
    }
}
