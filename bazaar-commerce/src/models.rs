use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant's shop front. Owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub sku: String,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Percent saved against the compare price, when there is one above the price.
    pub fn discount_percentage(&self) -> Option<Decimal> {
        match self.compare_price {
            Some(compare) if compare > self.price && !compare.is_zero() => Some(
                ((compare - self.price) / compare * Decimal::ONE_HUNDRED).round(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub minimum_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

/// Delivery details captured at checkout and copied onto every order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: OrderPaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_id: Option<Uuid>,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub commission_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total: Decimal,
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, compare: Option<Decimal>) -> Product {
        Product {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            name: "Kettle".into(),
            description: String::new(),
            price,
            compare_price: compare,
            sku: "KT-1".into(),
            stock_quantity: 3,
            is_active: true,
            is_featured: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_percentage() {
        assert_eq!(product(dec!(75), Some(dec!(100))).discount_percentage(), Some(dec!(25)));
        assert_eq!(product(dec!(100), Some(dec!(90))).discount_percentage(), None);
        assert_eq!(product(dec!(100), None).discount_percentage(), None);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&OrderStatus::Delivered).unwrap(), "\"delivered\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"cod\"");
        assert_eq!(OrderStatus::Refunded.to_string(), "refunded");
    }
}
