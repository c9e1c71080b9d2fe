use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use bazaar_core::{CoreResult, Credit, WalletTransaction};

use crate::models::{
    CartItem, Category, Coupon, Order, OrderItem, OrderPaymentStatus, OrderStatus, PlacedOrder, Product, Store,
};
use crate::review::{Review, WishlistItem};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub store_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub featured: Option<bool>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl ProductFilter {
    pub fn matches(&self, p: &Product) -> bool {
        let search_hit = self.search.as_deref().map_or(true, |q| {
            let q = q.to_lowercase();
            p.name.to_lowercase().contains(&q) || p.description.to_lowercase().contains(&q)
        });
        (self.include_inactive || p.is_active)
            && self.store_id.map_or(true, |s| p.store_id == s)
            && self.category_id.map_or(true, |c| p.category_id == c)
            && self.featured.map_or(true, |f| p.is_featured == f)
            && search_hit
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub store_ids: Option<Vec<Uuid>>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<OrderPaymentStatus>,
}

impl OrderFilter {
    pub fn matches(&self, o: &Order) -> bool {
        self.user_id.map_or(true, |u| o.user_id == u)
            && self.store_ids.as_ref().map_or(true, |ids| ids.contains(&o.store_id))
            && self.status.map_or(true, |s| o.status == s)
            && self.payment_status.map_or(true, |p| o.payment_status == p)
    }
}

#[async_trait]
pub trait CommerceRepository: Send + Sync {
    async fn create_store(&self, store: &Store) -> CoreResult<()>;

    async fn update_store(&self, store: &Store) -> CoreResult<()>;

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<Store>>;

    async fn list_stores(&self, owner_id: Option<Uuid>) -> CoreResult<Vec<Store>>;

    /// Conflict when the name is taken.
    async fn create_category(&self, category: &Category) -> CoreResult<()>;

    async fn list_categories(&self) -> CoreResult<Vec<Category>>;

    /// Conflict when the SKU is taken.
    async fn create_product(&self, product: &Product) -> CoreResult<()>;

    async fn update_product(&self, product: &Product) -> CoreResult<()>;

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>>;

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>>;

    async fn list_cart(&self, user_id: Uuid) -> CoreResult<Vec<CartItem>>;

    /// Insert, or replace the row with the same id.
    async fn save_cart_item(&self, item: &CartItem) -> CoreResult<()>;

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> CoreResult<()>;

    async fn create_coupon(&self, coupon: &Coupon) -> CoreResult<()>;

    async fn find_coupon(&self, code: &str) -> CoreResult<Option<Coupon>>;

    async fn list_coupons(&self) -> CoreResult<Vec<Coupon>>;

    /// Stores the orders, takes their quantities out of stock, clears the
    /// user's cart and counts one coupon use, all or nothing. Conflict when
    /// stock ran out or the coupon hit its limit in the meantime.
    async fn place_orders(&self, user_id: Uuid, orders: &[PlacedOrder]) -> CoreResult<()>;

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>>;

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>>;

    /// Writes status, payment status and `updated_at`. Conflict if the stored
    /// status is no longer `expected`.
    async fn update_order(&self, order: &Order, expected: OrderStatus) -> CoreResult<()>;

    /// Applies the credits and flags the order as settled in one step. Returns
    /// `None` without touching anything when the order was already settled.
    async fn settle_order(&self, order_id: Uuid, credits: &[Credit]) -> CoreResult<Option<Vec<WalletTransaction>>>;

    /// True when one of the user's delivered orders contains the product.
    async fn has_delivered_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<bool>;

    /// Conflict when the user already reviewed the product.
    async fn create_review(&self, review: &Review) -> CoreResult<()>;

    async fn update_review(&self, review: &Review) -> CoreResult<()>;

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>>;

    /// Newest first.
    async fn list_reviews(&self, product_id: Uuid) -> CoreResult<Vec<Review>>;

    async fn delete_review(&self, id: Uuid) -> CoreResult<()>;

    /// Newest first.
    async fn list_wishlist(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>>;

    /// Returns the stored row and whether it was created by this call.
    async fn add_wishlist_item(&self, item: &WishlistItem) -> CoreResult<(WishlistItem, bool)>;

    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_filter() {
        let store = Uuid::new_v4();
        let p = Product {
            id: Uuid::new_v4(),
            store_id: store,
            category_id: Uuid::new_v4(),
            name: "Brass Lamp".into(),
            description: "Hand made".into(),
            price: dec!(40),
            compare_price: None,
            sku: "BL-1".into(),
            stock_quantity: 1,
            is_active: true,
            is_featured: true,
            created_at: Utc::now(),
        };

        assert!(ProductFilter::default().matches(&p));
        assert!(ProductFilter { search: Some("LAMP".into()), ..Default::default() }.matches(&p));
        assert!(ProductFilter { search: Some("hand".into()), store_id: Some(store), ..Default::default() }.matches(&p));
        assert!(!ProductFilter { featured: Some(false), ..Default::default() }.matches(&p));

        let mut hidden = p.clone();
        hidden.is_active = false;
        assert!(!ProductFilter::default().matches(&hidden));
        assert!(ProductFilter { include_inactive: true, ..Default::default() }.matches(&hidden));
    }
}
