use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::repository::AccountRepository;
use bazaar_core::{CoreError, CoreResult, User};
use bazaar_shared::round_money;

use crate::checkout::{self, CartLine, CartView, CheckoutRequest};
use crate::coupon::normalize_code;
use crate::manager::OrderManager;
use crate::models::{
    CartItem, Category, Coupon, DiscountType, Order, OrderPaymentStatus, OrderStatus, PlacedOrder, Product, Store,
};
use crate::repository::{CommerceRepository, OrderFilter, ProductFilter};
use crate::review::{Review, ReviewInput, WishlistEntry, WishlistItem};
use crate::settlement::{Settlement, Split};
use crate::CommerceError;

#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub store_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_price: Option<Decimal>,
    pub sku: String,
    pub stock_quantity: i32,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub minimum_amount: Decimal,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// What a coupon would do to the caller's current cart.
#[derive(Debug, Clone, Serialize)]
pub struct CouponQuote {
    pub code: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// An order after a status or payment change, with the settlement it
/// triggered if any.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub settlement: Option<Settlement>,
}

fn validate_product(p: &Product) -> CoreResult<()> {
    if p.name.trim().is_empty() {
        return Err(CommerceError::InvalidProduct("name is required".into()).into());
    }
    if p.sku.trim().is_empty() {
        return Err(CommerceError::InvalidProduct("sku is required".into()).into());
    }
    if p.price <= Decimal::ZERO {
        return Err(CommerceError::InvalidProduct("price must be positive".into()).into());
    }
    if p.compare_price.is_some_and(|c| c < Decimal::ZERO) {
        return Err(CommerceError::InvalidProduct("compare price cannot be negative".into()).into());
    }
    if p.stock_quantity < 0 {
        return Err(CommerceError::InvalidProduct("stock cannot be negative".into()).into());
    }
    Ok(())
}

/// Stores, catalog, cart, checkout and the order lifecycle.
pub struct CommerceService {
    repo: Arc<dyn CommerceRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl CommerceService {
    pub fn new(repo: Arc<dyn CommerceRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { repo, accounts }
    }

    async fn merchant(&self, user_id: Uuid) -> CoreResult<User> {
        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        if !user.is_merchant {
            return Err(CommerceError::NotMerchant.into());
        }
        Ok(user)
    }

    async fn owned_store(&self, owner_id: Uuid, store_id: Uuid) -> CoreResult<Store> {
        let store = self
            .repo
            .get_store(store_id)
            .await?
            .ok_or_else(|| CoreError::not_found("store", store_id))?;
        if store.owner_id != owner_id {
            return Err(CommerceError::ForeignStore.into());
        }
        Ok(store)
    }

    async fn order(&self, id: Uuid) -> CoreResult<Order> {
        self.repo
            .get_order(id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", id))
    }

    async fn with_items(&self, order: Order) -> CoreResult<PlacedOrder> {
        let items = self.repo.order_items(order.id).await?;
        Ok(PlacedOrder { order, items })
    }

    // Stores

    pub async fn create_store(&self, owner_id: Uuid, input: NewStore) -> CoreResult<Store> {
        self.merchant(owner_id).await?;
        if input.name.trim().is_empty() {
            return Err(CoreError::ValidationError("Store name is required".into()));
        }
        let store = Store {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name.trim().to_string(),
            description: input.description,
            address: input.address,
            phone: input.phone,
            email: input.email,
            is_active: true,
            created_at: Utc::now(),
        };
        self.repo.create_store(&store).await?;
        tracing::info!(store_id = %store.id, owner = %owner_id, "Store created");
        Ok(store)
    }

    pub async fn my_stores(&self, owner_id: Uuid) -> CoreResult<Vec<Store>> {
        self.merchant(owner_id).await?;
        self.repo.list_stores(Some(owner_id)).await
    }

    pub async fn update_store(&self, owner_id: Uuid, store_id: Uuid, patch: StorePatch) -> CoreResult<Store> {
        self.merchant(owner_id).await?;
        let mut store = self.owned_store(owner_id, store_id).await?;
        if let Some(name) = patch.name {
            store.name = name;
        }
        if let Some(description) = patch.description {
            store.description = description;
        }
        if let Some(address) = patch.address {
            store.address = address;
        }
        if let Some(phone) = patch.phone {
            store.phone = phone;
        }
        if patch.email.is_some() {
            store.email = patch.email;
        }
        if let Some(active) = patch.is_active {
            store.is_active = active;
        }
        self.repo.update_store(&store).await?;
        Ok(store)
    }

    pub async fn active_stores(&self) -> CoreResult<Vec<Store>> {
        let stores = self.repo.list_stores(None).await?;
        Ok(stores.into_iter().filter(|s| s.is_active).collect())
    }

    // Catalog

    pub async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let categories = self.repo.list_categories().await?;
        Ok(categories.into_iter().filter(|c| c.is_active).collect())
    }

    pub async fn create_category(&self, name: String, parent_id: Option<Uuid>) -> CoreResult<Category> {
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError("Category name is required".into()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            parent_id,
            is_active: true,
        };
        self.repo.create_category(&category).await?;
        Ok(category)
    }

    /// Public listing; inactive products are never shown here.
    pub async fn list_products(&self, mut filter: ProductFilter) -> CoreResult<Vec<Product>> {
        filter.include_inactive = false;
        self.repo.list_products(&filter).await
    }

    pub async fn product(&self, id: Uuid) -> CoreResult<Product> {
        match self.repo.get_product(id).await? {
            Some(p) if p.is_active => Ok(p),
            _ => Err(CoreError::not_found("product", id)),
        }
    }

    pub async fn store_products(&self, owner_id: Uuid, store_id: Uuid) -> CoreResult<Vec<Product>> {
        self.merchant(owner_id).await?;
        self.owned_store(owner_id, store_id).await?;
        let filter = ProductFilter { store_id: Some(store_id), include_inactive: true, ..Default::default() };
        self.repo.list_products(&filter).await
    }

    pub async fn create_product(&self, owner_id: Uuid, input: NewProduct) -> CoreResult<Product> {
        self.merchant(owner_id).await?;
        self.owned_store(owner_id, input.store_id).await?;

        let product = Product {
            id: Uuid::new_v4(),
            store_id: input.store_id,
            category_id: input.category_id,
            name: input.name.trim().to_string(),
            description: input.description,
            price: round_money(input.price),
            compare_price: input.compare_price.map(round_money),
            sku: input.sku.trim().to_string(),
            stock_quantity: input.stock_quantity,
            is_active: true,
            is_featured: input.is_featured,
            created_at: Utc::now(),
        };
        validate_product(&product)?;
        self.repo.create_product(&product).await?;
        tracing::info!(product_id = %product.id, store_id = %product.store_id, "Product listed");
        Ok(product)
    }

    pub async fn update_product(&self, owner_id: Uuid, product_id: Uuid, patch: ProductPatch) -> CoreResult<Product> {
        self.merchant(owner_id).await?;
        let mut product = self
            .repo
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", product_id))?;
        self.owned_store(owner_id, product.store_id).await?;

        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = round_money(price);
        }
        if let Some(compare) = patch.compare_price {
            product.compare_price = Some(round_money(compare));
        }
        if let Some(stock) = patch.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(active) = patch.is_active {
            product.is_active = active;
        }
        if let Some(featured) = patch.is_featured {
            product.is_featured = featured;
        }
        validate_product(&product)?;
        self.repo.update_product(&product).await?;
        Ok(product)
    }

    // Cart

    async fn cart_lines(&self, user_id: Uuid) -> CoreResult<Vec<CartLine>> {
        let items = self.repo.list_cart(user_id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            match self.repo.get_product(item.product_id).await? {
                Some(product) => lines.push(CartLine { item, product }),
                None => tracing::warn!(item_id = %item.id, "Cart item points at a missing product"),
            }
        }
        Ok(lines)
    }

    pub async fn cart(&self, user_id: Uuid) -> CoreResult<CartView> {
        Ok(CartView::new(self.cart_lines(user_id).await?))
    }

    /// Adding a product already in the cart raises its quantity.
    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> CoreResult<CartView> {
        if quantity < 1 {
            return Err(CommerceError::InvalidQuantity.into());
        }
        let product = self.product(product_id).await?;
        let existing = self
            .repo
            .list_cart(user_id)
            .await?
            .into_iter()
            .find(|i| i.product_id == product_id);

        let item = match existing {
            Some(mut item) => {
                item.quantity += quantity;
                item
            }
            None => CartItem {
                id: Uuid::new_v4(),
                user_id,
                product_id,
                quantity,
                created_at: Utc::now(),
            },
        };
        if item.quantity > product.stock_quantity {
            return Err(CommerceError::InsufficientStock {
                product: product.name,
                available: product.stock_quantity,
                requested: item.quantity,
            }
            .into());
        }
        self.repo.save_cart_item(&item).await?;
        self.cart(user_id).await
    }

    pub async fn update_cart_item(&self, user_id: Uuid, item_id: Uuid, quantity: i32) -> CoreResult<CartView> {
        if quantity < 1 {
            return Err(CommerceError::InvalidQuantity.into());
        }
        let mut item = self
            .repo
            .list_cart(user_id)
            .await?
            .into_iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CoreError::not_found("cart item", item_id))?;
        let product = self.product(item.product_id).await?;
        if quantity > product.stock_quantity {
            return Err(CommerceError::InsufficientStock {
                product: product.name,
                available: product.stock_quantity,
                requested: quantity,
            }
            .into());
        }
        item.quantity = quantity;
        self.repo.save_cart_item(&item).await?;
        self.cart(user_id).await
    }

    pub async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> CoreResult<CartView> {
        self.repo.remove_cart_item(user_id, item_id).await?;
        self.cart(user_id).await
    }

    // Reviews

    pub async fn product_reviews(&self, product_id: Uuid) -> CoreResult<Vec<Review>> {
        self.product(product_id).await?;
        self.repo.list_reviews(product_id).await
    }

    pub async fn create_review(&self, user_id: Uuid, product_id: Uuid, input: ReviewInput) -> CoreResult<Review> {
        self.product(product_id).await?;
        let verified = self.repo.has_delivered_item(user_id, product_id).await?;
        let review = Review::new(user_id, product_id, input, verified)?;
        self.repo.create_review(&review).await.map_err(|err| match err {
            CoreError::Conflict(_) => CommerceError::DuplicateReview.into(),
            other => other,
        })?;
        tracing::info!(review_id = %review.id, product_id = %product_id, rating = review.rating, "Review created");
        Ok(review)
    }

    async fn own_review(&self, user_id: Uuid, review_id: Uuid) -> CoreResult<Review> {
        let review = self
            .repo
            .get_review(review_id)
            .await?
            .ok_or_else(|| CoreError::not_found("review", review_id))?;
        if review.user_id != user_id {
            return Err(CommerceError::ForeignReview.into());
        }
        Ok(review)
    }

    pub async fn update_review(&self, user_id: Uuid, review_id: Uuid, input: ReviewInput) -> CoreResult<Review> {
        let mut review = self.own_review(user_id, review_id).await?;
        review.revise(input)?;
        self.repo.update_review(&review).await?;
        Ok(review)
    }

    pub async fn delete_review(&self, user_id: Uuid, review_id: Uuid) -> CoreResult<()> {
        self.own_review(user_id, review_id).await?;
        self.repo.delete_review(review_id).await
    }

    // Wishlist

    /// Entries whose product has since been deactivated are left out.
    pub async fn wishlist(&self, user_id: Uuid) -> CoreResult<Vec<WishlistEntry>> {
        let mut entries = Vec::new();
        for item in self.repo.list_wishlist(user_id).await? {
            if let Some(product) = self.repo.get_product(item.product_id).await? {
                if product.is_active {
                    entries.push(WishlistEntry { item, product });
                }
            }
        }
        Ok(entries)
    }

    /// Adding a product twice returns the existing entry with `false`.
    pub async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<(WishlistEntry, bool)> {
        let product = self.product(product_id).await?;
        let candidate = WishlistItem { id: Uuid::new_v4(), user_id, product_id, created_at: Utc::now() };
        let (item, created) = self.repo.add_wishlist_item(&candidate).await?;
        Ok((WishlistEntry { item, product }, created))
    }

    pub async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<()> {
        self.repo.remove_wishlist_item(user_id, product_id).await
    }

    // Coupons

    pub async fn create_coupon(&self, input: NewCoupon) -> CoreResult<Coupon> {
        if input.discount_value <= Decimal::ZERO {
            return Err(CoreError::ValidationError("Discount value must be positive".into()));
        }
        if input.discount_type == DiscountType::Percentage && input.discount_value > Decimal::ONE_HUNDRED {
            return Err(CoreError::ValidationError("Percentage discount cannot exceed 100".into()));
        }
        if input.valid_until <= input.valid_from {
            return Err(CoreError::ValidationError("Coupon must end after it starts".into()));
        }
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: normalize_code(&input.code),
            description: input.description,
            discount_type: input.discount_type,
            discount_value: round_money(input.discount_value),
            minimum_amount: round_money(input.minimum_amount),
            usage_limit: input.usage_limit,
            used_count: 0,
            is_active: true,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
        };
        if coupon.code.is_empty() {
            return Err(CoreError::ValidationError("Coupon code is required".into()));
        }
        self.repo.create_coupon(&coupon).await?;
        Ok(coupon)
    }

    pub async fn list_coupons(&self) -> CoreResult<Vec<Coupon>> {
        self.repo.list_coupons().await
    }

    async fn coupon(&self, code: &str) -> CoreResult<Coupon> {
        let code = normalize_code(code);
        self.repo
            .find_coupon(&code)
            .await?
            .ok_or_else(|| CommerceError::InvalidCoupon(code).into())
    }

    pub async fn quote_coupon(&self, user_id: Uuid, code: &str) -> CoreResult<CouponQuote> {
        let coupon = self.coupon(code).await?;
        let subtotal = self.cart(user_id).await?.subtotal;
        let discount = coupon.discount_for(subtotal, Utc::now())?;
        Ok(CouponQuote {
            code: coupon.code,
            subtotal,
            discount,
            total: round_money(subtotal - discount),
        })
    }

    // Orders

    pub async fn checkout(&self, user_id: Uuid, request: CheckoutRequest) -> CoreResult<Vec<PlacedOrder>> {
        let lines = self.cart_lines(user_id).await?;
        let coupon = match request.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => Some(self.coupon(code).await?),
            _ => None,
        };

        let orders = checkout::plan(user_id, &lines, coupon.as_ref(), &request, Utc::now())?;
        self.repo.place_orders(user_id, &orders).await?;

        tracing::info!(
            user_id = %user_id,
            orders = orders.len(),
            payment_method = ?request.payment_method,
            "Checkout complete"
        );
        Ok(orders)
    }

    pub async fn my_orders(&self, user_id: Uuid, status: Option<OrderStatus>) -> CoreResult<Vec<Order>> {
        let filter = OrderFilter { user_id: Some(user_id), status, ..Default::default() };
        self.repo.list_orders(&filter).await
    }

    pub async fn order_detail(&self, user_id: Uuid, id: Uuid) -> CoreResult<PlacedOrder> {
        let order = self.order(id).await?;
        if order.user_id != user_id {
            return Err(CoreError::not_found("order", id));
        }
        self.with_items(order).await
    }

    pub async fn cancel_order(&self, user_id: Uuid, id: Uuid) -> CoreResult<Order> {
        let mut order = self.order(id).await?;
        if order.user_id != user_id {
            return Err(CoreError::not_found("order", id));
        }
        let expected = order.status;
        OrderManager::cancel_by_customer(&mut order, Utc::now())?;
        self.repo.update_order(&order, expected).await?;
        tracing::info!(order_id = %id, "Order cancelled by customer");
        Ok(order)
    }

    pub async fn store_orders(&self, owner_id: Uuid, status: Option<OrderStatus>) -> CoreResult<Vec<Order>> {
        self.merchant(owner_id).await?;
        let store_ids = self
            .repo
            .list_stores(Some(owner_id))
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let filter = OrderFilter { store_ids: Some(store_ids), status, ..Default::default() };
        self.repo.list_orders(&filter).await
    }

    pub async fn store_order(&self, owner_id: Uuid, id: Uuid) -> CoreResult<PlacedOrder> {
        self.merchant(owner_id).await?;
        let order = self.order(id).await?;
        self.owned_store(owner_id, order.store_id).await?;
        self.with_items(order).await
    }

    /// Merchant moves an order of one of their stores along.
    pub async fn advance_order(&self, owner_id: Uuid, id: Uuid, to: OrderStatus) -> CoreResult<StatusChange> {
        self.merchant(owner_id).await?;
        let order = self.order(id).await?;
        self.owned_store(owner_id, order.store_id).await?;
        self.change_status(order, to).await
    }

    pub async fn all_orders(&self, filter: OrderFilter) -> CoreResult<Vec<Order>> {
        self.repo.list_orders(&filter).await
    }

    pub async fn admin_set_status(&self, id: Uuid, to: OrderStatus) -> CoreResult<StatusChange> {
        let order = self.order(id).await?;
        self.change_status(order, to).await
    }

    /// Records the outcome reported by a payment gateway or an admin.
    pub async fn set_payment_status(&self, id: Uuid, status: OrderPaymentStatus) -> CoreResult<StatusChange> {
        let mut order = self.order(id).await?;
        let expected = order.status;
        OrderManager::record_payment(&mut order, status, Utc::now());
        self.repo.update_order(&order, expected).await?;
        tracing::info!(order_id = %id, payment_status = ?status, "Order payment updated");
        let settlement = self.settle_if_due(&mut order).await?;
        Ok(StatusChange { order, settlement })
    }

    async fn change_status(&self, mut order: Order, to: OrderStatus) -> CoreResult<StatusChange> {
        let expected = order.status;
        OrderManager::transition(&mut order, to, Utc::now())?;
        self.repo.update_order(&order, expected).await?;
        tracing::info!(order_id = %order.id, from = %expected, to = %to, "Order status changed");
        let settlement = self.settle_if_due(&mut order).await?;
        Ok(StatusChange { order, settlement })
    }

    async fn settle_if_due(&self, order: &mut Order) -> CoreResult<Option<Settlement>> {
        if !OrderManager::needs_settlement(order) {
            return Ok(None);
        }
        let settings = self.accounts.get_settings().await?;
        let store = self
            .repo
            .get_store(order.store_id)
            .await?
            .ok_or_else(|| CoreError::not_found("store", order.store_id))?;

        let split = Split::of(order, settings.sales_commission);
        let credits = split.credits(order, store.owner_id);
        let Some(transactions) = self.repo.settle_order(order.id, &credits).await? else {
            tracing::debug!(order_id = %order.id, "Order already settled");
            order.commission_processed = true;
            return Ok(None);
        };

        order.commission_processed = true;
        tracing::info!(
            order_id = %order.id,
            commission = %split.commission,
            payout = %split.payout,
            "Delivered order settled"
        );
        Ok(Some(Settlement { order_id: order.id, split, transactions }))
    }
}
