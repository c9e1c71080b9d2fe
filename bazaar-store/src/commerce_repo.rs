use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use bazaar_commerce::models::ShippingDetails;
use bazaar_commerce::{
    CartItem, Category, CommerceRepository, Coupon, Order, OrderFilter, OrderItem, OrderStatus, PlacedOrder, Product,
    ProductFilter, Review, Store, WishlistItem,
};
use bazaar_core::{CoreError, CoreResult, Credit, WalletTransaction};

use crate::database::{db_err, from_text, to_text};
use crate::ledger;

pub struct StoreCommerceRepository {
    pool: PgPool,
}

impl StoreCommerceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    rating: i16,
    title: String,
    comment: String,
    is_verified_purchase: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_verified_purchase: row.is_verified_purchase,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<WishlistRow> for WishlistItem {
    fn from(row: WishlistRow) -> Self {
        WishlistItem { id: row.id, user_id: row.user_id, product_id: row.product_id, created_at: row.created_at }
    }
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: String,
    address: String,
    phone: String,
    email: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            address: row.address,
            phone: row.phone,
            email: row.email,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    store_id: Uuid,
    category_id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    compare_price: Option<Decimal>,
    sku: String,
    stock_quantity: i32,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            store_id: row.store_id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price: row.price,
            compare_price: row.compare_price,
            sku: row.sku,
            stock_quantity: row.stock_quantity,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    description: String,
    discount_type: String,
    discount_value: Decimal,
    minimum_amount: Decimal,
    usage_limit: Option<i32>,
    used_count: i32,
    is_active: bool,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = CoreError;

    fn try_from(row: CouponRow) -> CoreResult<Self> {
        Ok(Coupon {
            id: row.id,
            code: row.code,
            description: row.description,
            discount_type: from_text(&row.discount_type)?,
            discount_value: row.discount_value,
            minimum_amount: row.minimum_amount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            is_active: row.is_active,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    store_id: Uuid,
    status: String,
    payment_method: String,
    payment_status: String,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    coupon_id: Option<Uuid>,
    shipping_address: String,
    billing_address: Option<String>,
    phone: String,
    email: Option<String>,
    notes: Option<String>,
    commission_processed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> CoreResult<Self> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            store_id: row.store_id,
            status: from_text(&row.status)?,
            payment_method: from_text(&row.payment_method)?,
            payment_status: from_text(&row.payment_status)?,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            coupon_id: row.coupon_id,
            shipping: ShippingDetails {
                shipping_address: row.shipping_address,
                billing_address: row.billing_address,
                phone: row.phone,
                email: row.email,
                notes: row.notes,
            },
            commission_processed: row.commission_processed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    store_id: Uuid,
    product_name: String,
    quantity: i32,
    price: Decimal,
    total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            store_id: row.store_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price: row.price,
            total: row.total,
        }
    }
}

#[async_trait]
impl CommerceRepository for StoreCommerceRepository {
    async fn create_store(&self, store: &Store) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stores (id, owner_id, name, description, address, phone, email, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(store.id)
        .bind(store.owner_id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(&store.email)
        .bind(store.is_active)
        .bind(store.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_store(&self, store: &Store) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stores SET name = $2, description = $3, address = $4, phone = $5, email = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(store.id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(&store.email)
        .bind(store.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("store", store.id));
        }
        Ok(())
    }

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<Store>> {
        let row = sqlx::query_as::<_, StoreRow>("SELECT * FROM stores WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Store::from))
    }

    async fn list_stores(&self, owner_id: Option<Uuid>) -> CoreResult<Vec<Store>> {
        let rows = sqlx::query_as::<_, StoreRow>(
            "SELECT * FROM stores WHERE ($1::uuid IS NULL OR owner_id = $1) ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Store::from).collect())
    }

    async fn create_category(&self, category: &Category) -> CoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name, parent_id, is_active) VALUES ($1, $2, $3, $4)")
            .bind(category.id)
            .bind(&category.name)
            .bind(category.parent_id)
            .bind(category.is_active)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let rows: Vec<(Uuid, String, Option<Uuid>, bool)> =
            sqlx::query_as("SELECT id, name, parent_id, is_active FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, name, parent_id, is_active)| Category { id, name, parent_id, is_active })
            .collect())
    }

    async fn create_product(&self, product: &Product) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, store_id, category_id, name, description, price, compare_price, sku,
                 stock_quantity, is_active, is_featured, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(product.id)
        .bind(product.store_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(&product.sku)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET category_id = $2, name = $3, description = $4, price = $5, compare_price = $6,
                stock_quantity = $7, is_active = $8, is_featured = $9
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.is_featured)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("product", product.id));
        }
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
        if !filter.include_inactive {
            qb.push(" AND is_active");
        }
        if let Some(store) = filter.store_id {
            qb.push(" AND store_id = ").push_bind(store);
        }
        if let Some(category) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category);
        }
        if let Some(featured) = filter.featured {
            qb.push(" AND is_featured = ").push_bind(featured);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR description ILIKE ").push_bind(pattern).push(")");
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build_query_as::<ProductRow>().fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_cart(&self, user_id: Uuid) -> CoreResult<Vec<CartItem>> {
        let rows: Vec<(Uuid, Uuid, Uuid, i32, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, product_id, quantity, created_at FROM cart_items WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, product_id, quantity, created_at)| CartItem { id, user_id, product_id, quantity, created_at })
            .collect())
    }

    async fn save_cart_item(&self, item: &CartItem) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("cart item", item_id));
        }
        Ok(())
    }

    async fn create_coupon(&self, coupon: &Coupon) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons
                (id, code, description, discount_type, discount_value, minimum_amount,
                 usage_limit, used_count, is_active, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(to_text(&coupon.discount_type))
        .bind(coupon.discount_value)
        .bind(coupon.minimum_amount)
        .bind(coupon.usage_limit)
        .bind(coupon.used_count)
        .bind(coupon.is_active)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> CoreResult<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn list_coupons(&self) -> CoreResult<Vec<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY valid_from DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Coupon::try_from)
            .collect()
    }

    async fn place_orders(&self, user_id: Uuid, orders: &[PlacedOrder]) -> CoreResult<()> {
        let mut wanted: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in orders.iter().flat_map(|o| &o.items) {
            *wanted.entry(item.product_id).or_default() += item.quantity;
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Product ids in sorted order so concurrent checkouts lock rows the same way.
        for (product_id, quantity) in &wanted {
            let taken = sqlx::query(
                r#"
                UPDATE products SET stock_quantity = stock_quantity - $2
                WHERE id = $1 AND is_active AND stock_quantity >= $2
                "#,
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if taken.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                let name = orders
                    .iter()
                    .flat_map(|o| &o.items)
                    .find(|i| i.product_id == *product_id)
                    .map_or_else(|| product_id.to_string(), |i| i.product_name.clone());
                return Err(CoreError::Conflict(format!("{} is out of stock", name)));
            }
        }

        if let Some(coupon_id) = orders.iter().find_map(|o| o.order.coupon_id) {
            let used = sqlx::query(
                r#"
                UPDATE coupons SET used_count = used_count + 1
                WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
                "#,
            )
            .bind(coupon_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if used.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(CoreError::Conflict("Coupon has reached its usage limit".into()));
            }
        }

        for placed in orders {
            let order = &placed.order;
            sqlx::query(
                r#"
                INSERT INTO orders
                    (id, order_number, user_id, store_id, status, payment_method, payment_status,
                     subtotal, discount, total, coupon_id, shipping_address, billing_address, phone,
                     email, notes, commission_processed, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                "#,
            )
            .bind(order.id)
            .bind(&order.order_number)
            .bind(order.user_id)
            .bind(order.store_id)
            .bind(order.status.to_string())
            .bind(to_text(&order.payment_method))
            .bind(to_text(&order.payment_status))
            .bind(order.subtotal)
            .bind(order.discount)
            .bind(order.total)
            .bind(order.coupon_id)
            .bind(&order.shipping.shipping_address)
            .bind(&order.shipping.billing_address)
            .bind(&order.shipping.phone)
            .bind(&order.shipping.email)
            .bind(&order.shipping.notes)
            .bind(order.commission_processed)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            for item in &placed.items {
                sqlx::query(
                    r#"
                    INSERT INTO order_items (id, order_id, product_id, store_id, product_name, quantity, price, total)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(item.id)
                .bind(item.order_id)
                .bind(item.product_id)
                .bind(item.store_id)
                .bind(&item.product_name)
                .bind(item.quantity)
                .bind(item.price)
                .bind(item.total)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Order::try_from)
            .transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM orders WHERE TRUE");
        if let Some(user) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user);
        }
        if let Some(stores) = &filter.store_ids {
            qb.push(" AND store_id = ANY(").push_bind(stores.clone()).push(")");
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(payment) = filter.payment_status {
            qb.push(" AND payment_status = ").push_bind(to_text(&payment));
        }
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1 AND status = $5",
        )
        .bind(order.id)
        .bind(order.status.to_string())
        .bind(to_text(&order.payment_status))
        .bind(order.updated_at)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get_order(order.id).await? {
            Some(current) => Err(CoreError::Conflict(format!(
                "Order status changed to {} in the meantime",
                current.status
            ))),
            None => Err(CoreError::not_found("order", order.id)),
        }
    }

    async fn settle_order(&self, order_id: Uuid, credits: &[Credit]) -> CoreResult<Option<Vec<WalletTransaction>>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let flagged = sqlx::query("UPDATE orders SET commission_processed = TRUE WHERE id = $1 AND NOT commission_processed")
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if flagged.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
            tx.rollback().await.map_err(db_err)?;
            if !exists {
                return Err(CoreError::not_found("order", order_id));
            }
            return Ok(None);
        }

        let transactions = ledger::apply_credits(&mut tx, credits, Utc::now()).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(transactions))
    }

    async fn has_delivered_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM order_items i JOIN orders o ON o.id = i.order_id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = 'delivered'
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn create_review(&self, review: &Review) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_reviews
                (id, user_id, product_id, rating, title, comment, is_verified_purchase, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.product_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_verified_purchase)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE product_reviews SET rating = $2, title = $3, comment = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(review.id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("review", review.id));
        }
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>("SELECT * FROM product_reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Review::from))
    }

    async fn list_reviews(&self, product_id: Uuid) -> CoreResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT * FROM product_reviews WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn delete_review(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM product_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("review", id));
        }
        Ok(())
    }

    async fn list_wishlist(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>> {
        let rows = sqlx::query_as::<_, WishlistRow>(
            "SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(WishlistItem::from).collect())
    }

    async fn add_wishlist_item(&self, item: &WishlistItem) -> CoreResult<(WishlistItem, bool)> {
        let inserted = sqlx::query_as::<_, WishlistRow>(
            r#"
            INSERT INTO wishlist_items (id, user_id, product_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.product_id)
        .bind(item.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(row) = inserted {
            return Ok((row.into(), true));
        }

        let existing = sqlx::query_as::<_, WishlistRow>(
            "SELECT * FROM wishlist_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(item.user_id)
        .bind(item.product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok((existing.into(), false))
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("wishlist item for product", product_id));
        }
        Ok(())
    }
}
