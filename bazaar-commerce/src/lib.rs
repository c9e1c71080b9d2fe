pub mod checkout;
pub mod coupon;
pub mod manager;
pub mod models;
pub mod repository;
pub mod review;
pub mod service;
pub mod settlement;

pub use checkout::{CartLine, CartView, CheckoutRequest};
pub use manager::OrderManager;
pub use models::{
    CartItem, Category, Coupon, DiscountType, Order, OrderItem, OrderPaymentStatus, OrderStatus, PaymentMethod,
    PlacedOrder, Product, ShippingDetails, Store,
};
pub use repository::{CommerceRepository, OrderFilter, ProductFilter};
pub use review::{Review, ReviewInput, WishlistEntry, WishlistItem};
pub use service::CommerceService;
pub use settlement::{Settlement, Split};

use bazaar_core::CoreError;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum CommerceError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Product {0} is not available")]
    ProductUnavailable(String),
    #[error("Only {available} of {product} left in stock, {requested} requested")]
    InsufficientStock { product: String, available: i32, requested: i32 },
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Coupon {0} is invalid or expired")]
    InvalidCoupon(String),
    #[error("Minimum order amount of {0} required for this coupon")]
    CouponMinimum(Decimal),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order with status \"{0}\" cannot be cancelled. Only pending or confirmed orders can be cancelled.")]
    NotCancellable(OrderStatus),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Only merchants can manage stores")]
    NotMerchant,
    #[error("Store belongs to another merchant")]
    ForeignStore,
    #[error("Invalid review: {0}")]
    InvalidReview(String),
    #[error("You have already reviewed this product")]
    DuplicateReview,
    #[error("Review belongs to another user")]
    ForeignReview,
}

impl From<CommerceError> for CoreError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::NotMerchant | CommerceError::ForeignStore | CommerceError::ForeignReview => {
                CoreError::Forbidden(err.to_string())
            }
            CommerceError::DuplicateReview => CoreError::Conflict(err.to_string()),
            _ => CoreError::ValidationError(err.to_string()),
        }
    }
}

pub type CommerceResult<T> = Result<T, CommerceError>;
