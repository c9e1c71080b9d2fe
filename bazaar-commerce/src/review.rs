use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Product;
use crate::{CommerceError, CommerceResult};

/// One review per user and product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i16,
    pub title: String,
    pub comment: String,
    /// Set from the reviewer's delivered orders, never from the request.
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i16,
    #[serde(default)]
    pub title: String,
    pub comment: String,
}

impl ReviewInput {
    pub fn validate(&self) -> CommerceResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(CommerceError::InvalidReview("Rating must be between 1 and 5".into()));
        }
        if self.comment.trim().is_empty() {
            return Err(CommerceError::InvalidReview("Comment is required".into()));
        }
        Ok(())
    }
}

impl Review {
    pub fn new(user_id: Uuid, product_id: Uuid, input: ReviewInput, verified: bool) -> CommerceResult<Self> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            rating: input.rating,
            title: input.title.trim().to_string(),
            comment: input.comment.trim().to_string(),
            is_verified_purchase: verified,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn revise(&mut self, input: ReviewInput) -> CommerceResult<()> {
        input.validate()?;
        self.rating = input.rating;
        self.title = input.title.trim().to_string();
        self.comment = input.comment.trim().to_string();
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistEntry {
    #[serde(flatten)]
    pub item: WishlistItem,
    pub product: Product,
}
