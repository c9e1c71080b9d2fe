use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_shared::{percent_of, round_money};

use crate::models::{Coupon, DiscountType};
use crate::{CommerceError, CommerceResult};

impl Coupon {
    /// Active, inside its validity window, and under its usage limit.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && now <= self.valid_until
            && self.usage_limit.map_or(true, |limit| self.used_count < limit)
    }

    /// The discount this coupon gives on `subtotal`, never more than the subtotal.
    pub fn discount_for(&self, subtotal: Decimal, now: DateTime<Utc>) -> CommerceResult<Decimal> {
        if !self.is_valid(now) {
            return Err(CommerceError::InvalidCoupon(self.code.clone()));
        }
        if subtotal < self.minimum_amount {
            return Err(CommerceError::CouponMinimum(round_money(self.minimum_amount)));
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => percent_of(subtotal, self.discount_value),
            DiscountType::Fixed => self.discount_value,
        };
        Ok(round_money(raw.min(subtotal).max(Decimal::ZERO)))
    }
}

/// Coupon codes are matched case-insensitively and stored upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(kind: DiscountType, value: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            description: String::new(),
            discount_type: kind,
            discount_value: value,
            minimum_amount: dec!(100),
            usage_limit: Some(2),
            used_count: 0,
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(DiscountType::Percentage, dec!(12.5));
        assert_eq!(c.discount_for(dec!(250.10), Utc::now()).unwrap(), dec!(31.26));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let mut c = coupon(DiscountType::Fixed, dec!(500));
        c.minimum_amount = Decimal::ZERO;
        assert_eq!(c.discount_for(dec!(120), Utc::now()).unwrap(), dec!(120.00));
    }

    #[test]
    fn test_minimum_amount() {
        let c = coupon(DiscountType::Fixed, dec!(20));
        assert!(matches!(
            c.discount_for(dec!(99.99), Utc::now()),
            Err(CommerceError::CouponMinimum(_))
        ));
    }

    #[test]
    fn test_validity() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Fixed, dec!(20));
        assert!(c.is_valid(now));

        c.used_count = 2;
        assert!(!c.is_valid(now));

        c.used_count = 0;
        c.usage_limit = None;
        assert!(c.is_valid(now));
        assert!(!c.is_valid(now + Duration::days(2)));

        c.is_active = false;
        assert!(matches!(c.discount_for(dec!(200), now), Err(CommerceError::InvalidCoupon(_))));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }
}
