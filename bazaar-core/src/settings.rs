use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Platform-wide commission rates and the system account balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Percent of an order subtotal kept by the platform on delivery.
    pub sales_commission: Decimal,
    pub shipping_charge_commission: Decimal,
    pub system_balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            sales_commission: Decimal::TEN,
            shipping_charge_commission: Decimal::TEN,
            system_balance: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub sales_commission: Option<Decimal>,
    pub shipping_charge_commission: Option<Decimal>,
}

impl PlatformSettings {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, value) in [
            ("sales_commission", self.sales_commission),
            ("shipping_charge_commission", self.shipping_charge_commission),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(CoreError::ValidationError(format!(
                    "{} must be between 0 and 100",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, update: SettingsUpdate) -> CoreResult<()> {
        let mut next = self.clone();
        if let Some(v) = update.sales_commission {
            next.sales_commission = v;
        }
        if let Some(v) = update.shipping_charge_commission {
            next.shipping_charge_commission = v;
        }
        next.validate()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_rejects_out_of_range() {
        let mut settings = PlatformSettings::default();
        let result = settings.apply(SettingsUpdate {
            sales_commission: Some(dec!(120)),
            shipping_charge_commission: None,
        });
        assert!(result.is_err());
        assert_eq!(settings.sales_commission, dec!(10));

        settings
            .apply(SettingsUpdate {
                sales_commission: Some(dec!(12.5)),
                shipping_charge_commission: Some(dec!(0)),
            })
            .unwrap();
        assert_eq!(settings.sales_commission, dec!(12.5));
        assert_eq!(settings.shipping_charge_commission, dec!(0));
    }
}
