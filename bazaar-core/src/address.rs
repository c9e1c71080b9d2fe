use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A saved delivery address. At most one per user is the default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub title: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    pub fn new(user_id: Uuid, input: AddressInput) -> CoreResult<Self> {
        let now = Utc::now();
        let mut address = Self {
            id: Uuid::new_v4(),
            user_id,
            title: String::new(),
            full_name: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            latitude: None,
            longitude: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        address.apply(input)?;
        Ok(address)
    }

    /// Replace every editable field, keeping identity and creation time.
    pub fn apply(&mut self, input: AddressInput) -> CoreResult<()> {
        self.title = input.title.trim().to_string();
        self.full_name = input.full_name.trim().to_string();
        self.phone = input.phone.trim().to_string();
        self.address = input.address.trim().to_string();
        self.city = input.city.trim().to_string();
        self.state = input.state.trim().to_string();
        self.zip_code = input.zip_code.trim().to_string();
        self.latitude = input.latitude;
        self.longitude = input.longitude;
        self.is_default = input.is_default;
        self.updated_at = Utc::now();
        self.validate()
    }

    fn validate(&self) -> CoreResult<()> {
        let required = [
            ("title", &self.title),
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(CoreError::ValidationError(format!("The {} field must be set", field)));
        }
        if self.latitude.is_some_and(|lat| lat.abs() > Decimal::from(90)) {
            return Err(CoreError::ValidationError("Latitude must be between -90 and 90".into()));
        }
        if self.longitude.is_some_and(|lng| lng.abs() > Decimal::from(180)) {
            return Err(CoreError::ValidationError("Longitude must be between -180 and 180".into()));
        }
        Ok(())
    }
}

/// Default address first, then newest.
pub fn sort_addresses(addresses: &mut [Address]) {
    addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(b.created_at.cmp(&a.created_at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn input() -> AddressInput {
        AddressInput {
            title: "Home".into(),
            full_name: " Sita Sharma ".into(),
            phone: "9800000001".into(),
            address: "Ward 4, Lakeside".into(),
            city: "Pokhara".into(),
            state: "Gandaki".into(),
            zip_code: "33700".into(),
            latitude: Some(dec!(28.2096)),
            longitude: Some(dec!(83.9856)),
            is_default: false,
        }
    }

    #[test]
    fn test_new_address_trims_and_validates() {
        let address = Address::new(Uuid::new_v4(), input()).unwrap();
        assert_eq!(address.full_name, "Sita Sharma");

        let mut blank = input();
        blank.city = "  ".into();
        assert!(matches!(Address::new(Uuid::new_v4(), blank), Err(CoreError::ValidationError(_))));

        let mut off_map = input();
        off_map.latitude = Some(dec!(91));
        assert!(Address::new(Uuid::new_v4(), off_map).is_err());
    }

    #[test]
    fn test_default_sorts_first() {
        let user = Uuid::new_v4();
        let mut old_default = Address::new(user, AddressInput { is_default: true, ..input() }).unwrap();
        old_default.created_at -= Duration::days(3);
        let newer = Address::new(user, input()).unwrap();
        let mut oldest = Address::new(user, input()).unwrap();
        oldest.created_at -= Duration::days(5);

        let mut all = vec![oldest.clone(), newer.clone(), old_default.clone()];
        sort_addresses(&mut all);
        let ids: Vec<Uuid> = all.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![old_default.id, newer.id, oldest.id]);
    }
}
