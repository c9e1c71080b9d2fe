use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Dialing prefixes the platform accepts, with the country each one implies.
const COUNTRIES: &[(&str, &str)] = &[("+977", "Nepal"), ("+91", "India")];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub country_code: String,
    pub country: String,
    pub is_merchant: bool,
    pub is_driver: bool,
    pub is_admin: bool,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    pub country: Option<String>,
}

fn default_country_code() -> String {
    "+91".to_string()
}

impl User {
    /// Build and validate a fresh customer account.
    pub fn register(new: NewUser) -> CoreResult<Self> {
        let country = match new.country {
            Some(country) => country,
            None => country_for_code(&new.country_code)
                .ok_or_else(|| CoreError::ValidationError(format!("Unsupported country code {}", new.country_code)))?
                .to_string(),
        };

        let user = Self {
            id: Uuid::new_v4(),
            phone: new.phone.trim().to_string(),
            name: new.name.trim().to_string(),
            email: new.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()),
            country_code: new.country_code,
            country,
            is_merchant: false,
            is_driver: false,
            is_admin: false,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.phone.is_empty() {
            return Err(CoreError::ValidationError("The phone field must be set".into()));
        }
        if self.name.is_empty() {
            return Err(CoreError::ValidationError("The name field must be set".into()));
        }
        match country_for_code(&self.country_code) {
            Some(expected) if expected == self.country => {}
            Some(expected) => {
                return Err(CoreError::ValidationError(format!(
                    "Country must be {} when country code is {}",
                    expected, self.country_code
                )))
            }
            None => {
                return Err(CoreError::ValidationError(format!(
                    "Unsupported country code {}",
                    self.country_code
                )))
            }
        }
        if self.is_merchant && self.is_driver {
            return Err(CoreError::ValidationError(
                "User cannot be both merchant and driver at the same time".into(),
            ));
        }
        Ok(())
    }
}

pub fn country_for_code(code: &str) -> Option<&'static str> {
    COUNTRIES.iter().find(|(c, _)| *c == code).map(|(_, country)| *country)
}

/// A named stop used by travel routes and taxi trips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(code: &str, country: Option<&str>) -> NewUser {
        NewUser {
            phone: "9800000001".into(),
            name: "Sita".into(),
            email: Some(" Sita@Example.com ".into()),
            country_code: code.into(),
            country: country.map(String::from),
        }
    }

    #[test]
    fn test_register_infers_country() {
        let user = User::register(new_user("+977", None)).unwrap();
        assert_eq!(user.country, "Nepal");
        assert_eq!(user.email.as_deref(), Some("sita@example.com"));
        assert_eq!(user.balance, Decimal::ZERO);
    }

    #[test]
    fn test_country_must_match_code() {
        let result = User::register(new_user("+91", Some("Nepal")));
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_merchant_and_driver_are_exclusive() {
        let mut user = User::register(new_user("+91", None)).unwrap();
        user.is_merchant = true;
        user.is_driver = true;
        assert!(user.validate().is_err());
    }
}
