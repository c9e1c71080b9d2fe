use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a sensitive value so it never leaks through `{:?}` or `{}` in log
/// macros. Serialization still writes the real value; API payloads need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

/// Phone numbers in logs keep only their last four digits.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_debug_hides_value() {
        let phone = Masked("9800000000".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"9800000000\"");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("9812345678"), "******5678");
        assert_eq!(mask_phone("123"), "***");
    }
}
