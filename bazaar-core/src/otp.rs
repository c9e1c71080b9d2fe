use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use bazaar_shared::mask_phone;
use crate::CoreResult;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub phone: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn issue(phone: &str, now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..OTP_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();

        Self {
            phone: phone.to_string(),
            code,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn verify(&self, code: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.code == code.trim()
    }
}

/// Delivery channel for one-time codes. SMS providers plug in here.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, challenge: &OtpChallenge) -> CoreResult<()>;
}

/// Records that a code went out without revealing it.
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, challenge: &OtpChallenge) -> CoreResult<()> {
        tracing::info!(
            phone = %mask_phone(&challenge.phone),
            expires_at = %challenge.expires_at,
            "OTP issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_shape() {
        let now = Utc::now();
        let otp = OtpChallenge::issue("9800000000", now);
        assert_eq!(otp.code.len(), OTP_LENGTH);
        assert!(otp.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(otp.expires_at - now, Duration::minutes(OTP_TTL_MINUTES));
    }

    #[test]
    fn test_verify_rejects_expired_and_wrong_codes() {
        let now = Utc::now();
        let otp = OtpChallenge::issue("9800000000", now);
        let code = otp.code.clone();

        assert!(otp.verify(&code, now));
        assert!(!otp.verify("xxxxxx", now));
        assert!(!otp.verify(&code, now + Duration::minutes(OTP_TTL_MINUTES + 1)));
    }
}
