use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use crate::error::Result;

pub const DEFAULT_DISCOUNT_PERCENT: i32 = 20;
pub const MIN_DISCOUNT_PERCENT: i32 = 10;
pub const MAX_DISCOUNT_PERCENT: i32 = 80;
pub const DEFAULT_VALID_DAYS: i64 = 14;
pub const MIN_VALID_DAYS: i64 = 1;
pub const MAX_VALID_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponRequest {
    pub percent_off: i32,
    pub valid_days: i64,
}

impl CouponRequest {
    /// Missing values take the defaults; out-of-range values are clamped.
    pub fn clamped(percent_off: Option<i32>, valid_days: Option<i64>) -> Self {
        Self {
            percent_off: percent_off
                .unwrap_or(DEFAULT_DISCOUNT_PERCENT)
                .clamp(MIN_DISCOUNT_PERCENT, MAX_DISCOUNT_PERCENT),
            valid_days: valid_days
                .unwrap_or(DEFAULT_VALID_DAYS)
                .clamp(MIN_VALID_DAYS, MAX_VALID_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coupon {
    pub code: String,
    pub percent_off: i32,
    pub expires_at: DateTime<Utc>,
}

/// Mints ticket discount codes offered alongside rejection emails.
#[async_trait]
pub trait CouponIssuer: Send + Sync {
    async fn issue(&self, request: CouponRequest, recipient_email: &str) -> Result<Coupon>;
}

/// Issues random codes without contacting a ticketing system.
#[derive(Debug, Default, Clone)]
pub struct LocalCouponIssuer;

fn generate_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("CFP-{}", suffix.to_uppercase())
}

#[async_trait]
impl CouponIssuer for LocalCouponIssuer {
    async fn issue(&self, request: CouponRequest, _recipient_email: &str) -> Result<Coupon> {
        Ok(Coupon {
            code: generate_code(),
            percent_off: request.percent_off,
            expires_at: Utc::now() + Duration::days(request.valid_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(
            CouponRequest::clamped(None, None),
            CouponRequest {
                percent_off: 20,
                valid_days: 14
            }
        );
    }

    #[test]
    fn values_are_clamped_into_range() {
        assert_eq!(CouponRequest::clamped(Some(5), Some(0)).percent_off, 10);
        assert_eq!(CouponRequest::clamped(Some(5), Some(0)).valid_days, 1);
        assert_eq!(CouponRequest::clamped(Some(95), Some(90)).percent_off, 80);
        assert_eq!(CouponRequest::clamped(Some(95), Some(90)).valid_days, 30);
        assert_eq!(
            CouponRequest::clamped(Some(35), Some(7)),
            CouponRequest {
                percent_off: 35,
                valid_days: 7
            }
        );
    }

    #[tokio::test]
    async fn local_codes_have_expected_shape() {
        let coupon = LocalCouponIssuer
            .issue(CouponRequest::clamped(None, Some(3)), "ada@example.com")
            .await
            .unwrap();
        assert!(coupon.code.starts_with("CFP-"));
        assert_eq!(coupon.code.len(), 12);
        assert!(coupon.code[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        let days = (coupon.expires_at - Utc::now()).num_hours();
        assert!((71..=72).contains(&days));
    }
}
