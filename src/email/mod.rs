//! Outbound decision emails: the provider client, ticket coupons and the
//! dispatcher that ties them to submissions.

pub mod coupon;
pub mod dispatch;
pub mod provider;

pub use coupon::{Coupon, CouponIssuer, CouponRequest, LocalCouponIssuer};
pub use dispatch::{Dispatcher, EmailSettings, ScheduleOptions};
pub use provider::{DryRunProvider, EmailProvider, OutboundEmail, ResendClient};
