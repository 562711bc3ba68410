//! Application Services
//!
//! Services that enforce exchange policy independent of the transport.
//!
//! - `RateLimiter`: Connection-attempt admission and control-message throttling
//! - `RateLimitResetTask`: Periodic full reset of tracked attempts

pub mod rate_limiter;

pub use rate_limiter::{RateLimitConfig, RateLimitResetTask, RateLimiter, SharedRateLimiter};
