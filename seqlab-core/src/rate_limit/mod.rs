//! Request throttling against a rate-limited data source.

pub mod clock;
pub mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitExceeded, RateLimitPolicy, RateLimiter, Window};
