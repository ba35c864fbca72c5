//! Shared, low-latency store enforcing two independent sliding-window rate
//! limits: one keyed on source IP, one keyed on recipient address.

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use self::redis::RedisLimiter;

#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug)]
pub enum Scope {
    Ip,
    Address,
}

impl Scope {
    fn tag(self) -> &'static str {
        match self {
            Scope::Ip => "ip",
            Scope::Address => "address",
        }
    }
}

/// Result of a `check`: either allowed, or denied with a retry-after hint.
#[derive(Clone, Copy, Debug)]
pub enum Decision {
    Allowed,
    Denied { retry_after: Duration },
}

#[async_trait]
pub trait Limiter: Send + Sync {
    /// Consults both the per-IP and per-address counters. Allowed only if
    /// both are below their configured caps.
    async fn check(&self, ip: &str, recipient: &str) -> Result<Decision, LimiterError>;

    /// Increments both counters, each with TTL equal to the window length.
    /// Must be called after a successful `check` and before broadcast; a
    /// broadcast failure must NOT decrement these counters (prevents
    /// counter-based amplification via repeated failing requests).
    async fn record(&self, ip: &str, recipient: &str) -> Result<(), LimiterError>;
}
