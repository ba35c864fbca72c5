//! In-memory sliding-window `Limiter` used by the Dispenser's own tests and
//! by `tests/`. Mirrors the Redis implementation's eviction-on-access
//! approach so the same cap-enforcement behavior is exercised without a
//! real cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Decision, Limiter, LimiterError, Scope};

pub struct FakeLimiter {
    cap_ip: u32,
    cap_address: u32,
    window: Duration,
    events: Mutex<HashMap<String, Vec<Instant>>>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl FakeLimiter {
    pub fn new(cap_ip: u32, cap_address: u32, window: Duration) -> Self {
        Self {
            cap_ip,
            cap_address,
            window,
            events: Mutex::new(HashMap::new()),
            unavailable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn key(scope: Scope, value: &str) -> String {
        format!("{}:{value}", scope.tag())
    }

    fn count_in_window(&self, scope: Scope, value: &str) -> u32 {
        let mut events = self.events.lock().unwrap();
        let key = Self::key(scope, value);
        let now = Instant::now();
        let entry = events.entry(key).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        entry.len() as u32
    }

    fn record_one(&self, scope: Scope, value: &str) {
        let mut events = self.events.lock().unwrap();
        events
            .entry(Self::key(scope, value))
            .or_default()
            .push(Instant::now());
    }
}

#[async_trait]
impl Limiter for FakeLimiter {
    async fn check(&self, ip: &str, recipient: &str) -> Result<Decision, LimiterError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LimiterError::Unavailable("fake limiter down".into()));
        }
        let ip_count = self.count_in_window(Scope::Ip, ip);
        let addr_count = self.count_in_window(Scope::Address, recipient);
        if ip_count >= self.cap_ip || addr_count >= self.cap_address {
            return Ok(Decision::Denied {
                retry_after: self.window,
            });
        }
        Ok(Decision::Allowed)
    }

    async fn record(&self, ip: &str, recipient: &str) -> Result<(), LimiterError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LimiterError::Unavailable("fake limiter down".into()));
        }
        self.record_one(Scope::Ip, ip);
        self.record_one(Scope::Address, recipient);
        Ok(())
    }
}
