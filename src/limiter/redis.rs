//! Redis-backed sliding window: a sorted set per `(scope, key)`, scored by
//! event timestamp. `ZREMRANGEBYSCORE` evicts everything older than the
//! window on every access, so cap enforcement is correct to within ±1
//! at the window boundary, with no separate sweep job —
//! the `EXPIRE` on the key is just a backstop so an abandoned key doesn't
//! linger forever.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::{Decision, Limiter, LimiterError, Scope};

/// Spec §5 budget for a single limiter round-trip.
const LIMITER_TIMEOUT: Duration = Duration::from_secs(1);

/// Bounds a limiter call to `LIMITER_TIMEOUT` so an unresponsive cache fails
/// closed quickly rather than blocking a request handler indefinitely.
async fn with_deadline<T, F>(fut: F) -> Result<T, LimiterError>
where
    F: Future<Output = Result<T, LimiterError>>,
{
    match tokio::time::timeout(LIMITER_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(LimiterError::Unavailable(
            "rate limit store timed out".to_string(),
        )),
    }
}

pub struct RedisLimiter {
    conn: ConnectionManager,
    cap_ip: u32,
    cap_address: u32,
    window: Duration,
}

impl RedisLimiter {
    pub async fn connect(
        redis_url: &str,
        cap_ip: u32,
        cap_address: u32,
        window: Duration,
    ) -> Result<Self, LimiterError> {
        let client =
            Client::open(redis_url).map_err(|e| LimiterError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LimiterError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn,
            cap_ip,
            cap_address,
            window,
        })
    }

    fn key(scope: Scope, value: &str) -> String {
        format!("faucet:ratelimit:{}:{value}", scope.tag())
    }

    async fn count_in_window(&self, scope: Scope, value: &str) -> Result<u32, LimiterError> {
        with_deadline(async {
            let mut conn = self.conn.clone();
            let key = Self::key(scope, value);
            let now = now_millis();
            let window_start = now.saturating_sub(self.window.as_millis() as u64);

            let _: () = conn
                .zrembyscore(&key, 0, window_start as isize)
                .await
                .map_err(|e| LimiterError::Unavailable(e.to_string()))?;
            let count: u32 = conn
                .zcard(&key)
                .await
                .map_err(|e| LimiterError::Unavailable(e.to_string()))?;
            Ok(count)
        })
        .await
    }

    async fn record_one(&self, scope: Scope, value: &str) -> Result<(), LimiterError> {
        with_deadline(async {
            let mut conn = self.conn.clone();
            let key = Self::key(scope, value);
            let now = now_millis();
            let member = format!("{now}-{}", uuid::Uuid::new_v4());

            let _: () = conn
                .zadd(&key, member, now as f64)
                .await
                .map_err(|e| LimiterError::Unavailable(e.to_string()))?;
            let _: () = conn
                .expire(&key, self.window.as_secs() as i64)
                .await
                .map_err(|e| LimiterError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[async_trait]
impl Limiter for RedisLimiter {
    async fn check(&self, ip: &str, recipient: &str) -> Result<Decision, LimiterError> {
        let ip_count = self.count_in_window(Scope::Ip, ip).await?;
        let addr_count = self.count_in_window(Scope::Address, recipient).await?;

        if ip_count >= self.cap_ip || addr_count >= self.cap_address {
            return Ok(Decision::Denied {
                retry_after: self.window,
            });
        }
        Ok(Decision::Allowed)
    }

    async fn record(&self, ip: &str, recipient: &str) -> Result<(), LimiterError> {
        self.record_one(Scope::Ip, ip).await?;
        self.record_one(Scope::Address, recipient).await?;
        Ok(())
    }
}
