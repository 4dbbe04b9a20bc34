use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Fixed-window request counters.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// `Err(AppError::RateLimited)` once either the IP or the email exceeds its
    /// budget for the current window.
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()>;
}

/// Atomic INCR that starts the window on the first hit. Also repairs keys
/// left without a TTL.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

const KEY_PREFIX: &str = "taskpro:rate";

#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    window_secs: u64,
    max_per_ip: u64,
    max_per_email: u64,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(
        redis_url: &str,
        window_secs: u64,
        max_per_ip: u64,
        max_per_email: u64,
    ) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            window_secs,
            max_per_ip,
            max_per_email,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
        })
    }

    async fn hit(&self, conn: &mut ConnectionManager, key: &str, limit: u64) -> AppResult<()> {
        let current: u64 = self
            .script
            .key(key)
            .arg(self.window_secs)
            .invoke_async(conn)
            .await
            .map_err(|e| AppError::Internal(format!("rate limiter: {e}")))?;

        if current > limit {
            tracing::warn!(key, current, limit, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        self.hit(&mut conn, &ip_key(ip), self.max_per_ip).await?;

        if let Some(email) = email {
            self.hit(&mut conn, &email_key(email), self.max_per_email)
                .await?;
        }
        Ok(())
    }
}

fn ip_key(ip: &str) -> String {
    format!("{KEY_PREFIX}:ip:{ip}")
}

/// Addresses differing only in case or surrounding space share one budget.
fn email_key(email: &str) -> String {
    format!("{KEY_PREFIX}:email:{}", email.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_dimension() {
        assert_eq!(ip_key("203.0.113.7"), "taskpro:rate:ip:203.0.113.7");
        assert_eq!(email_key("a@example.com"), "taskpro:rate:email:a@example.com");
        assert_ne!(ip_key("x"), email_key("x"));
    }

    #[test]
    fn email_key_ignores_case_and_padding() {
        assert_eq!(email_key("  Dana@Example.COM "), email_key("dana@example.com"));
    }
}
