use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Which surface a request hit. Storefront traffic (visitor tracking,
/// invitation links) is counted apart from the merchant dashboard API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Api,
    Storefront,
}

impl RateScope {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/public-api") {
            RateScope::Storefront
        } else {
            RateScope::Api
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RateScope::Api => "api",
            RateScope::Storefront => "storefront",
        }
    }
}

/// Redis key of one budget, e.g. `rate:storefront:ip:203.0.113.7`.
pub fn bucket_key(scope: RateScope, kind: &str, value: &str) -> String {
    format!("rate:{}:{kind}:{}", scope.as_str(), value.trim().to_lowercase())
}

/// Request budget per client.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// Counts one request for `ip`, and for `email` when the caller is a
    /// signed-in merchant. Fails with `AppError::RateLimited` once either
    /// budget of the scope is spent.
    async fn check(&self, scope: RateScope, ip: &str, email: Option<&str>) -> AppResult<()>;
}

/// Atomic INCR that sets the window TTL on first use.
/// Keys left without a TTL get one on their next hit.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
elseif redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

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

    async fn bump(&self, conn: &mut ConnectionManager, key: &str, limit: u64) -> AppResult<()> {
        let current: u64 = self
            .script
            .key(key)
            .arg(self.window_secs)
            .invoke_async(conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "Rate limit counter unavailable");
                AppError::Internal(format!("rate limiter: {e}"))
            })?;

        if current > limit {
            tracing::warn!(key, current, limit, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, scope: RateScope, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        self.bump(&mut conn, &bucket_key(scope, "ip", ip), self.max_per_ip)
            .await?;

        // Storefront visitors are anonymous; only merchants get an email budget.
        if let (RateScope::Api, Some(email)) = (scope, email) {
            self.bump(&mut conn, &bucket_key(scope, "email", email), self.max_per_email)
                .await?;
        }
        Ok(())
    }
}
