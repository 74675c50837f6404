//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use innovai_common::{
    config::RateLimitConfig,
    errors::{AppError, Result},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter plus the configured rate, reported on rejection
pub struct RateLimit {
    limiter: GlobalRateLimiter,
    requests_per_second: u32,
}

/// Create a new rate limiter
pub fn create_rate_limiter(config: &RateLimitConfig) -> Result<Arc<RateLimit>> {
    let per_second = non_zero(config.requests_per_second, "rate_limit.requests_per_second")?;
    let burst = non_zero(config.burst, "rate_limit.burst")?;
    let quota = Quota::per_second(per_second).allow_burst(burst);

    Ok(Arc::new(RateLimit {
        limiter: RateLimiter::direct(quota),
        requests_per_second: config.requests_per_second,
    }))
}

fn non_zero(value: u32, field: &str) -> Result<NonZeroU32> {
    NonZeroU32::new(value).ok_or_else(|| AppError::Configuration {
        message: format!("{} must be greater than zero", field),
    })
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limit): State<Arc<RateLimit>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    match limit.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: limit.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limit = create_rate_limiter(&RateLimitConfig::default()).unwrap();
        assert!(limit.limiter.check().is_ok());
    }

    #[test]
    fn test_burst_is_enforced() {
        let config = RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        };
        let limit = create_rate_limiter(&config).unwrap();
        assert!(limit.limiter.check().is_ok());
        assert!(limit.limiter.check().is_ok());
        assert!(limit.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let config = RateLimitConfig {
            requests_per_second: 0,
            burst: 10,
            enabled: true,
        };
        assert!(matches!(
            create_rate_limiter(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
