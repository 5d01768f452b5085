/// Per-IP rate limiting
///
/// Two keyed limiters: a global budget over every route and a stricter one
/// on sign-in. Client identity comes from X-Forwarded-For when present,
/// otherwise the socket address.
use crate::config::RateLimitConfig;
use crate::context::AppContext;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub struct RateLimiters {
    enabled: bool,
    global: KeyedLimiter,
    sign_in: KeyedLimiter,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            global: RateLimiter::keyed(quota(config.global_requests, config.global_window_secs)),
            sign_in: RateLimiter::keyed(quota(
                config.sign_in_requests,
                config.sign_in_window_secs,
            )),
        }
    }

    pub fn check_global(&self, ip: IpAddr) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        self.global.check_key(&ip).map_err(|_| {
            tracing::warn!(%ip, "global rate limit exceeded");
            ApiError::RateLimitExceeded
        })
    }

    pub fn check_sign_in(&self, ip: IpAddr) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        self.sign_in.check_key(&ip).map_err(|_| {
            tracing::warn!(%ip, "sign-in rate limit exceeded");
            ApiError::RateLimitExceeded
        })
    }
}

/// Budget of `requests` over `window_secs`, spendable in one burst
fn quota(requests: u32, window_secs: u64) -> Quota {
    let requests = NonZeroU32::new(requests.max(1)).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs(window_secs.max(1)) / requests.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(requests))
        .allow_burst(requests)
}

/// Resolve the client IP, preferring the first X-Forwarded-For hop
pub fn client_ip(headers: &HeaderMap, fallback: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| fallback.ip())
}

/// Middleware applying the global budget to every request
pub async fn global_rate_limit(
    State(ctx): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(request.headers(), addr);
    ctx.rate_limiters.check_global(ip)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sign_in_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            global_requests: 100,
            global_window_secs: 900,
            sign_in_requests,
            sign_in_window_secs: 3600,
        }
    }

    #[test]
    fn test_burst_then_rejection() {
        let limiters = RateLimiters::new(&config(3));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiters.check_sign_in(ip).is_ok());
        }
        assert!(matches!(
            limiters.check_sign_in(ip),
            Err(ApiError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_limits_are_per_ip() {
        let limiters = RateLimiters::new(&config(1));
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiters.check_sign_in(first).is_ok());
        assert!(limiters.check_sign_in(first).is_err());
        assert!(limiters.check_sign_in(second).is_ok());
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let mut config = config(1);
        config.enabled = false;
        let limiters = RateLimiters::new(&config);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..10 {
            assert!(limiters.check_sign_in(ip).is_ok());
        }
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let fallback: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(
            client_ip(&headers, fallback),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );

        assert_eq!(
            client_ip(&HeaderMap::new(), fallback),
            "127.0.0.1".parse::<IpAddr>().unwrap()
        );
    }
}
