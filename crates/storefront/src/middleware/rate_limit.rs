//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Public write endpoints (orders, quotes, returns, warranties and coupon
//! checks) share one per-IP limiter of about 30 requests per minute.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor that reads the client IP from proxy headers.
///
/// Checks `CF-Connecting-IP`, then the first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then `Fly-Client-IP`.
#[derive(Clone, Copy)]
pub struct CloudflareIpKeyExtractor;

const IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

impl tower_governor::key_extractor::KeyExtractor for CloudflareIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        IP_HEADERS
            .iter()
            .find_map(|name| {
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<CloudflareIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// The limiter settings were rejected.
#[derive(Debug, thiserror::Error)]
#[error("invalid rate limiter configuration")]
pub struct InvalidRateLimit;

/// Limiter for public write endpoints: one token every 2 seconds, burst of 10.
///
/// # Errors
///
/// Returns [`InvalidRateLimit`] if governor rejects the settings.
pub fn write_rate_limiter() -> Result<RateLimiterLayer, InvalidRateLimit> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(CloudflareIpKeyExtractor)
        .per_second(2)
        .burst_size(10)
        .finish()
        .ok_or(InvalidRateLimit)?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        let ip = CloudflareIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[test]
    fn test_takes_first_forwarded_entry() {
        let req = request(&[("x-forwarded-for", "198.51.100.2, 10.0.0.1")]);
        let ip = CloudflareIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.2");
    }

    #[test]
    fn test_missing_headers_rejected() {
        let req = request(&[]);
        assert!(CloudflareIpKeyExtractor.extract(&req).is_err());
    }

    #[test]
    fn test_limiter_builds() {
        assert!(write_rate_limiter().is_ok());
    }
}
