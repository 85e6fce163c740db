//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Per-IP limiters for the public API:
//! - `checkout_rate_limiter`: placing orders (~10/min)
//! - `shipping_rate_limiter`: carrier quotes and agency lookups (~60/min)
//! - `api_rate_limiter`: everything else (~100/min)
//!
//! Rejections are rendered through [`AppError`], so clients get the same
//! JSON envelope as every other error.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderValue, Request, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Proxy headers carrying the client IP, most trusted first.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Key extractor that reads the client IP from proxy headers, falling back
/// to the peer address when the request did not come through a proxy.
///
/// For `X-Forwarded-For` the first address in the chain is used. The peer
/// address is only available when the server is started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// The client IP from the first proxy header that carries a valid one.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Render a limiter rejection as an [`AppError`] response.
fn rejection_response(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::debug!(wait_time, "Rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(wait_time));
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("No client address for rate limiting".to_string()).into_response()
        }
        GovernorError::Other { code, msg, .. } => AppError::Internal(format!(
            "Rate limiter error ({code}): {}",
            msg.unwrap_or_default()
        ))
        .into_response(),
    }
}

/// One token every `period_secs` seconds, bursts of `burst`.
///
/// # Panics
///
/// Panics if either argument is zero. Callers in this module only pass
/// positive constants.
fn limiter(period_secs: u64, burst: u32) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(period_secs)
        .burst_size(burst)
        .finish()
        .expect("rate limiter config with positive period and burst is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rejection_response)
}

/// Checkout: 1 request every 6 seconds, burst of 5.
#[must_use]
pub fn checkout_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5)
}

/// Shipping quotes and agency lookups: 1 request per second, burst of 20.
#[must_use]
pub fn shipping_rate_limiter() -> RateLimiterLayer {
    limiter(1, 20)
}

/// General API: 1 request per second, burst of 50.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(1, 50)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::post};
    use tower::ServiceExt;
    use tower_governor::key_extractor::KeyExtractor;

    #[test]
    fn test_cloudflare_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "198.51.100.4".parse().ok());
    }

    #[test]
    fn test_garbage_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(client_ip(&headers), "2001:db8::1".parse().ok());

        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_peer_address_used_without_proxy_headers() {
        let peer: SocketAddr = "192.0.2.33:51234".parse().unwrap();
        let mut request = Request::new(());
        request.extensions_mut().insert(ConnectInfo(peer));

        let key = ProxyIpKeyExtractor.extract(&request).unwrap();
        assert_eq!(key, peer.ip());

        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4"));
        let key = ProxyIpKeyExtractor.extract(&request).unwrap();
        assert_eq!(key, "198.51.100.4".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_no_address_at_all_is_an_error() {
        let request = Request::new(());
        assert!(ProxyIpKeyExtractor.extract(&request).is_err());
    }

    #[tokio::test]
    async fn test_over_limit_gets_json_envelope() {
        let app = Router::new()
            .route("/checkout", post(|| async { "ok" }))
            .layer(checkout_rate_limiter());
        let peer: SocketAddr = "192.0.2.50:40000".parse().unwrap();
        let request = || {
            let mut request = Request::builder()
                .method("POST")
                .uri("/checkout")
                .body(Body::empty())
                .unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));
            request
        };

        for _ in 0..5 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "rate_limited");
    }
}
