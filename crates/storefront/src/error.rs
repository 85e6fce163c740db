//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors from the lower layers
//! are flattened into HTTP-facing variants by the `From` impls below, and
//! rendered as `{"success": false, "error": {"code", "message"}}`. Server
//! and upstream errors are captured to Sentry before responding and never
//! leak their details to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use tienda_core::{CouponError, StockError, StockShortage};
use tienda_correo::CorreoError;

use crate::db::RepositoryError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderServiceError;
use crate::services::payments::PaymentError;
use crate::services::shipping::ShippingError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong admin token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body failed validation; one message per problem.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Coupon cannot be applied.
    #[error("Coupon rejected: {0}")]
    Coupon(#[from] CouponError),

    /// Not enough stock for one or more cart lines.
    #[error("Insufficient stock for {} item(s)", .0.len())]
    OutOfStock(Vec<StockShortage>),

    /// The resource changed underneath the request (stock race, status race).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Carrier or payment provider failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Validation(_) | Self::Coupon(_) => StatusCode::BAD_REQUEST,
            Self::OutOfStock(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal_error",
            Self::Upstream(_) => "upstream_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_error",
            Self::Coupon(_) => "invalid_coupon",
            Self::OutOfStock(_) => "insufficient_stock",
            Self::Conflict(_) => "conflict",
            Self::RateLimited => "rate_limited",
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_) | Self::Upstream(_))
    }

    fn body(&self) -> ErrorBody<'static> {
        // Don't expose internal error details to clients
        let message = match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "External service error, please try again later".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Validation(_) => "Validation failed".to_string(),
            Self::Coupon(err) => err.to_string(),
            Self::OutOfStock(_) => "Not enough stock for some items".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
        };
        let details = match self {
            Self::Validation(errors) => serde_json::to_value(errors).ok(),
            Self::OutOfStock(shortages) => serde_json::to_value(shortages).ok(),
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let envelope = ErrorEnvelope {
            success: false,
            error: self.body(),
        };
        (self.status(), Json(envelope)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Resource".to_string()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

impl From<CorreoError> for AppError {
    fn from(err: CorreoError) -> Self {
        match err {
            CorreoError::Validation(errors) => Self::Validation(errors),
            CorreoError::NotFound(what) => Self::NotFound(what),
            CorreoError::RateLimited(retry_after) => {
                tracing::warn!(retry_after, "Correo API rate limit reached");
                Self::RateLimited
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient(shortages) => Self::OutOfStock(shortages),
            other => Self::Validation(vec![other.to_string()]),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature(msg) => Self::Unauthorized(msg),
            PaymentError::NotConfigured => {
                Self::BadRequest("Online payment is not available".to_string())
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(errors) => Self::Validation(errors),
            CheckoutError::Stock(err) => err.into(),
            CheckoutError::Coupon(err) => Self::Coupon(err),
            CheckoutError::Shipping(err) => err.into(),
            CheckoutError::NoShippingRate => Self::BadRequest(err.to_string()),
            CheckoutError::Payment(err) => err.into(),
            CheckoutError::PaymentUnavailable => Self::BadRequest(err.to_string()),
            CheckoutError::Repository(err) => err.into(),
        }
    }
}

impl From<ShippingError> for AppError {
    fn from(err: ShippingError) -> Self {
        match err {
            ShippingError::Correo(err) => err.into(),
            ShippingError::Repository(err) => err.into(),
            ShippingError::NotShippable(msg) => Self::Conflict(msg),
            ShippingError::SenderNotConfigured => Self::Internal(err.to_string()),
        }
    }
}

impl From<OrderServiceError> for AppError {
    fn from(err: OrderServiceError) -> Self {
        match err {
            OrderServiceError::Transition(err) => Self::Conflict(err.to_string()),
            OrderServiceError::Repository(err) => err.into(),
            OrderServiceError::Payment(err) => err.into(),
            OrderServiceError::UnknownReference(_) => Self::NotFound("Order".to_string()),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Add a breadcrumb for a business event.
///
/// Breadcrumbs appear in Sentry error reports to show what led up to an
/// error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tienda_core::{OrderStatus, ProductId, StatusTransitionError, StockKey};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Validation(vec!["x".to_string()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Upstream("test".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_envelope_lists_details() {
        let (status, body) =
            body_json(AppError::Validation(vec!["customer.name is required".to_string()])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0], "customer.name is required");
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = body_json(AppError::Upstream(
            "Correo API error (HTTP 500): stack trace".to_string(),
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("stack trace"));
    }

    #[test]
    fn test_conflicts_map_to_409() {
        let err: AppError = RepositoryError::Conflict("not enough stock left".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = OrderServiceError::Transition(StatusTransitionError::Terminal(
            OrderStatus::Delivered,
        ))
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = CheckoutError::Stock(StockError::Insufficient(vec![StockShortage {
            key: StockKey::new(ProductId::new(1), Some("M"), None),
            requested: 3,
            available: 1,
        }]))
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[test]
    fn test_carrier_validation_is_client_error() {
        let err: AppError = CorreoError::Validation(vec!["postalCode is required".to_string()]).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = CorreoError::TokenExpired.into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_carrier_rate_limit_is_429() {
        let (status, body) = body_json(CorreoError::RateLimited(30).into()).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "rate_limited");
    }

    #[test]
    fn test_bad_webhook_signature_is_unauthorized() {
        let err: AppError = PaymentError::InvalidSignature("mismatch".to_string()).into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
