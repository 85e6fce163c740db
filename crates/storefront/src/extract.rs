//! Request extractors whose rejections render as [`AppError`].
//!
//! Drop-in replacements for `axum::Json`, `Query` and `Path`: a body that
//! does not deserialize, a bad query string or a malformed path segment
//! answers with the usual `validation_error` envelope instead of axum's
//! plain-text rejection.

use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection, QueryRejection},
};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

/// Query string.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameters.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                Self::Validation(vec![rejection.body_text()])
            }
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(vec![rejection.body_text()])
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(_) => {
                Self::Validation(vec![rejection.body_text()])
            }
            other => Self::Internal(other.body_text()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Line {
        quantity: u32,
    }

    #[derive(Deserialize)]
    struct Filter {
        #[allow(dead_code)]
        page: u32,
    }

    fn app() -> Router {
        Router::new()
            .route("/lines", post(|Json(line): Json<Line>| async move { line.quantity.to_string() }))
            .route("/items/{id}", get(|Path(id): Path<i64>| async move { id.to_string() }))
            .route("/items", get(|Query(_): Query<Filter>| async { "ok" }))
    }

    async fn error_code(response: axum::response::Response) -> (StatusCode, String) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        (status, body["error"]["code"].as_str().unwrap().to_string())
    }

    fn post_json(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/lines")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_well_formed_body_passes_through() {
        let response = app().oneshot(post_json(r#"{"quantity": 2}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_negative_quantity_is_validation_error() {
        let response = app()
            .oneshot(post_json(r#"{"quantity": -1}"#))
            .await
            .unwrap();
        let (status, code) = error_code(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "validation_error");
    }

    #[tokio::test]
    async fn test_broken_json_is_validation_error() {
        let response = app().oneshot(post_json("{\"quantity\":")).await.unwrap();
        let (status, code) = error_code(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "validation_error");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/lines")
            .body(Body::from(r#"{"quantity": 2}"#))
            .unwrap();
        let (status, code) = error_code(app().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "bad_request");
    }

    #[tokio::test]
    async fn test_non_numeric_path_and_bad_query() {
        let request = Request::builder().uri("/items/abc").body(Body::empty()).unwrap();
        let (status, code) = error_code(app().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "validation_error");

        let request = Request::builder()
            .uri("/items?page=first")
            .body(Body::empty())
            .unwrap();
        let (status, code) = error_code(app().oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "validation_error");
    }
}
