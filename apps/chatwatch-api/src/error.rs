use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Failure envelope returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub ok: bool,
    pub msg: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            ok: false,
            msg: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Response for a handler that panicked; installed via
/// `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "handler panicked");
    ApiError::internal("internal server error").into_response()
}

/// Failures raised by an external chat source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to connect to chat source: {0}")]
    Connect(String),
    #[error("chat source rejected the session: {0}")]
    Rejected(String),
    #[error("malformed frame from chat source: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for SourceError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::Http(resp) => Self::Rejected(format!("relay answered {}", resp.status())),
            other => Self::Connect(other.to_string()),
        }
    }
}

/// Failures of the observer lifecycle that callers must handle.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("liveId or channelId is required")]
    MissingTarget,
}

impl From<ObserverError> for ApiError {
    fn from(err: ObserverError) -> Self {
        match err {
            ObserverError::MissingTarget => Self::bad_request(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_maps_to_bad_request() {
        let err: ApiError = ObserverError::MissingTarget.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "liveId or channelId is required");
    }

    #[tokio::test]
    async fn panicking_handler_yields_generic_500() {
        use axum::routing::get;
        use tower::ServiceExt;
        use tower_http::catch_panic::CatchPanicLayer;

        async fn boom() -> &'static str {
            panic!("kaboom")
        }
        let app = axum::Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/boom")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false, "msg": "internal server error" }));
    }

    #[test]
    fn body_serializes_ok_false() {
        let body = ApiErrorBody {
            ok: false,
            msg: "boom".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false, "msg": "boom" }));
    }
}
