use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::services::{PurchaseError, ResendError};

#[derive(Debug)]
pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
    /// Validation errors - safe to show
    Validation(String),
    /// Throttled request - message carries the wait time
    TooManyRequests(String),
}

impl AppError {
    /// Map a purchase outcome onto its HTTP status.
    pub fn purchase(err: PurchaseError) -> Self {
        match err {
            PurchaseError::NotAvailable => {
                AppError::External(StatusCode::NOT_FOUND, "Book not available.")
            }
            PurchaseError::NotEligible => {
                AppError::External(StatusCode::FORBIDDEN, "Admins cannot purchase books.")
            }
            PurchaseError::InsufficientBalance => {
                AppError::External(StatusCode::BAD_REQUEST, "Insufficient balance.")
            }
            PurchaseError::TransactionFailed(err) => AppError::Internal(err),
        }
    }

    /// Map a resend throttle outcome onto its HTTP status.
    pub fn resend(err: ResendError) -> Self {
        match err {
            ResendError::UnknownAccount => {
                AppError::External(StatusCode::NOT_FOUND, "User not found.")
            }
            ResendError::AlreadyActive => {
                AppError::External(StatusCode::BAD_REQUEST, "Account is already activated.")
            }
            err @ (ResendError::TooSoon { .. } | ResendError::Locked { .. }) => {
                AppError::TooManyRequests(err.to_string())
            }
            ResendError::Store(err) => AppError::Internal(err),
        }
    }
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                sentry::capture_error(
                    err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                );

                message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::External(status, msg) => message(status, msg),
            AppError::Validation(msg) => message(StatusCode::BAD_REQUEST, &msg),
            AppError::TooManyRequests(msg) => message(StatusCode::TOO_MANY_REQUESTS, &msg),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_message(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn internal_error_returns_500_generic_message() {
        let err = AppError::Internal(anyhow::anyhow!("database connection failed"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_message(response).await, "Internal server error");
    }

    #[tokio::test]
    async fn internal_error_hides_sensitive_details() {
        let err = AppError::Internal(anyhow::anyhow!("password=secret123 leaked"));
        let response = err.into_response();

        let body = response_message(response).await;

        assert!(!body.contains("secret123"));
        assert!(!body.contains("password"));
    }

    #[tokio::test]
    async fn external_error_returns_specified_status_and_message() {
        let err = AppError::External(StatusCode::NOT_FOUND, "User not found.");
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_message(response).await, "User not found.");
    }

    #[tokio::test]
    async fn validation_error_returns_400_with_details() {
        let err = AppError::Validation("email: not a valid email address".into());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_message(response).await,
            "email: not a valid email address"
        );
    }

    #[tokio::test]
    async fn sqlx_error_converts_to_internal() {
        // Simulating what happens when a DB query fails
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down");
        let err: AppError = io_err.into();

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn purchase_errors_map_to_their_statuses() {
        let cases = [
            (PurchaseError::NotAvailable, StatusCode::NOT_FOUND),
            (PurchaseError::NotEligible, StatusCode::FORBIDDEN),
            (PurchaseError::InsufficientBalance, StatusCode::BAD_REQUEST),
            (
                PurchaseError::TransactionFailed(anyhow::anyhow!("deadlock")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::purchase(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn throttled_resend_returns_429_with_wait_time() {
        let response = AppError::resend(ResendError::TooSoon { seconds_left: 42 }).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response_message(response).await,
            "Please wait 42 seconds before resending the code."
        );

        let response = AppError::resend(ResendError::Locked { wait_minutes: 7 }).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response_message(response).await,
            "Too many attempts. Please try again in 7 minutes."
        );
    }

    #[tokio::test]
    async fn resend_account_errors_are_not_throttling() {
        assert_eq!(
            AppError::resend(ResendError::UnknownAccount)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::resend(ResendError::AlreadyActive)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
