//! Bearer credential extractors.
//!
//! Usage: add `AuthUser` as an extractor parameter to require a valid,
//! non-revoked credential and a live session. `AdminUser` additionally
//! requires the admin role. `TokenUser` skips the session check and is meant
//! for endpoints that end the session (logout).
//!
//! ```ignore
//! async fn my_handler(user: AuthUser, ...) -> ... {
//!     // user.id and user.role are available here
//! }
//! ```

use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    models::Role,
    services::{AuthError, Claims},
    state::AppState,
};

/// Identity behind a verified credential whose session is still active.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
    /// Raw bearer credential as presented.
    pub token: String,
}

/// An `AuthUser` holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Identity behind a verified credential. No session check.
#[derive(Debug, Clone)]
pub struct TokenUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub token: String,
}

async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<(Claims, String), AuthError> {
    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AuthError::MissingCredential)?;

    let token = bearer.token();
    if token.is_empty() || token == "null" || token == "undefined" {
        return Err(AuthError::MissingCredential);
    }

    let claims = state.tokens.authenticate(token).await?;

    Ok((claims, token.to_string()))
}

impl FromRequestParts<AppState> for TokenUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (claims, token) = authenticate(parts, state).await?;

        Ok(TokenUser {
            id: claims.id,
            email: claims.email,
            role: claims.role,
            token,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (claims, token) = authenticate(parts, state).await?;

        let touch = state
            .sessions
            .touch(claims.id)
            .await
            .map_err(AuthError::Store)?;

        if touch.is_expired() {
            return Err(AuthError::SessionExpired);
        }

        Ok(AuthUser {
            id: claims.id,
            email: claims.email,
            role: claims.role,
            token,
        })
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            tracing::info!(user_id = user.id, "admin route refused");
            return Err(AuthError::Forbidden);
        }

        Ok(AdminUser(user))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing authorization header",
            ),
            AuthError::Revoked => (
                StatusCode::UNAUTHORIZED,
                "Token has been revoked. Please log in again.",
            ),
            AuthError::Expired => (
                StatusCode::UNAUTHORIZED,
                "Token has expired. Please log in again.",
            ),
            AuthError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "Session expired due to inactivity. Please log in again.",
            ),
            AuthError::Invalid => (
                StatusCode::FORBIDDEN,
                "Invalid token. Please log in again.",
            ),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Access denied. Required role(s): admin.",
            ),
            AuthError::Store(err) => {
                tracing::error!("credential store error during authentication: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred during authentication",
                )
            }
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
