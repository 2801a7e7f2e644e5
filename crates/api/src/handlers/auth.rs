//! Account lifecycle and credential endpoints.
//!
//! Flow:
//! 1. POST /auth/register creates a pending account and emails an activation code
//! 2. POST /auth/activate-account with the code flips the account to active
//! 3. POST /auth/login returns an access token and sets a `refreshToken` cookie
//! 4. POST /auth/refresh exchanges the cookie for a new access token
//! 5. GET /auth/logout blacklists the access token and the refresh cookie, then
//!    ends the session
//!
//! Password reset runs through POST /auth/forgot-password and
//! POST /auth/reset-password with the same emailed-code scheme. Codes are
//! stored hashed; see `services::codes`.

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use garde::Validate;
use shared::api::{
    ActivateAccountPayload, EmailPayload, LoginPayload, LoginResponse, MessageResponse,
    RefreshResponse, RegisterPayload, ResetPasswordPayload, UserSummary,
};

use crate::{
    error::AppError,
    middleware::auth::TokenUser,
    models::{AccountStatus, NewAccount, Role},
    services::{
        AuthError, CodeKind, Identity,
        codes::{code_matches, generate_code, hash_code},
        passwords::{hash_password, verify_password},
        tokens::REFRESH_TOKEN_TTL_SECS,
    },
    state::AppState,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/activate-account", post(activate_account))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/resend-activation-code", post(resend_activation_code))
        .route("/refresh", post(refresh))
}

#[debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if let Some(existing) = state
        .repos
        .accounts
        .find_by_email_or_phone(&payload.email, &payload.phone_number)
        .await?
    {
        let mut message = String::new();
        if existing.email == payload.email {
            message.push_str(&format!("Email {} is already registered. ", payload.email));
        }
        if existing.phone_number == payload.phone_number {
            message.push_str(&format!(
                "Phone number {} is already registered.",
                payload.phone_number
            ));
        }
        return Err(AppError::Validation(message.trim_end().to_string()));
    }

    let code = generate_code();
    let account = state
        .repos
        .accounts
        .create(NewAccount {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            phone_number: payload.phone_number,
            password_hash: hash_password(&payload.password)?,
            role: Role::Client,
            status: AccountStatus::Pending,
            activation_code: Some(hash_code(&code)),
        })
        .await?;

    state
        .email
        .send_code(
            &account.email,
            &account.full_name(),
            CodeKind::Activation,
            &code,
        )
        .await?;

    tracing::info!(user_id = account.id, email = %account.email, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "User created successfully. Activation code sent to email.",
        )),
    ))
}

#[debug_handler]
async fn activate_account(
    State(state): State<AppState>,
    Json(payload): Json<ActivateAccountPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let account = state.repos.accounts.find_by_email(&payload.email).await?;

    let Some(account) = account.filter(|a| {
        a.status == AccountStatus::Pending
            && code_matches(&payload.code, a.activation_code.as_deref())
    }) else {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "Invalid activation code.",
        ));
    };

    state.repos.accounts.activate(account.id).await?;

    tracing::info!(user_id = account.id, "account activated");

    Ok(Json(MessageResponse::new("Account activated successfully.")))
}

#[debug_handler]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let account = state
        .repos
        .accounts
        .find_by_email(&payload.email)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found."))?;

    let code = generate_code();
    state
        .repos
        .accounts
        .begin_reset(account.id, &hash_code(&code))
        .await?;

    state
        .email
        .send_code(
            &account.email,
            &account.full_name(),
            CodeKind::PasswordReset,
            &code,
        )
        .await?;

    tracing::info!(user_id = account.id, "password reset requested");

    Ok(Json(MessageResponse::new("Password reset email sent.")))
}

#[debug_handler]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let account = state.repos.accounts.find_by_email(&payload.email).await?;

    let Some(account) = account.filter(|a| {
        a.status == AccountStatus::Reset
            && code_matches(&payload.reset_code, a.activation_code.as_deref())
    }) else {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "Invalid reset code or user status.",
        ));
    };

    state
        .repos
        .accounts
        .complete_reset(account.id, &hash_password(&payload.new_password)?)
        .await?;

    tracing::info!(user_id = account.id, "password reset completed");

    Ok(Json(MessageResponse::new("Password reset successfully.")))
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let account = state
        .repos
        .accounts
        .find_by_email(&payload.email)
        .await?
        .ok_or(AppError::External(
            StatusCode::FORBIDDEN,
            "User not found. Please register.",
        ))?;

    if account.status != AccountStatus::Active {
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Please activate your account first.",
        ));
    }

    if !verify_password(&payload.password, &account.password_hash)? {
        tracing::info!(user_id = account.id, "login rejected: wrong password");
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Password incorrect.",
        ));
    }

    let identity = Identity {
        id: account.id,
        email: account.email.clone(),
        role: account.role,
    };
    let pair = state.tokens.issue_pair(&identity)?;

    state.sessions.start(account.id).await?;

    let cookie = Cookie::build((REFRESH_COOKIE, pair.refresh))
        .path("/")
        .http_only(true)
        .secure(state.config.is_production())
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(REFRESH_TOKEN_TTL_SECS));

    tracing::info!(user_id = account.id, role = account.role.as_str(), "user logged in");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: format!("User logged in successfully as {}", account.role.as_str()),
            access_token: pair.access,
            user: UserSummary {
                id: account.id,
                full_name: account.full_name(),
                email: account.email,
                role: account.role.as_str().to_string(),
            },
        }),
    ))
}

#[debug_handler]
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let Some(cookie) = jar.get(REFRESH_COOKIE) else {
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "No refresh token provided",
        ));
    };

    let access_token = match state.tokens.refresh_access(cookie.value()).await {
        Ok(token) => token,
        Err(AuthError::Revoked) => {
            return Err(AppError::External(
                StatusCode::UNAUTHORIZED,
                "Refresh token has been revoked",
            ));
        }
        Err(AuthError::Store(err)) => return Err(AppError::Internal(err)),
        Err(_) => {
            return Err(AppError::External(
                StatusCode::FORBIDDEN,
                "Invalid refresh token",
            ));
        }
    };

    Ok(Json(RefreshResponse { access_token }))
}

#[debug_handler]
async fn logout(
    user: TokenUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.tokens.revoke(&user.token).await?;

    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        state.tokens.revoke(cookie.value()).await?;
    }

    state.sessions.clear(user.id).await?;

    tracing::info!(user_id = user.id, "user logged out");

    Ok((
        jar.remove(Cookie::build(REFRESH_COOKIE).path("/")),
        Json(MessageResponse::new("Logged out successfully.")),
    ))
}

#[debug_handler]
async fn resend_activation_code(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .resend
        .check_and_record(&payload.email)
        .await
        .map_err(AppError::resend)?;

    Ok(Json(MessageResponse::new(
        "Activation code resent successfully. Check your email.",
    )))
}
