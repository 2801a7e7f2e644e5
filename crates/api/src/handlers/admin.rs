//! Admin dashboard endpoints.
//!
//! - GET /admin/statistics - Client count, platform balance, book count
//! - POST /admin/clients/{id}/credit - Add funds to a client's balance

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use garde::Validate;
use shared::api::{BalanceResponse, CreditPayload, StatisticsResponse};

use crate::{error::AppError, middleware::auth::AdminUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(statistics))
        .route("/clients/{id}/credit", post(credit_client))
}

#[debug_handler]
async fn statistics(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let platform = state
        .repos
        .accounts
        .find_platform()
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Admin not found"))?;

    let total_users = state.repos.accounts.count_clients().await?;
    let total_books = state.repos.books.count().await?;

    Ok(Json(StatisticsResponse {
        total_users,
        admin_balance: platform.balance_cents,
        total_books,
    }))
}

#[debug_handler]
async fn credit_client(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreditPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let account = state
        .repos
        .accounts
        .credit(id, payload.amount)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Client not found."))?;

    tracing::info!(
        user_id = admin.id,
        client_id = account.id,
        amount_cents = payload.amount,
        "balance credited"
    );

    Ok(Json(BalanceResponse {
        message: "Balance updated successfully.".to_string(),
        balance: account.balance_cents,
    }))
}
