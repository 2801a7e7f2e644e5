//! Book purchases and purchase history.
//!
//! Both endpoints require a live session. A purchase moves the book's price
//! from the buyer to the platform account in a single database transaction.

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use shared::api::{PurchaseResponse, TransactionInfo, TransactionsResponse};

use crate::{error::AppError, middleware::auth::AuthUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buy/{book_id}", post(buy_book))
        .route("/my-transactions", get(my_transactions))
}

#[debug_handler]
async fn buy_book(
    user: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .purchases
        .execute(user.id, book_id)
        .await
        .map_err(AppError::purchase)?;

    tracing::info!(
        user_id = user.id,
        book_id = receipt.book_id,
        amount_cents = receipt.amount_cents,
        transaction_id = receipt.transaction_id,
        "book purchased"
    );

    Ok(Json(PurchaseResponse {
        message: "Purchase successful!".to_string(),
        transaction_id: receipt.transaction_id,
    }))
}

/// List the caller's purchases, newest first.
#[debug_handler]
async fn my_transactions(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.repos.ledger.list_by_buyer(user.id).await?;

    let transactions = entries
        .into_iter()
        .map(|entry| TransactionInfo {
            id: entry.id,
            book_id: entry.book_id,
            amount: entry.amount_cents,
            kind: entry.kind,
            status: entry.status,
            created_at: entry.created_at,
        })
        .collect();

    Ok(Json(TransactionsResponse {
        message: "Transactions fetched successfully".to_string(),
        transactions,
    }))
}
