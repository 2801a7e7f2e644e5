//! Book inventory, admin only.
//!
//! Endpoints:
//! - POST /books - Stock a new book
//! - PUT /books/{id} - Replace title, price and stock
//! - DELETE /books/{id} - Remove a book that was never purchased

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};
use garde::Validate;
use shared::api::{BookInfo, BookPayload, BookResponse, MessageResponse};

use crate::{
    error::AppError,
    middleware::auth::AdminUser,
    models::{Book, NewBook},
    repos::BookRemoval,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_book))
        .route("/{id}", put(update_book).delete(delete_book))
}

fn book_info(book: Book) -> BookInfo {
    BookInfo {
        id: book.id,
        title: book.title,
        unit_price: book.unit_price_cents,
        quantity: book.quantity,
    }
}

fn new_book(payload: BookPayload) -> Result<NewBook, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(NewBook {
        title: payload.title,
        unit_price_cents: payload.unit_price,
        quantity: payload.quantity,
    })
}

#[debug_handler]
async fn create_book(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<BookPayload>,
) -> Result<impl IntoResponse, AppError> {
    let book = state.repos.books.create(new_book(payload)?).await?;

    tracing::info!(user_id = admin.id, book_id = book.id, "book added");

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Book added successfully".to_string(),
            book: book_info(book),
        }),
    ))
}

#[debug_handler]
async fn update_book(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BookPayload>,
) -> Result<impl IntoResponse, AppError> {
    let book = state
        .repos
        .books
        .update(id, new_book(payload)?)
        .await?
        .ok_or(AppError::External(
            StatusCode::NOT_FOUND,
            "Book does not exist",
        ))?;

    tracing::info!(user_id = admin.id, book_id = book.id, "book updated");

    Ok(Json(BookResponse {
        message: "Book updated successfully".to_string(),
        book: book_info(book),
    }))
}

#[debug_handler]
async fn delete_book(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state.repos.books.delete(id).await? {
        BookRemoval::Deleted => {
            tracing::info!(user_id = admin.id, book_id = id, "book deleted");
            Ok(Json(MessageResponse::new("Book deleted successfully")))
        }
        BookRemoval::NotFound => Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Book not found",
        )),
        BookRemoval::Referenced => Err(AppError::External(
            StatusCode::CONFLICT,
            "Book has been purchased and cannot be deleted",
        )),
    }
}
