//! Book inventory repository for PostgreSQL.
//!
//! Stock changes caused by purchases go through the purchase ledger; this
//! repository only serves the admin inventory endpoints.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::{Book, NewBook};

/// Outcome of deleting a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookRemoval {
    Deleted,
    NotFound,
    /// Ledger entries reference the book, so the row must stay.
    Referenced,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepo: Send + Sync {
    /// Insert a new book.
    async fn create(&self, book: NewBook) -> Result<Book>;

    /// Replace a book's title, price and stock. `None` if it doesn't exist.
    async fn update(&self, id: i64, book: NewBook) -> Result<Option<Book>>;

    async fn delete(&self, id: i64) -> Result<BookRemoval>;

    async fn count(&self) -> Result<i64>;
}

/// PostgreSQL implementation of BookRepo.
#[derive(Clone)]
pub struct PgBookRepo {
    pool: Pool<Postgres>,
}

impl PgBookRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepo for PgBookRepo {
    async fn create(&self, book: NewBook) -> Result<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, unit_price_cents, quantity)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(book.title)
        .bind(book.unit_price_cents)
        .bind(book.quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(book)
    }

    async fn update(&self, id: i64, book: NewBook) -> Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, unit_price_cents = $3, quantity = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(book.title)
        .bind(book.unit_price_cents)
        .bind(book.quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn delete(&self, id: i64) -> Result<BookRemoval> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(BookRemoval::NotFound),
            Ok(_) => Ok(BookRemoval::Deleted),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                Ok(BookRemoval::Referenced)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
