//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for database access.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **accounts** - Account lookup, activation, password reset, resend throttling, balance credits
//! - **books** - Admin inventory (create, update, delete, count)
//! - **ledger** - Purchase transactions (row-locking unit of work) and ledger reads
//! - **status** - Database health checks
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let account = state.repos.accounts.find_by_email(&email).await?;
//!     let entries = state.repos.ledger.list_by_buyer(account_id).await?;
//! }
//! ```

mod accounts;
mod books;
mod ledger;
mod status;

pub use accounts::{AccountRepo, PgAccountRepo};
pub use books::{BookRemoval, BookRepo, PgBookRepo};
pub use ledger::{
    LockedAccounts, NewLedgerEntry, PgPurchaseLedger, PurchaseLedger, PurchaseTx,
};
pub use status::{PgStatusRepo, StatusRepo};

#[cfg(test)]
pub use accounts::MockAccountRepo;
#[cfg(test)]
pub use books::MockBookRepo;
#[cfg(test)]
pub use ledger::{MockPurchaseLedger, MockPurchaseTx};
#[cfg(test)]
pub use status::MockStatusRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub accounts: Arc<dyn AccountRepo>,
    pub books: Arc<dyn BookRepo>,
    pub ledger: Arc<dyn PurchaseLedger>,
    pub status: Arc<dyn StatusRepo>,
}
