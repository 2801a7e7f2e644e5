//! Atomic book purchase: buyer pays the platform account for one copy.
//!
//! All reads happen under row locks inside the purchase transaction, so two
//! requests racing for the last copy (or the last of a buyer's balance) are
//! serialized by the database: the second one re-reads committed values after
//! the first commits. Any early return drops the uncommitted transaction, which
//! rolls it back.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    models::Role,
    repos::{LockedAccounts, NewLedgerEntry, PurchaseLedger},
};

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("Book not available.")]
    NotAvailable,
    #[error("Admins cannot purchase books.")]
    NotEligible,
    #[error("Insufficient balance.")]
    InsufficientBalance,
    #[error("purchase transaction failed")]
    TransactionFailed(#[source] anyhow::Error),
}

/// Proof of a committed purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Ledger entry id.
    pub transaction_id: i64,
    pub book_id: i64,
    pub amount_cents: i64,
}

#[derive(Clone)]
pub struct PurchaseCoordinator {
    ledger: Arc<dyn PurchaseLedger>,
}

impl PurchaseCoordinator {
    pub fn new(ledger: Arc<dyn PurchaseLedger>) -> Self {
        Self { ledger }
    }

    pub async fn execute(&self, buyer_id: i64, book_id: i64) -> Result<Receipt, PurchaseError> {
        let failed = |err: anyhow::Error| {
            tracing::error!(user_id = buyer_id, book_id, "purchase failed: {:?}", err);
            PurchaseError::TransactionFailed(err)
        };

        let mut tx = self.ledger.begin().await.map_err(failed)?;

        let book = match tx.lock_book(book_id).await.map_err(failed)? {
            Some(book) if book.quantity > 0 => book,
            _ => return Err(PurchaseError::NotAvailable),
        };

        let LockedAccounts { buyer, platform } =
            tx.lock_accounts(buyer_id).await.map_err(failed)?;

        let Some(buyer) = buyer else {
            return Err(PurchaseError::NotEligible);
        };
        let platform_id = platform.as_ref().map(|p| p.id);
        if buyer.role == Role::Admin || platform_id == Some(buyer.id) {
            return Err(PurchaseError::NotEligible);
        }

        if buyer.balance_cents < book.unit_price_cents {
            return Err(PurchaseError::InsufficientBalance);
        }

        let platform_id =
            platform_id.ok_or_else(|| failed(anyhow::anyhow!("no platform account configured")))?;
        let amount = book.unit_price_cents;

        tx.adjust_balance(buyer.id, -amount).await.map_err(failed)?;
        tx.adjust_balance(platform_id, amount).await.map_err(failed)?;
        tx.decrement_stock(book.id).await.map_err(failed)?;

        let entry = tx
            .insert_entry(NewLedgerEntry {
                buyer_id: buyer.id,
                platform_id,
                book_id: book.id,
                amount_cents: amount,
            })
            .await
            .map_err(failed)?;

        tx.commit().await.map_err(failed)?;

        tracing::info!(
            user_id = buyer.id,
            book_id = book.id,
            transaction_id = entry.id,
            amount_cents = amount,
            "purchase completed"
        );

        Ok(Receipt {
            transaction_id: entry.id,
            book_id: book.id,
            amount_cents: amount,
        })
    }
}
