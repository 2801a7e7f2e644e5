//! Purchase ledger for PostgreSQL.
//!
//! Purchases run as an explicit unit of work: [`PurchaseLedger::begin`] opens a
//! transaction, the caller locks and mutates rows through [`PurchaseTx`], then
//! calls [`PurchaseTx::commit`]. A `PurchaseTx` dropped without committing rolls
//! back, so early returns and cancelled requests leave nothing behind.
//!
//! Lock order is always: book row, then the buyer and platform account rows in
//! ascending id order. Every purchase takes locks in that order, so concurrent
//! purchases queue behind each other instead of deadlocking.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::models::{Account, Book, LedgerEntry};

/// Ledger row to insert for a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub buyer_id: i64,
    pub platform_id: i64,
    pub book_id: i64,
    pub amount_cents: i64,
}

/// Buyer and platform account rows, locked for the rest of the transaction.
#[derive(Debug, Clone)]
pub struct LockedAccounts {
    pub buyer: Option<Account>,
    pub platform: Option<Account>,
}

/// Entry point for purchase transactions and ledger reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Open a new purchase transaction.
    async fn begin(&self) -> Result<Box<dyn PurchaseTx>>;

    /// Ledger entries where the account is the buyer, newest first.
    async fn list_by_buyer(&self, buyer_id: i64) -> Result<Vec<LedgerEntry>>;
}

/// An open purchase transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseTx: Send {
    /// Lock and read a book row.
    async fn lock_book(&mut self, book_id: i64) -> Result<Option<Book>>;

    /// Lock and read the buyer and platform account rows.
    async fn lock_accounts(&mut self, buyer_id: i64) -> Result<LockedAccounts>;

    /// Add `delta_cents` (possibly negative) to an account balance.
    async fn adjust_balance(&mut self, account_id: i64, delta_cents: i64) -> Result<()>;

    /// Take one copy of a book out of stock.
    async fn decrement_stock(&mut self, book_id: i64) -> Result<()>;

    /// Record the purchase.
    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    /// Commit every change made through this transaction.
    async fn commit(&mut self) -> Result<()>;
}

/// PostgreSQL implementation of PurchaseLedger.
#[derive(Clone)]
pub struct PgPurchaseLedger {
    pool: Pool<Postgres>,
}

impl PgPurchaseLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseLedger for PgPurchaseLedger {
    async fn begin(&self) -> Result<Box<dyn PurchaseTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPurchaseTx { tx: Some(tx) }))
    }

    async fn list_by_buyer(&self, buyer_id: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

/// Open PostgreSQL transaction. `tx` is `None` once committed.
pub struct PgPurchaseTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgPurchaseTx {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| anyhow!("purchase transaction already committed"))
    }
}

#[async_trait]
impl PurchaseTx for PgPurchaseTx {
    async fn lock_book(&mut self, book_id: i64) -> Result<Option<Book>> {
        let tx = self.tx()?;
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(book)
    }

    async fn lock_accounts(&mut self, buyer_id: i64) -> Result<LockedAccounts> {
        let tx = self.tx()?;

        let platform_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE role = 'admin' ORDER BY id LIMIT 1")
                .fetch_optional(&mut **tx)
                .await?;

        let ids: Vec<i64> = match platform_id {
            Some(platform_id) => vec![buyer_id, platform_id],
            None => vec![buyer_id],
        };

        let rows = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;

        let buyer = rows.iter().find(|a| a.id == buyer_id).cloned();
        let platform = platform_id.and_then(|id| rows.into_iter().find(|a| a.id == id));

        Ok(LockedAccounts { buyer, platform })
    }

    async fn adjust_balance(&mut self, account_id: i64, delta_cents: i64) -> Result<()> {
        let tx = self.tx()?;
        let result =
            sqlx::query("UPDATE accounts SET balance_cents = balance_cents + $2 WHERE id = $1")
                .bind(account_id)
                .bind(delta_cents)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("adjusting balance of account {account_id}"))?;

        if result.rows_affected() != 1 {
            bail!("account {account_id} disappeared during purchase");
        }
        Ok(())
    }

    async fn decrement_stock(&mut self, book_id: i64) -> Result<()> {
        let tx = self.tx()?;
        let result = sqlx::query("UPDATE books SET quantity = quantity - 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("decrementing stock of book {book_id}"))?;

        if result.rows_affected() != 1 {
            bail!("book {book_id} disappeared during purchase");
        }
        Ok(())
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let tx = self.tx()?;
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries (buyer_id, platform_id, book_id, amount_cents, kind, status)
            VALUES ($1, $2, $3, $4, 'purchase', 'completed')
            RETURNING *
            "#,
        )
        .bind(entry.buyer_id)
        .bind(entry.platform_id)
        .bind(entry.book_id)
        .bind(entry.amount_cents)
        .fetch_one(&mut **tx)
        .await?;
        Ok(entry)
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| anyhow!("purchase transaction already committed"))?;
        tx.commit().await?;
        Ok(())
    }
}
