//! Account repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::{Account, NewAccount, ResendState};

/// Repository for account operations outside of purchases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Find an account by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Find any account holding either the email or the phone number.
    async fn find_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<Account>>;

    /// The platform (admin) account that receives every payment.
    async fn find_platform(&self) -> Result<Option<Account>>;

    /// Insert a new account.
    async fn create(&self, account: NewAccount) -> Result<Account>;

    /// Mark the account active and clear its outstanding code.
    async fn activate(&self, id: i64) -> Result<()>;

    /// Put the account into reset status with a fresh hashed code.
    async fn begin_reset(&self, id: i64, code_hash: &str) -> Result<()>;

    /// Store the new password hash and return the account to active status.
    async fn complete_reset(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Add funds to a client account. `None` if no client has that id.
    async fn credit(&self, id: i64, amount_cents: i64) -> Result<Option<Account>>;

    async fn count_clients(&self) -> Result<i64>;

    /// Persist resend throttling columns. When `code_hash` is set, the
    /// outstanding code is replaced in the same statement.
    async fn save_resend_state(
        &self,
        id: i64,
        state: ResendState,
        code_hash: Option<String>,
    ) -> Result<()>;
}

/// PostgreSQL implementation of AccountRepo.
#[derive(Clone)]
pub struct PgAccountRepo {
    pool: Pool<Postgres>,
}

impl PgAccountRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepo for PgAccountRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE email = $1 OR phone_number = $2 LIMIT 1",
        )
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_platform(&self) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE role = 'admin' ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts
                (first_name, last_name, email, phone_number, password_hash, role, status, activation_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(account.first_name)
        .bind(account.last_name)
        .bind(account.email)
        .bind(account.phone_number)
        .bind(account.password_hash)
        .bind(account.role)
        .bind(account.status)
        .bind(account.activation_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn activate(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = 'active', activation_code = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn begin_reset(&self, id: i64, code_hash: &str) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = 'reset', activation_code = $2 WHERE id = $1")
            .bind(id)
            .bind(code_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_reset(&self, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, status = 'active', activation_code = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn credit(&self, id: i64, amount_cents: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + $2
            WHERE id = $1 AND role = 'client'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount_cents)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn count_clients(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = 'client'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn save_resend_state(
        &self,
        id: i64,
        state: ResendState,
        code_hash: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET resend_count = $2,
                last_resend_at = $3,
                resend_lock_until = $4,
                activation_code = COALESCE($5, activation_code)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state.resend_count)
        .bind(state.last_resend_at)
        .bind(state.resend_lock_until)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
