use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    /// A password reset is in progress.
    Reset,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    /// SHA-256 hex of the outstanding activation/reset code.
    #[serde(skip_serializing)]
    pub activation_code: Option<String>,
    pub resend_count: i32,
    pub last_resend_at: Option<DateTime<Utc>>,
    pub resend_lock_until: Option<DateTime<Utc>>,
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn resend_state(&self) -> ResendState {
        ResendState {
            resend_count: self.resend_count,
            last_resend_at: self.last_resend_at,
            resend_lock_until: self.resend_lock_until,
        }
    }
}

/// Fields needed to insert a new account row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    pub activation_code: Option<String>,
}

/// Resend throttling columns of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResendState {
    pub resend_count: i32,
    pub last_resend_at: Option<DateTime<Utc>>,
    pub resend_lock_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

/// Fields an admin sets when stocking or editing a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

/// Immutable record of a completed purchase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub buyer_id: i64,
    pub platform_id: i64,
    pub book_id: i64,
    pub amount_cents: i64,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
