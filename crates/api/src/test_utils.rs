//! Shared test utilities.
//!
//! Provides mock factories, in-memory fakes for the credential store and the
//! purchase ledger, and a `TestStateBuilder` for constructing `AppState`
//! instances with only the mocks needed for each test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_account};
//!
//! let mut account_repo = MockAccountRepo::new();
//! account_repo.expect_find_by_email().returning(|_| Ok(Some(mock_account(1, "alice@example.com"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_account_repo(account_repo)
//!     .build();
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::models::{Account, AccountStatus, Book, LedgerEntry, Role};
use crate::repos::{
    LockedAccounts, MockAccountRepo, MockBookRepo, MockStatusRepo, NewLedgerEntry, PurchaseLedger,
    PurchaseTx, Repos,
};
use crate::services::{EmailSender, Identity, MockEmailSender};
use crate::state::AppState;
use crate::stores::{CredentialStore, Stores};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: "redis://test".to_string(),
        jwt_secret: "test-secret".to_string(),
        smtp_url: None,
        resend_api_key: None,
        env: "test".to_string(),
        sentry_dsn: None,
        admin_email: None,
        admin_password: None,
    }
}

pub fn mock_identity(id: i64, role: Role) -> Identity {
    Identity {
        id,
        email: format!("user{}@example.com", id),
        role,
    }
}

/// Creates an active client account with zero balance.
pub fn mock_account(id: i64, email: &str) -> Account {
    Account {
        id,
        first_name: "Alice".to_string(),
        last_name: "Reader".to_string(),
        email: email.to_string(),
        phone_number: format!("07880000{:02}", id % 100),
        password_hash: String::new(),
        role: Role::Client,
        status: AccountStatus::Active,
        activation_code: None,
        resend_count: 0,
        last_resend_at: None,
        resend_lock_until: None,
        balance_cents: 0,
        created_at: Utc::now(),
    }
}

/// Creates the platform (admin) account.
pub fn mock_platform(id: i64, balance_cents: i64) -> Account {
    Account {
        first_name: "Platform".to_string(),
        last_name: "Admin".to_string(),
        role: Role::Admin,
        balance_cents,
        ..mock_account(id, "admin@example.com")
    }
}

pub fn mock_book(id: i64, unit_price_cents: i64, quantity: i32) -> Book {
    Book {
        id,
        title: format!("Book {}", id),
        unit_price_cents,
        quantity,
    }
}

/// In-memory credential store. TTLs are recorded, not enforced.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, (String, u64)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_of(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl_secs));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value_of(key))
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct LedgerData {
    accounts: BTreeMap<i64, Account>,
    books: BTreeMap<i64, Book>,
    entries: Vec<LedgerEntry>,
    fail_next_insert: bool,
}

/// In-memory purchase ledger.
///
/// A transaction holds the whole ledger lock from `begin` until commit or
/// drop, which serializes purchases the way row locks do for the rows they
/// share. Writes go to a staged copy that only replaces the ledger on commit.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    data: Arc<AsyncMutex<LedgerData>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn idle(&self) -> tokio::sync::MutexGuard<'_, LedgerData> {
        self.data
            .try_lock()
            .expect("ledger inspected while a transaction is open")
    }

    pub fn put_account(&self, account: Account) {
        self.idle().accounts.insert(account.id, account);
    }

    pub fn put_book(&self, book: Book) {
        self.idle().books.insert(book.id, book);
    }

    /// Make the next ledger insert fail, after balances were already adjusted.
    pub fn fail_next_insert(&self) {
        self.idle().fail_next_insert = true;
    }

    pub fn balance_of(&self, account_id: i64) -> i64 {
        self.idle().accounts[&account_id].balance_cents
    }

    pub fn quantity_of(&self, book_id: i64) -> i32 {
        self.idle().books[&book_id].quantity
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.idle().entries.clone()
    }
}

#[async_trait]
impl PurchaseLedger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn PurchaseTx>> {
        let guard = self.data.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            staged,
        }))
    }

    async fn list_by_buyer(&self, buyer_id: i64) -> Result<Vec<LedgerEntry>> {
        let data = self.data.lock().await;
        let mut entries: Vec<LedgerEntry> = data
            .entries
            .iter()
            .filter(|e| e.buyer_id == buyer_id)
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries)
    }
}

struct MemoryTx {
    guard: Option<OwnedMutexGuard<LedgerData>>,
    staged: LedgerData,
}

#[async_trait]
impl PurchaseTx for MemoryTx {
    async fn lock_book(&mut self, book_id: i64) -> Result<Option<Book>> {
        Ok(self.staged.books.get(&book_id).cloned())
    }

    async fn lock_accounts(&mut self, buyer_id: i64) -> Result<LockedAccounts> {
        let platform = self
            .staged
            .accounts
            .values()
            .find(|a| a.role == Role::Admin)
            .cloned();
        Ok(LockedAccounts {
            buyer: self.staged.accounts.get(&buyer_id).cloned(),
            platform,
        })
    }

    async fn adjust_balance(&mut self, account_id: i64, delta_cents: i64) -> Result<()> {
        let account = self
            .staged
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow!("account {account_id} missing"))?;
        if account.balance_cents + delta_cents < 0 {
            bail!("balance check constraint violated");
        }
        account.balance_cents += delta_cents;
        Ok(())
    }

    async fn decrement_stock(&mut self, book_id: i64) -> Result<()> {
        let book = self
            .staged
            .books
            .get_mut(&book_id)
            .ok_or_else(|| anyhow!("book {book_id} missing"))?;
        if book.quantity == 0 {
            bail!("quantity check constraint violated");
        }
        book.quantity -= 1;
        Ok(())
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        if self.staged.fail_next_insert {
            bail!("ledger insert failed");
        }
        let row = LedgerEntry {
            id: self.staged.entries.len() as i64 + 1,
            buyer_id: entry.buyer_id,
            platform_id: entry.platform_id,
            book_id: entry.book_id,
            amount_cents: entry.amount_cents,
            kind: "purchase".to_string(),
            status: "completed".to_string(),
            created_at: Utc::now(),
        };
        self.staged.entries.push(row.clone());
        Ok(row)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| anyhow!("transaction already committed"))?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Defaults: empty mocks for repositories and email, an in-memory credential
/// store (so tokens and sessions work end to end), and an empty in-memory ledger.
pub struct TestStateBuilder {
    account_repo: Option<MockAccountRepo>,
    book_repo: Option<MockBookRepo>,
    status_repo: Option<MockStatusRepo>,
    ledger: Option<Arc<dyn PurchaseLedger>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    email_sender: Option<MockEmailSender>,
    config: Option<Config>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            account_repo: None,
            book_repo: None,
            status_repo: None,
            ledger: None,
            credentials: None,
            email_sender: None,
            config: None,
        }
    }

    pub fn with_account_repo(mut self, repo: MockAccountRepo) -> Self {
        self.account_repo = Some(repo);
        self
    }

    pub fn with_book_repo(mut self, repo: MockBookRepo) -> Self {
        self.book_repo = Some(repo);
        self
    }

    pub fn with_status_repo(mut self, repo: MockStatusRepo) -> Self {
        self.status_repo = Some(repo);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn PurchaseLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_email_sender(mut self, sender: MockEmailSender) -> Self {
        self.email_sender = Some(sender);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let repos = Repos {
            accounts: Arc::new(self.account_repo.unwrap_or_else(MockAccountRepo::new)),
            books: Arc::new(self.book_repo.unwrap_or_else(MockBookRepo::new)),
            ledger: self
                .ledger
                .unwrap_or_else(|| Arc::new(MemoryLedger::new())),
            status: Arc::new(self.status_repo.unwrap_or_else(MockStatusRepo::new)),
        };

        let stores = Stores {
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
        };

        let email = Arc::new(self.email_sender.unwrap_or_else(MockEmailSender::new))
            as Arc<dyn EmailSender>;

        AppState::new(
            self.config.unwrap_or_else(test_config),
            repos,
            stores,
            email,
        )
        .expect("test state")
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
