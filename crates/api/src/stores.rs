//! Ephemeral stores (Redis).
//!
//! Everything kept here expires on its own through Redis TTLs; nothing in the
//! API sweeps it. The store is a thin key-value surface so the services built
//! on top of it (token blacklist, session activity) own their key layout.
//!
//! ## Redis Key Patterns
//!
//! ```text
//! blacklisted_token:{token}   → "true"          (TTL = token's remaining lifetime)
//! user:{id}:lastActivity      → epoch millis    (TTL = idle timeout, 300s)
//! ```
//!
//! ## Usage
//!
//! The credential store is injected into the services that need it:
//!
//! ```ignore
//! let credentials: Arc<dyn CredentialStore> = Arc::new(RedisCredentialStore::new(redis));
//! let tokens = TokenService::new(&config.jwt_secret, credentials.clone())?;
//! let sessions = SessionTracker::new(credentials);
//! ```

mod credentials;

pub use credentials::{CredentialStore, RedisCredentialStore};

#[cfg(test)]
pub use credentials::MockCredentialStore;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
}
