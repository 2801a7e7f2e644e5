use std::sync::Arc;

use anyhow::Result;

use crate::{
    config::Config,
    repos::Repos,
    services::{EmailSender, PurchaseCoordinator, ResendLimiter, SessionTracker, TokenService},
    stores::Stores,
};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Database repositories.
    pub repos: Repos,
    /// Ephemeral stores (Redis).
    pub stores: Stores,
    /// Credential issuance and revocation.
    pub tokens: TokenService,
    /// Idle-timeout tracking.
    pub sessions: SessionTracker,
    /// Activation code resend throttling.
    pub resend: ResendLimiter,
    /// Book purchases.
    pub purchases: PurchaseCoordinator,
    /// Email sender.
    pub email: Arc<dyn EmailSender>,
}

impl AppState {
    /// Wire the domain services on top of the given repositories and stores.
    pub fn new(
        config: Config,
        repos: Repos,
        stores: Stores,
        email: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        let tokens = TokenService::new(&config.jwt_secret, stores.credentials.clone())?;
        let sessions = SessionTracker::new(stores.credentials.clone());
        let resend = ResendLimiter::new(repos.accounts.clone(), email.clone());
        let purchases = PurchaseCoordinator::new(repos.ledger.clone());

        Ok(Self {
            config,
            repos,
            stores,
            tokens,
            sessions,
            resend,
            purchases,
            email,
        })
    }
}
