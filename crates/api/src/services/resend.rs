//! Throttling for activation code resends.
//!
//! State lives on the account row (`resend_count`, `last_resend_at`,
//! `resend_lock_until`). Checks run in a fixed order:
//!
//! 1. lock still active → `Locked`
//! 2. last resend under a minute ago → `TooSoon`
//! 3. two codes already resent → impose a 10 minute lock, reset the count, `Locked`
//! 4. otherwise send a new code and bump the count
//!
//! The third attempt after cooldowns therefore becomes a lockout instead of a
//! third code. Imposing a lock leaves `last_resend_at` as it was.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    models::{AccountStatus, ResendState},
    repos::AccountRepo,
    services::{
        codes::{generate_code, hash_code},
        email::{CodeKind, EmailSender},
    },
};

/// Minimum gap between two resends.
pub const RESEND_COOLDOWN_SECS: i64 = 60;
/// Resends allowed before the next attempt triggers a lock.
pub const MAX_RESENDS: i32 = 2;
/// Lock length once `MAX_RESENDS` is reached.
pub const RESEND_LOCK_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum ResendError {
    #[error("account not found")]
    UnknownAccount,
    #[error("account is already activated")]
    AlreadyActive,
    #[error("Please wait {seconds_left} seconds before resending the code.")]
    TooSoon { seconds_left: i64 },
    #[error("Too many attempts. Please try again in {wait_minutes} minutes.")]
    Locked { wait_minutes: i64 },
    #[error("resend state unavailable")]
    Store(#[source] anyhow::Error),
}

/// What to do with a resend request, decided purely from state and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendDecision {
    /// Send a code and persist the new state.
    Send(ResendState),
    /// Persist the new (locked) state and reject.
    Lock(ResendState),
    /// Reject with the lock's remaining minutes.
    Locked { wait_minutes: i64 },
    /// Reject with the cooldown's remaining seconds.
    TooSoon { seconds_left: i64 },
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

/// Evaluate the resend state machine at `now`.
pub fn evaluate(state: ResendState, now: DateTime<Utc>) -> ResendDecision {
    if let Some(lock_until) = state.resend_lock_until
        && now < lock_until
    {
        let remaining_ms = (lock_until - now).num_milliseconds();
        return ResendDecision::Locked {
            wait_minutes: ceil_div(remaining_ms, 60_000),
        };
    }

    if let Some(last) = state.last_resend_at {
        let elapsed_ms = (now - last).num_milliseconds();
        let cooldown_ms = RESEND_COOLDOWN_SECS * 1000;
        if elapsed_ms < cooldown_ms {
            return ResendDecision::TooSoon {
                seconds_left: ceil_div(cooldown_ms - elapsed_ms, 1000),
            };
        }
    }

    if state.resend_count >= MAX_RESENDS {
        return ResendDecision::Lock(ResendState {
            resend_count: 0,
            last_resend_at: state.last_resend_at,
            resend_lock_until: Some(now + Duration::minutes(RESEND_LOCK_MINUTES)),
        });
    }

    ResendDecision::Send(ResendState {
        resend_count: state.resend_count + 1,
        last_resend_at: Some(now),
        resend_lock_until: state.resend_lock_until,
    })
}

#[derive(Clone)]
pub struct ResendLimiter {
    accounts: Arc<dyn AccountRepo>,
    email: Arc<dyn EmailSender>,
}

impl ResendLimiter {
    pub fn new(accounts: Arc<dyn AccountRepo>, email: Arc<dyn EmailSender>) -> Self {
        Self { accounts, email }
    }

    /// Resend the activation code for `email` if the account's throttle allows it.
    pub async fn check_and_record(&self, email: &str) -> Result<(), ResendError> {
        self.check_and_record_at(email, Utc::now()).await
    }

    pub async fn check_and_record_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ResendError> {
        let account = self
            .accounts
            .find_by_email(email)
            .await
            .map_err(ResendError::Store)?
            .ok_or(ResendError::UnknownAccount)?;

        if account.status == AccountStatus::Active {
            return Err(ResendError::AlreadyActive);
        }

        match evaluate(account.resend_state(), now) {
            ResendDecision::Locked { wait_minutes } => Err(ResendError::Locked { wait_minutes }),
            ResendDecision::TooSoon { seconds_left } => Err(ResendError::TooSoon { seconds_left }),
            ResendDecision::Lock(next) => {
                self.accounts
                    .save_resend_state(account.id, next, None)
                    .await
                    .map_err(ResendError::Store)?;

                tracing::warn!(user_id = account.id, "activation code resend locked");

                Err(ResendError::Locked {
                    wait_minutes: RESEND_LOCK_MINUTES,
                })
            }
            ResendDecision::Send(next) => {
                let code = generate_code();

                self.accounts
                    .save_resend_state(account.id, next, Some(hash_code(&code)))
                    .await
                    .map_err(ResendError::Store)?;

                self.email
                    .send_code(&account.email, &account.full_name(), CodeKind::Activation, &code)
                    .await
                    .map_err(ResendError::Store)?;

                tracing::info!(
                    user_id = account.id,
                    resend_count = next.resend_count,
                    "activation code resent"
                );

                Ok(())
            }
        }
    }
}
