//! Bearer credential issuance, verification and revocation.
//!
//! Credentials are HS256 JWTs in compact form:
//! `base64url(header).base64url(claims).base64url(HMAC-SHA256(secret, header.claims))`.
//!
//! Revocation is a Redis deny-list. A revoked token is stored under
//! `blacklisted_token:{token}` with a TTL equal to the token's remaining
//! lifetime, so entries disappear on their own once the token would have
//! expired anyway.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::{models::Role, stores::CredentialStore};

type HmacSha256 = Hmac<Sha256>;

/// Access tokens live for one hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Refresh tokens live for seven days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Who a credential speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// Access tokens authorize requests; refresh tokens only mint access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Access,
    Refresh,
}

/// Claims carried by every credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub kind: CredentialKind,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Access and refresh tokens issued together at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer credential")]
    MissingCredential,
    #[error("credential has been revoked")]
    Revoked,
    #[error("credential has expired")]
    Expired,
    #[error("credential signature or format is invalid")]
    Invalid,
    #[error("session expired due to inactivity")]
    SessionExpired,
    #[error("caller lacks the required role")]
    Forbidden,
    #[error("credential store unavailable")]
    Store(#[source] anyhow::Error),
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Signs, checks and revokes credentials.
#[derive(Clone)]
pub struct TokenService {
    key: HmacSha256,
    store: Arc<dyn CredentialStore>,
}

impl TokenService {
    pub fn new(secret: &str, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let key = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("invalid JWT signing secret"))?;

        Ok(Self { key, store })
    }

    fn blacklist_key(token: &str) -> String {
        format!("blacklisted_token:{}", token)
    }

    /// Issue an access credential for `identity` valid for `lifetime_secs` from now.
    pub fn issue(&self, identity: &Identity, lifetime_secs: i64) -> Result<String> {
        self.issue_at(identity, lifetime_secs, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        lifetime_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.sign(identity, CredentialKind::Access, lifetime_secs, now)
    }

    /// Issue the access + refresh pair handed out at login.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair> {
        self.issue_pair_at(identity, Utc::now())
    }

    pub fn issue_pair_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign(identity, CredentialKind::Access, ACCESS_TOKEN_TTL_SECS, now)?,
            refresh: self.sign(identity, CredentialKind::Refresh, REFRESH_TOKEN_TTL_SECS, now)?,
        })
    }

    fn sign(
        &self,
        identity: &Identity,
        kind: CredentialKind,
        lifetime_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let iat = now.timestamp();
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            kind,
            iat,
            exp: iat + lifetime_secs,
        };

        let payload = serde_json::to_vec(&claims)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let mut mac = self.key.clone();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Check signature and expiry. Does not consult the blacklist.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Invalid);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Invalid)?;

        let mut mac = self.key.clone();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::Invalid)?;

        let header: Header = decode_segment(header).ok_or(AuthError::Invalid)?;
        if header.alg != "HS256" {
            return Err(AuthError::Invalid);
        }

        let claims: Claims = decode_segment(payload).ok_or(AuthError::Invalid)?;
        if now.timestamp() > claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Blacklist a credential until its own expiry.
    ///
    /// Returns `false` when there is nothing to revoke: the token is malformed
    /// or already expired. The signature is not checked; only `exp` is read.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        self.revoke_at(token, Utc::now()).await
    }

    pub async fn revoke_at(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(claims) = decode_unverified(token) else {
            tracing::warn!("refusing to blacklist malformed token");
            return Ok(false);
        };

        let remaining = claims.exp - now.timestamp();
        if remaining <= 0 {
            return Ok(false);
        }

        self.store
            .set_ex(&Self::blacklist_key(token), "true", remaining as u64)
            .await?;

        tracing::info!(user_id = claims.id, ttl_secs = remaining, "token blacklisted");

        Ok(true)
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.store.exists(&Self::blacklist_key(token)).await
    }

    /// Full bearer check: deny-list first, then signature and expiry. Only
    /// access credentials pass.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        self.authenticate_at(token, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        self.check(token, CredentialKind::Access, now).await
    }

    /// Exchange a refresh token for a fresh access token bound to the same
    /// identity. The refresh token itself is left untouched (no rotation).
    pub async fn refresh_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = self
            .check(refresh_token, CredentialKind::Refresh, now)
            .await?;

        self.issue_at(&claims.identity(), ACCESS_TOKEN_TTL_SECS, now)
            .map_err(AuthError::Store)
    }

    async fn check(
        &self,
        token: &str,
        kind: CredentialKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        if self.is_revoked(token).await.map_err(AuthError::Store)? {
            return Err(AuthError::Revoked);
        }

        let claims = self.verify_at(token, now)?;
        if claims.kind != kind {
            return Err(AuthError::Invalid);
        }

        Ok(claims)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn decode_unverified(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    decode_segment(payload)
}
