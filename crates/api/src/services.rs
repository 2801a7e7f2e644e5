//! Domain services and external service abstractions.
//!
//! ## Services
//!
//! - **tokens** - Signed bearer credentials: issue, verify, revoke (Redis deny-list)
//! - **session** - Sliding-window idle timeout per identity (Redis)
//! - **resend** - Activation code resend throttling (account row state)
//! - **purchase** - Atomic balance transfer for book purchases (PostgreSQL)
//! - **email** - One-time code delivery via Resend (prod) or SMTP (dev)
//! - **codes** / **passwords** - One-time code and password hashing helpers
//!
//! ## Usage in Handlers
//!
//! Services are accessed via `AppState`:
//!
//! ```ignore
//! async fn handler(user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let receipt = state.purchases.execute(user.id, book_id).await?;
//!     state.sessions.clear(user.id).await?;
//! }
//! ```

pub mod codes;
pub mod email;
pub mod passwords;
pub mod purchase;
pub mod resend;
pub mod session;
pub mod tokens;

pub use email::{CodeKind, EmailSender, EmailSenderImpl};
pub use purchase::{PurchaseCoordinator, PurchaseError};
pub use resend::{ResendError, ResendLimiter};
pub use session::SessionTracker;
pub use tokens::{AuthError, Claims, Identity, TokenService};

#[cfg(test)]
pub use email::MockEmailSender;
