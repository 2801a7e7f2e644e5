//! Shared API request/response types used by the API server and its clients.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Create a new client account. The account starts out pending until the
/// emailed activation code is submitted.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[garde(length(min = 3, max = 250))]
    pub first_name: String,
    #[garde(length(min = 3, max = 250))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 10, max = 15), pattern(r"^\+?[0-9]+$"))]
    pub phone_number: String,
    #[garde(length(min = 8, max = 125))]
    pub password: String,
}

/// Submit the activation code received via email.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivateAccountPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub code: String,
}

/// Request body for endpoints that only need an email address
/// (resend activation code, forgot password).
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailPayload {
    #[garde(email)]
    pub email: String,
}

/// Complete a password reset with the emailed code.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 6, max = 6), pattern(r"^[0-9]+$"))]
    pub reset_code: String,
    #[garde(length(min = 8, max = 125))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// Public view of the logged-in account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: String,
}

/// Returned by login. The refresh token travels separately in an HTTP-only cookie.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Generic `{ "message": ... }` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned after a successful purchase.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub message: String,
    pub transaction_id: i64,
}

/// A single ledger entry as seen by the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: i64,
    pub book_id: i64,
    /// Amount in cents.
    pub amount: i64,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub message: String,
    pub transactions: Vec<TransactionInfo>,
}

/// Stock a new book or replace an existing one's details. Prices are in cents.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    #[garde(length(min = 1, max = 125))]
    pub title: String,
    #[garde(range(min = 1))]
    pub unit_price: i64,
    #[garde(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInfo {
    pub id: i64,
    pub title: String,
    /// Price in cents.
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub message: String,
    pub book: BookInfo,
}

/// Add funds to a client's balance. Amount in cents.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreditPayload {
    #[garde(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub message: String,
    /// New balance in cents.
    pub balance: i64,
}

/// Store-wide counters for the admin dashboard.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub total_users: i64,
    /// Platform account balance in cents.
    pub admin_balance: i64,
    pub total_books: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    mod activation_code {
        use super::*;

        #[test]
        fn rejects_non_numeric_code() {
            let payload = ActivateAccountPayload {
                email: "test@example.com".into(),
                code: "abc123".into(),
            };

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_short_code() {
            let payload = ActivateAccountPayload {
                email: "test@example.com".into(),
                code: "12345".into(),
            };

            assert!(payload.validate().is_err());
        }

        #[test]
        fn accepts_valid_code() {
            let payload = ActivateAccountPayload {
                email: "test@example.com".into(),
                code: "123456".into(),
            };

            assert!(payload.validate().is_ok());
        }
    }

    mod register {
        use super::*;

        fn make_payload() -> RegisterPayload {
            RegisterPayload {
                first_name: "Alice".into(),
                last_name: "Reader".into(),
                email: "alice@example.com".into(),
                phone_number: "0788123456".into(),
                password: "correct-horse".into(),
            }
        }

        #[test]
        fn accepts_valid_payload() {
            assert!(make_payload().validate().is_ok());
        }

        #[test]
        fn rejects_short_password() {
            let payload = RegisterPayload {
                password: "short".into(),
                ..make_payload()
            };

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_phone_with_letters() {
            let payload = RegisterPayload {
                phone_number: "07881234ab".into(),
                ..make_payload()
            };

            assert!(payload.validate().is_err());
        }
    }

    mod book {
        use super::*;

        fn make_payload() -> BookPayload {
            BookPayload {
                title: "The Rust Book".into(),
                unit_price: 1_299,
                quantity: 3,
            }
        }

        #[test]
        fn accepts_valid_payload() {
            assert!(make_payload().validate().is_ok());
        }

        #[test]
        fn rejects_empty_title() {
            let payload = BookPayload {
                title: String::new(),
                ..make_payload()
            };

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_free_book_and_negative_stock() {
            let free = BookPayload {
                unit_price: 0,
                ..make_payload()
            };
            let negative = BookPayload {
                quantity: -1,
                ..make_payload()
            };

            assert!(free.validate().is_err());
            assert!(negative.validate().is_err());
        }

        #[test]
        fn reads_camel_case_fields() {
            let payload: BookPayload = serde_json::from_str(
                r#"{"title":"Dune","unitPrice":999,"quantity":2}"#,
            )
            .unwrap();

            assert_eq!(payload.unit_price, 999);
        }
    }

    #[test]
    fn credit_must_be_positive() {
        assert!(CreditPayload { amount: 0 }.validate().is_err());
        assert!(CreditPayload { amount: 500 }.validate().is_ok());
    }

    #[test]
    fn login_response_uses_camel_case() {
        let response = LoginResponse {
            message: "ok".into(),
            access_token: "token".into(),
            user: UserSummary {
                id: 1,
                full_name: "Alice Reader".into(),
                email: "alice@example.com".into(),
                role: "client".into(),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "token");
        assert_eq!(json["user"]["fullName"], "Alice Reader");
    }
}
