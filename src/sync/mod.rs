//! Keeps the local store and MailChimp in step.
//!
//! Every write follows the same shape: validate, open a transaction, write
//! locally, call MailChimp, commit. If anything after the transaction opens
//! fails, the transaction is rolled back and the caller gets the upstream
//! message.

mod lists;
mod members;

use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use actix_web::ResponseError;
pub use lists::ListSync;
pub use members::MemberSync;
use serde_json::json;

use crate::persistence::StoreError;
use crate::persistence::StoreTransaction;
use crate::utils::error_chain_fmt;
use crate::validation::FieldErrors;

const INVALID_DATA: &str = "Invalid data given";
const INVALID_REMOTE_DATA: &str = "Invalid data given during update data in DB";

#[derive(thiserror::Error)]
pub enum SyncError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: FieldErrors,
    },
    #[error("{0}")]
    NotFound(String),
    /// MailChimp (or the store, mid-transaction) failed; carries the
    /// upstream message
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl SyncError {
    /// Inbound data failed validation
    fn invalid(errors: FieldErrors) -> Self {
        Self::Validation {
            message: INVALID_DATA,
            errors,
        }
    }

    /// A record fetched from MailChimp failed validation
    fn invalid_remote(errors: FieldErrors) -> Self {
        Self::Validation {
            message: INVALID_REMOTE_DATA,
            errors,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self { Self::Unexpected(e.into()) }
}

impl Debug for SyncError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SyncError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Remote(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Validation { message, errors } => json!({
                "message": message,
                "errors": errors,
            }),
            // details stay in the logs
            Self::Unexpected(_) => json!({"message": "Internal server error"}),
            _ => json!({"message": self.to_string()}),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Commit on success, roll back on failure. A failed rollback is logged; the
/// caller always sees the original failure.
async fn commit_or_rollback<T>(
    transaction: Box<dyn StoreTransaction>,
    outcome: Result<T, anyhow::Error>,
) -> Result<T, SyncError> {
    match outcome {
        Ok(value) => match transaction.commit().await {
            Ok(()) => Ok(value),
            Err(e) => Err(SyncError::Remote(e.to_string())),
        },
        Err(e) => {
            tracing::warn!(error.cause_chain = ?e, "rolling back");
            if let Err(rollback) = transaction.rollback().await {
                tracing::error!(error.cause_chain = ?rollback, "rollback failed");
            }
            Err(SyncError::Remote(e.to_string()))
        }
    }
}
