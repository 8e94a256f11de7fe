//! Per-user credit balance.
//!
//! Balances live in `users/{uid}.credits`. The debit is a read-check-write
//! staged on a caller-owned [`Transaction`], so it commits or aborts
//! together with whatever else the caller stages (the job record). Refunds
//! are a single server-side increment and never read the balance.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentStore;
use crate::transaction::Transaction;
use crate::types::{FieldTransform, Precondition, ToFirestoreValue, Write};

pub const USERS_COLLECTION: &str = "users";
pub const CREDITS_FIELD: &str = "credits";

/// Why a debit was refused.
#[derive(Debug, Error)]
pub enum DebitError {
    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("User {user_id} has no credits left (balance {balance})")]
    InsufficientCredits { user_id: String, balance: i64 },

    #[error(transparent)]
    Store(#[from] FirestoreError),
}

/// What happened to a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded,
    /// The user document no longer exists; the credit is lost.
    UserMissing,
    /// The store rejected the write; the credit is lost.
    Failed,
}

#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn DocumentStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current balance, `None` if the user does not exist. A missing
    /// `credits` field reads as zero.
    pub async fn balance(&self, user_id: &str) -> FirestoreResult<Option<i64>> {
        let doc = self.store.get_document(USERS_COLLECTION, user_id).await?;
        Ok(doc.map(|d| d.get::<i64>(CREDITS_FIELD).unwrap_or(0)))
    }

    /// Stage a one-credit debit on `tx`.
    ///
    /// Reads the balance through the transaction, refuses when the user is
    /// missing or the balance is not positive, and otherwise stages
    /// `credits = balance - 1`. Nothing is written until the transaction
    /// commits; a concurrent change to the user document makes that commit
    /// fail with a precondition error. Returns the balance after the debit.
    pub async fn try_debit(&self, tx: &mut Transaction<'_>, user_id: &str) -> Result<i64, DebitError> {
        let doc = tx
            .get(USERS_COLLECTION, user_id)
            .await?
            .ok_or_else(|| DebitError::UserNotFound(user_id.to_string()))?;

        let balance = doc.get::<i64>(CREDITS_FIELD).unwrap_or(0);
        if balance <= 0 {
            debug!(user_id = %user_id, balance, "Debit refused, no credits");
            return Err(DebitError::InsufficientCredits {
                user_id: user_id.to_string(),
                balance,
            });
        }

        let remaining = balance - 1;
        let fields = HashMap::from([(CREDITS_FIELD.to_string(), remaining.to_firestore_value())]);
        let name = tx.document_name(USERS_COLLECTION, user_id);
        tx.stage(Write::merge(name, fields));

        Ok(remaining)
    }

    /// Return one credit to the user.
    ///
    /// Best effort: failures are logged and reported in the outcome, never
    /// propagated. The increment is guarded by `exists = true` so a deleted
    /// user is not recreated.
    pub async fn refund(&self, user_id: &str) -> RefundOutcome {
        let name = self.store.document_name(USERS_COLLECTION, user_id);
        let write = Write::merge(name, HashMap::new())
            .with_precondition(Precondition::exists(true))
            .with_transform(FieldTransform::increment(CREDITS_FIELD, 1));

        match self.store.commit(vec![write]).await {
            Ok(_) => {
                info!(user_id = %user_id, "Refunded 1 credit");
                RefundOutcome::Refunded
            }
            Err(e) if e.is_precondition_failed() || e.is_not_found() => {
                warn!(user_id = %user_id, "Refund skipped, user record no longer exists");
                RefundOutcome::UserMissing
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Refund failed");
                RefundOutcome::Failed
            }
        }
    }
}
