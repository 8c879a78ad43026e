use std::fmt;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::transaction::{
    RuleRecord, RuleRequest, RuleResponse, Transaction, TransactionError,
};

/// A schema-level inference rule: a condition (`when`) and a single
/// conclusion (`then`), identified by a unique label. Reads serve cached data;
/// every mutation goes through a caller-supplied transaction.
#[async_trait]
pub trait Rule: Send + Sync {
    /// The label as last synchronized from the server, at construction or
    /// after a successful rename.
    fn label(&self) -> String;

    /// The condition clause, fixed at rule creation.
    fn when(&self) -> &str;

    /// The conclusion statement, fixed at rule creation.
    fn then(&self) -> &str;

    /// Rename this rule. The new label must remain unique; the cached label is
    /// updated only after the server confirms. Effects are visible within
    /// `transaction` and durable once it commits.
    async fn set_label(
        &self,
        transaction: &dyn Transaction,
        new_label: &str,
    ) -> Result<(), RuleError>;

    /// Delete this rule within `transaction`'s view. Deleting an
    /// already-deleted rule reports `NotFound`.
    async fn delete(&self, transaction: &dyn Transaction) -> Result<(), RuleError>;

    /// Whether this rule is deleted in `transaction`'s view. A deleted rule is
    /// the `true` answer, not an error.
    async fn is_deleted(&self, transaction: &dyn Transaction) -> Result<bool, RuleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOperation {
    SetLabel,
    Delete,
    IsDeleted,
}

impl fmt::Display for RuleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleOperation::SetLabel => "set_label",
            RuleOperation::Delete => "delete",
            RuleOperation::IsDeleted => "is_deleted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{op} on rule '{label}': transaction is not open")]
    InvalidTransactionState { label: String, op: RuleOperation },
    #[error("{op} on rule '{label}': rule not found")]
    NotFound { label: String, op: RuleOperation },
    #[error("{op} on rule '{label}': label '{conflicting}' is already in use")]
    NameConflict {
        label: String,
        op: RuleOperation,
        conflicting: String,
    },
    #[error("{op} on rule '{label}': invalid label {invalid:?}")]
    InvalidLabel {
        label: String,
        op: RuleOperation,
        invalid: String,
    },
    #[error("{op} on rule '{label}': {source}")]
    Transport {
        label: String,
        op: RuleOperation,
        source: TransactionError,
    },
    #[error("{op} on rule '{label}': unexpected response from transaction")]
    UnexpectedResponse { label: String, op: RuleOperation },
}

/// Transaction-independent handle to one rule. Holds no connection and no
/// transaction; callers borrow it a transaction per mutating call. Identity is
/// the stable schema id, which survives renames.
#[derive(Debug)]
pub struct RuleHandle {
    id: String,
    label: RwLock<String>,
    when: String,
    then: String,
}

impl RuleHandle {
    pub(crate) fn from_record(record: RuleRecord) -> Self {
        Self {
            id: record.id,
            label: RwLock::new(record.label),
            when: record.when,
            then: record.then,
        }
    }

    /// Stable schema identifier, assigned when the rule was defined.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl PartialEq for RuleHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RuleHandle {}

#[async_trait]
impl Rule for RuleHandle {
    fn label(&self) -> String {
        self.label
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn when(&self) -> &str {
        &self.when
    }

    fn then(&self) -> &str {
        &self.then
    }

    async fn set_label(
        &self,
        transaction: &dyn Transaction,
        new_label: &str,
    ) -> Result<(), RuleError> {
        let current = self.label();
        if !transaction.is_open() {
            return Err(RuleError::InvalidTransactionState {
                label: current,
                op: RuleOperation::SetLabel,
            });
        }

        let response = transaction
            .execute(RuleRequest::Rename {
                label: current.clone(),
                new_label: new_label.to_string(),
            })
            .await
            .map_err(|err| tag(err, &current, RuleOperation::SetLabel))?;

        match response {
            RuleResponse::Renamed(record) => {
                let mut label = self.label.write().unwrap_or_else(PoisonError::into_inner);
                *label = record.label;
                drop(label);
                info!(rule = %current, new_label, "rule renamed");
                Ok(())
            }
            _ => Err(RuleError::UnexpectedResponse {
                label: current,
                op: RuleOperation::SetLabel,
            }),
        }
    }

    async fn delete(&self, transaction: &dyn Transaction) -> Result<(), RuleError> {
        let current = self.label();
        if !transaction.is_open() {
            return Err(RuleError::InvalidTransactionState {
                label: current,
                op: RuleOperation::Delete,
            });
        }

        let response = transaction
            .execute(RuleRequest::Delete {
                label: current.clone(),
            })
            .await
            .map_err(|err| tag(err, &current, RuleOperation::Delete))?;

        match response {
            RuleResponse::Deleted => {
                info!(rule = %current, "rule deleted");
                Ok(())
            }
            _ => Err(RuleError::UnexpectedResponse {
                label: current,
                op: RuleOperation::Delete,
            }),
        }
    }

    async fn is_deleted(&self, transaction: &dyn Transaction) -> Result<bool, RuleError> {
        let current = self.label();
        if !transaction.is_open() {
            return Err(RuleError::InvalidTransactionState {
                label: current,
                op: RuleOperation::IsDeleted,
            });
        }

        let response = transaction
            .execute(RuleRequest::Lookup {
                label: current.clone(),
            })
            .await
            .map_err(|err| tag(err, &current, RuleOperation::IsDeleted))?;

        match response {
            RuleResponse::Rule(record) => Ok(record.is_none()),
            _ => Err(RuleError::UnexpectedResponse {
                label: current,
                op: RuleOperation::IsDeleted,
            }),
        }
    }
}

/// Attach the rule and operation to a transaction failure. Kinds map through
/// unchanged; there is no local recovery or retry.
fn tag(err: TransactionError, label: &str, op: RuleOperation) -> RuleError {
    match err {
        TransactionError::InvalidState => RuleError::InvalidTransactionState {
            label: label.to_string(),
            op,
        },
        TransactionError::NotFound(missing) => RuleError::NotFound { label: missing, op },
        TransactionError::NameConflict(conflicting) => RuleError::NameConflict {
            label: label.to_string(),
            op,
            conflicting,
        },
        TransactionError::InvalidLabel(invalid) => RuleError::InvalidLabel {
            label: label.to_string(),
            op,
            invalid,
        },
        source => RuleError::Transport {
            label: label.to_string(),
            op,
            source,
        },
    }
}
