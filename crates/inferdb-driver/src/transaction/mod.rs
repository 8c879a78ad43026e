pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;

pub use store::StoreTransaction;

/// One logical schema-store request. Each rule operation maps to exactly one
/// request; the response correlates to that request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleRequest {
    Define {
        label: String,
        when: String,
        then: String,
    },
    Rename {
        label: String,
        new_label: String,
    },
    Delete {
        label: String,
    },
    Lookup {
        label: String,
    },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResponse {
    Defined(RuleRecord),
    Renamed(RuleRecord),
    Deleted,
    Rule(Option<RuleRecord>),
    Rules(Vec<RuleRecord>),
}

/// A rule as stored in the schema, with its stable id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub label: String,
    pub when: String,
    pub then: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction is not open")]
    InvalidState,
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("rule label already in use: {0}")]
    NameConflict(String),
    #[error("invalid rule label: {0:?}")]
    InvalidLabel(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("transport failure: {0}")]
    Transport(#[from] libsql::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
}

/// Capability through which rule operations reach the schema store. Owned by
/// the caller and borrowed per call; rule handles never hold one.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Whether the transaction can still accept requests. False once committed
    /// or rolled back.
    fn is_open(&self) -> bool;

    /// Execute one request against the transaction's view of the schema.
    async fn execute(&self, request: RuleRequest) -> Result<RuleResponse, TransactionError>;
}
