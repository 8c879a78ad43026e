use thiserror::Error;
use tracing::info;

use crate::transaction::{RuleRequest, RuleResponse, Transaction, TransactionError};

use super::rule::RuleHandle;

#[derive(Debug, Error)]
pub enum LogicError {
    #[error("{0}: transaction is not open")]
    InvalidTransactionState(&'static str),
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("rule label already in use: {0}")]
    NameConflict(String),
    #[error("invalid rule label: {0:?}")]
    InvalidLabel(String),
    #[error("{op}: {source}")]
    Transport {
        op: &'static str,
        source: TransactionError,
    },
    #[error("{0}: unexpected response from transaction")]
    UnexpectedResponse(&'static str),
}

/// Entry point of the logic API: defines rules and produces `RuleHandle`s by
/// querying the schema through a caller-supplied transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicManager;

impl LogicManager {
    pub fn new() -> Self {
        Self
    }

    /// Define a new rule. The label must be unique within the schema; effects
    /// are durable once the transaction commits.
    pub async fn put_rule(
        &self,
        transaction: &dyn Transaction,
        label: &str,
        when: &str,
        then: &str,
    ) -> Result<RuleHandle, LogicError> {
        const OP: &str = "put_rule";
        if !transaction.is_open() {
            return Err(LogicError::InvalidTransactionState(OP));
        }

        let response = transaction
            .execute(RuleRequest::Define {
                label: label.to_string(),
                when: when.to_string(),
                then: then.to_string(),
            })
            .await
            .map_err(|err| tag(err, OP))?;

        match response {
            RuleResponse::Defined(record) => {
                info!(rule = %record.label, "rule defined");
                Ok(RuleHandle::from_record(record))
            }
            _ => Err(LogicError::UnexpectedResponse(OP)),
        }
    }

    /// Retrieve the rule with the given label, if the transaction's view
    /// contains one.
    pub async fn get_rule(
        &self,
        transaction: &dyn Transaction,
        label: &str,
    ) -> Result<Option<RuleHandle>, LogicError> {
        const OP: &str = "get_rule";
        if !transaction.is_open() {
            return Err(LogicError::InvalidTransactionState(OP));
        }

        let response = transaction
            .execute(RuleRequest::Lookup {
                label: label.to_string(),
            })
            .await
            .map_err(|err| tag(err, OP))?;

        match response {
            RuleResponse::Rule(record) => Ok(record.map(RuleHandle::from_record)),
            _ => Err(LogicError::UnexpectedResponse(OP)),
        }
    }

    /// Retrieve all rules visible to the transaction, ordered by label.
    pub async fn get_rules(
        &self,
        transaction: &dyn Transaction,
    ) -> Result<Vec<RuleHandle>, LogicError> {
        const OP: &str = "get_rules";
        if !transaction.is_open() {
            return Err(LogicError::InvalidTransactionState(OP));
        }

        let response = transaction
            .execute(RuleRequest::List)
            .await
            .map_err(|err| tag(err, OP))?;

        match response {
            RuleResponse::Rules(records) => Ok(records
                .into_iter()
                .map(RuleHandle::from_record)
                .collect()),
            _ => Err(LogicError::UnexpectedResponse(OP)),
        }
    }
}

fn tag(err: TransactionError, op: &'static str) -> LogicError {
    match err {
        TransactionError::InvalidState => LogicError::InvalidTransactionState(op),
        TransactionError::NotFound(label) => LogicError::NotFound(label),
        TransactionError::NameConflict(label) => LogicError::NameConflict(label),
        TransactionError::InvalidLabel(label) => LogicError::InvalidLabel(label),
        source => LogicError::Transport { op, source },
    }
}
