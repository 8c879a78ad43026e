use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Row, params};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::storage::SchemaStorage;

use super::{RuleRecord, RuleRequest, RuleResponse, Transaction, TransactionError};

const RULE_COLUMNS: &str = "id, label, when_clause, then_clause, created_at, updated_at";

/// The concrete transaction over the embedded schema store. Wraps a libsql
/// transaction; effects are visible inside it and durable only after
/// `commit`. Once committed or rolled back, every further request fails with
/// `InvalidState` without touching the database.
pub struct StoreTransaction {
    inner: Mutex<Option<libsql::Transaction>>,
    open: AtomicBool,
}

impl StoreTransaction {
    pub async fn begin(storage: &SchemaStorage) -> Result<Self, TransactionError> {
        let conn = storage.connection().await?;
        let tx = conn.transaction().await?;
        Ok(Self {
            inner: Mutex::new(Some(tx)),
            open: AtomicBool::new(true),
        })
    }

    pub async fn commit(&self) -> Result<(), TransactionError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(TransactionError::InvalidState)?;
        self.open.store(false, Ordering::SeqCst);
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<(), TransactionError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(TransactionError::InvalidState)?;
        self.open.store(false, Ordering::SeqCst);
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for StoreTransaction {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn execute(&self, request: RuleRequest) -> Result<RuleResponse, TransactionError> {
        let guard = self.inner.lock().await;
        let tx = guard.as_ref().ok_or(TransactionError::InvalidState)?;
        match request {
            RuleRequest::Define { label, when, then } => define(tx, &label, &when, &then).await,
            RuleRequest::Rename { label, new_label } => rename(tx, &label, &new_label).await,
            RuleRequest::Delete { label } => delete(tx, &label).await,
            RuleRequest::Lookup { label } => lookup(tx, &label).await,
            RuleRequest::List => list(tx).await,
        }
    }
}

async fn define(
    tx: &libsql::Transaction,
    label: &str,
    when: &str,
    then: &str,
) -> Result<RuleResponse, TransactionError> {
    validate_label(label)?;
    if label_taken(tx, label, None).await? {
        return Err(TransactionError::NameConflict(label.to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let mut rows = tx
        .query(
            &format!(
                "INSERT INTO rules (id, label, when_clause, then_clause, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 RETURNING {RULE_COLUMNS}"
            ),
            params![id, label, when, then, now],
        )
        .await?;

    debug!(label, "defined rule");
    match rows.next().await? {
        Some(row) => Ok(RuleResponse::Defined(row_to_record(row)?)),
        None => Err(TransactionError::NotFound(label.to_string())),
    }
}

async fn rename(
    tx: &libsql::Transaction,
    label: &str,
    new_label: &str,
) -> Result<RuleResponse, TransactionError> {
    validate_label(new_label)?;
    let current = match fetch(tx, label).await? {
        Some(record) => record,
        None => return Err(TransactionError::NotFound(label.to_string())),
    };
    if new_label == current.label {
        return Ok(RuleResponse::Renamed(current));
    }
    if label_taken(tx, new_label, Some(&current.id)).await? {
        return Err(TransactionError::NameConflict(new_label.to_string()));
    }

    let now = now_rfc3339();
    let mut rows = tx
        .query(
            &format!(
                "UPDATE rules SET label = ?1, updated_at = ?2 WHERE id = ?3
                 RETURNING {RULE_COLUMNS}"
            ),
            params![new_label, now, current.id],
        )
        .await?;

    debug!(from = label, to = new_label, "renamed rule");
    match rows.next().await? {
        Some(row) => Ok(RuleResponse::Renamed(row_to_record(row)?)),
        None => Err(TransactionError::NotFound(label.to_string())),
    }
}

async fn delete(tx: &libsql::Transaction, label: &str) -> Result<RuleResponse, TransactionError> {
    let affected = tx
        .execute("DELETE FROM rules WHERE label = ?1", params![label])
        .await?;
    if affected == 0 {
        return Err(TransactionError::NotFound(label.to_string()));
    }
    debug!(label, "deleted rule");
    Ok(RuleResponse::Deleted)
}

async fn lookup(tx: &libsql::Transaction, label: &str) -> Result<RuleResponse, TransactionError> {
    Ok(RuleResponse::Rule(fetch(tx, label).await?))
}

async fn list(tx: &libsql::Transaction) -> Result<RuleResponse, TransactionError> {
    let mut rows = tx
        .query(
            &format!("SELECT {RULE_COLUMNS} FROM rules ORDER BY label"),
            (),
        )
        .await?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        records.push(row_to_record(row)?);
    }
    Ok(RuleResponse::Rules(records))
}

async fn fetch(
    tx: &libsql::Transaction,
    label: &str,
) -> Result<Option<RuleRecord>, TransactionError> {
    let mut rows = tx
        .query(
            &format!("SELECT {RULE_COLUMNS} FROM rules WHERE label = ?1"),
            params![label],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_record(row)?)),
        None => Ok(None),
    }
}

async fn label_taken(
    tx: &libsql::Transaction,
    label: &str,
    exclude_id: Option<&str>,
) -> Result<bool, TransactionError> {
    let mut rows = match exclude_id {
        Some(id) => {
            tx.query(
                "SELECT 1 FROM rules WHERE label = ?1 AND id != ?2",
                params![label, id],
            )
            .await?
        }
        None => {
            tx.query("SELECT 1 FROM rules WHERE label = ?1", params![label])
                .await?
        }
    };
    Ok(rows.next().await?.is_some())
}

fn validate_label(label: &str) -> Result<(), TransactionError> {
    if label.trim().is_empty() {
        return Err(TransactionError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

fn row_to_record(row: Row) -> Result<RuleRecord, TransactionError> {
    let id: String = row.get(0)?;
    let label: String = row.get(1)?;
    let when: String = row.get(2)?;
    let then: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(RuleRecord {
        id,
        label,
        when,
        then,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
