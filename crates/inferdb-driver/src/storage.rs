use std::{env, path::Path, sync::Arc};

use libsql::{Builder, Connection, Database};
use thiserror::Error;

/// Handle to the schema store backing transactions. Points at either a local
/// database file or a remote libsql URL.
#[derive(Clone)]
pub struct SchemaStorage {
    inner: Arc<Database>,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to build schema store: {0}")]
    Build(libsql::Error),
    #[error("failed to open connection: {0}")]
    Connect(libsql::Error),
    #[error("failed to execute statement: {0}")]
    Statement(libsql::Error),
    #[error("missing required INFERDB_AUTH_TOKEN for remote schema store")]
    MissingAuthToken,
}

impl SchemaStorage {
    pub async fn new(database_path: &Path) -> Result<Self, StorageError> {
        let path_str = database_path.to_string_lossy();
        let inner = if is_remote(&path_str) {
            let auth_token = env::var("INFERDB_AUTH_TOKEN")
                .ok()
                .filter(|token| !token.is_empty())
                .ok_or(StorageError::MissingAuthToken)?;

            Builder::new_remote(path_str.to_string(), auth_token)
                .build()
                .await
        } else {
            Builder::new_local(path_str.to_string()).build().await
        }
        .map_err(StorageError::Build)?;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub async fn connection(&self) -> Result<Connection, StorageError> {
        let conn = self.inner.connect().map_err(StorageError::Connect)?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(StorageError::Statement)?;
        Ok(conn)
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(StorageError::Statement)?;
        let _ = rows.next().await.map_err(StorageError::Statement)?;
        Ok(())
    }
}

fn is_remote(path: &str) -> bool {
    path.starts_with("libsql://") || path.starts_with("http://") || path.starts_with("https://")
}
