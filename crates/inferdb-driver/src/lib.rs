pub mod config;
pub mod logic;
pub mod migrations;
pub mod storage;
pub mod telemetry;
pub mod transaction;

pub use config::Config;
pub use logic::{LogicError, LogicManager, Rule, RuleError, RuleHandle, RuleOperation};
pub use migrations::run_migrations;
pub use storage::SchemaStorage;
pub use telemetry::{TelemetryError, init_logging};
pub use transaction::{
    RuleRecord, RuleRequest, RuleResponse, StoreTransaction, Transaction, TransactionError,
};
