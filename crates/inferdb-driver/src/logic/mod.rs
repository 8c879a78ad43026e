pub mod manager;
pub mod rule;

pub use manager::{LogicError, LogicManager};
pub use rule::{Rule, RuleError, RuleHandle, RuleOperation};
