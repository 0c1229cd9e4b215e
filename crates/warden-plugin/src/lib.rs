pub mod builtin;
pub mod capability;
pub mod chain;
pub mod error;
pub mod expr;
pub mod registry;
pub mod schedule;

pub use capability::{
    CheckContext, CheckResult, Checker, Notifier, NotifyContext, Trigger, TriggerContext,
};
pub use chain::{
    CheckChain, CheckChainResult, CheckRecord, ChainError, NotificationChain, TriggerChain,
};
pub use error::PluginError;
pub use expr::BoolExpr;
pub use registry::{InstanceSet, PluginRegistry};
pub use schedule::Schedule;
