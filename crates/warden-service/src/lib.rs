#![forbid(unsafe_code)]

//! Cached command and logging policy resolution over a pluggable rule store.
//!
//! Each guild's rows are compiled once and kept in a bounded LRU table.
//! Configuration writes go through the services so the affected guild is
//! invalidated right after the store accepts the change.

mod command_policy;
mod config;
mod log_policy;
mod metrics;
mod state;
mod store;
mod telemetry;

pub use command_policy::{CommandPolicyService, GuildKey, Invocation};
pub use config::{
    AppConfig, COMMAND_CACHE_CAPACITY_VAR, DEFAULT_COMMAND_CACHE_CAPACITY,
    DEFAULT_LOG_CACHE_CAPACITY, DEFAULT_LOG_FILTER, LOG_CACHE_CAPACITY_VAR, LOG_FILTER_VAR,
};
pub use log_policy::LogPolicyService;
pub use metrics::render_metrics;
pub use state::AppState;
pub use store::{InMemoryRuleStore, RuleStore, RuleStoreWriter};
pub use telemetry::init_tracing;
