#![forbid(unsafe_code)]

//! Hierarchical access policies for guild commands and activity logging.
//!
//! Rules are attached to a scope object (guild, category, channel, role or
//! user). Resolution walks the scopes from broadest to narrowest and the last
//! scope holding a matching rule decides.

mod command_policy;
mod ids;
mod log_policy;
mod scope;

pub use command_policy::{
    CompiledPolicy, Decision, MatchedRule, MatchedRules, OverrideRule, PolicyEntry,
    RoleBypassConfig,
};
pub use ids::{CategoryId, ChannelId, GuildId, RoleId, UserId};
pub use log_policy::{CompiledLogPolicy, LogDecision, LogOverrideRule, LogPolicyEntry};
pub use scope::{command_prefixes, normalize_command_path, PlatformObject, ScopeKind};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("scope kind code {0} is unknown")]
    UnknownScopeKind(i16),
}
