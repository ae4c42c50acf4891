use std::sync::Arc;

use warden_core::GuildId;

use crate::{
    command_policy::{CommandPolicyService, COMMAND_POLICY_CACHE},
    config::AppConfig,
    log_policy::{LogPolicyService, LOG_POLICY_CACHE},
    metrics::render_metrics,
    store::RuleStore,
};

/// Shared handle for command handlers and event listeners.
pub struct AppState<S: RuleStore> {
    pub store: Arc<S>,
    pub commands: CommandPolicyService<S>,
    pub logging: LogPolicyService<S>,
}

impl<S: RuleStore> AppState<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        tracing::info!(
            event = "state.init",
            command_cache_capacity = config.command_cache_capacity,
            log_cache_capacity = config.log_cache_capacity
        );
        Self {
            commands: CommandPolicyService::new(Arc::clone(&store), config.command_cache_capacity),
            logging: LogPolicyService::new(Arc::clone(&store), config.log_cache_capacity),
            store,
        }
    }

    /// Drops both cached policies of `guild_id`, e.g. when the bot leaves it.
    pub fn forget_guild(&self, guild_id: GuildId) {
        let commands = self.commands.invalidate(guild_id);
        let logging = self.logging.invalidate(guild_id);
        tracing::debug!(
            event = "state.forget_guild",
            guild_id = %guild_id,
            commands,
            logging
        );
    }

    #[must_use]
    pub fn render_metrics(&self) -> String {
        render_metrics(&[
            (COMMAND_POLICY_CACHE, self.commands.cache_stats()),
            (LOG_POLICY_CACHE, self.logging.cache_stats()),
        ])
    }
}
