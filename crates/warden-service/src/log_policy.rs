use std::sync::Arc;

use futures_util::future::FutureExt;
use warden_cache::{AsyncMemoized, CacheStatsSnapshot};
use warden_core::{
    CategoryId, ChannelId, CompiledLogPolicy, GuildId, LogOverrideRule, RoleId, UserId,
};

use crate::{
    command_policy::{GuildKey, Loader},
    store::{RuleStore, RuleStoreWriter},
};

pub(crate) const LOG_POLICY_CACHE: &str = "log_policy";

/// Per-guild activity logging policy. Same caching contract as
/// [`crate::CommandPolicyService`].
pub struct LogPolicyService<S: RuleStore> {
    store: Arc<S>,
    policies: AsyncMemoized<Loader<Arc<CompiledLogPolicy>, S::Error>, Arc<CompiledLogPolicy>>,
}

impl<S: RuleStore> LogPolicyService<S> {
    #[must_use]
    pub fn new(store: Arc<S>, capacity: usize) -> Self {
        let loader_store = Arc::clone(&store);
        let loader: Loader<Arc<CompiledLogPolicy>, S::Error> =
            Box::new(move |GuildKey(guild_id)| {
                let store = Arc::clone(&loader_store);
                async move { load_log_policy(store.as_ref(), guild_id).await }.boxed()
            });
        Self {
            store,
            policies: AsyncMemoized::wrap(LOG_POLICY_CACHE, capacity, loader),
        }
    }

    /// # Errors
    /// Returns the store error unchanged when the guild's rows cannot be read.
    pub async fn policy(&self, guild_id: GuildId) -> Result<Arc<CompiledLogPolicy>, S::Error> {
        self.policies.try_call(GuildKey(guild_id)).await
    }

    /// # Errors
    /// Returns the store error unchanged when the guild's rows cannot be read.
    pub async fn should_log(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        category: Option<CategoryId>,
        actor: UserId,
        actor_roles: &[RoleId],
    ) -> Result<bool, S::Error> {
        let policy = self.policy(guild_id).await?;
        Ok(policy.decide(channel, category, actor, actor_roles).allowed)
    }

    pub fn invalidate(&self, guild_id: GuildId) -> bool {
        self.policies.invalidate(&GuildKey(guild_id))
    }

    pub fn invalidate_containing(&self, needle: &str) -> usize {
        self.policies.invalidate_containing(needle)
    }

    #[must_use]
    pub fn cached_guilds(&self) -> usize {
        self.policies.cache().len()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.policies.cache().stats()
    }
}

impl<S: RuleStoreWriter> LogPolicyService<S> {
    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn set_rule(&self, rule: LogOverrideRule) -> Result<(), S::Error> {
        let guild_id = rule.guild_id;
        self.store.upsert_log_rule(rule).await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "stat_config.set",
            guild_id = %guild_id,
            kind_code = rule.kind_code,
            object_id = rule.object_id,
            allow = rule.allow
        );
        Ok(())
    }

    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn remove_rule(&self, guild_id: GuildId, object_id: u64) -> Result<bool, S::Error> {
        let removed = self.store.remove_log_rule(guild_id, object_id).await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "stat_config.remove",
            guild_id = %guild_id,
            object_id,
            outcome = if removed { "removed" } else { "missing" }
        );
        Ok(removed)
    }
}

async fn load_log_policy<S: RuleStore>(
    store: &S,
    guild_id: GuildId,
) -> Result<Arc<CompiledLogPolicy>, S::Error> {
    let rows = store.load_log_rules(guild_id).await?;
    let policy = CompiledLogPolicy::compile(guild_id, &rows);
    tracing::debug!(
        event = "policy.compile",
        policy = "log",
        guild_id = %guild_id,
        rules = rows.len(),
        skipped = policy.skipped_rows()
    );
    Ok(Arc::new(policy))
}
