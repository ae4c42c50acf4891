use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use warden_cache::{AsyncMemoized, CacheStatsSnapshot, KeyArgs, KeyBuilder};
use warden_core::{
    normalize_command_path, CategoryId, ChannelId, CompiledPolicy, Decision, GuildId,
    OverrideRule, RoleId, UserId,
};

use crate::store::{RuleStore, RuleStoreWriter};

pub(crate) const COMMAND_POLICY_CACHE: &str = "command_policy";

pub(crate) type Loader<V, E> =
    Box<dyn Fn(GuildKey) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Cache key for anything compiled per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuildKey(pub GuildId);

impl KeyArgs for GuildKey {
    fn write_key(&self, key: &mut KeyBuilder) {
        key.arg(&self.0.get());
    }
}

/// Everything the resolver needs to know about one command invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub channel: ChannelId,
    pub category: Option<CategoryId>,
    pub actor: UserId,
    /// Roles in the order the platform reported them.
    pub actor_roles: &'a [RoleId],
    pub command_path: &'a str,
}

/// Per-guild command policy, compiled once and served from an LRU table
/// until a configuration change invalidates it.
pub struct CommandPolicyService<S: RuleStore> {
    store: Arc<S>,
    policies: AsyncMemoized<Loader<Arc<CompiledPolicy>, S::Error>, Arc<CompiledPolicy>>,
}

impl<S: RuleStore> CommandPolicyService<S> {
    #[must_use]
    pub fn new(store: Arc<S>, capacity: usize) -> Self {
        let loader_store = Arc::clone(&store);
        let loader: Loader<Arc<CompiledPolicy>, S::Error> = Box::new(move |GuildKey(guild_id)| {
            let store = Arc::clone(&loader_store);
            async move { load_policy(store.as_ref(), guild_id).await }.boxed()
        });
        Self {
            store,
            policies: AsyncMemoized::wrap(COMMAND_POLICY_CACHE, capacity, loader),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// # Errors
    /// Returns the store error unchanged when the guild's rows cannot be read.
    pub async fn policy(&self, guild_id: GuildId) -> Result<Arc<CompiledPolicy>, S::Error> {
        self.policies.try_call(GuildKey(guild_id)).await
    }

    /// # Errors
    /// Returns the store error unchanged when the guild's rows cannot be read.
    pub async fn decide(
        &self,
        guild_id: GuildId,
        invocation: &Invocation<'_>,
    ) -> Result<Decision, S::Error> {
        let policy = self.policy(guild_id).await?;
        let decision = policy.decide(
            invocation.channel,
            invocation.category,
            invocation.actor,
            invocation.actor_roles,
            invocation.command_path,
        );
        tracing::trace!(
            event = "policy.decide",
            policy = "command",
            guild_id = %guild_id,
            command = invocation.command_path,
            allowed = decision.allowed,
            is_admin = decision.is_admin,
            is_manager = decision.is_manager
        );
        Ok(decision)
    }

    /// Drops the cached policy of `guild_id`. Returns whether one was cached.
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

impl<S: RuleStoreWriter> CommandPolicyService<S> {
    /// Stores `rule` and invalidates its guild.
    ///
    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn set_rule(&self, mut rule: OverrideRule) -> Result<(), S::Error> {
        let guild_id = rule.guild_id;
        rule.command_path = normalize_command_path(&rule.command_path);
        let (kind_code, object_id, allow) = (rule.kind_code, rule.object_id, rule.allow);
        let command = rule.command_path.clone();
        self.store.upsert_command_rule(rule).await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "command_config.set",
            guild_id = %guild_id,
            kind_code,
            object_id,
            command = %command,
            allow
        );
        Ok(())
    }

    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn remove_rule(
        &self,
        guild_id: GuildId,
        object_id: u64,
        command_path: &str,
    ) -> Result<bool, S::Error> {
        let command_path = normalize_command_path(command_path);
        let removed = self
            .store
            .remove_command_rule(guild_id, object_id, &command_path)
            .await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "command_config.remove",
            guild_id = %guild_id,
            object_id,
            command = %command_path,
            outcome = if removed { "removed" } else { "missing" }
        );
        Ok(removed)
    }

    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn set_admin_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), S::Error> {
        self.store.set_admin_role(guild_id, role_id).await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "role_config.set",
            guild_id = %guild_id,
            field = "admin",
            role_id = role_id.map(RoleId::get)
        );
        Ok(())
    }

    /// # Errors
    /// Returns the store error unchanged; the cache is left untouched then.
    pub async fn set_manager_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), S::Error> {
        self.store.set_manager_role(guild_id, role_id).await?;
        self.invalidate(guild_id);
        tracing::info!(
            event = "role_config.set",
            guild_id = %guild_id,
            field = "manager",
            role_id = role_id.map(RoleId::get)
        );
        Ok(())
    }
}

async fn load_policy<S: RuleStore>(
    store: &S,
    guild_id: GuildId,
) -> Result<Arc<CompiledPolicy>, S::Error> {
    let rows = store.load_command_rules(guild_id).await?;
    let bypass = store.load_role_bypass(guild_id).await?;
    let policy = CompiledPolicy::compile(guild_id, &rows, bypass.as_ref());
    tracing::debug!(
        event = "policy.compile",
        policy = "command",
        guild_id = %guild_id,
        rules = rows.len(),
        skipped = policy.skipped_rows()
    );
    Ok(Arc::new(policy))
}
