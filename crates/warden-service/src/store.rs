use std::{collections::HashMap, convert::Infallible, future::Future};

use tokio::sync::RwLock;
use warden_core::{
    normalize_command_path, GuildId, LogOverrideRule, OverrideRule, RoleBypassConfig, RoleId,
};

/// Read side of the per-guild configuration tables.
pub trait RuleStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every `command_config` row of the guild, in storage order.
    fn load_command_rules(
        &self,
        guild_id: GuildId,
    ) -> impl Future<Output = Result<Vec<OverrideRule>, Self::Error>> + Send;

    fn load_role_bypass(
        &self,
        guild_id: GuildId,
    ) -> impl Future<Output = Result<Option<RoleBypassConfig>, Self::Error>> + Send;

    fn load_log_rules(
        &self,
        guild_id: GuildId,
    ) -> impl Future<Output = Result<Vec<LogOverrideRule>, Self::Error>> + Send;
}

/// Write side used by configuration commands.
///
/// Command rules are unique per `(guild, object, path)` and log rules per
/// `(guild, object)`. Upserting an existing key only replaces `allow`.
pub trait RuleStoreWriter: RuleStore {
    fn upsert_command_rule(
        &self,
        rule: OverrideRule,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn remove_command_rule(
        &self,
        guild_id: GuildId,
        object_id: u64,
        command_path: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn set_admin_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn set_manager_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn upsert_log_rule(
        &self,
        rule: LogOverrideRule,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn remove_log_rule(
        &self,
        guild_id: GuildId,
        object_id: u64,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    command_rules: RwLock<HashMap<GuildId, Vec<OverrideRule>>>,
    role_bypass: RwLock<HashMap<GuildId, RoleBypassConfig>>,
    log_rules: RwLock<HashMap<GuildId, Vec<LogOverrideRule>>>,
}

impl InMemoryRuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleStore for InMemoryRuleStore {
    type Error = Infallible;

    async fn load_command_rules(&self, guild_id: GuildId) -> Result<Vec<OverrideRule>, Infallible> {
        Ok(self
            .command_rules
            .read()
            .await
            .get(&guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_role_bypass(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<RoleBypassConfig>, Infallible> {
        Ok(self.role_bypass.read().await.get(&guild_id).copied())
    }

    async fn load_log_rules(&self, guild_id: GuildId) -> Result<Vec<LogOverrideRule>, Infallible> {
        Ok(self
            .log_rules
            .read()
            .await
            .get(&guild_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl RuleStoreWriter for InMemoryRuleStore {
    async fn upsert_command_rule(&self, mut rule: OverrideRule) -> Result<(), Infallible> {
        rule.command_path = normalize_command_path(&rule.command_path);
        let mut guard = self.command_rules.write().await;
        let rows = guard.entry(rule.guild_id).or_default();
        match rows
            .iter_mut()
            .find(|row| row.object_id == rule.object_id && row.command_path == rule.command_path)
        {
            Some(existing) => existing.allow = rule.allow,
            None => rows.push(rule),
        }
        Ok(())
    }

    async fn remove_command_rule(
        &self,
        guild_id: GuildId,
        object_id: u64,
        command_path: &str,
    ) -> Result<bool, Infallible> {
        let command_path = normalize_command_path(command_path);
        let mut guard = self.command_rules.write().await;
        let Some(rows) = guard.get_mut(&guild_id) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !(row.object_id == object_id && row.command_path == command_path));
        Ok(rows.len() != before)
    }

    async fn set_admin_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), Infallible> {
        let mut guard = self.role_bypass.write().await;
        guard
            .entry(guild_id)
            .or_insert_with(|| empty_bypass(guild_id))
            .admin_role_id = role_id;
        Ok(())
    }

    async fn set_manager_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), Infallible> {
        let mut guard = self.role_bypass.write().await;
        guard
            .entry(guild_id)
            .or_insert_with(|| empty_bypass(guild_id))
            .manager_role_id = role_id;
        Ok(())
    }

    async fn upsert_log_rule(&self, rule: LogOverrideRule) -> Result<(), Infallible> {
        let mut guard = self.log_rules.write().await;
        let rows = guard.entry(rule.guild_id).or_default();
        match rows.iter_mut().find(|row| row.object_id == rule.object_id) {
            Some(existing) => existing.allow = rule.allow,
            None => rows.push(rule),
        }
        Ok(())
    }

    async fn remove_log_rule(&self, guild_id: GuildId, object_id: u64) -> Result<bool, Infallible> {
        let mut guard = self.log_rules.write().await;
        let Some(rows) = guard.get_mut(&guild_id) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row.object_id != object_id);
        Ok(rows.len() != before)
    }
}

fn empty_bypass(guild_id: GuildId) -> RoleBypassConfig {
    RoleBypassConfig {
        guild_id,
        admin_role_id: None,
        manager_role_id: None,
    }
}

#[cfg(test)]
mod tests {
    use warden_core::{GuildId, LogOverrideRule, OverrideRule, RoleId, ScopeKind};

    use super::{InMemoryRuleStore, RuleStore, RuleStoreWriter};

    const GUILD: GuildId = GuildId::new(1);

    #[tokio::test]
    async fn command_upsert_only_replaces_allow() {
        let store = InMemoryRuleStore::new();
        store
            .upsert_command_rule(OverrideRule::new(GUILD, ScopeKind::Channel, 5, "stats", true))
            .await
            .expect("upsert should succeed");
        store
            .upsert_command_rule(OverrideRule::new(GUILD, ScopeKind::Channel, 5, " Stats ", false))
            .await
            .expect("upsert should succeed");

        let rows = store
            .load_command_rules(GUILD)
            .await
            .expect("load should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].command_path, "stats");
        assert!(!rows[0].allow);
    }

    #[tokio::test]
    async fn command_removal_reports_whether_a_row_existed() {
        let store = InMemoryRuleStore::new();
        store
            .upsert_command_rule(OverrideRule::new(GUILD, ScopeKind::Role, 9, "stats top", true))
            .await
            .expect("upsert should succeed");

        assert!(store
            .remove_command_rule(GUILD, 9, "stats top")
            .await
            .expect("remove should succeed"));
        assert!(!store
            .remove_command_rule(GUILD, 9, "stats top")
            .await
            .expect("remove should succeed"));
        assert!(!store
            .remove_command_rule(GuildId::new(2), 9, "stats top")
            .await
            .expect("remove should succeed"));
    }

    #[tokio::test]
    async fn admin_and_manager_roles_are_set_independently() {
        let store = InMemoryRuleStore::new();
        assert_eq!(
            store.load_role_bypass(GUILD).await.expect("load should succeed"),
            None
        );

        store
            .set_admin_role(GUILD, Some(RoleId::new(7)))
            .await
            .expect("set should succeed");
        store
            .set_manager_role(GUILD, Some(RoleId::new(8)))
            .await
            .expect("set should succeed");
        store
            .set_admin_role(GUILD, None)
            .await
            .expect("set should succeed");

        let bypass = store
            .load_role_bypass(GUILD)
            .await
            .expect("load should succeed")
            .expect("bypass row should exist");
        assert_eq!(bypass.admin_role_id, None);
        assert_eq!(bypass.manager_role_id, Some(RoleId::new(8)));
    }

    #[tokio::test]
    async fn log_rules_are_unique_per_object() {
        let store = InMemoryRuleStore::new();
        store
            .upsert_log_rule(LogOverrideRule::new(GUILD, ScopeKind::Channel, 3, false))
            .await
            .expect("upsert should succeed");
        store
            .upsert_log_rule(LogOverrideRule::new(GUILD, ScopeKind::Channel, 3, true))
            .await
            .expect("upsert should succeed");

        let rows = store.load_log_rules(GUILD).await.expect("load should succeed");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].allow);

        assert!(store
            .remove_log_rule(GUILD, 3)
            .await
            .expect("remove should succeed"));
        assert!(store
            .load_log_rules(GUILD)
            .await
            .expect("load should succeed")
            .is_empty());
    }
}
