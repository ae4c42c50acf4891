use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{CategoryId, ChannelId, GuildId, RoleId, UserId},
    scope::{PlatformObject, ScopeKind},
};

/// One `stat_config` row: whether activity at a scope object is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOverrideRule {
    pub guild_id: GuildId,
    pub kind_code: i16,
    pub object_id: u64,
    pub allow: bool,
}

impl LogOverrideRule {
    #[must_use]
    pub const fn new(guild_id: GuildId, kind: ScopeKind, object_id: u64, allow: bool) -> Self {
        Self {
            guild_id,
            kind_code: kind.code(),
            object_id,
            allow,
        }
    }

    #[must_use]
    pub fn for_object(guild_id: GuildId, target: &PlatformObject, allow: bool) -> Self {
        Self::new(guild_id, target.scope_kind(), target.object_id(), allow)
    }

    #[must_use]
    pub const fn scope_kind(&self) -> Option<ScopeKind> {
        ScopeKind::from_code(self.kind_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDecision {
    pub allowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LogPolicyEntry {
    pub kind: ScopeKind,
    pub object_id: u64,
    pub allow: bool,
}

/// Opt-out logging policy: everything is recorded unless a scope says no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLogPolicy {
    guild_id: GuildId,
    guild: bool,
    categories: HashMap<u64, bool>,
    channels: HashMap<u64, bool>,
    roles: HashMap<u64, bool>,
    users: HashMap<u64, bool>,
    skipped_rows: usize,
}

impl CompiledLogPolicy {
    #[must_use]
    pub fn compile(guild_id: GuildId, rows: &[LogOverrideRule]) -> Self {
        let mut policy = Self {
            guild_id,
            guild: true,
            categories: HashMap::new(),
            channels: HashMap::new(),
            roles: HashMap::new(),
            users: HashMap::new(),
            skipped_rows: 0,
        };

        for row in rows {
            match row.scope_kind() {
                Some(ScopeKind::Guild) => policy.guild = row.allow,
                Some(ScopeKind::Category) => {
                    policy.categories.insert(row.object_id, row.allow);
                }
                Some(ScopeKind::Channel) => {
                    policy.channels.insert(row.object_id, row.allow);
                }
                Some(ScopeKind::Role) => {
                    policy.roles.insert(row.object_id, row.allow);
                }
                Some(ScopeKind::User) => {
                    policy.users.insert(row.object_id, row.allow);
                }
                None => policy.skipped_rows += 1,
            }
        }

        policy
    }

    /// Same walk as the command resolver: guild, category, channel, roles in
    /// caller order, user. The last scope with a setting wins.
    #[must_use]
    pub fn decide(
        &self,
        channel: ChannelId,
        category: Option<CategoryId>,
        actor: UserId,
        actor_roles: &[RoleId],
    ) -> LogDecision {
        let mut allowed = self.guild;

        if let Some(value) = category.and_then(|category| self.categories.get(&category.get())) {
            allowed = *value;
        }
        if let Some(value) = self.channels.get(&channel.get()) {
            allowed = *value;
        }
        for role in actor_roles {
            if let Some(value) = self.roles.get(&role.get()) {
                allowed = *value;
            }
        }
        if let Some(value) = self.users.get(&actor.get()) {
            allowed = *value;
        }

        LogDecision { allowed }
    }

    #[must_use]
    pub const fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    #[must_use]
    pub const fn guild_default(&self) -> bool {
        self.guild
    }

    #[must_use]
    pub const fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LogPolicyEntry> {
        let mut entries = vec![LogPolicyEntry {
            kind: ScopeKind::Guild,
            object_id: self.guild_id.get(),
            allow: self.guild,
        }];
        for (kind, map) in [
            (ScopeKind::Category, &self.categories),
            (ScopeKind::Channel, &self.channels),
            (ScopeKind::Role, &self.roles),
            (ScopeKind::User, &self.users),
        ] {
            entries.extend(map.iter().map(|(object_id, allow)| LogPolicyEntry {
                kind,
                object_id: *object_id,
                allow: *allow,
            }));
        }
        entries.sort();
        entries
    }
}
