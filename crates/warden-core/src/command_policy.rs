use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{CategoryId, ChannelId, GuildId, RoleId, UserId},
    scope::{command_prefixes, normalize_command_path, PlatformObject, ScopeKind},
};

/// One `command_config` row as handed over by the rule store.
///
/// `kind_code` stays raw so rows written by newer releases with kinds this
/// build does not know about can be carried and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub guild_id: GuildId,
    pub kind_code: i16,
    pub object_id: u64,
    pub command_path: String,
    pub allow: bool,
}

impl OverrideRule {
    #[must_use]
    pub fn new(
        guild_id: GuildId,
        kind: ScopeKind,
        object_id: u64,
        command_path: &str,
        allow: bool,
    ) -> Self {
        Self {
            guild_id,
            kind_code: kind.code(),
            object_id,
            command_path: normalize_command_path(command_path),
            allow,
        }
    }

    #[must_use]
    pub fn for_object(
        guild_id: GuildId,
        target: &PlatformObject,
        command_path: &str,
        allow: bool,
    ) -> Self {
        Self::new(
            guild_id,
            target.scope_kind(),
            target.object_id(),
            command_path,
            allow,
        )
    }

    #[must_use]
    pub const fn scope_kind(&self) -> Option<ScopeKind> {
        ScopeKind::from_code(self.kind_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBypassConfig {
    pub guild_id: GuildId,
    pub admin_role_id: Option<RoleId>,
    pub manager_role_id: Option<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PathRules {
    allowed: HashSet<String>,
    denied: HashSet<String>,
}

impl PathRules {
    fn put(&mut self, path: String, allow: bool) {
        if allow {
            self.denied.remove(&path);
            self.allowed.insert(path);
        } else {
            self.allowed.remove(&path);
            self.denied.insert(path);
        }
    }

    /// Walks the prefixes against this scope object, recording every match
    /// and letting the most specific one set `allowed`.
    fn apply(
        &self,
        prefixes: &[String],
        object_id: u64,
        kind: ScopeKind,
        allowed: &mut bool,
        matched: &mut MatchedRules,
    ) {
        for prefix in prefixes {
            if self.allowed.contains(prefix) {
                matched.allowed.insert(MatchedRule::new(prefix, object_id, kind));
                *allowed = true;
            } else if self.denied.contains(prefix) {
                matched.denied.insert(MatchedRule::new(prefix, object_id, kind));
                *allowed = false;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchedRule {
    pub path: String,
    pub object_id: u64,
    pub kind: ScopeKind,
}

impl MatchedRule {
    fn new(path: &str, object_id: u64, kind: ScopeKind) -> Self {
        Self {
            path: path.to_owned(),
            object_id,
            kind,
        }
    }
}

/// Every rule that fired during one resolution, whether or not it decided
/// the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRules {
    pub allowed: BTreeSet<MatchedRule>,
    pub denied: BTreeSet<MatchedRule>,
}

impl MatchedRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty() && self.denied.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len() + self.denied.len()
    }

    #[must_use]
    pub fn has_override_at(&self, kind: ScopeKind) -> bool {
        self.allowed
            .iter()
            .chain(self.denied.iter())
            .any(|rule| rule.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub is_admin: bool,
    pub is_manager: bool,
    pub matched: MatchedRules,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PolicyEntry {
    pub kind: ScopeKind,
    pub object_id: u64,
    pub path: String,
    pub allow: bool,
}

/// Per-guild command overrides, compiled once from the stored rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPolicy {
    guild_id: GuildId,
    admin_role: Option<RoleId>,
    manager_role: Option<RoleId>,
    guild: PathRules,
    categories: HashMap<u64, PathRules>,
    channels: HashMap<u64, PathRules>,
    roles: HashMap<u64, PathRules>,
    users: HashMap<u64, PathRules>,
    skipped_rows: usize,
}

impl CompiledPolicy {
    /// Builds the policy for `guild_id`. Rows with an unknown scope kind are
    /// counted and ignored.
    #[must_use]
    pub fn compile(
        guild_id: GuildId,
        rows: &[OverrideRule],
        bypass: Option<&RoleBypassConfig>,
    ) -> Self {
        let mut policy = Self {
            guild_id,
            admin_role: bypass.and_then(|config| config.admin_role_id),
            manager_role: bypass.and_then(|config| config.manager_role_id),
            guild: PathRules::default(),
            categories: HashMap::new(),
            channels: HashMap::new(),
            roles: HashMap::new(),
            users: HashMap::new(),
            skipped_rows: 0,
        };

        for row in rows {
            let Some(kind) = row.scope_kind() else {
                policy.skipped_rows += 1;
                continue;
            };
            let path = normalize_command_path(&row.command_path);
            let rules = match kind {
                ScopeKind::Guild => &mut policy.guild,
                ScopeKind::Category => policy.categories.entry(row.object_id).or_default(),
                ScopeKind::Channel => policy.channels.entry(row.object_id).or_default(),
                ScopeKind::Role => policy.roles.entry(row.object_id).or_default(),
                ScopeKind::User => policy.users.entry(row.object_id).or_default(),
            };
            rules.put(path, row.allow);
        }

        policy
    }

    /// Resolves `command_path` for an actor in `channel`.
    ///
    /// Scopes are visited guild, category, channel, each role in the order
    /// given, then the user; the last scope with a matching rule wins. The
    /// bypass flags are reported alongside and never folded into `allowed`.
    #[must_use]
    pub fn decide(
        &self,
        channel: ChannelId,
        category: Option<CategoryId>,
        actor: UserId,
        actor_roles: &[RoleId],
        command_path: &str,
    ) -> Decision {
        let prefixes = command_prefixes(command_path);
        let mut allowed = true;
        let mut matched = MatchedRules::default();

        self.guild.apply(
            &prefixes,
            self.guild_id.get(),
            ScopeKind::Guild,
            &mut allowed,
            &mut matched,
        );

        if let Some(category) = category {
            if let Some(rules) = self.categories.get(&category.get()) {
                rules.apply(
                    &prefixes,
                    category.get(),
                    ScopeKind::Category,
                    &mut allowed,
                    &mut matched,
                );
            }
        }

        if let Some(rules) = self.channels.get(&channel.get()) {
            rules.apply(
                &prefixes,
                channel.get(),
                ScopeKind::Channel,
                &mut allowed,
                &mut matched,
            );
        }

        let mut is_admin = false;
        let mut is_manager = false;
        // Caller order decides ties between roles; no rank sorting.
        for role in actor_roles {
            if self.admin_role == Some(*role) {
                is_admin = true;
            }
            if self.manager_role == Some(*role) {
                is_manager = true;
            }
            if let Some(rules) = self.roles.get(&role.get()) {
                rules.apply(
                    &prefixes,
                    role.get(),
                    ScopeKind::Role,
                    &mut allowed,
                    &mut matched,
                );
            }
        }

        if let Some(rules) = self.users.get(&actor.get()) {
            rules.apply(
                &prefixes,
                actor.get(),
                ScopeKind::User,
                &mut allowed,
                &mut matched,
            );
        }

        Decision {
            allowed,
            is_admin,
            is_manager,
            matched,
        }
    }

    #[must_use]
    pub const fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    #[must_use]
    pub const fn admin_role(&self) -> Option<RoleId> {
        self.admin_role
    }

    #[must_use]
    pub const fn manager_role(&self) -> Option<RoleId> {
        self.manager_role
    }

    #[must_use]
    pub const fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Every compiled rule, sorted by scope precedence, object id, then path.
    #[must_use]
    pub fn entries(&self) -> Vec<PolicyEntry> {
        let mut entries = Vec::new();
        push_entries(&mut entries, ScopeKind::Guild, self.guild_id.get(), &self.guild);
        for (kind, map) in [
            (ScopeKind::Category, &self.categories),
            (ScopeKind::Channel, &self.channels),
            (ScopeKind::Role, &self.roles),
            (ScopeKind::User, &self.users),
        ] {
            for (object_id, rules) in map {
                push_entries(&mut entries, kind, *object_id, rules);
            }
        }
        entries.sort();
        entries
    }
}

fn push_entries(entries: &mut Vec<PolicyEntry>, kind: ScopeKind, object_id: u64, rules: &PathRules) {
    let allowed = rules.allowed.iter().map(|path| (path, true));
    let denied = rules.denied.iter().map(|path| (path, false));
    for (path, allow) in allowed.chain(denied) {
        entries.push(PolicyEntry {
            kind,
            object_id,
            path: path.clone(),
            allow,
        });
    }
}
