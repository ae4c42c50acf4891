use serde::{Deserialize, Serialize};

use crate::{
    ids::{CategoryId, ChannelId, GuildId, RoleId, UserId},
    DomainError,
};

/// Kind of object an override rule is attached to.
///
/// Variant order is resolution precedence, lowest first. The derived `Ord`
/// is what the resolvers walk; reordering variants changes outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Guild,
    Category,
    Channel,
    Role,
    User,
}

impl ScopeKind {
    pub const PRECEDENCE: [Self; 5] = [
        Self::Guild,
        Self::Category,
        Self::Channel,
        Self::Role,
        Self::User,
    ];

    /// Storage code used by the rule tables. Unrelated to precedence.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Guild => 0,
            Self::Channel => 1,
            Self::User => 2,
            Self::Role => 3,
            Self::Category => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Guild),
            1 => Some(Self::Channel),
            2 => Some(Self::User),
            3 => Some(Self::Role),
            4 => Some(Self::Category),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::Category => "category",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::User => "user",
        }
    }
}

impl TryFrom<i16> for ScopeKind {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or(DomainError::UnknownScopeKind(value))
    }
}

impl core::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform object an override can be written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformObject {
    Guild { id: GuildId, name: String },
    TextChannel { id: ChannelId },
    VoiceChannel { id: ChannelId },
    StageChannel { id: ChannelId },
    Category { id: CategoryId, name: String },
    Role { id: RoleId },
    Member { id: UserId },
    User { id: UserId },
}

impl PlatformObject {
    #[must_use]
    pub const fn scope_kind(&self) -> ScopeKind {
        match self {
            Self::Guild { .. } => ScopeKind::Guild,
            Self::TextChannel { .. } | Self::VoiceChannel { .. } | Self::StageChannel { .. } => {
                ScopeKind::Channel
            }
            Self::Category { .. } => ScopeKind::Category,
            Self::Role { .. } => ScopeKind::Role,
            Self::Member { .. } | Self::User { .. } => ScopeKind::User,
        }
    }

    #[must_use]
    pub const fn object_id(&self) -> u64 {
        match self {
            Self::Guild { id, .. } => id.get(),
            Self::TextChannel { id } | Self::VoiceChannel { id } | Self::StageChannel { id } => {
                id.get()
            }
            Self::Category { id, .. } => id.get(),
            Self::Role { id } => id.get(),
            Self::Member { id } | Self::User { id } => id.get(),
        }
    }

    /// Human-readable label for confirmation messages and listings.
    #[must_use]
    pub fn scope_label(&self) -> String {
        match self {
            Self::Guild { name, .. } => format!("Guild {name}"),
            Self::TextChannel { id } | Self::VoiceChannel { id } | Self::StageChannel { id } => {
                format!("Channel <#{id}>")
            }
            Self::Category { name, .. } => format!("Category {name}"),
            Self::Role { id } => format!("Role <@&{id}>"),
            Self::Member { id } | Self::User { id } => format!("User <@{id}>"),
        }
    }
}

/// Lowercases and collapses whitespace so stored paths and queried paths
/// compare equal token by token.
#[must_use]
pub fn normalize_command_path(path: &str) -> String {
    path.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expands a command path into every prefix, from the empty path up to the
/// full path: `"role create"` becomes `["", "role", "role create"]`.
#[must_use]
pub fn command_prefixes(path: &str) -> Vec<String> {
    let normalized = normalize_command_path(path);
    let mut prefixes = vec![String::new()];
    let mut current = String::new();
    for token in normalized.split(' ').filter(|token| !token.is_empty()) {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(token);
        prefixes.push(current.clone());
    }
    prefixes
}
