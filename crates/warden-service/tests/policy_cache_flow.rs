use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use warden_core::{
    CategoryId, ChannelId, GuildId, LogOverrideRule, MatchedRules, OverrideRule, PlatformObject,
    RoleBypassConfig, RoleId, ScopeKind, UserId,
};
use warden_service::{
    AppConfig, AppState, CommandPolicyService, InMemoryRuleStore, Invocation, LogPolicyService,
    RuleStore, RuleStoreWriter,
};

const GUILD: GuildId = GuildId::new(1_000);
const CHANNEL: ChannelId = ChannelId::new(1_001);
const CATEGORY: CategoryId = CategoryId::new(1_002);
const USER: UserId = UserId::new(1_003);
const R1: RoleId = RoleId::new(1_004);

/// Wraps the in-memory store and counts reads so cache hits are observable.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryRuleStore,
    command_loads: AtomicUsize,
    log_loads: AtomicUsize,
}

impl CountingStore {
    fn command_loads(&self) -> usize {
        self.command_loads.load(Ordering::SeqCst)
    }

    fn log_loads(&self) -> usize {
        self.log_loads.load(Ordering::SeqCst)
    }
}

impl RuleStore for CountingStore {
    type Error = Infallible;

    async fn load_command_rules(&self, guild_id: GuildId) -> Result<Vec<OverrideRule>, Infallible> {
        self.command_loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_command_rules(guild_id).await
    }

    async fn load_role_bypass(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<RoleBypassConfig>, Infallible> {
        self.inner.load_role_bypass(guild_id).await
    }

    async fn load_log_rules(&self, guild_id: GuildId) -> Result<Vec<LogOverrideRule>, Infallible> {
        self.log_loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_log_rules(guild_id).await
    }
}

impl RuleStoreWriter for CountingStore {
    async fn upsert_command_rule(&self, rule: OverrideRule) -> Result<(), Infallible> {
        self.inner.upsert_command_rule(rule).await
    }

    async fn remove_command_rule(
        &self,
        guild_id: GuildId,
        object_id: u64,
        command_path: &str,
    ) -> Result<bool, Infallible> {
        self.inner
            .remove_command_rule(guild_id, object_id, command_path)
            .await
    }

    async fn set_admin_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), Infallible> {
        self.inner.set_admin_role(guild_id, role_id).await
    }

    async fn set_manager_role(
        &self,
        guild_id: GuildId,
        role_id: Option<RoleId>,
    ) -> Result<(), Infallible> {
        self.inner.set_manager_role(guild_id, role_id).await
    }

    async fn upsert_log_rule(&self, rule: LogOverrideRule) -> Result<(), Infallible> {
        self.inner.upsert_log_rule(rule).await
    }

    async fn remove_log_rule(&self, guild_id: GuildId, object_id: u64) -> Result<bool, Infallible> {
        self.inner.remove_log_rule(guild_id, object_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule store unavailable for guild {0}")]
struct StoreDown(GuildId);

/// Fails every read until `recover` is called.
#[derive(Default)]
struct FlakyStore {
    healthy: AtomicBool,
    reads: AtomicUsize,
}

impl FlakyStore {
    fn recover(&self) {
        self.healthy.store(true, Ordering::SeqCst);
    }

    fn check(&self, guild_id: GuildId) -> Result<(), StoreDown> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreDown(guild_id))
        }
    }
}

impl RuleStore for FlakyStore {
    type Error = StoreDown;

    async fn load_command_rules(&self, guild_id: GuildId) -> Result<Vec<OverrideRule>, StoreDown> {
        self.check(guild_id)?;
        Ok(vec![OverrideRule::new(
            guild_id,
            ScopeKind::Guild,
            guild_id.get(),
            "stats",
            false,
        )])
    }

    async fn load_role_bypass(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<RoleBypassConfig>, StoreDown> {
        self.check(guild_id)?;
        Ok(None)
    }

    async fn load_log_rules(&self, guild_id: GuildId) -> Result<Vec<LogOverrideRule>, StoreDown> {
        self.check(guild_id)?;
        Ok(Vec::new())
    }
}

fn invocation<'a>(roles: &'a [RoleId], path: &'a str) -> Invocation<'a> {
    Invocation {
        channel: CHANNEL,
        category: Some(CATEGORY),
        actor: USER,
        actor_roles: roles,
        command_path: path,
    }
}

#[tokio::test]
async fn loader_runs_once_until_the_guild_is_invalidated() {
    let store = Arc::new(CountingStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 64);

    service.policy(GUILD).await.expect("first lookup should load");
    service.policy(GUILD).await.expect("second lookup should hit");
    assert_eq!(store.command_loads(), 1);

    assert!(service.invalidate(GUILD));
    service.policy(GUILD).await.expect("lookup after invalidation should load");
    assert_eq!(store.command_loads(), 2);

    let stats = service.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.invalidations), (1, 2, 1));
}

#[tokio::test]
async fn least_recently_used_guild_is_evicted() {
    let store = Arc::new(CountingStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 2);
    let (a, b, c) = (GuildId::new(1), GuildId::new(2), GuildId::new(3));

    service.policy(a).await.expect("lookup should succeed");
    service.policy(b).await.expect("lookup should succeed");
    service.policy(a).await.expect("lookup should succeed");
    service.policy(c).await.expect("lookup should succeed");
    assert_eq!(store.command_loads(), 3);
    assert_eq!(service.cache_stats().evictions, 1);

    // b was the oldest entry when c arrived.
    service.policy(a).await.expect("lookup should succeed");
    assert_eq!(store.command_loads(), 3);
    service.policy(b).await.expect("lookup should succeed");
    assert_eq!(store.command_loads(), 4);
}

#[tokio::test]
async fn admin_bypass_without_rules() {
    let store = Arc::new(CountingStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 64);
    service
        .set_admin_role(GUILD, Some(R1))
        .await
        .expect("admin role should be stored");

    let decision = service
        .decide(GUILD, &invocation(&[R1], "danger"))
        .await
        .expect("decide should succeed");

    assert!(decision.allowed);
    assert!(decision.is_admin);
    assert!(!decision.is_manager);
    assert_eq!(decision.matched, MatchedRules::default());
}

#[tokio::test]
async fn mutations_invalidate_after_the_write() {
    let store = Arc::new(CountingStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 64);
    let channel = PlatformObject::TextChannel { id: CHANNEL };
    let user = PlatformObject::Member { id: USER };

    assert!(service
        .decide(GUILD, &invocation(&[], "stats top"))
        .await
        .expect("decide should succeed")
        .allowed);

    service
        .set_rule(OverrideRule::for_object(GUILD, &channel, "stats", false))
        .await
        .expect("channel rule should be stored");
    let denied = service
        .decide(GUILD, &invocation(&[], "stats top"))
        .await
        .expect("decide should succeed");
    assert!(!denied.allowed);
    assert_eq!(denied.matched.denied.len(), 1);

    service
        .set_rule(OverrideRule::for_object(GUILD, &user, "stats top", true))
        .await
        .expect("user rule should be stored");
    let allowed = service
        .decide(GUILD, &invocation(&[], "stats top"))
        .await
        .expect("decide should succeed");
    assert!(allowed.allowed);
    assert_eq!(allowed.matched.len(), 2);

    // Every decide after a write reloads exactly once.
    assert_eq!(store.command_loads(), 3);
}

#[tokio::test]
async fn unknown_kind_rows_do_not_disturb_decisions() {
    let store = Arc::new(CountingStore::default());
    let mut stray = OverrideRule::new(GUILD, ScopeKind::Channel, CHANNEL.get(), "stats", false);
    stray.kind_code = 99;
    store
        .upsert_command_rule(stray)
        .await
        .expect("raw row should be stored");
    let service = CommandPolicyService::new(Arc::clone(&store), 64);

    let policy = service.policy(GUILD).await.expect("lookup should succeed");
    assert_eq!(policy.skipped_rows(), 1);
    assert!(service
        .decide(GUILD, &invocation(&[], "stats"))
        .await
        .expect("decide should succeed")
        .allowed);
}

#[tokio::test]
async fn store_errors_surface_unchanged_and_are_not_cached() {
    let store = Arc::new(FlakyStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 64);

    let error = service
        .decide(GUILD, &invocation(&[], "stats"))
        .await
        .expect_err("unavailable store should fail the lookup");
    assert_eq!(error, StoreDown(GUILD));
    assert_eq!(service.cached_guilds(), 0);

    store.recover();
    let decision = service
        .decide(GUILD, &invocation(&[], "stats"))
        .await
        .expect("recovered store should load");
    assert!(!decision.allowed);
    service
        .decide(GUILD, &invocation(&[], "stats"))
        .await
        .expect("second lookup should hit");
    // One failed read, then one command-rule read and one bypass read.
    assert_eq!(store.reads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn log_policy_caches_and_invalidates_independently() {
    let store = Arc::new(CountingStore::default());
    let service = LogPolicyService::new(Arc::clone(&store), 64);
    let role = PlatformObject::Role { id: R1 };

    assert!(service
        .should_log(GUILD, CHANNEL, None, USER, &[R1])
        .await
        .expect("lookup should succeed"));
    service
        .set_rule(LogOverrideRule::for_object(GUILD, &role, false))
        .await
        .expect("role rule should be stored");
    assert!(!service
        .should_log(GUILD, CHANNEL, None, USER, &[R1])
        .await
        .expect("lookup should succeed"));
    assert!(service
        .should_log(GUILD, CHANNEL, None, USER, &[])
        .await
        .expect("lookup should succeed"));
    assert_eq!(store.log_loads(), 2);
    assert_eq!(store.command_loads(), 0);
}

#[tokio::test]
async fn app_state_shares_one_store_between_services() {
    let store = Arc::new(CountingStore::default());
    let config = AppConfig {
        command_cache_capacity: 4,
        log_cache_capacity: 4,
        ..AppConfig::default()
    };
    let state = AppState::new(Arc::clone(&store), &config);

    state
        .commands
        .set_manager_role(GUILD, Some(R1))
        .await
        .expect("manager role should be stored");
    let decision = state
        .commands
        .decide(GUILD, &invocation(&[R1], "config"))
        .await
        .expect("decide should succeed");
    assert!(decision.is_manager);
    assert!(!decision.is_admin);

    state
        .logging
        .should_log(GUILD, CHANNEL, None, USER, &[])
        .await
        .expect("lookup should succeed");
    assert_eq!(
        state.commands.invalidate_containing(&GUILD.to_string()),
        1
    );
    assert_eq!(state.logging.invalidate_containing(&GUILD.to_string()), 1);

    let metrics = state.render_metrics();
    assert!(metrics.contains("warden_cache_invalidations_total{cache=\"command_policy\"} 1\n"));
    assert!(metrics.contains("warden_cache_invalidations_total{cache=\"log_policy\"} 1\n"));
}

#[tokio::test]
async fn compiled_entries_serialize_for_listings() {
    let store = Arc::new(CountingStore::default());
    let service = CommandPolicyService::new(Arc::clone(&store), 64);
    service
        .set_rule(OverrideRule::new(GUILD, ScopeKind::Role, R1.get(), "Stats  Top", false))
        .await
        .expect("rule should be stored");

    let policy = service.policy(GUILD).await.expect("lookup should succeed");
    let listing = serde_json::to_value(policy.entries()).expect("entries should serialize");
    let first = &listing[0];
    assert_eq!(first["path"], "stats top");
    assert_eq!(first["allow"], false);
    assert_eq!(first["object_id"], R1.get());
}
