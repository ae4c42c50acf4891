use warden_cache::DEFAULT_CAPACITY;

pub const DEFAULT_COMMAND_CACHE_CAPACITY: usize = DEFAULT_CAPACITY;
pub const DEFAULT_LOG_CACHE_CAPACITY: usize = DEFAULT_CAPACITY;
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const COMMAND_CACHE_CAPACITY_VAR: &str = "WARDEN_COMMAND_CACHE_CAPACITY";
pub const LOG_CACHE_CAPACITY_VAR: &str = "WARDEN_LOG_CACHE_CAPACITY";
pub const LOG_FILTER_VAR: &str = "WARDEN_LOG";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub command_cache_capacity: usize,
    pub log_cache_capacity: usize,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_cache_capacity: DEFAULT_COMMAND_CACHE_CAPACITY,
            log_cache_capacity: DEFAULT_LOG_CACHE_CAPACITY,
            log_filter: String::from(DEFAULT_LOG_FILTER),
        }
    }
}

impl AppConfig {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    /// Fails when a capacity variable is set but is not an unsigned integer.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name: &str| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    /// Fails when a capacity variable is set but is not an unsigned integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            command_cache_capacity: parse_capacity(
                COMMAND_CACHE_CAPACITY_VAR,
                lookup(COMMAND_CACHE_CAPACITY_VAR),
                defaults.command_cache_capacity,
            )?,
            log_cache_capacity: parse_capacity(
                LOG_CACHE_CAPACITY_VAR,
                lookup(LOG_CACHE_CAPACITY_VAR),
                defaults.log_cache_capacity,
            )?,
            log_filter: lookup(LOG_FILTER_VAR)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_capacity(name: &str, value: Option<String>, default: usize) -> anyhow::Result<usize> {
    value.map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("invalid {name} value {value:?}: {e}"))
    })
}
