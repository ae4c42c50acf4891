use std::fmt::Write as _;

use warden_cache::CacheStatsSnapshot;

/// Renders per-cache counters in the Prometheus text format, one sample per
/// `(cache name, snapshot)` pair in the order given.
#[must_use]
pub fn render_metrics(caches: &[(&str, CacheStatsSnapshot)]) -> String {
    let counters: [(&str, &str, fn(&CacheStatsSnapshot) -> u64); 4] = [
        (
            "warden_cache_hits_total",
            "Count of memoized lookups served from the cache",
            |stats| stats.hits,
        ),
        (
            "warden_cache_misses_total",
            "Count of memoized lookups that ran the wrapped function",
            |stats| stats.misses,
        ),
        (
            "warden_cache_evictions_total",
            "Count of entries dropped to stay within capacity",
            |stats| stats.evictions,
        ),
        (
            "warden_cache_invalidations_total",
            "Count of entries removed by explicit invalidation",
            |stats| stats.invalidations,
        ),
    ];

    let mut output = String::new();
    for (metric, help, read) in counters {
        let _ = writeln!(output, "# HELP {metric} {help}");
        let _ = writeln!(output, "# TYPE {metric} counter");
        for (cache, stats) in caches {
            let _ = writeln!(output, "{metric}{{cache=\"{cache}\"}} {}", read(stats));
        }
    }
    output
}
