//! Time-bounded memo of gateway results keyed by exact SQL text.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::gateway::{GatewayError, QueryGateway, QueryRows};

pub const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(300);

/// Monotonic time source, expressed as elapsed time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced by hand, for deterministic expiry.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub gateway_errors: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CacheEntry {
    rows: Rc<QueryRows>,
    fetched_at: Duration,
}

#[derive(Debug)]
pub struct QueryCache<G, C = SystemClock> {
    gateway: G,
    clock: C,
    ttl: Duration,
    entries: RefCell<HashMap<String, CacheEntry>>,
    stats: Cell<CacheStats>,
}

impl<G: QueryGateway> QueryCache<G, SystemClock> {
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self::with_clock(gateway, SystemClock::new(), DEFAULT_QUERY_TTL)
    }
}

impl<G: QueryGateway, C: Clock> QueryCache<G, C> {
    #[must_use]
    pub fn with_clock(gateway: G, clock: C, ttl: Duration) -> Self {
        Self {
            gateway,
            clock,
            ttl,
            entries: RefCell::new(HashMap::new()),
            stats: Cell::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns rows fetched less than one TTL ago, or asks the gateway.
    /// Gateway errors are returned as-is and never cached.
    pub fn fetch(&self, sql: &str) -> Result<Rc<QueryRows>, GatewayError> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.borrow().get(sql) {
            if now.saturating_sub(entry.fetched_at) < self.ttl {
                self.record(|stats| stats.hits += 1);
                return Ok(Rc::clone(&entry.rows));
            }
        }

        self.record(|stats| stats.misses += 1);
        let rows = match self.gateway.execute_select(sql) {
            Ok(rows) => Rc::new(rows),
            Err(error) => {
                self.entries.borrow_mut().remove(sql);
                self.record(|stats| stats.gateway_errors += 1);
                return Err(error);
            }
        };

        self.entries.borrow_mut().insert(
            sql.to_string(),
            CacheEntry {
                rows: Rc::clone(&rows),
                fetched_at: now,
            },
        );
        Ok(rows)
    }

    /// Drops entries that can no longer be served.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_sub(entry.fetched_at) < self.ttl);
        before - entries.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.get();
        stats.entries = self.entries.borrow().len();
        stats
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use serde_json::json;

    use super::{ManualClock, QueryCache};
    use crate::gateway::{GatewayError, QueryGateway, QueryRows, Row};

    #[derive(Default)]
    struct CountingGateway {
        calls: Cell<usize>,
        fail_next: Cell<bool>,
        seen: RefCell<Vec<String>>,
    }

    impl QueryGateway for CountingGateway {
        fn execute_select(&self, sql: &str) -> Result<QueryRows, GatewayError> {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(sql.to_string());
            if self.fail_next.replace(false) {
                return Err(GatewayError::Execution {
                    cause: "gateway offline".to_string(),
                });
            }
            let mut row = Row::new();
            row.insert("call".to_string(), json!(self.calls.get()));
            Ok(QueryRows {
                columns: vec!["call".to_string()],
                rows: vec![row],
                truncated: false,
            })
        }
    }

    #[test]
    fn identical_sql_within_ttl_hits_gateway_once() {
        let gateway = CountingGateway::default();
        let clock = ManualClock::default();
        let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(300));

        let first = cache.fetch("SELECT 1").expect("first fetch");
        clock.advance(Duration::from_secs(299));
        let second = cache.fetch("SELECT 1").expect("second fetch");

        assert_eq!(gateway.calls.get(), 1);
        assert_eq!(first, second);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn expired_entry_is_refetched() {
        let gateway = CountingGateway::default();
        let clock = ManualClock::default();
        let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(300));

        cache.fetch("SELECT 1").expect("first fetch");
        clock.advance(Duration::from_secs(300));
        let refreshed = cache.fetch("SELECT 1").expect("refetch");

        assert_eq!(gateway.calls.get(), 2);
        assert_eq!(refreshed.rows[0].get("call"), Some(&json!(2)));
    }

    #[test]
    fn textually_different_sql_is_a_distinct_entry() {
        let gateway = CountingGateway::default();
        let clock = ManualClock::default();
        let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(300));

        cache.fetch("SELECT 1").expect("fetch");
        cache.fetch("select 1").expect("fetch");
        assert_eq!(gateway.calls.get(), 2);
    }

    #[test]
    fn gateway_errors_are_not_cached() {
        let gateway = CountingGateway::default();
        gateway.fail_next.set(true);
        let clock = ManualClock::default();
        let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(300));

        let error = cache.fetch("SELECT 1").expect_err("first call must fail");
        assert_eq!(error.code(), "query_execution_failed");
        assert_eq!(cache.stats().entries, 0);

        let rows = cache.fetch("SELECT 1").expect("retry should reach the gateway");
        assert_eq!(gateway.calls.get(), 2);
        assert!(!rows.is_empty());
        assert_eq!(cache.stats().gateway_errors, 1);
    }

    #[test]
    fn purge_drops_only_stale_entries() {
        let gateway = CountingGateway::default();
        let clock = ManualClock::default();
        let cache = QueryCache::with_clock(&gateway, &clock, Duration::from_secs(10));

        cache.fetch("SELECT 1").expect("fetch");
        clock.advance(Duration::from_secs(6));
        cache.fetch("SELECT 2").expect("fetch");
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(gateway.seen.borrow().len(), 2);
    }
}
