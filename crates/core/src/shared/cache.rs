use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;

/// Single-value cache that goes stale `ttl` after the last refresh.
pub struct TtlCache<T> {
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
    entry: Option<(T, u64)>,
    expired: bool,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            clock,
            entry: None,
            expired: false,
        }
    }

    /// Returns the fresh value, or replaces it with `refresh(stale)` when it
    /// has expired. `stale` is the previous value, if any. Whatever `refresh`
    /// returns stays fresh for a full TTL.
    pub fn get_or_refresh(&mut self, refresh: impl FnOnce(Option<T>) -> T) -> &T {
        let now = self.clock.now_ms();
        let entry = match self.entry.take() {
            Some((value, stored_at))
                if !self.expired && now.saturating_sub(stored_at) < self.ttl_ms =>
            {
                (value, stored_at)
            }
            stale => (refresh(stale.map(|(value, _)| value)), now),
        };
        self.expired = false;
        &self.entry.insert(entry).0
    }

    /// Forces a refresh on the next read. The current value is still
    /// handed to `refresh` as the stale one.
    pub fn invalidate(&mut self) {
        self.expired = true;
    }
}
