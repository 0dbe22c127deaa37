use std::sync::Arc;
use std::time::Duration;

use crate::classification::domain::size_config_source::SizeConfigSource;
use crate::classification::domain::size_range::SizeTiers;
use crate::shared::cache::TtlCache;
use crate::shared::clock::Clock;

/// Size tiers re-read from a source at most once per TTL.
///
/// A failed reload keeps the last good tiers (or the defaults when there
/// never were any) and waits a full TTL before retrying.
pub struct CachedSizeConfig {
    source: Box<dyn SizeConfigSource>,
    cache: TtlCache<SizeTiers>,
}

impl CachedSizeConfig {
    pub fn new(source: Box<dyn SizeConfigSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub fn tiers(&mut self) -> &SizeTiers {
        let source = &mut self.source;
        self.cache.get_or_refresh(|stale| {
            match source.load().and_then(SizeTiers::from_settings) {
                Ok(tiers) => {
                    log::debug!("Loaded {} size tiers", tiers.len());
                    tiers
                }
                Err(e) => match stale {
                    Some(previous) => {
                        log::warn!("Size settings reload failed, keeping previous: {e}");
                        previous
                    }
                    None => {
                        log::warn!("Size settings unavailable, using defaults: {e}");
                        SizeTiers::default()
                    }
                },
            }
        })
    }

    /// Forces a reload on the next call to [`tiers`](Self::tiers).
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::size_range::{SizeRange, SizeSettings};
    use crate::shared::clock::ManualClock;
    use crate::shared::config_error::ConfigError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedSource {
        responses: Arc<Mutex<Vec<Result<SizeSettings, ConfigError>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl SizeConfigSource for ScriptedSource {
        fn load(&mut self) -> Result<SizeSettings, ConfigError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ConfigError::Invalid("exhausted".into())))
        }
    }

    fn two_tiers(split: f64) -> SizeSettings {
        let mut map = BTreeMap::new();
        map.insert("keep".into(), SizeRange::new(0.0, split, 0.0, 5.0));
        map.insert("harvest".into(), SizeRange::new(split + 0.1, 999.0, 5.1, 999.0));
        SizeSettings::Ranges(map)
    }

    /// Responses are served in the given order.
    fn cached(
        mut responses: Vec<Result<SizeSettings, ConfigError>>,
    ) -> (CachedSizeConfig, ManualClock, Arc<AtomicUsize>) {
        responses.reverse();
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = ManualClock::new(0);
        let source = ScriptedSource {
            responses: Arc::new(Mutex::new(responses)),
            calls: calls.clone(),
        };
        let config = CachedSizeConfig::new(
            Box::new(source),
            Duration::from_secs(60),
            Arc::new(clock.clone()),
        );
        (config, clock, calls)
    }

    #[test]
    fn test_reads_once_within_ttl() {
        let (mut config, clock, calls) = cached(vec![Ok(two_tiers(10.0))]);
        assert_eq!(config.tiers().terminal().name, "Harvest");
        clock.advance(59_000);
        assert_eq!(config.tiers().terminal().name, "Harvest");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reloads_after_ttl() {
        let (mut config, clock, calls) = cached(vec![Ok(two_tiers(10.0)), Ok(two_tiers(30.0))]);
        config.tiers();
        clock.advance(61_000);
        let split = config.tiers().non_terminal()[0].range.max_length;
        assert_eq!(split, 30.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_without_history_uses_defaults() {
        let (mut config, _clock, _calls) = cached(vec![Err(ConfigError::Invalid("bad".into()))]);
        assert_eq!(config.tiers(), &SizeTiers::default());
    }

    #[test]
    fn test_failure_keeps_previous_tiers_and_backs_off() {
        let (mut config, clock, calls) = cached(vec![
            Ok(two_tiers(10.0)),
            Err(ConfigError::Invalid("bad".into())),
        ]);
        config.tiers();
        clock.advance(61_000);
        assert_eq!(config.tiers().terminal().name, "Harvest");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        clock.advance(1_000);
        config.tiers();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (mut config, _clock, calls) = cached(vec![Ok(two_tiers(10.0)), Ok(two_tiers(12.0))]);
        config.tiers();
        config.invalidate();
        config.tiers();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
