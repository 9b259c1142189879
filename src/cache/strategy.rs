//! Strategy Registry Module
//!
//! Named policies that refine TTL and priority for the keys they claim.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::Priority;
use crate::error::StrategyError;

// == Cache Strategy ==
/// A policy deciding cacheability, TTL and priority for matching keys.
pub trait CacheStrategy<T>: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this strategy governs `key`. An `Err` counts as "no match".
    fn should_cache(&self, key: &str, data: &T) -> Result<bool, StrategyError>;

    fn ttl(&self, key: &str, data: &T) -> Duration;

    fn priority(&self, key: &str, data: &T) -> Priority;
}

// == Prefix Strategy ==
/// Claims keys starting with any of its prefixes.
#[derive(Debug, Clone)]
pub struct PrefixStrategy {
    name: String,
    prefixes: Vec<String>,
    ttl: Duration,
    priority: Priority,
}

impl PrefixStrategy {
    pub fn new<I, S>(name: impl Into<String>, prefixes: I, ttl: Duration, priority: Priority) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            ttl,
            priority,
        }
    }
}

impl<T> CacheStrategy<T> for PrefixStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_cache(&self, key: &str, _data: &T) -> Result<bool, StrategyError> {
        Ok(self.prefixes.iter().any(|p| key.starts_with(p.as_str())))
    }

    fn ttl(&self, _key: &str, _data: &T) -> Duration {
        self.ttl
    }

    fn priority(&self, _key: &str, _data: &T) -> Priority {
        self.priority
    }
}

/// Built-in policies for the data a client application typically caches.
pub mod presets {
    use super::*;

    const MINUTE: u64 = 60;

    /// Profile records: read often, change rarely.
    pub fn profiles() -> PrefixStrategy {
        PrefixStrategy::new(
            "profiles",
            ["user:", "profile:"],
            Duration::from_secs(30 * MINUTE),
            Priority::High,
        )
    }

    /// Computed audio artifacts: expensive to regenerate.
    pub fn voice() -> PrefixStrategy {
        PrefixStrategy::new(
            "voice",
            ["voice:", "audio:"],
            Duration::from_secs(60 * MINUTE),
            Priority::Medium,
        )
    }

    /// Generated text.
    pub fn text() -> PrefixStrategy {
        PrefixStrategy::new(
            "text",
            ["text:"],
            Duration::from_secs(10 * MINUTE),
            Priority::Medium,
        )
    }

    /// Transient session state: short-lived but must not be evicted casually.
    pub fn session() -> PrefixStrategy {
        PrefixStrategy::new(
            "session",
            ["session:"],
            Duration::from_secs(5 * MINUTE),
            Priority::Critical,
        )
    }

    /// All presets in registration order.
    pub fn default_strategies() -> Vec<PrefixStrategy> {
        vec![profiles(), voice(), text(), session()]
    }
}

// == Resolution ==
/// TTL and priority chosen for one `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ttl: Duration,
    pub priority: Priority,
    /// Name of the governing strategy, if any matched
    pub strategy: Option<String>,
}

// == Strategy Registry ==
/// Ordered collection of named strategies.
pub struct StrategyRegistry<T> {
    strategies: Vec<(String, Arc<dyn CacheStrategy<T>>)>,
}

impl<T> Default for StrategyRegistry<T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<T> StrategyRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Adds a strategy, or replaces the one with the same id in place.
    pub fn register(&mut self, id: impl Into<String>, strategy: Arc<dyn CacheStrategy<T>>) {
        let id = id.into();
        match self.strategies.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = strategy,
            None => self.strategies.push((id, strategy)),
        }
    }

    // == Select For ==
    /// First strategy (registration order) whose predicate is true.
    /// Predicate errors are logged and treated as no match.
    pub fn select_for(&self, key: &str, data: &T) -> Option<&Arc<dyn CacheStrategy<T>>> {
        self.strategies
            .iter()
            .find(|(id, strategy)| match strategy.should_cache(key, data) {
                Ok(matched) => matched,
                Err(err) => {
                    warn!(strategy = %id, %key, "Strategy predicate failed: {}", err);
                    false
                }
            })
            .map(|(_, strategy)| strategy)
    }

    // == Resolve ==
    /// Explicit values win; otherwise the matching strategy; otherwise defaults.
    pub fn resolve(
        &self,
        key: &str,
        data: &T,
        ttl: Option<Duration>,
        priority: Option<Priority>,
        default_ttl: Duration,
    ) -> Resolution {
        if let (Some(ttl), Some(priority)) = (ttl, priority) {
            return Resolution {
                ttl,
                priority,
                strategy: None,
            };
        }

        match self.select_for(key, data) {
            Some(strategy) => Resolution {
                ttl: ttl.unwrap_or_else(|| strategy.ttl(key, data)),
                priority: priority.unwrap_or_else(|| strategy.priority(key, data)),
                strategy: Some(strategy.name().to_string()),
            },
            None => Resolution {
                ttl: ttl.unwrap_or(default_ttl),
                priority: priority.unwrap_or_default(),
                strategy: None,
            },
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TTL: Duration = Duration::from_secs(300);

    struct Faulty;

    impl CacheStrategy<String> for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn should_cache(&self, _key: &str, _data: &String) -> Result<bool, StrategyError> {
            Err(StrategyError::new("faulty", "cannot inspect payload"))
        }

        fn ttl(&self, _key: &str, _data: &String) -> Duration {
            Duration::from_secs(1)
        }

        fn priority(&self, _key: &str, _data: &String) -> Priority {
            Priority::Low
        }
    }

    fn registry() -> StrategyRegistry<String> {
        let mut registry = StrategyRegistry::new();
        for strategy in presets::default_strategies() {
            let id = CacheStrategy::<String>::name(&strategy).to_string();
            registry.register(id, Arc::new(strategy));
        }
        registry
    }

    #[test]
    fn test_select_first_match() {
        let registry = registry();
        let data = String::new();

        let selected = registry.select_for("user:42", &data).unwrap();
        assert_eq!(selected.name(), "profiles");
        assert!(registry.select_for("unknown:1", &data).is_none());
    }

    #[test]
    fn test_registration_order_wins() {
        let mut registry: StrategyRegistry<String> = StrategyRegistry::new();
        registry.register(
            "broad",
            Arc::new(PrefixStrategy::new("broad", ["voice"], DEFAULT_TTL, Priority::Low)),
        );
        registry.register("voice", Arc::new(presets::voice()));

        let selected = registry.select_for("voice:1", &String::new()).unwrap();
        assert_eq!(selected.name(), "broad");
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = registry();
        registry.register(
            "profiles",
            Arc::new(PrefixStrategy::new("profiles-v2", ["user:"], DEFAULT_TTL, Priority::Low)),
        );

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.ids()[0], "profiles");
        let selected = registry.select_for("user:1", &String::new()).unwrap();
        assert_eq!(selected.name(), "profiles-v2");
    }

    #[test]
    fn test_faulty_predicate_is_no_match() {
        let mut registry: StrategyRegistry<String> = StrategyRegistry::new();
        registry.register("faulty", Arc::new(Faulty));
        registry.register("session", Arc::new(presets::session()));

        let selected = registry.select_for("session:1", &String::new()).unwrap();
        assert_eq!(selected.name(), "session");
        assert!(registry.select_for("other", &String::new()).is_none());
    }

    #[test]
    fn test_resolve_uses_strategy() {
        let resolution = registry().resolve("session:abc", &String::new(), None, None, DEFAULT_TTL);
        assert_eq!(resolution.priority, Priority::Critical);
        assert_eq!(resolution.ttl, Duration::from_secs(300));
        assert_eq!(resolution.strategy.as_deref(), Some("session"));
    }

    #[test]
    fn test_resolve_explicit_overrides() {
        let resolution = registry().resolve(
            "user:1",
            &String::new(),
            Some(Duration::from_secs(1)),
            None,
            DEFAULT_TTL,
        );
        assert_eq!(resolution.ttl, Duration::from_secs(1));
        assert_eq!(resolution.priority, Priority::High);
    }

    #[test]
    fn test_resolve_defaults_without_match() {
        let resolution = registry().resolve("misc", &String::new(), None, None, DEFAULT_TTL);
        assert_eq!(resolution.ttl, DEFAULT_TTL);
        assert_eq!(resolution.priority, Priority::Medium);
        assert!(resolution.strategy.is_none());
    }
}
