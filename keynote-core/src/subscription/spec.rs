//! Subscription interests and their validation

use super::patterns::{build_patterns, Pattern};
use crate::config::{validate_backoff_factor, OneOrMany, ServiceConfig, DEFAULT_BACKOFF_FACTOR};
use crate::core::{ConfigurationError, Database};
use std::collections::HashSet;
use tracing::error;

/// Validated subscription configuration
///
/// `events` and `keys` are never both empty. When no databases were given
/// the listener resolves them from the connection on first connect and
/// freezes the result with [`SubscriptionSpec::freeze_databases`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    databases: Option<Vec<Database>>,
    events: Vec<String>,
    keys: Vec<String>,
    notification_events: Option<String>,
    backoff_factor: f64,
}

impl SubscriptionSpec {
    pub fn builder() -> SubscriptionSpecBuilder {
        SubscriptionSpecBuilder::default()
    }

    /// Explicit or frozen databases, `None` until resolved from the connection
    pub fn databases(&self) -> Option<&[Database]> {
        self.databases.as_deref()
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn notification_events(&self) -> Option<&str> {
        self.notification_events.as_deref()
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Fix the database set if it was not configured explicitly
    ///
    /// Returns the databases in effect. Later calls never change them.
    pub fn freeze_databases(&mut self, connected: u32) -> &[Database] {
        self.databases
            .get_or_insert_with(|| vec![Database::Index(connected)])
            .as_slice()
    }

    /// Patterns for the current database set (empty while unresolved)
    pub fn patterns(&self) -> Vec<Pattern> {
        match &self.databases {
            Some(databases) => build_patterns(databases, &self.events, &self.keys),
            None => Vec::new(),
        }
    }
}

/// Builder for [`SubscriptionSpec`]
#[derive(Debug, Clone)]
pub struct SubscriptionSpecBuilder {
    databases: Option<Vec<Database>>,
    events: Vec<String>,
    keys: Vec<String>,
    notification_events: Option<String>,
    backoff_factor: f64,
}

impl Default for SubscriptionSpecBuilder {
    fn default() -> Self {
        Self {
            databases: None,
            events: Vec::new(),
            keys: Vec::new(),
            notification_events: None,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl SubscriptionSpecBuilder {
    /// One event name or several; glob patterns allowed
    pub fn events(mut self, events: impl Into<OneOrMany<String>>) -> Self {
        self.events.extend(events.into().into_vec());
        self
    }

    /// One key or several; glob patterns allowed
    pub fn keys(mut self, keys: impl Into<OneOrMany<String>>) -> Self {
        self.keys.extend(keys.into().into_vec());
        self
    }

    pub fn database(mut self, database: impl Into<Database>) -> Self {
        self.databases.get_or_insert_with(Vec::new).push(database.into());
        self
    }

    pub fn databases<I, D>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Database>,
    {
        self.databases
            .get_or_insert_with(Vec::new)
            .extend(databases.into_iter().map(Into::into));
        self
    }

    /// Subscribe on every database (`*`)
    pub fn all_databases(self) -> Self {
        self.database(Database::Any)
    }

    pub fn notification_events(mut self, value: Option<impl Into<String>>) -> Self {
        self.notification_events = value.map(Into::into);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn build(self) -> Result<SubscriptionSpec, ConfigurationError> {
        if self.events.is_empty() && self.keys.is_empty() {
            let err = ConfigurationError::MissingInterests;
            error!("{}", err);
            return Err(err);
        }
        validate_backoff_factor(self.backoff_factor)?;

        Ok(SubscriptionSpec {
            databases: self.databases.map(dedup_ordered),
            events: dedup_ordered(self.events),
            keys: dedup_ordered(self.keys),
            notification_events: self.notification_events,
            backoff_factor: self.backoff_factor,
        })
    }
}

fn dedup_ordered<T: Clone + Eq + std::hash::Hash>(values: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Subscription registration attached to a handler at composition time
///
/// Holds the interests and the name of the URI entry to connect to; turned
/// into a runnable spec against the host configuration by [`Subscription::setup`].
#[derive(Debug, Clone)]
pub struct Subscription {
    uri_config_key: String,
    databases: Option<Vec<Database>>,
    events: Vec<String>,
    keys: Vec<String>,
}

/// Result of [`Subscription::setup`]
#[derive(Debug, Clone, PartialEq)]
pub struct SetupOutcome {
    pub uri: String,
    pub spec: SubscriptionSpec,
}

impl Subscription {
    pub fn new(uri_config_key: impl Into<String>) -> Self {
        Self {
            uri_config_key: uri_config_key.into(),
            databases: None,
            events: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn events(mut self, events: impl Into<OneOrMany<String>>) -> Self {
        self.events.extend(events.into().into_vec());
        self
    }

    pub fn keys(mut self, keys: impl Into<OneOrMany<String>>) -> Self {
        self.keys.extend(keys.into().into_vec());
        self
    }

    pub fn databases<I, D>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Database>,
    {
        self.databases
            .get_or_insert_with(Vec::new)
            .extend(databases.into_iter().map(Into::into));
        self
    }

    /// Database selectors as they appear in configuration (`"0"`, `"*"`)
    pub fn database_selectors(
        self,
        selectors: impl Into<OneOrMany<String>>,
    ) -> Result<Self, ConfigurationError> {
        let parsed = selectors
            .into()
            .into_vec()
            .iter()
            .map(|s| s.parse::<Database>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.databases(parsed))
    }

    pub fn uri_config_key(&self) -> &str {
        &self.uri_config_key
    }

    /// Validate against the host configuration
    ///
    /// Missing interests are reported before the URI lookup.
    pub fn setup(&self, config: &ServiceConfig) -> Result<SetupOutcome, ConfigurationError> {
        let mut builder = SubscriptionSpec::builder()
            .events(self.events.clone())
            .keys(self.keys.clone())
            .notification_events(config.redis.notification_events.clone())
            .backoff_factor(config.redis.pubsub_backoff_factor);
        if let Some(databases) = &self.databases {
            builder = builder.databases(databases.iter().copied());
        }
        let spec = builder.build()?;

        let uri = config.uri_for(&self.uri_config_key)?.to_string();

        Ok(SetupOutcome { uri, spec })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServiceConfig {
        ServiceConfig::from_json_value(serde_json::json!({
            "REDIS_URIS": {"MY_REDIS": "redis://localhost:6379/0"},
            "REDIS": {"notification_events": "KEA"},
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_interests() {
        assert_eq!(
            SubscriptionSpec::builder().build(),
            Err(ConfigurationError::MissingInterests)
        );
        assert_eq!(
            SubscriptionSpec::builder().databases([0u32, 1]).build(),
            Err(ConfigurationError::MissingInterests)
        );
    }

    #[test]
    fn test_defaults() {
        let spec = SubscriptionSpec::builder().keys("foo").build().unwrap();
        assert_eq!(spec.databases(), None);
        assert_eq!(spec.backoff_factor(), DEFAULT_BACKOFF_FACTOR);
        assert!(spec.patterns().is_empty());
    }

    #[test]
    fn test_freeze_databases() {
        let mut spec = SubscriptionSpec::builder().events("set").build().unwrap();
        assert_eq!(spec.freeze_databases(3), &[Database::Index(3)]);
        assert_eq!(spec.freeze_databases(5), &[Database::Index(3)]);

        let mut explicit = SubscriptionSpec::builder()
            .events("set")
            .database(1u32)
            .build()
            .unwrap();
        assert_eq!(explicit.freeze_databases(0), &[Database::Index(1)]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let spec = SubscriptionSpec::builder()
            .events(["set", "del", "set"])
            .databases([0u32, 0])
            .build()
            .unwrap();
        assert_eq!(spec.events(), &["set".to_string(), "del".to_string()]);
        assert_eq!(spec.databases(), Some(&[Database::Index(0)][..]));
    }

    #[test]
    fn test_invalid_backoff() {
        let result = SubscriptionSpec::builder().events("set").backoff_factor(-0.5).build();
        assert_eq!(result, Err(ConfigurationError::InvalidBackoffFactor(-0.5)));
    }

    #[test]
    fn test_setup_resolves_uri_and_settings() {
        let outcome = Subscription::new("MY_REDIS")
            .events("*")
            .database_selectors("*")
            .unwrap()
            .setup(&config())
            .unwrap();

        assert_eq!(outcome.uri, "redis://localhost:6379/0");
        assert_eq!(outcome.spec.notification_events(), Some("KEA"));
        assert_eq!(outcome.spec.databases(), Some(&[Database::Any][..]));
    }

    #[test]
    fn test_setup_unknown_uri_key() {
        let result = Subscription::new("OTHER_REDIS").keys("foo").setup(&config());
        assert_eq!(
            result,
            Err(ConfigurationError::UnknownUriKey("OTHER_REDIS".to_string()))
        );
    }

    #[test]
    fn test_setup_checks_interests_first() {
        let result = Subscription::new("OTHER_REDIS").setup(&config());
        assert_eq!(result, Err(ConfigurationError::MissingInterests));
    }

    #[test]
    fn test_invalid_selector() {
        let result = Subscription::new("MY_REDIS").database_selectors(["0", "x"]);
        assert!(matches!(result, Err(ConfigurationError::InvalidDatabase(s)) if s == "x"));
    }
}
