//! Pattern derivation
//!
//! The subscribed set is `databases × events` (keyevent patterns) followed by
//! `databases × keys` (keyspace patterns). The order is observable: the
//! server acknowledges subscriptions in the order they were requested.

use crate::core::{Category, Database};
use std::fmt;

/// A channel pattern for one category, database and suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub category: Category,
    pub database: Database,
    /// Event name (keyevent) or key (keyspace); may contain glob characters
    pub suffix: String,
}

impl Pattern {
    pub fn keyevent(database: Database, event: impl Into<String>) -> Self {
        Self {
            category: Category::KeyEvent,
            database,
            suffix: event.into(),
        }
    }

    pub fn keyspace(database: Database, key: impl Into<String>) -> Self {
        Self {
            category: Category::KeySpace,
            database,
            suffix: key.into(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__{}@{}__:{}", self.category, self.database, self.suffix)
    }
}

/// Derive every pattern for the given interests, in subscribe order
pub fn build_patterns(databases: &[Database], events: &[String], keys: &[String]) -> Vec<Pattern> {
    let keyevent = databases
        .iter()
        .flat_map(|db| events.iter().map(move |event| Pattern::keyevent(*db, event.as_str())));

    let keyspace = databases
        .iter()
        .flat_map(|db| keys.iter().map(move |key| Pattern::keyspace(*db, key.as_str())));

    keyevent.chain(keyspace).collect()
}

/// Rendered form of [`build_patterns`]
pub fn pattern_strings(databases: &[Database], events: &[String], keys: &[String]) -> Vec<String> {
    build_patterns(databases, events, keys)
        .iter()
        .map(Pattern::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_single_event() {
        let patterns = pattern_strings(&[Database::Index(0)], &strings(&["set"]), &[]);
        assert_eq!(patterns, vec!["__keyevent@0__:set"]);
    }

    #[test]
    fn test_keyevent_before_keyspace() {
        let patterns = pattern_strings(
            &[Database::Index(0), Database::Index(1)],
            &strings(&["set", "del"]),
            &strings(&["foo"]),
        );
        assert_eq!(
            patterns,
            vec![
                "__keyevent@0__:set",
                "__keyevent@0__:del",
                "__keyevent@1__:set",
                "__keyevent@1__:del",
                "__keyspace@0__:foo",
                "__keyspace@1__:foo",
            ]
        );
    }

    #[test]
    fn test_any_database() {
        let patterns = pattern_strings(&[Database::Any], &strings(&["*"]), &strings(&["*"]));
        assert_eq!(patterns, vec!["__keyevent@*__:*", "__keyspace@*__:*"]);
    }

    #[test]
    fn test_repeatable() {
        let dbs = [Database::Index(2)];
        let keys = strings(&["foo/bar-*"]);
        assert_eq!(build_patterns(&dbs, &[], &keys), build_patterns(&dbs, &[], &keys));
    }

    proptest! {
        #[test]
        fn prop_pattern_count_and_order(
            dbs in prop::collection::vec(0u32..16, 1..4),
            events in prop::collection::vec("[a-z]{1,6}", 0..4),
            keys in prop::collection::vec("[a-z*]{1,6}", 0..4),
        ) {
            let databases: Vec<Database> = dbs.iter().copied().map(Database::Index).collect();
            let patterns = build_patterns(&databases, &events, &keys);

            prop_assert_eq!(
                patterns.len(),
                databases.len() * events.len() + databases.len() * keys.len()
            );

            let split = databases.len() * events.len();
            prop_assert!(patterns[..split].iter().all(|p| p.category == Category::KeyEvent));
            prop_assert!(patterns[split..].iter().all(|p| p.category == Category::KeySpace));

            for (i, pattern) in patterns[..split].iter().enumerate() {
                let db = databases[i / events.len()];
                let event = &events[i % events.len()];
                prop_assert_eq!(pattern.to_string(), format!("__keyevent@{}__:{}", db, event));
            }
            for (i, pattern) in patterns[split..].iter().enumerate() {
                let db = databases[i / keys.len()];
                let key = &keys[i % keys.len()];
                prop_assert_eq!(pattern.to_string(), format!("__keyspace@{}__:{}", db, key));
            }
        }
    }
}
