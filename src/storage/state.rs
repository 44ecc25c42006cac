//! Persisted reconciliation facts
//!
//! Storage decisions that must survive process restarts are recorded as
//! string key/value pairs on the resource status. A fact, once recorded, is
//! never silently rewritten: a differing candidate is rejected, so a
//! provisioned storage medium cannot drift out from under a running
//! registry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

// =============================================================================
// Fact Keys
// =============================================================================

// These keys are a persisted schema: renaming one is a breaking change that
// requires a migration of existing resources.

/// The active backend name
pub const STORAGE_TYPE: &str = "storagetype";

/// The filesystem volume-source kind
pub const STORAGE_FIELD: &str = "storagefield";

/// The S3/GCS bucket name
pub const STORAGE_BUCKET: &str = "storagebucket";

/// The S3 region
pub const STORAGE_REGION: &str = "storageregion";

/// The Azure/Swift container name
pub const STORAGE_CONTAINER: &str = "storagecontainer";

/// The Swift auth endpoint
pub const STORAGE_AUTH_URL: &str = "storageauthurl";

// =============================================================================
// State Store
// =============================================================================

/// String-keyed fact table persisted in the resource status.
///
/// Entries are only ever added by drivers; removing or resetting one is an
/// administrative action performed outside the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StateStore(BTreeMap<String, String>);

/// Result of a validation pass: the facts after the pass and whether the
/// caller must persist them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    /// The fact table after the pass
    pub state: StateStore,
    /// Whether a new fact was recorded
    pub modified: bool,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a recorded fact
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Record a fact unconditionally
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record each candidate fact that has no entry yet and reject any that
    /// conflicts with a previously recorded value.
    ///
    /// An empty candidate value carries no constraint and is skipped. The
    /// returned store is produced only when every fact passes, so a rejected
    /// validation records nothing.
    pub fn pin_all<I, K>(&self, facts: I) -> Result<StateTransition>
    where
        I: IntoIterator<Item = (K, String)>,
        K: Into<String>,
    {
        let mut next = self.clone();
        let mut modified = false;

        for (key, candidate) in facts {
            if candidate.is_empty() {
                continue;
            }
            match next.0.entry(key.into()) {
                Entry::Occupied(entry) => {
                    if entry.get() != &candidate {
                        return Err(Error::ConfigurationChangeRejected {
                            key: entry.key().clone(),
                            previous: entry.get().clone(),
                            requested: candidate,
                        });
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(candidate);
                    modified = true;
                }
            }
        }

        Ok(StateTransition {
            state: next,
            modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_first_write_records_facts() {
        let store = StateStore::new();
        let transition = store
            .pin_all([
                (STORAGE_TYPE, "s3".to_string()),
                (STORAGE_BUCKET, "images".to_string()),
            ])
            .unwrap();

        assert!(transition.modified);
        assert_eq!(transition.state.get(STORAGE_TYPE), Some("s3"));
        assert_eq!(transition.state.get(STORAGE_BUCKET), Some("images"));
        // The original store is untouched
        assert!(store.is_empty());
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let store = StateStore::new();
        let first = store.pin_all([(STORAGE_TYPE, "s3".to_string())]).unwrap();
        assert!(first.modified);

        let second = first
            .state
            .pin_all([(STORAGE_TYPE, "s3".to_string())])
            .unwrap();
        assert!(!second.modified);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_conflicting_fact_is_rejected() {
        let mut store = StateStore::new();
        store.set(STORAGE_TYPE, "filesystem");

        let err = store
            .pin_all([(STORAGE_TYPE, "s3".to_string())])
            .unwrap_err();
        assert_matches!(
            err,
            Error::ConfigurationChangeRejected { key, previous, requested }
                if key == "storagetype" && previous == "filesystem" && requested == "s3"
        );
    }

    #[test]
    fn test_rejection_records_nothing() {
        let mut store = StateStore::new();
        store.set(STORAGE_TYPE, "filesystem");

        // The conflicting fact comes last; the earlier fact must not leak
        // into the store either.
        let result = store.pin_all([
            (STORAGE_FIELD, "emptydir".to_string()),
            (STORAGE_TYPE, "s3".to_string()),
        ]);
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(STORAGE_FIELD), None);
    }

    #[test]
    fn test_empty_candidate_is_no_constraint() {
        let store = StateStore::new();
        let transition = store
            .pin_all([(STORAGE_FIELD, String::new())])
            .unwrap();
        assert!(!transition.modified);
        assert!(transition.state.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut store = StateStore::new();
        store.set(STORAGE_TYPE, "filesystem");
        store.set(STORAGE_FIELD, "emptydir");

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"storagetype": "filesystem", "storagefield": "emptydir"})
        );

        let back: StateStore = serde_json::from_value(json).unwrap();
        assert_eq!(back, store);
    }
}
