use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ---

use tether_domain::{Result, SessionStore, TetherError};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`SessionStore`], standing in for browser local storage.
///
/// Keys iterate in sorted order so purge and sweep logs are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // ---
    entries: Mutex<BTreeMap<String, String>>,

    /// When set, every `remove` fails. Exercises the log-and-continue paths.
    fail_removals: AtomicBool,
}

// ---

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    // ---

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().unwrap().insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    // ---

    /// Write a provider record under `wagmi.store` that references
    /// `address` through `connector_id`.
    pub fn persist_connection(&self, address: &str, connector_id: &str) {
        self.insert("wagmi.store", persisted_store_json(address, connector_id));
    }
}

// ---

impl SessionStore for MemoryStore {
    // ---
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn remove(&self, key: &str) -> Result<bool> {
        // ---
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(TetherError::Store(format!("remove {key}: storage locked")));
        }
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// persisted_store_json
// ---------------------------------------------------------------------------

/// Render the provider's persisted-store layout for one connection.
///
/// ```text
/// { "state": { "current": <connector>,
///              "connections": { "__type": "Map",
///                               "value": [[<connector>, { "accounts": [<address>],
///                                                          "connector": { "id": <connector> } }]] } } }
/// ```
pub fn persisted_store_json(address: &str, connector_id: &str) -> String {
    // ---
    format!(
        r#"{{"state":{{"current":"{connector_id}","connections":{{"__type":"Map","value":[["{connector_id}",{{"accounts":["{address}"],"chainId":1,"connector":{{"id":"{connector_id}"}}}}]]}}}},"version":2}}"#
    )
}
