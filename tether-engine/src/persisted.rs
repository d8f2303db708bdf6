//! Read the provider's persisted connection record out of the store.
//!
//! The provider serializes its connection map under
//! [`SessionNamespace::record_key`]:
//!
//! ```text
//! { "state": { "current": "<key>",
//!              "connections": { "__type": "Map",
//!                               "value": [ ["<key>", { "accounts": ["0x…"],
//!                                                      "connector": { "id": "…" } }] ] } } }
//! ```
//!
//! A missing, malformed or empty record reads as
//! [`PersistedSessionRecord::none`]. That is the normal state for a user who
//! never connected, so nothing here returns an error.

use serde_json::Value;

// ---

use tether_domain::{Address, PersistedSessionRecord, SessionNamespace, SessionStore};

// ---------------------------------------------------------------------------
// read_persisted_record
// ---------------------------------------------------------------------------

/// Take one fresh snapshot of the persisted record.
pub fn read_persisted_record(
    store: &dyn SessionStore,
    namespace: &SessionNamespace,
) -> PersistedSessionRecord {
    // ---
    let Some(raw) = store.get(&namespace.record_key) else {
        return PersistedSessionRecord::none();
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(root) => parse_record(&root),
        Err(e) => {
            tracing::debug!(key = %namespace.record_key, "persisted record unreadable: {e}");
            PersistedSessionRecord::none()
        }
    }
}

// ---

fn parse_record(root: &Value) -> PersistedSessionRecord {
    // ---
    let state = &root["state"];

    let Some(current) = state["current"].as_str() else {
        return PersistedSessionRecord::none();
    };
    let entries = match state["connections"]["value"].as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return PersistedSessionRecord::none(),
    };

    // Prefer the current connection.
    let current_entry = entries
        .iter()
        .filter_map(entry_parts)
        .find(|(key, _)| *key == current);
    if let Some((_, conn)) = current_entry {
        if let Some(address) = first_account(conn) {
            return record(address, connector_id(conn).unwrap_or(current));
        }
    }

    // Fall back to any connection that still lists an account.
    for (key, conn) in entries.iter().filter_map(entry_parts) {
        if let Some(address) = first_account(conn) {
            return record(address, connector_id(conn).unwrap_or(key));
        }
    }

    PersistedSessionRecord::none()
}

// ---

/// `[key, connection]` pair from the serialized map.
fn entry_parts(entry: &Value) -> Option<(&str, &Value)> {
    // ---
    let pair = entry.as_array()?;
    let key = pair.first()?.as_str()?;
    let conn = pair.get(1)?;
    Some((key, conn))
}

fn first_account(conn: &Value) -> Option<&str> {
    conn["accounts"][0].as_str().filter(|a| !a.is_empty())
}

fn connector_id(conn: &Value) -> Option<&str> {
    conn["connector"]["id"].as_str()
}

fn record(address: &str, connector_id: &str) -> PersistedSessionRecord {
    // ---
    PersistedSessionRecord {
        has_persisted: true,
        last_address: Some(Address::new(address)),
        connector_id: Some(connector_id.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use tether_sim::MemoryStore;

    use super::*;

    fn read(store: &MemoryStore) -> PersistedSessionRecord {
        read_persisted_record(store, &SessionNamespace::default())
    }

    #[test]
    fn absent_record_is_not_an_error() {
        // ---
        let store = MemoryStore::new();
        assert_eq!(read(&store), PersistedSessionRecord::none());
    }

    #[test]
    fn current_connection_wins() {
        // ---
        let store = MemoryStore::new();
        store.persist_connection("0xABC", "walletConnect");

        let rec = read(&store);
        assert!(rec.has_persisted);
        assert_eq!(rec.last_address, Some(Address::new("0xABC")));
        assert_eq!(rec.connector_id.as_deref(), Some("walletConnect"));
    }

    #[test]
    fn falls_back_to_any_connection_with_accounts() {
        // ---
        let store = MemoryStore::new();
        store.insert(
            "wagmi.store",
            r#"{"state":{"current":"injected","connections":{"__type":"Map","value":[
                ["injected",{"accounts":[]}],
                ["coinbase",{"accounts":["0x111","0x222"]}]
            ]}}}"#,
        );

        let rec = read(&store);
        assert_eq!(rec.last_address, Some(Address::new("0x111")));
        assert_eq!(rec.connector_id.as_deref(), Some("coinbase"));
    }

    #[test]
    fn no_current_key_means_no_record() {
        // ---
        let store = MemoryStore::new();
        store.insert(
            "wagmi.store",
            r#"{"state":{"connections":{"value":[["injected",{"accounts":["0x1"]}]]}}}"#,
        );
        assert!(!read(&store).has_persisted);
    }

    #[test]
    fn malformed_record_reads_as_none() {
        // ---
        let store = MemoryStore::new();
        store.insert("wagmi.store", "{not json");
        assert_eq!(read(&store), PersistedSessionRecord::none());

        store.insert("wagmi.store", r#"{"state":{"current":"x","connections":{"value":"oops"}}}"#);
        assert_eq!(read(&store), PersistedSessionRecord::none());
    }
}
