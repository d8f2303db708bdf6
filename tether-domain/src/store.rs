use std::sync::Arc;

use super::error::Result;

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Synchronous key-value surface where the provider persists session data.
///
/// Shared between the engines and the provider itself, so no caller may
/// assume exclusive ownership: every read is a fresh snapshot and a key
/// returned by [`SessionStore::keys`] may already be gone when read.
pub trait SessionStore: Send + Sync {
    // ---
    fn get(&self, key: &str) -> Option<String>;

    /// Snapshot of all keys currently present.
    fn keys(&self) -> Vec<String>;

    /// Delete `key`. Returns `Ok(false)` if it was already absent.
    fn remove(&self, key: &str) -> Result<bool>;
}

// ---

/// Convenience alias for a shared [`SessionStore`].
pub type SessionStorePtr = Arc<dyn SessionStore>;

// ---------------------------------------------------------------------------
// SessionNamespace
// ---------------------------------------------------------------------------

/// Key layout of session data inside a [`SessionStore`].
///
/// A key belongs to the session namespace if it starts with one of
/// `prefixes` or contains one of `markers`. Matching is case sensitive;
/// list each casing the provider uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNamespace {
    // ---
    /// Key of the provider's persisted connection record.
    pub record_key: String,

    pub prefixes: Vec<String>,

    pub markers: Vec<String>,
}

// ---

impl Default for SessionNamespace {
    fn default() -> Self {
        // ---
        Self {
            record_key: "wagmi.store".into(),
            prefixes: vec!["wc@2:".into(), "wc@1:".into(), "wagmi.".into()],
            markers: vec!["walletconnect".into(), "WALLETCONNECT".into()],
        }
    }
}

// ---

impl SessionNamespace {
    // ---
    pub fn matches(&self, key: &str) -> bool {
        // ---
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
            || self.markers.iter().any(|m| key.contains(m.as_str()))
    }

    /// Namespaced keys currently present in `store`.
    pub fn keys_in(&self, store: &dyn SessionStore) -> Vec<String> {
        store.keys().into_iter().filter(|k| self.matches(k)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::SessionNamespace;

    #[test]
    fn default_namespace_matches_session_keys() {
        // ---
        let ns = SessionNamespace::default();
        assert!(ns.matches("wc@2:core:0.3//keychain"));
        assert!(ns.matches("wc@1:legacy"));
        assert!(ns.matches("wagmi.store"));
        assert!(ns.matches("@walletconnect/deeplink"));
        assert!(ns.matches("WALLETCONNECT_DEEPLINK_CHOICE"));
    }

    #[test]
    fn default_namespace_ignores_unrelated_keys() {
        // ---
        let ns = SessionNamespace::default();
        assert!(!ns.matches("theme"));
        assert!(!ns.matches("auth.token"));
        assert!(!ns.matches("my-wagmi.store"));
        assert!(!ns.matches("WalletConnect"));
    }
}
