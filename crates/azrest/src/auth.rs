//! Bearer-token provider seam.
//!
//! Credential acquisition lives outside this crate; callers hand in any
//! [`TokenProvider`] and the client attaches `Authorization: Bearer ...`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// Well-known token scopes.
pub mod scopes {
    /// Azure Resource Manager.
    pub const MANAGEMENT: &str = "https://management.azure.com/.default";
    /// Azure AI Search data plane.
    pub const SEARCH: &str = "https://search.azure.com/.default";
    /// Key Vault data plane.
    pub const KEY_VAULT: &str = "https://vault.azure.net/.default";
    /// App Configuration data plane.
    pub const APP_CONFIG: &str = "https://azconfig.io/.default";
}

/// Supplies bearer tokens for a scope.
pub trait TokenProvider: Send + Sync {
    fn token(&self, scope: &str) -> Result<String>;
}

/// A single pre-acquired token used for every scope.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self, _scope: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Memoizes tokens per scope for the lifetime of one run.
pub struct CachedTokens<P> {
    inner: P,
    cache: Mutex<HashMap<String, String>>,
}

impl<P: TokenProvider> CachedTokens<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: TokenProvider> TokenProvider for CachedTokens<P> {
    fn token(&self, scope: &str) -> Result<String> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = cache.get(scope) {
            return Ok(token.clone());
        }
        let token = self.inner.token(scope)?;
        cache.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl TokenProvider for Counting {
        fn token(&self, scope: &str) -> Result<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{scope}#{n}"))
        }
    }

    #[test]
    fn test_static_token_ignores_scope() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.token(scopes::SEARCH).unwrap(), "abc");
        assert_eq!(provider.token(scopes::MANAGEMENT).unwrap(), "abc");
    }

    #[test]
    fn test_cached_tokens_fetch_once_per_scope() {
        let provider = CachedTokens::new(Counting(AtomicUsize::new(0)));

        let first = provider.token(scopes::SEARCH).unwrap();
        let second = provider.token(scopes::SEARCH).unwrap();
        let other = provider.token(scopes::KEY_VAULT).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(provider.inner.0.load(Ordering::SeqCst), 2);
    }
}
