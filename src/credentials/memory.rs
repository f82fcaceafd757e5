use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use time::OffsetDateTime;

use super::{CookieOptions, CredentialName, CredentialStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<OffsetDateTime>,
}

/// In-process credential store.
///
/// Honours `max_age` the way a browser would: an expired credential reads as
/// absent. A zero or negative `max_age` deletes the credential.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<CredentialName, Entry>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair, each at its default lifetime.
    #[must_use]
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        store.set(
            CredentialName::AccessToken,
            access_token,
            &CookieOptions::new(time::Duration::minutes(15)),
        );
        store.set(
            CredentialName::RefreshToken,
            refresh_token,
            &CookieOptions::new(time::Duration::days(7)),
        );
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, name: CredentialName) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&name)?;
        match entry.expires_at {
            Some(at) if at <= OffsetDateTime::now_utc() => None,
            _ => Some(entry.value.clone()),
        }
    }

    fn set(&self, name: CredentialName, value: &str, options: &CookieOptions) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if options.max_age.is_some_and(|age| !age.is_positive()) {
            entries.remove(&name);
            return;
        }
        let expires_at = options.max_age.map(|age| OffsetDateTime::now_utc() + age);
        entries.insert(
            name,
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn delete(&self, name: CredentialName) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);
    }
}
