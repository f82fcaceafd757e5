use std::sync::{Mutex, PoisonError};

use axum_extra::extract::CookieJar;

use super::cookies;
use super::{CookieOptions, CredentialName, CredentialStore};

/// Credential store backed by the request's cookies.
///
/// Wrap the jar extracted by an Axum handler, run the session manager
/// against it, then hand the jar back in the response so refreshed or
/// cleared credentials reach the browser as `Set-Cookie` headers.
///
/// ```rust,ignore
/// async fn profile(jar: CookieJar, State(cfg): State<SessionConfig>) -> impl IntoResponse {
///     let session = SessionManager::new(cfg, JarCredentialStore::new(jar))?;
///     let profile = ApiClient::new(session.clone()).profile().await;
///     (session.credentials().take_jar(), Json(profile))
/// }
/// ```
#[derive(Debug)]
pub struct JarCredentialStore {
    jar: Mutex<CookieJar>,
}

impl JarCredentialStore {
    #[must_use]
    pub fn new(jar: CookieJar) -> Self {
        Self {
            jar: Mutex::new(jar),
        }
    }

    /// Current jar, including every credential change made so far.
    #[must_use]
    pub fn jar(&self) -> CookieJar {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take the jar out, leaving an empty one behind.
    #[must_use]
    pub fn take_jar(&self) -> CookieJar {
        std::mem::take(&mut *self.jar.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn into_jar(self) -> CookieJar {
        self.jar.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for JarCredentialStore {
    fn get(&self, name: CredentialName) -> Option<String> {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name.as_str())
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn set(&self, name: CredentialName, value: &str, options: &CookieOptions) {
        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = jar.clone().add(cookies::credential_cookie(name, value, options));
        *jar = updated;
    }

    fn delete(&self, name: CredentialName) {
        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = jar.clone().remove(cookies::clear_credential_cookie(name));
        *jar = updated;
    }
}
