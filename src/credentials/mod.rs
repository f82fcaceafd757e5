//! Credential storage for the access/refresh token pair.
//!
//! The session manager never touches cookies or globals directly; it reads and
//! writes the two named credentials through a [`CredentialStore`]. Pick the
//! store that matches where the session lives:
//!
//! - [`MemoryCredentialStore`]: an in-process client (CLI, worker, test).
//! - [`JarCredentialStore`]: a server-side handler holding the browser's
//!   cookies in an `axum_extra` [`CookieJar`](axum_extra::extract::CookieJar).

pub(crate) mod cookies;
mod jar;
mod memory;

pub use jar::JarCredentialStore;
pub use memory::MemoryCredentialStore;

use axum_extra::extract::cookie::SameSite;
use time::Duration;

/// The two credentials a session consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialName {
    AccessToken,
    RefreshToken,
}

impl CredentialName {
    /// Storage/cookie name of the credential.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
        }
    }
}

impl std::fmt::Display for CredentialName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes a credential is stored with.
///
/// `http_only` only has an effect for stores that emit `Set-Cookie` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Option<Duration>,
    pub same_site: SameSite,
    pub secure: bool,
    pub http_only: bool,
}

impl CookieOptions {
    /// Options for a credential living `max_age`.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            same_site: SameSite::Lax,
            secure: true,
            http_only: true,
        }
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// Host-provided storage for the two session credentials.
///
/// Implementations use interior mutability: the session manager shares one
/// store across concurrent requests.
pub trait CredentialStore: Send + Sync + 'static {
    /// Current value of `name`, if present and not expired.
    fn get(&self, name: CredentialName) -> Option<String>;

    /// Store `value` under `name`, replacing any previous value.
    fn set(&self, name: CredentialName, value: &str, options: &CookieOptions);

    /// Remove `name`. Removing an absent credential is a no-op.
    fn delete(&self, name: CredentialName);
}
