use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::SameSite;
use time::Duration;
use url::Url;

use crate::error::Error;

/// Paths of the storefront REST API, relative to the base URL.
const LOGIN_PATH: &str = "auth/login";
const VERIFY_OTP_PATH: &str = "auth/verify-otp";
const REGISTER_PATH: &str = "auth/register";
const FORGOT_PASSWORD_PATH: &str = "auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "auth/reset-password";
const CHANGE_PASSWORD_PATH: &str = "auth/change-password";
const REFRESH_PATH: &str = "auth/refresh-token";
const LOGOUT_PATH: &str = "auth/logout";
const PROFILE_PATH: &str = "users/profile";
const ORDERS_PATH: &str = "orders";

/// Resolved endpoint URLs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Endpoints {
    pub login: Url,
    pub verify_otp: Url,
    pub register: Url,
    pub forgot_password: Url,
    pub reset_password: Url,
    pub change_password: Url,
    pub refresh: Url,
    pub logout: Url,
    pub profile: Url,
    pub orders: Url,
}

impl Endpoints {
    fn resolve(base: &Url) -> Result<Self, Error> {
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("API base URL cannot be a base: {base}")));
        }
        // `Url::join` replaces the last segment unless the base ends with '/'.
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| Error::Config(format!("endpoint {path}: {e}")))
        };

        Ok(Self {
            login: join(LOGIN_PATH)?,
            verify_otp: join(VERIFY_OTP_PATH)?,
            register: join(REGISTER_PATH)?,
            forgot_password: join(FORGOT_PASSWORD_PATH)?,
            reset_password: join(RESET_PASSWORD_PATH)?,
            change_password: join(CHANGE_PASSWORD_PATH)?,
            refresh: join(REFRESH_PATH)?,
            logout: join(LOGOUT_PATH)?,
            profile: join(PROFILE_PATH)?,
            orders: join(ORDERS_PATH)?,
        })
    }
}

/// Session and API client configuration.
///
/// The base URL is the only required field. Token lifetimes default to
/// 15 minutes (access) and 7 days (refresh); cookies default to
/// `Secure` + `SameSite=Lax`.
///
/// ```rust,ignore
/// use labcart::SessionConfig;
///
/// let config = SessionConfig::new("https://api.example.com/api/v1".parse()?)?
///     .with_request_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) base_url: Url,
    pub(crate) endpoints: Endpoints,
    pub(crate) request_timeout: StdDuration,
    pub(crate) access_token_ttl: Duration,
    pub(crate) refresh_token_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) same_site: SameSite,
}

impl SessionConfig {
    /// Create a configuration rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` cannot have relative paths joined to it.
    pub fn new(base_url: Url) -> Result<Self, Error> {
        let endpoints = Endpoints::resolve(&base_url)?;
        Ok(Self {
            base_url,
            endpoints,
            request_timeout: StdDuration::from_secs(30),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            secure_cookies: true,
            same_site: SameSite::Lax,
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `LABCART_API_URL`: base URL of the storefront REST API
    ///
    /// # Optional env vars
    /// - `LABCART_TIMEOUT_SECS`: per-request timeout in seconds (default 30)
    /// - `LABCART_SECURE_COOKIES`: `"0"` or `"false"` to drop the `Secure` attribute
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url: Url = std::env::var("LABCART_API_URL")
            .map_err(|_| Error::Config("LABCART_API_URL is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("LABCART_API_URL: {e}")))?;

        let mut config = Self::new(base_url)?;

        if let Ok(secs) = std::env::var("LABCART_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::Config(format!("LABCART_TIMEOUT_SECS: {e}")))?;
            config = config.with_request_timeout(StdDuration::from_secs(secs));
        }

        let insecure = matches!(
            std::env::var("LABCART_SECURE_COOKIES").as_deref(),
            Ok("0") | Ok("false"),
        );

        Ok(config.with_secure_cookies(!insecure))
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Override the token refresh endpoint.
    #[must_use]
    pub fn with_refresh_url(mut self, url: Url) -> Self {
        self.endpoints.refresh = url;
        self
    }

    /// API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolved endpoint URLs.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Per-request timeout applied to the HTTP client.
    #[must_use]
    pub fn request_timeout(&self) -> StdDuration {
        self.request_timeout
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }
}
