//! Authenticated requests with transparent, single-flight token refresh.
//!
//! A [`SessionManager`] owns the access/refresh token pair through a
//! [`CredentialStore`] and sends requests with the access token as a bearer
//! credential. When the API answers `401`, the manager refreshes the access
//! token once and retries the request once. Any further rejection is terminal:
//! both credentials are cleared and the caller gets [`Error::SessionExpired`].
//!
//! Concurrent `401`s share one refresh: the first caller starts it, the rest
//! await the same result.

use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Request, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::config::SessionConfig;
use crate::credentials::{CookieOptions, CredentialName, CredentialStore, cookies};
use crate::envelope::{Envelope, error_message};
use crate::error::Error;

type RefreshFlight = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Outcome of a failed refresh, shared between all callers awaiting it.
#[derive(Debug, Clone)]
enum RefreshError {
    NoRefreshToken,
    /// Refresh endpoint answered 401; both credentials were cleared.
    Expired(String),
    /// Any other failure; credentials untouched.
    Failed(String),
}

impl From<RefreshError> for Error {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::NoRefreshToken => Self::NoRefreshToken,
            RefreshError::Expired(msg) | RefreshError::Failed(msg) => Self::RefreshFailed(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedToken {
    access_token: String,
}

struct Inner<S> {
    config: SessionConfig,
    http: reqwest::Client,
    store: S,
    in_flight: Mutex<Option<RefreshFlight>>,
}

/// Session over the storefront REST API.
///
/// Cheap to clone; clones share credentials and the in-flight refresh.
pub struct SessionManager<S> {
    inner: Arc<Inner<S>>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CredentialStore> SessionManager<S> {
    /// Create a session manager with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: SessionConfig, store: S) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http_client(config, store, http))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The client's own timeout applies; `config.request_timeout` is ignored.
    #[must_use]
    pub fn with_http_client(config: SessionConfig, store: S, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http,
                store,
                in_flight: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// HTTP client used for every request; build requests with it.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    #[must_use]
    pub fn credentials(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner.store.get(CredentialName::AccessToken)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Store a freshly issued token pair (login, OTP verification).
    ///
    /// A `None` refresh token keeps whatever refresh token is already stored.
    pub fn establish(&self, access_token: &str, refresh_token: Option<&str>) {
        store_access_token(&self.inner, access_token);
        if let Some(refresh_token) = refresh_token {
            store_refresh_token(&self.inner, refresh_token);
        }
        tracing::debug!("session established");
    }

    /// Store a refresh token delivered through a `Set-Cookie` response header.
    pub fn absorb_set_cookies(&self, headers: &HeaderMap) {
        if let Some(refresh_token) = cookies::refresh_token_from_headers(headers) {
            store_refresh_token(&self.inner, &refresh_token);
        }
    }

    /// Remove both credentials.
    pub fn clear(&self) {
        clear_credentials(&self.inner);
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// Joins a refresh already in flight instead of starting another one.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRefreshToken`] if no refresh token is stored (no request is made).
    /// - [`Error::RefreshFailed`] if the refresh endpoint rejects the token. On `401`
    ///   both credentials are cleared first; on other failures they are kept.
    pub async fn refresh(&self) -> Result<String, Error> {
        self.shared_refresh().await.map_err(Into::into)
    }

    /// Send `request` with the access token, refreshing and retrying once on `401`.
    ///
    /// Any response other than `401` is returned as-is, error statuses
    /// included; the caller inspects status and body.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] if no access token is stored (no request is made).
    /// - [`Error::SessionExpired`] if the refresh token is missing or expired, or the
    ///   retried request is rejected again. Both credentials are cleared.
    /// - [`Error::RefreshFailed`] if refreshing failed for another reason. Both
    ///   credentials are cleared.
    /// - [`Error::UnreplayableRequest`] if the body is a stream.
    /// - [`Error::Http`] on network failure.
    pub async fn authenticated_request(&self, request: RequestBuilder) -> Result<Response, Error> {
        let Some(access_token) = self.access_token() else {
            self.clear();
            return Err(Error::NotAuthenticated);
        };

        let template = request.build()?;
        if template.try_clone().is_none() {
            return Err(Error::UnreplayableRequest);
        }

        let response = self.send_with_token(&template, &access_token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(url = %template.url(), "Access token rejected, refreshing");

        let retry_token = match self.access_token() {
            // Another request already replaced the token we were rejected with.
            Some(current) if current != access_token => current,
            _ => match self.shared_refresh().await {
                Ok(token) => token,
                Err(e) => {
                    self.clear();
                    tracing::warn!(error = ?e, "Token refresh failed, session cleared");
                    return Err(match e {
                        RefreshError::Failed(msg) => Error::RefreshFailed(msg),
                        RefreshError::NoRefreshToken | RefreshError::Expired(_) => {
                            Error::SessionExpired
                        }
                    });
                }
            },
        };

        let response = self.send_with_token(&template, &retry_token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.clear();
            tracing::warn!(url = %template.url(), "Refreshed token rejected, session cleared");
            return Err(Error::SessionExpired);
        }
        Ok(response)
    }

    async fn send_with_token(&self, template: &Request, token: &str) -> Result<Response, Error> {
        let mut request = template.try_clone().ok_or(Error::UnreplayableRequest)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::NotAuthenticated)?;
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(self.inner.http.execute(request).await?)
    }

    async fn shared_refresh(&self) -> Result<String, RefreshError> {
        let flight = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let flight = refresh_once(Arc::clone(&self.inner)).boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        result
    }
}

async fn refresh_once<S: CredentialStore>(inner: Arc<Inner<S>>) -> Result<String, RefreshError> {
    let refresh_token = inner
        .store
        .get(CredentialName::RefreshToken)
        .ok_or(RefreshError::NoRefreshToken)?;

    let response = inner
        .http
        .post(inner.config.endpoints.refresh.clone())
        .header(COOKIE, cookies::refresh_cookie_header(&refresh_token))
        .header(CACHE_CONTROL, "no-store")
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Token refresh request failed");
            RefreshError::Failed(e.to_string())
        })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        clear_credentials(&inner);
        let message = error_message(response).await;
        tracing::info!(message = %message, "Refresh token expired, session cleared");
        return Err(RefreshError::Expired(message));
    }
    if !status.is_success() {
        let message = error_message(response).await;
        tracing::warn!(status = status.as_u16(), message = %message, "Token refresh rejected");
        return Err(RefreshError::Failed(message));
    }

    let rotated = cookies::refresh_token_from_headers(response.headers());
    let body: Envelope<RefreshedToken> = response
        .json()
        .await
        .map_err(|e| RefreshError::Failed(format!("invalid refresh response: {e}")))?;

    store_access_token(&inner, &body.data.access_token);
    if let Some(refresh_token) = rotated {
        store_refresh_token(&inner, &refresh_token);
    }

    tracing::debug!("Access token refreshed");
    Ok(body.data.access_token)
}

fn cookie_options<S>(inner: &Inner<S>, max_age: time::Duration) -> CookieOptions {
    CookieOptions::new(max_age)
        .with_secure(inner.config.secure_cookies)
        .with_same_site(inner.config.same_site)
}

fn store_access_token<S: CredentialStore>(inner: &Inner<S>, token: &str) {
    let options = cookie_options(inner, inner.config.access_token_ttl);
    inner.store.set(CredentialName::AccessToken, token, &options);
}

fn store_refresh_token<S: CredentialStore>(inner: &Inner<S>, token: &str) {
    let options = cookie_options(inner, inner.config.refresh_token_ttl);
    inner.store.set(CredentialName::RefreshToken, token, &options);
}

fn clear_credentials<S: CredentialStore>(inner: &Inner<S>) {
    inner.store.delete(CredentialName::AccessToken);
    inner.store.delete(CredentialName::RefreshToken);
}
