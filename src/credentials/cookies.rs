use axum_extra::extract::cookie::Cookie;
use reqwest::header::{HeaderMap, SET_COOKIE};
use time::Duration;

use super::{CookieOptions, CredentialName};

/// Create the cookie carrying a credential.
pub(crate) fn credential_cookie(
    name: CredentialName,
    value: &str,
    options: &CookieOptions,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name.as_str(), value.to_string()))
        .http_only(options.http_only)
        .secure(options.secure)
        .same_site(options.same_site)
        .path("/");
    if let Some(max_age) = options.max_age {
        builder = builder.max_age(max_age);
    }
    builder.build()
}

/// Create removal cookie for a credential.
pub(crate) fn clear_credential_cookie(name: CredentialName) -> Cookie<'static> {
    Cookie::build((name.as_str(), ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// `Cookie` request header value presenting the refresh token.
pub(crate) fn refresh_cookie_header(refresh_token: &str) -> String {
    Cookie::new(CredentialName::RefreshToken.as_str(), refresh_token).to_string()
}

/// Find a non-empty `refreshToken` among the response's `Set-Cookie` headers.
pub(crate) fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| Cookie::parse(s.to_owned()).ok())
        .find(|c| c.name() == CredentialName::RefreshToken.as_str())
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
