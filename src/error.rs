#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No access token was stored when a protected call was attempted.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The access token could not be renewed, or the renewed token was rejected too.
    #[error("Session expired")]
    SessionExpired,

    /// `refresh()` was called with no refresh token stored.
    #[error("No refresh token")]
    NoRefreshToken,

    /// The refresh endpoint rejected the refresh for a reason other than expiry.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The request body is a stream and cannot be re-sent after a refresh.
    #[error("Request body cannot be replayed")]
    UnreplayableRequest,

    /// Checkout was attempted with no items in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The REST API answered with a non-success status.
    #[error("{operation} failed ({status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The API accepted the call but issued no tokens.
    #[error("{operation} issued no tokens: {message}")]
    NoTokensIssued {
        operation: &'static str,
        message: String,
    },

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cart persistence backend failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}
