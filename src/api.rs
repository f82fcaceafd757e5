use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cart::{CartPersistence, CartStore};
use crate::credentials::CredentialStore;
use crate::envelope::{Envelope, error_message};
use crate::error::Error;
use crate::session::SessionManager;
use crate::types::{OrderId, TestId};

/// Typed client for the storefront REST API.
///
/// Unauthenticated calls (login, registration, password reset) go straight
/// to the API; everything else goes through the [`SessionManager`] and its
/// refresh-and-retry handling.
pub struct ApiClient<S> {
    session: SessionManager<S>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

/// Result of a password login.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoginOutcome {
    /// Tokens were issued and stored.
    Authenticated,
    /// The account needs a one-time code; call [`ApiClient::verify_otp`] next.
    OtpRequired { message: String },
}

/// Registration form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl NewAccount {
    #[must_use]
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            password: password.into(),
            phone: None,
        }
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Account profile as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum OrderStatus {
    Pending,
    Confirmed,
    SampleCollected,
    Processing,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub test_id: TestId,
    pub test_name: String,
    pub price: Decimal,
}

/// Released result of one ordered test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct TestResult {
    pub test_id: TestId,
    pub test_name: String,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub released_at: Option<time::OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub promo_code: Option<String>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<time::OffsetDateTime>,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

/// Checkout form: who the samples are collected from and where.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CheckoutDetails {
    pub patient_name: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_date: Option<String>,
    pub payment_method: String,
}

impl CheckoutDetails {
    #[must_use]
    pub fn new(
        patient_name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: patient_name.into(),
            phone: phone.into(),
            address: address.into(),
            collection_date: None,
            payment_method: payment_method.into(),
        }
    }

    #[must_use]
    pub fn with_collection_date(mut self, date: impl Into<String>) -> Self {
        self.collection_date = Some(date.into());
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOrder<'a> {
    items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    promo_code: Option<&'a str>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    #[serde(flatten)]
    details: &'a CheckoutDetails,
}

/// Body of login and OTP verification responses.
#[derive(Debug, Deserialize)]
struct IssuedTokensResponse {
    #[serde(default)]
    data: Option<IssuedTokens>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl<S: CredentialStore> ApiClient<S> {
    #[must_use]
    pub fn new(session: SessionManager<S>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    /// Log in with an email or phone number and a password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the credentials are rejected, or
    /// [`Error::Http`] on network failure.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, Error> {
        let body = serde_json::json!({ "identifier": identifier, "password": password });
        let response = self
            .session
            .http()
            .post(self.endpoints().login.clone())
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "login").await?;

        match self.store_issued_tokens(response).await? {
            None => Ok(LoginOutcome::Authenticated),
            Some(message) => Ok(LoginOutcome::OtpRequired { message }),
        }
    }

    /// Complete a login with the one-time code sent to `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the code is rejected, or
    /// [`Error::NoTokensIssued`] if the API accepts it without issuing tokens.
    pub async fn verify_otp(&self, identifier: &str, code: &str) -> Result<(), Error> {
        let body = serde_json::json!({ "identifier": identifier, "otp": code });
        let response = self
            .session
            .http()
            .post(self.endpoints().verify_otp.clone())
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "OTP verification").await?;

        match self.store_issued_tokens(response).await? {
            None => Ok(()),
            Some(message) => Err(Error::NoTokensIssued {
                operation: "OTP verification",
                message,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Api`] if the API rejects the registration.
    pub async fn register(&self, account: &NewAccount) -> Result<(), Error> {
        let response = self
            .session
            .http()
            .post(self.endpoints().register.clone())
            .json(account)
            .send()
            .await?;
        ensure_success(response, "registration").await?;
        tracing::info!("Account registered");
        Ok(())
    }

    /// Ask the API to send a password-reset link or code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the API rejects the request.
    pub async fn forgot_password(&self, identifier: &str) -> Result<(), Error> {
        let body = serde_json::json!({ "identifier": identifier });
        let response = self
            .session
            .http()
            .post(self.endpoints().forgot_password.clone())
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "forgot password").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Api`] if the reset token is invalid or expired.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), Error> {
        let body = serde_json::json!({ "token": reset_token, "password": new_password });
        let response = self
            .session
            .http()
            .post(self.endpoints().reset_password.clone())
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "password reset").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns session errors from [`SessionManager::authenticated_request`], or
    /// [`Error::Api`] if the current password is wrong.
    pub async fn change_password(&self, current: &str, new_password: &str) -> Result<(), Error> {
        let body = serde_json::json!({ "currentPassword": current, "newPassword": new_password });
        let request = self
            .session
            .http()
            .put(self.endpoints().change_password.clone())
            .json(&body);
        let response = self.session.authenticated_request(request).await?;
        ensure_success(response, "password change").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns session errors from [`SessionManager::authenticated_request`], or
    /// [`Error::Api`] on a non-success status.
    pub async fn profile(&self) -> Result<Profile, Error> {
        let request = self.session.http().get(self.endpoints().profile.clone());
        self.authenticated_data(request, "profile fetch").await
    }

    /// # Errors
    ///
    /// Returns session errors from [`SessionManager::authenticated_request`], or
    /// [`Error::Api`] if the update is rejected.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, Error> {
        let request = self
            .session
            .http()
            .put(self.endpoints().profile.clone())
            .json(update);
        self.authenticated_data(request, "profile update").await
    }

    /// End the session.
    ///
    /// The server call is best-effort; local credentials are cleared either way.
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            let request = self.session.http().post(self.endpoints().logout.clone());
            match self.session.authenticated_request(request).await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(status = response.status().as_u16(), "Logout rejected by API");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Logout request failed"),
            }
        }
        self.session.clear();
        tracing::info!("Logged out");
    }

    /// Order history, newest first as returned by the API.
    ///
    /// # Errors
    ///
    /// Returns session errors or [`Error::Api`] on a non-success status.
    pub async fn orders(&self) -> Result<Vec<Order>, Error> {
        let request = self.session.http().get(self.endpoints().orders.clone());
        self.authenticated_data(request, "order list").await
    }

    /// One order with its released results.
    ///
    /// # Errors
    ///
    /// Returns session errors or [`Error::Api`] (404 for an unknown order).
    pub async fn order(&self, id: &OrderId) -> Result<Order, Error> {
        let request = self.session.http().get(self.order_url(id));
        self.authenticated_data(request, "order fetch").await
    }

    /// Place an order for everything in `cart`, then clear the cart.
    ///
    /// The cart is left untouched if the order is not created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCart`] without any request for an empty cart,
    /// session errors, or [`Error::Api`] if the order is rejected.
    pub async fn checkout<P: CartPersistence>(
        &self,
        cart: &mut CartStore<P>,
        details: &CheckoutDetails,
    ) -> Result<Order, Error> {
        let request = {
            let state = cart.cart();
            if state.is_empty() {
                return Err(Error::EmptyCart);
            }

            let body = NewOrder {
                items: state
                    .items()
                    .iter()
                    .map(|i| OrderItem {
                        test_id: i.test_id.clone(),
                        test_name: i.test_name.clone(),
                        price: i.price,
                    })
                    .collect(),
                promo_code: state.promo_code(),
                subtotal: state.subtotal(),
                discount: state.discount(),
                total: state.total(),
                details,
            };
            self.session
                .http()
                .post(self.endpoints().orders.clone())
                .json(&body)
        };

        let order: Order = self.authenticated_data(request, "checkout").await?;
        cart.clear_cart();
        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    fn endpoints(&self) -> &crate::config::Endpoints {
        self.session.config().endpoints()
    }

    fn order_url(&self, id: &OrderId) -> Url {
        let mut url = self.endpoints().orders.clone();
        // Base URLs are validated as `can_be_a_base` when the config is built.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id.as_str());
        }
        url
    }

    async fn authenticated_data<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = self.session.authenticated_request(request).await?;
        let response = ensure_success(response, operation).await?;
        let body: Envelope<T> = response.json().await?;
        Ok(body.data)
    }

    /// Store tokens issued by login/OTP verification.
    ///
    /// Returns the API's message when no access token was issued.
    async fn store_issued_tokens(&self, response: reqwest::Response) -> Result<Option<String>, Error> {
        let headers = response.headers().clone();
        let body: IssuedTokensResponse = response.json().await?;
        let tokens = body.data.unwrap_or_default();

        let Some(access_token) = tokens.access_token else {
            let message = body.message.unwrap_or_else(|| "One-time code sent".into());
            return Ok(Some(message));
        };

        self.session
            .establish(&access_token, tokens.refresh_token.as_deref());
        self.session.absorb_set_cookies(&headers);
        tracing::info!("Login successful");
        Ok(None)
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = error_message(response).await;
    Err(Error::Api {
        operation,
        status,
        message,
    })
}
