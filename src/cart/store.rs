use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::model::{Cart, CartItem};
use super::persist::CartPersistence;
use crate::error::Error;
use crate::types::TestId;

/// Format version of the persisted envelope.
const PERSIST_VERSION: u32 = 0;

/// Cart persistence settings.
///
/// Both limits are off by default: the cart keeps any number of items and
/// never expires.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CartConfig {
    pub(crate) storage_key: String,
    pub(crate) max_items: Option<usize>,
    pub(crate) ttl: Option<Duration>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: "cart-storage".into(),
            max_items: None,
            ttl: None,
        }
    }
}

impl CartConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `LABCART_CART_KEY`: storage key (default `cart-storage`)
    /// - `LABCART_CART_MAX_ITEMS`: maximum number of distinct tests
    /// - `LABCART_CART_TTL_HOURS`: discard a persisted cart older than this
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse or the
    /// TTL is out of range.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new();

        if let Ok(key) = std::env::var("LABCART_CART_KEY") {
            config = config.with_storage_key(key);
        }
        if let Ok(max) = std::env::var("LABCART_CART_MAX_ITEMS") {
            let max: usize = max
                .parse()
                .map_err(|e| Error::Config(format!("LABCART_CART_MAX_ITEMS: {e}")))?;
            config = config.with_max_items(max);
        }
        if let Ok(hours) = std::env::var("LABCART_CART_TTL_HOURS") {
            config = config.with_ttl(parse_ttl_hours(&hours)?);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

fn parse_ttl_hours(hours: &str) -> Result<Duration, Error> {
    let hours: i64 = hours
        .parse()
        .map_err(|e| Error::Config(format!("LABCART_CART_TTL_HOURS: {e}")))?;
    hours
        .checked_mul(3600)
        .map(Duration::seconds)
        .ok_or_else(|| Error::Config(format!("LABCART_CART_TTL_HOURS: {hours} is out of range")))
}

/// On-disk shape: `{"state": {...}, "version": 0, "savedAt": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCart {
    state: Cart,
    version: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    saved_at: Option<OffsetDateTime>,
}

/// A [`Cart`] that writes itself through a [`CartPersistence`] after every change.
pub struct CartStore<P> {
    cart: Cart,
    persistence: P,
    config: CartConfig,
}

impl<P: CartPersistence> CartStore<P> {
    /// Open the cart stored under `config.storage_key`, or start empty.
    ///
    /// Unreadable, outdated or expired state is discarded with a warning.
    pub fn open(persistence: P, config: CartConfig) -> Self {
        let cart = load(&persistence, &config).unwrap_or_default();
        Self {
            cart,
            persistence,
            config,
        }
    }

    #[must_use]
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Add `item` unless its test is already in the cart or the cart is full.
    pub fn add_item(&mut self, item: CartItem) {
        let full = self
            .config
            .max_items
            .is_some_and(|max| self.cart.item_count() >= max);
        if full && !self.cart.contains(&item.test_id) {
            tracing::debug!(test_id = %item.test_id, "Cart full, item not added");
            return;
        }
        if self.cart.add_item(item) {
            self.persist();
        }
    }

    pub fn remove_item(&mut self, test_id: &TestId) {
        if self.cart.remove_item(test_id) {
            self.persist();
        }
    }

    /// Empty the cart, promo code included.
    pub fn clear_cart(&mut self) {
        self.cart.clear();
        self.persist();
    }

    pub fn set_promo_code(&mut self, code: impl Into<String>, rate: Decimal) {
        self.cart.set_promo_code(code, rate);
        self.persist();
    }

    pub fn clear_promo_code(&mut self) {
        self.cart.clear_promo_code();
        self.persist();
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.cart.subtotal()
    }

    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.cart.discount()
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.cart.total()
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.cart.item_count()
    }

    fn persist(&self) {
        let envelope = PersistedCart {
            state: self.cart.clone(),
            version: PERSIST_VERSION,
            saved_at: Some(OffsetDateTime::now_utc()),
        };
        let result = serde_json::to_string(&envelope)
            .map_err(|e| Error::Persistence(e.to_string()))
            .and_then(|json| self.persistence.save(&self.config.storage_key, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %self.config.storage_key, "Failed to persist cart");
        }
    }
}

fn load<P: CartPersistence>(persistence: &P, config: &CartConfig) -> Option<Cart> {
    let key = &config.storage_key;
    let raw = match persistence.load(key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Failed to load cart, starting empty");
            return None;
        }
    };

    let envelope: PersistedCart = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Unreadable cart state, starting empty");
            return None;
        }
    };

    if envelope.version != PERSIST_VERSION {
        tracing::warn!(version = envelope.version, key = %key, "Unknown cart version, starting empty");
        return None;
    }

    let expired = match (config.ttl, envelope.saved_at) {
        // A deadline past the representable range never expires.
        (Some(ttl), Some(saved_at)) => saved_at
            .checked_add(ttl)
            .is_some_and(|deadline| deadline <= OffsetDateTime::now_utc()),
        _ => false,
    };
    if expired {
        tracing::info!(key = %key, "Persisted cart expired, starting empty");
        if let Err(e) = persistence.remove(key) {
            tracing::warn!(error = %e, key = %key, "Failed to remove expired cart");
        }
        return None;
    }

    Some(envelope.state.normalized())
}
