use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::TestId;

/// One laboratory test selected for purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub test_id: TestId,
    pub test_name: String,
    pub price: Decimal,
}

impl CartItem {
    #[must_use]
    pub fn new(test_id: impl Into<TestId>, test_name: impl Into<String>, price: Decimal) -> Self {
        Self {
            test_id: test_id.into(),
            test_name: test_name.into(),
            price,
        }
    }
}

/// Cart state: items in insertion order, unique by `test_id`, plus an
/// optional promo code and its discount rate in `[0, 1]`.
///
/// Totals are derived on demand and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    promo_code: Option<String>,
    discount: Decimal,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless a test with the same id is already in the cart
    /// or its price is negative.
    ///
    /// Returns whether the item was added.
    pub fn add_item(&mut self, item: CartItem) -> bool {
        if item.price < Decimal::ZERO {
            return false;
        }
        if self.contains(&item.test_id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove the item with `test_id`. Returns whether anything was removed.
    pub fn remove_item(&mut self, test_id: &TestId) -> bool {
        match self.items.iter().position(|i| &i.test_id == test_id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empty the cart and drop the promo code with it.
    pub fn clear(&mut self) {
        self.items.clear();
        self.clear_promo_code();
    }

    /// Replace the promo code and discount rate.
    ///
    /// The code itself is not validated. The rate is clamped into `[0, 1]`.
    pub fn set_promo_code(&mut self, code: impl Into<String>, rate: Decimal) {
        self.promo_code = Some(code.into());
        self.discount = rate.clamp(Decimal::ZERO, Decimal::ONE);
    }

    pub fn clear_promo_code(&mut self) {
        self.promo_code = None;
        self.discount = Decimal::ZERO;
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, test_id: &TestId) -> bool {
        self.items.iter().any(|i| &i.test_id == test_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn promo_code(&self) -> Option<&str> {
        self.promo_code.as_deref()
    }

    #[must_use]
    pub fn discount_rate(&self) -> Decimal {
        self.discount
    }

    /// Sum of item prices, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |sum, i| {
            sum.checked_add(i.price).unwrap_or(Decimal::MAX)
        })
    }

    /// Discount amount: subtotal × discount rate.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.subtotal() * self.discount
    }

    /// Subtotal minus discount amount.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.subtotal() - self.discount()
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Restore the cart invariants on state read from outside (persistence):
    /// first occurrence wins for duplicate ids, negative prices are dropped,
    /// rate clamped into `[0, 1]`.
    pub(crate) fn normalized(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.items
            .retain(|i| i.price >= Decimal::ZERO && seen.insert(i.test_id.clone()));
        self.discount = self.discount.clamp(Decimal::ZERO, Decimal::ONE);
        if self.promo_code.is_none() {
            self.discount = Decimal::ZERO;
        }
        self
    }
}
