//! Cart state and its transitions.
//!
//! [`Cart`] is a plain value: every operation either returns a fully
//! consistent new state or leaves the cart untouched. The store layer decides
//! when to publish and persist.

use core::num::NonZeroU32;

use gomarket_core::{CartEntry, Product, ProductId};
use serde::Serialize;

/// What a mutation did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A new entry was appended with quantity one.
    Added,
    /// An existing entry's quantity went up.
    Incremented {
        /// Quantity after the change.
        quantity: u32,
    },
    /// An existing entry's quantity went down but stayed positive.
    Decremented {
        /// Quantity after the change.
        quantity: u32,
    },
    /// An entry at quantity one was decremented and removed.
    Removed,
    /// No entry matched the id.
    Unchanged,
}

impl CartChange {
    /// Whether the cart differs from before the operation.
    #[must_use]
    pub const fn is_modified(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Ordered list of cart entries, unique by id, every quantity at least one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a cart from entries, rejecting duplicate ids.
    ///
    /// Quantities are already positive by construction of [`CartEntry`].
    ///
    /// # Errors
    ///
    /// Returns the first id that appears more than once.
    pub fn from_entries(entries: Vec<CartEntry>) -> Result<Self, ProductId> {
        for (i, entry) in entries.iter().enumerate() {
            if entries.iter().take(i).any(|earlier| earlier.id == entry.id) {
                return Err(entry.id.clone());
            }
        }
        Ok(Self { entries })
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, CartEntry> {
        self.entries.iter()
    }

    /// Number of distinct products.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity())).sum()
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.id.as_str() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id.as_str() == id)
    }

    /// Add a product.
    ///
    /// An id already in the cart is incremented instead of duplicated, and the
    /// stored title, image and price are kept as they were.
    pub fn add(&mut self, product: Product) -> CartChange {
        if self.contains(product.id.as_str()) {
            return self.increment(product.id.as_str());
        }
        self.entries.push(CartEntry::first(product));
        CartChange::Added
    }

    /// Increase the quantity of `id` by one.
    ///
    /// Unknown ids, and entries already at `u32::MAX`, are left alone.
    pub fn increment(&mut self, id: &str) -> CartChange {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id.as_str() == id) else {
            return CartChange::Unchanged;
        };
        let Some(quantity) = entry.quantity.checked_add(1) else {
            return CartChange::Unchanged;
        };
        entry.quantity = quantity;
        CartChange::Incremented {
            quantity: quantity.get(),
        }
    }

    /// Decrease the quantity of `id` by one, removing it at zero.
    pub fn decrement(&mut self, id: &str) -> CartChange {
        let Some(index) = self.position(id) else {
            return CartChange::Unchanged;
        };
        let Some(entry) = self.entries.get_mut(index) else {
            return CartChange::Unchanged;
        };
        match NonZeroU32::new(entry.quantity() - 1) {
            Some(quantity) => {
                entry.quantity = quantity;
                CartChange::Decremented {
                    quantity: quantity.get(),
                }
            }
            None => {
                self.entries.remove(index);
                CartChange::Removed
            }
        }
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartEntry;
    type IntoIter = core::slice::Iter<'a, CartEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<Cart> for Vec<CartEntry> {
    fn from(cart: Cart) -> Self {
        cart.entries
    }
}
