//! Product and cart entry types.
//!
//! A [`Product`] is what the catalog hands to the cart: identity plus display
//! metadata. A [`CartEntry`] is a product with a quantity attached. The
//! quantity is a [`NonZeroU32`], so an entry with zero items cannot exist.

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product as supplied to the cart, without a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub image_url: String,
    pub price: Price,
}

impl Product {
    /// Create a new product.
    #[must_use]
    pub fn new(
        id: impl Into<ProductId>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: Price,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            image_url: image_url.into(),
            price,
        }
    }
}

/// One distinct product held in the cart.
///
/// Field names match the stored payload: `id`, `title`, `image_url`, `price`,
/// `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: ProductId,
    pub title: String,
    pub image_url: String,
    pub price: Price,
    pub quantity: NonZeroU32,
}

impl CartEntry {
    /// Create an entry for a product with a quantity of one.
    #[must_use]
    pub fn first(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            image_url: product.image_url,
            price: product.price,
            quantity: NonZeroU32::MIN,
        }
    }

    /// The quantity as a plain integer.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    /// Split the entry back into its product and quantity.
    #[must_use]
    pub fn into_parts(self) -> (Product, NonZeroU32) {
        (
            Product {
                id: self.id,
                title: self.title,
                image_url: self.image_url,
                price: self.price,
            },
            self.quantity,
        )
    }
}

impl From<Product> for CartEntry {
    fn from(product: Product) -> Self {
        Self::first(product)
    }
}
