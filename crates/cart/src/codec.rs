//! Stored payload format.
//!
//! The cart is stored as a JSON array of entries under [`CART_STORAGE_KEY`]:
//!
//! ```json
//! [{"id":"p1","title":"Apple","image_url":"u","price":1.5,"quantity":1}]
//! ```
//!
//! Decoding is strict. A payload that is not valid JSON, has a missing field,
//! a non-positive quantity, or a repeated id is rejected rather than repaired.

use gomarket_core::{CartEntry, ProductId};
use thiserror::Error;

use crate::cart::Cart;

/// Storage key holding the serialized cart.
pub const CART_STORAGE_KEY: &str = "@GoMarket:Product";

/// Errors from encoding or decoding the stored cart.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not a valid cart document.
    #[error("invalid cart payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload lists the same product twice.
    #[error("duplicate product id in cart payload: {0}")]
    DuplicateId(ProductId),
}

/// Serialize a cart to its stored form.
///
/// # Errors
///
/// Returns `CodecError::Json` if serialization fails.
pub fn encode(cart: &Cart) -> Result<String, CodecError> {
    Ok(serde_json::to_string(cart)?)
}

/// Parse a stored payload back into a cart.
///
/// # Errors
///
/// Returns `CodecError` if the payload is malformed or breaks a cart invariant.
pub fn decode(payload: &str) -> Result<Cart, CodecError> {
    let entries: Vec<CartEntry> = serde_json::from_str(payload)?;
    Cart::from_entries(entries).map_err(CodecError::DuplicateId)
}
