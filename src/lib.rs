//! OpenSASE Cart Session
//!
//! Client for a WooCommerce Store API cart.
//!
//! ## Features
//! - Cart token and nonce tracking from response headers
//! - Token persistence across restarts
//! - Single-flight session bootstrap
//! - Typed cart operations: items, customer addresses, shipping rates, coupons

// =============================================================================
// Modules
// =============================================================================

pub mod api;
mod bootstrap;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{CartRequest, CustomerUpdate, Endpoint, VariationAttribute};
pub use client::CartClient;
pub use config::{ClientConfig, ConfigError};
pub use domain::{Address, Cart, CartItem, Money, ShippingPackage, ShippingRate};
pub use error::{CartError, Result};
pub use session::{Credentials, SessionPhase};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
