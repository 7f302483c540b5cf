//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - password registration and login
//! - `account` - profile and address book
//! - `catalog` - product listings, facets and administrator catalog edits
//! - `cart` - per-user cart line items
//! - `orders` - order placement and fulfillment status
//! - `payments` - gateway transactions and callback reconciliation
//!
//! Services borrow a `&dyn Store` and take the acting user explicitly, so a
//! request never depends on ambient identity.

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;

pub use account::{AccountError, AccountService};
pub use auth::{AuthError, AuthService};
pub use cart::{AddToCart, CartError, CartService};
pub use catalog::{CatalogError, CatalogService};
pub use orders::{OrderError, OrderService};
pub use payments::{PaymentCallback, PaymentError, PaymentHandle, PaymentService, ReconcileOutcome};
