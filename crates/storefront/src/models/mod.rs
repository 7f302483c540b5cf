//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the `sqlx` row types in
//! [`crate::db`]. Two pricing views coexist on purpose:
//!
//! - [`cart::CartLine`] is a live read model joined with the current product.
//! - [`order::OrderItem`] is frozen at order time and never recomputed.

pub mod cart;
pub mod order;
pub mod page;
pub mod payment;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{CartItem, CartLine, CartView, NewCartItem};
pub use order::{
    NewOrder, Order, OrderItem, OrderQuery, OrderSort, ShippingAddress, StockShortfall,
};
pub use page::{Page, SortOrder};
pub use payment::{NewPaymentIntent, PaymentIntent, PaymentOutcome, Settlement};
pub use product::{Product, ProductDraft, ProductPatch, ProductQuery, ProductSort};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{Address, NewAddress, NewUser, ProfileUpdate, User};
