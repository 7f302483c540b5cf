//! AmyFairy Core - Shared domain types.
//!
//! This crate provides the types used by every AmyFairy component:
//! - `storefront` - Customer and administrator JSON API
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The order state machine and discount arithmetic
//! live here so every caller agrees on them.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, prices, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
