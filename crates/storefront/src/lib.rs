//! AmyFairy storefront library.
//!
//! Catalog, cart, checkout and payment reconciliation behind an axum JSON
//! API. The binary wires the Postgres store and the Razorpay gateway; tests
//! and embedders can plug in [`db::MemoryStore`] and their own
//! [`gateway::PaymentGateway`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
