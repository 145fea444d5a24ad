//! Durable client-local state.
//!
//! A single-file SQLite database holds the order history (keyed by exchange
//! id) and a small settings table (terms acceptance). It survives restarts,
//! not a deliberate wipe of the file.

pub mod order_store;

pub use order_store::OrderStore;
