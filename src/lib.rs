//! swapdeck - cross-chain swap client for an exchange-aggregator API.
//!
//! The crate wraps the aggregator's REST API with the pieces a swap
//! front end needs: debounced rate estimation with a fee breakdown,
//! recipient address validation, single-shot order creation, background
//! status polling, and a durable local order store.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod persistence;
pub mod services;
pub mod wizard;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AppConfig;
pub use error::{Result, SwapError};
pub use wizard::{SwapWizard, WizardStep};
