//! # consent-core
//!
//! The trust seams of the consent system and the validator that joins them.
//!
//! This crate provides:
//! - The two core traits (`ConsentLedger`, `ConsentPolicy`)
//! - The `ConsentValidator` that evaluates a request and records the outcome
//!
//! ## Usage
//!
//! ```rust,ignore
//! use consent_core::{ConsentValidator, traits::{ConsentLedger, ConsentPolicy}};
//! ```

pub mod traits;
pub mod validator;

pub use traits::GENESIS_HASH;
pub use validator::ConsentValidator;
