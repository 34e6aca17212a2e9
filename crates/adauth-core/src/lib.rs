//! # adauth-core
//!
//! Identity primitives for Active Directory style directories.
//!
//! This crate derives DNS domains from distinguished names, builds userPrincipalName candidates
//! for raw usernames, and provides the error types shared by the directory search layer.
//!
//! ## Modules
//!
//! - [`error`] - Error type and result alias
//! - [`aggregate`] - Accumulator for independent failures
//! - [`dn`] - Domain derivation from distinguished names
//! - [`config`] - Directory configuration, domains and UPNs

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod config;
pub mod dn;
pub mod error;

// Re-export commonly used types
pub use aggregate::AggregatingError;
pub use config::{DirectoryConfig, SecurityType};
pub use error::{Error, Result};
