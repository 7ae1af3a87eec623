//! Solsight Shared Library
//!
//! This crate contains the cloud API client, data models, and PVOutput
//! bridging logic used across Solsight.
//!
//! # Modules
//!
//! - [`config`] - Account credentials and tuning loaded from the environment
//! - [`daterange`] - Bounded date-list generation for history queries
//! - [`models`] - Wire models for the cloud Open API and PVOutput records
//! - [`tariff`] - Time-of-use periods for peak/off-peak energy bucketing
//! - [`client`] - Signed, throttled HTTP client for the cloud Open API
//! - [`pvoutput`] - Daily output assembly and PVOutput upload
//!
//! # Example
//!
//! ```
//! use shared::daterange::{DateList, Span};
//!
//! let days = DateList::new()
//!     .span(Span::Week)
//!     .end("2024-03-10".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(days.len(), 7);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod daterange;
pub mod models;
pub mod pvoutput;
pub mod tariff;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
