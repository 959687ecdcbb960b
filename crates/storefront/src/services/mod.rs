//! Business logic services for storefront.
//!
//! - [`catalog`] - Cached category, brand and shipping method lists
//! - [`pricing`] - Cart and order pricing shared by checkout and the API

pub mod catalog;
pub mod pricing;
