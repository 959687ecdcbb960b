//! Emporium Core - Shared domain types.
//!
//! This crate provides the types shared by every Emporium component:
//! - `storefront` - Public-facing shop and public REST API
//! - `admin` - Back-office CRUD screens and admin REST API
//! - `db` - `PostgreSQL` repositories
//! - `cli` - Migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding for the newtypes and enums is
//! available behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, slugs, money formatting and status enums
//! - [`pricing`] - Coupon, flash deal and shipping rules, order totals
//! - [`api`] - The `{ success, data | error }` response envelope and pagination
//! - [`csv`] - CSV export writer
//! - [`numbers`] - Human-readable document numbers (orders, quotes, RMAs)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod csv;
pub mod numbers;
pub mod pricing;
pub mod types;

pub use types::*;
