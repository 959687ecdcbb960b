//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Password sign-in and user management
//! - `generator` - AI product copy generation

pub mod auth;
pub mod generator;

pub use auth::{AdminAuthService, AuthError};
pub use generator::{GenerateRequest, GeneratedProduct, GeneratorError, ProductGenerator};
