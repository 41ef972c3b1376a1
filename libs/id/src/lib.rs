//! # ssoa-id
//!
//! Validated identifier types for identity-center resources.
//!
//! ## Design Principles
//!
//! - Identifiers are assigned by the backend or the caller; this crate never mints them
//! - Every identifier is parsed once at the boundary and carried as a typed newtype
//! - Parsing is strict but purely syntactic (no backend lookups)
//! - Identifiers roundtrip through serde as their canonical string form
//!
//! ## Identifier Formats
//!
//! - Instance ARN: `arn:aws:sso:::instance/ssoins-1234567890abcdef`
//! - Permission set ARN: `arn:aws:sso:::permissionSet/ssoins-1234567890abcdef/ps-1234567890abcdef`
//! - Managed policy ARN: `arn:aws:iam::aws:policy/ReadOnlyAccess`
//! - Account ID: twelve decimal digits
//! - Principal ID: identity-store user or group id
//! - Request ID: opaque tracking token of an asynchronous backend operation

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
