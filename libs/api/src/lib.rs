//! # ssoa-api
//!
//! Backend collaborator interfaces for the identity-center control plane.
//!
//! The workflows never talk to the wire directly. Each resource family is an
//! async trait ([`AssignmentApi`], [`AccessControlApi`], [`PermissionSetApi`])
//! whose methods mirror the remote operations one to one. Failures surface as
//! [`ApiError`] carrying the service exception name and message, which the
//! retry policy classifies.
//!
//! ## Pagination
//!
//! Listing operations take an optional continuation token and return a
//! [`Page`]. An absent or empty `next_token` marks the last page.

mod access_control;
mod assignment;
mod permission_set;
mod status;

pub use access_control::*;
pub use assignment::*;
pub use permission_set::*;
pub use status::*;

pub use ssoa_reconcile::{ApiError, ApiErrorCode, Page};

/// Every backend interface the resource handlers need.
pub trait Backend: AssignmentApi + AccessControlApi + PermissionSetApi {}

impl<T> Backend for T where T: AssignmentApi + AccessControlApi + PermissionSetApi {}
