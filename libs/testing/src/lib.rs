//! # ssoa-testing
//!
//! An in-memory identity-center backend for tests and local sandboxes.
//!
//! [`MemoryBackend`] implements every backend interface from `ssoa-api`
//! against a serializable [`SandboxState`]. On top of the plain state it
//! offers:
//!
//! - **Fault scripts**: queue errors that the next calls of a given
//!   [`Operation`] return instead of executing
//! - **Call recording**: every call is recorded, so tests can assert that a
//!   workflow issued no mutations or exactly the expected ones
//! - **Asynchronous requests**: assignment, provisioning and attribute
//!   configuration requests stay in progress for a configurable number of
//!   status checks before they settle
//! - **Persistence**: the state round-trips through a JSON file so a CLI can
//!   drive one invocation per process

mod access_control;
mod assignment;
mod backend;
mod error;
pub mod fixtures;
mod operation;
mod permission_set;
mod state;

pub use backend::{Call, MemoryBackend};
pub use error::SandboxError;
pub use operation::Operation;
pub use state::{SandboxSettings, SandboxState};
