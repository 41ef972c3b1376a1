//! # ssoa-events
//!
//! The invocation contract between an external driver and the workflow
//! handlers.
//!
//! ## Design Principles
//!
//! - One invocation yields exactly one [`ProgressEvent`]
//! - `IN_PROGRESS` events carry the callback context the driver must pass back verbatim
//! - `FAILED` events carry the backend's original message text
//! - The contract is generic over the resource model and context types; the
//!   wire form is camelCase JSON
//!
//! ## Request Envelope
//!
//! A [`HandlerRequest`] names the action, the resource type, the desired model
//! and (on re-invocation) the callback context from the previous event.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
