//! Identity-center resource handlers.
//!
//! Each resource type exposes create, read, update, delete and list entry
//! points. Mutating actions run as resumable workflows: one invocation does
//! as much as it can without waiting and returns `IN_PROGRESS` with a
//! callback context whenever it would have to wait. The [`Dispatcher`] routes
//! wire requests to the handler for their resource type.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod resources;
pub mod telemetry;

pub use config::HandlerConfig;
pub use dispatch::Dispatcher;
pub use error::HandlerError;
pub use resources::access_control::{AccessControlAttributesModel, AccessControlHandler};
pub use resources::assignment::{AssignmentHandler, AssignmentModel};
pub use resources::permission_set::{PermissionSetHandler, PermissionSetModel};
pub use resources::{invoke, Event, ResourceHandler};
pub use telemetry::{init_tracing, LogFormat};
