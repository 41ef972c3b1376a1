//! Handler request envelope - the common wrapper for every invocation.

use serde::{Deserialize, Serialize};

use crate::EventError;

/// The operation a workflow performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Action {
    /// Returns the wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::List => "LIST",
        }
    }

    /// Returns true for actions that may span several invocations.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Action::Create),
            "READ" => Ok(Action::Read),
            "UPDATE" => Ok(Action::Update),
            "DELETE" => Ok(Action::Delete),
            "LIST" => Ok(Action::List),
            _ => Err(EventError::UnknownAction(s.to_string())),
        }
    }
}

/// One invocation of a workflow.
///
/// `M` is the resource model type and `C` the callback context type. The
/// driver sends the same desired model on every re-invocation of a workflow,
/// together with the context returned by the previous event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerRequest<M, C> {
    /// Operation to perform.
    pub action: Action,

    /// Resource type name, e.g. `AWS::SSO::PermissionSet`.
    pub type_name: String,

    /// Desired configuration of the resource.
    pub desired_resource_state: M,

    /// Configuration before an update, if known.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub previous_resource_state: Option<M>,

    /// Context from the previous `IN_PROGRESS` event.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub callback_context: Option<C>,

    /// Pagination token for list actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl<M, C> HandlerRequest<M, C> {
    /// Creates a first invocation of a workflow.
    pub fn new(action: Action, type_name: impl Into<String>, desired: M) -> Self {
        Self {
            action,
            type_name: type_name.into(),
            desired_resource_state: desired,
            previous_resource_state: None,
            callback_context: None,
            next_token: None,
        }
    }

    /// Sets the callback context for a re-invocation.
    pub fn with_context(mut self, context: Option<C>) -> Self {
        self.callback_context = context;
        self
    }

    /// Sets the model prior to an update.
    pub fn with_previous(mut self, previous: M) -> Self {
        self.previous_resource_state = Some(previous);
        self
    }

    /// Sets the list pagination token.
    pub fn with_next_token(mut self, token: Option<String>) -> Self {
        self.next_token = token;
        self
    }
}
