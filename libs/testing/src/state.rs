//! Serializable sandbox state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ssoa_api::{
    AccessControlAttribute, AccountAssignment, ApiError, ConfigurationStatus,
    CustomerManagedPolicyReference, Page, PermissionSetDescription, PermissionsBoundary,
    RequestStatus, StatusValue,
};
use ssoa_id::{InstanceArn, ManagedPolicyArn, PermissionSetArn, RequestId};
use tracing::debug;

/// Behaviour knobs of the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxSettings {
    /// Items per listing page.
    pub page_size: usize,

    /// Status checks an asynchronous request reports in progress before it
    /// settles. Zero settles on submission.
    pub pending_polls: u32,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            pending_polls: 1,
        }
    }
}

/// Everything the sandbox knows, in a form that round-trips through JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxState {
    pub(crate) settings: SandboxSettings,
    pub(crate) assignments: BTreeSet<StoredAssignment>,
    pub(crate) requests: BTreeMap<String, StoredRequest>,
    pub(crate) access_control: BTreeMap<String, StoredConfiguration>,
    pub(crate) permission_sets: BTreeMap<String, StoredPermissionSet>,
    pub(crate) pending_failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredAssignment {
    pub instance_arn: InstanceArn,
    pub assignment: AccountAssignment,
}

/// What a request does to the state when it succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum RequestEffect {
    Assign(StoredAssignment),
    Unassign(StoredAssignment),
    Provision(PermissionSetArn),
}

impl RequestEffect {
    fn kind(&self) -> RequestKind {
        match self {
            RequestEffect::Assign(_) => RequestKind::AssignmentCreation,
            RequestEffect::Unassign(_) => RequestKind::AssignmentDeletion,
            RequestEffect::Provision(_) => RequestKind::Provisioning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    AssignmentCreation,
    AssignmentDeletion,
    Provisioning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredRequest {
    pub instance_arn: InstanceArn,
    pub status: StatusValue,
    pub polls_remaining: u32,
    /// Reason the request fails with once it settles.
    pub failure: Option<String>,
    pub effect: RequestEffect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredConfiguration {
    pub attributes: Vec<AccessControlAttribute>,
    pub status: ConfigurationStatus,
    pub status_reason: Option<String>,
    pub polls_remaining: u32,
    pub failure: Option<String>,
}

impl StoredConfiguration {
    /// Advances an in-progress configuration by one status check.
    pub fn observe(&mut self) {
        if self.status != ConfigurationStatus::CreationInProgress {
            return;
        }
        if self.polls_remaining > 0 {
            self.polls_remaining -= 1;
            return;
        }
        match self.failure.take() {
            Some(reason) => {
                self.status = ConfigurationStatus::CreationFailed;
                self.status_reason = Some(reason);
            }
            None => self.status = ConfigurationStatus::Enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredPermissionSet {
    pub instance_arn: InstanceArn,
    pub description: PermissionSetDescription,
    pub tags: BTreeMap<String, String>,
    pub managed_policies: BTreeSet<ManagedPolicyArn>,
    pub customer_managed_policies: BTreeSet<CustomerManagedPolicyReference>,
    pub permissions_boundary: Option<PermissionsBoundary>,
    pub inline_policy: Option<String>,
    /// False after any change until a provisioning request succeeds.
    pub provisioned: bool,
}

impl SandboxState {
    pub fn new(settings: SandboxSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SandboxSettings {
        &mut self.settings
    }

    /// Makes the next submitted asynchronous request fail with `reason`.
    pub fn fail_next_request(&mut self, reason: impl Into<String>) {
        self.pending_failure = Some(reason.into());
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn permission_set_count(&self) -> usize {
        self.permission_sets.len()
    }

    /// Returns true if the permission set's last change has been provisioned.
    pub fn is_provisioned(&self, permission_set_arn: &PermissionSetArn) -> bool {
        self.permission_sets
            .get(permission_set_arn.as_str())
            .is_some_and(|ps| ps.provisioned)
    }

    /// Tags currently on a permission set.
    pub fn tags_of(&self, permission_set_arn: &PermissionSetArn) -> BTreeMap<String, String> {
        self.permission_sets
            .get(permission_set_arn.as_str())
            .map(|ps| ps.tags.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Asynchronous requests
    // =========================================================================

    pub(crate) fn submit(
        &mut self,
        instance_arn: &InstanceArn,
        effect: RequestEffect,
    ) -> Result<RequestStatus, ApiError> {
        let request_id = new_request_id()?;
        let mut request = StoredRequest {
            instance_arn: instance_arn.clone(),
            status: StatusValue::InProgress,
            polls_remaining: self.settings.pending_polls,
            failure: self.pending_failure.take(),
            effect,
        };
        if request.polls_remaining == 0 {
            self.settle(&mut request);
        }
        debug!(request_id = %request_id, status = ?request.status, "Request submitted");

        let status = RequestStatus {
            request_id: request_id.clone(),
            status: StatusValue::InProgress,
            failure_reason: None,
        };
        self.requests.insert(request_id.into_inner(), request);
        Ok(status)
    }

    pub(crate) fn describe(
        &mut self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
        kind: RequestKind,
    ) -> Result<RequestStatus, ApiError> {
        let not_found = || ApiError::not_found(format!("Request {request_id} not found"));
        let mut request = match self.requests.get(request_id.as_str()) {
            Some(r) if r.effect.kind() == kind && r.instance_arn == *instance_arn => r.clone(),
            _ => return Err(not_found()),
        };

        if request.status == StatusValue::InProgress {
            if request.polls_remaining > 0 {
                request.polls_remaining -= 1;
            } else {
                self.settle(&mut request);
            }
        }

        let status = RequestStatus {
            request_id: request_id.clone(),
            status: request.status,
            failure_reason: request.failure.clone().filter(|_| request.status == StatusValue::Failed),
        };
        self.requests.insert(request_id.as_str().to_string(), request);
        Ok(status)
    }

    fn settle(&mut self, request: &mut StoredRequest) {
        if request.failure.is_some() {
            request.status = StatusValue::Failed;
            return;
        }
        request.status = StatusValue::Succeeded;
        match &request.effect {
            RequestEffect::Assign(assignment) => {
                self.assignments.insert(assignment.clone());
            }
            RequestEffect::Unassign(assignment) => {
                self.assignments.remove(assignment);
            }
            RequestEffect::Provision(arn) => {
                if let Some(ps) = self.permission_sets.get_mut(arn.as_str()) {
                    ps.provisioned = true;
                }
            }
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub(crate) fn permission_set(
        &self,
        instance_arn: &InstanceArn,
        arn: &PermissionSetArn,
    ) -> Result<&StoredPermissionSet, ApiError> {
        match self.permission_sets.get(arn.as_str()) {
            Some(ps) if ps.instance_arn == *instance_arn => Ok(ps),
            _ => Err(permission_set_not_found(arn)),
        }
    }

    pub(crate) fn permission_set_mut(
        &mut self,
        instance_arn: &InstanceArn,
        arn: &PermissionSetArn,
    ) -> Result<&mut StoredPermissionSet, ApiError> {
        match self.permission_sets.get_mut(arn.as_str()) {
            Some(ps) if ps.instance_arn == *instance_arn => Ok(ps),
            _ => Err(permission_set_not_found(arn)),
        }
    }

    /// Returns one page of `items`. Tokens are stringified offsets.
    pub(crate) fn paginate<T>(
        &self,
        items: Vec<T>,
        next_token: Option<String>,
    ) -> Result<Page<T>, ApiError> {
        let offset = match next_token.as_deref() {
            None | Some("") => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::validation(format!("Invalid NextToken: {token}")))?,
        };
        let size = self.settings.page_size.max(1);
        let total = items.len();
        let page: Vec<T> = items.into_iter().skip(offset).take(size).collect();
        let end = offset + page.len();
        Ok(if end < total {
            Page::with_next(page, end.to_string())
        } else {
            Page::last(page)
        })
    }
}

fn permission_set_not_found(arn: &PermissionSetArn) -> ApiError {
    ApiError::not_found(format!("Could not find PermissionSet with ARN {arn}"))
}

pub(crate) fn new_request_id() -> Result<RequestId, ApiError> {
    RequestId::parse(&uuid::Uuid::new_v4().to_string())
        .map_err(|e| ApiError::internal(e.to_string()))
}
