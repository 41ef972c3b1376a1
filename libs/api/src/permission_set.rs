//! Permission sets and their attached sub-resources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssoa_id::{InstanceArn, ManagedPolicyArn, PermissionSetArn, PermissionSetName, RequestId};

use crate::{ApiError, Page, RequestStatus};

/// A resource tag. Tags are unique by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Reference to a policy that lives in each target account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerManagedPolicyReference {
    pub name: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl CustomerManagedPolicyReference {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Upper bound on the permissions a permission set can grant.
///
/// Exactly one of the two fields is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionsBoundary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_policy_arn: Option<ManagedPolicyArn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_managed_policy_reference: Option<CustomerManagedPolicyReference>,
}

impl PermissionsBoundary {
    pub fn managed(arn: ManagedPolicyArn) -> Self {
        Self {
            managed_policy_arn: Some(arn),
            customer_managed_policy_reference: None,
        }
    }

    pub fn customer_managed(reference: CustomerManagedPolicyReference) -> Self {
        Self {
            managed_policy_arn: None,
            customer_managed_policy_reference: Some(reference),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.managed_policy_arn.is_some() != self.customer_managed_policy_reference.is_some()
    }
}

/// Mutable session settings of a permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO-8601 duration, e.g. `PT8H`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
}

/// Result of describing a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetDescription {
    pub permission_set_arn: PermissionSetArn,
    pub name: PermissionSetName,
    #[serde(flatten)]
    pub settings: PermissionSetSettings,
    pub created_date: DateTime<Utc>,
}

/// Which accounts a provisioning request pushes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionTarget {
    AllProvisionedAccounts,
}

#[async_trait]
pub trait PermissionSetApi: Send + Sync {
    /// Creates a permission set with its initial tags. Fails with an
    /// already-exists error when the name is taken.
    async fn create_permission_set(
        &self,
        instance_arn: &InstanceArn,
        name: &PermissionSetName,
        settings: &PermissionSetSettings,
        tags: &[Tag],
    ) -> Result<PermissionSetDescription, ApiError>;

    async fn update_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        settings: &PermissionSetSettings,
    ) -> Result<(), ApiError>;

    async fn describe_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<PermissionSetDescription, ApiError>;

    async fn delete_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError>;

    async fn list_permission_sets(
        &self,
        instance_arn: &InstanceArn,
        next_token: Option<String>,
    ) -> Result<Page<PermissionSetArn>, ApiError>;

    // Tags

    async fn list_tags_for_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<Tag>, ApiError>;

    /// Adds tags, overwriting values of existing keys.
    async fn tag_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        tags: &[Tag],
    ) -> Result<(), ApiError>;

    async fn untag_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        keys: &[String],
    ) -> Result<(), ApiError>;

    // Managed policies

    async fn list_managed_policies_in_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<ManagedPolicyArn>, ApiError>;

    async fn attach_managed_policy_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        policy_arn: &ManagedPolicyArn,
    ) -> Result<(), ApiError>;

    async fn detach_managed_policy_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        policy_arn: &ManagedPolicyArn,
    ) -> Result<(), ApiError>;

    // Customer managed policy references

    async fn list_customer_managed_policy_references_in_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<CustomerManagedPolicyReference>, ApiError>;

    async fn attach_customer_managed_policy_reference_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        reference: &CustomerManagedPolicyReference,
    ) -> Result<(), ApiError>;

    async fn detach_customer_managed_policy_reference_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        reference: &CustomerManagedPolicyReference,
    ) -> Result<(), ApiError>;

    // Permissions boundary

    /// Returns `None` when no boundary is attached.
    async fn get_permissions_boundary_for_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<Option<PermissionsBoundary>, ApiError>;

    async fn put_permissions_boundary_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        boundary: &PermissionsBoundary,
    ) -> Result<(), ApiError>;

    async fn delete_permissions_boundary_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError>;

    // Inline policy

    /// Returns `None` when no inline policy is set.
    async fn get_inline_policy_for_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<Option<String>, ApiError>;

    async fn put_inline_policy_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        inline_policy: &str,
    ) -> Result<(), ApiError>;

    async fn delete_inline_policy_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError>;

    // Provisioning

    /// Submits an asynchronous push of the permission set to accounts.
    async fn provision_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        target: ProvisionTarget,
    ) -> Result<RequestStatus, ApiError>;

    async fn describe_permission_set_provisioning_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn policy(arn: &str) -> ManagedPolicyArn {
        ManagedPolicyArn::parse(arn).unwrap()
    }

    #[rstest]
    #[case(PermissionsBoundary::managed(policy("arn:aws:iam::aws:policy/ReadOnlyAccess")), true)]
    #[case(PermissionsBoundary::customer_managed(CustomerManagedPolicyReference::new("Boundary", "/")), true)]
    #[case(PermissionsBoundary { managed_policy_arn: None, customer_managed_policy_reference: None }, false)]
    fn test_boundary_validity(#[case] boundary: PermissionsBoundary, #[case] valid: bool) {
        assert_eq!(boundary.is_valid(), valid);
    }

    #[test]
    fn test_reference_path_defaults_to_root() {
        let reference: CustomerManagedPolicyReference =
            serde_json::from_str(r#"{"Name":"Deploy"}"#).unwrap();
        assert_eq!(reference, CustomerManagedPolicyReference::new("Deploy", "/"));
    }
}
