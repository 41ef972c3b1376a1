//! Account assignments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssoa_id::{AccountId, InstanceArn, PermissionSetArn, PrincipalId, RequestId};

use crate::{ApiError, Page, RequestStatus};

/// Kind of target an assignment grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetType {
    #[serde(rename = "AWS_ACCOUNT")]
    AwsAccount,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::AwsAccount => "AWS_ACCOUNT",
        }
    }
}

/// Kind of principal receiving the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    User,
    Group,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "USER",
            PrincipalType::Group => "GROUP",
        }
    }
}

/// Full key of an assignment, used for create and delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentRequest {
    pub instance_arn: InstanceArn,
    pub target_id: AccountId,
    pub target_type: TargetType,
    pub permission_set_arn: PermissionSetArn,
    pub principal_type: PrincipalType,
    pub principal_id: PrincipalId,
}

impl AssignmentRequest {
    /// Returns true if a listed assignment has the same key.
    pub fn matches(&self, listed: &AccountAssignment) -> bool {
        self.target_id == listed.account_id
            && self.permission_set_arn == listed.permission_set_arn
            && self.principal_type == listed.principal_type
            && self.principal_id == listed.principal_id
    }
}

/// One entry of an assignment listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountAssignment {
    pub account_id: AccountId,
    pub permission_set_arn: PermissionSetArn,
    pub principal_type: PrincipalType,
    pub principal_id: PrincipalId,
}

#[async_trait]
pub trait AssignmentApi: Send + Sync {
    /// Submits an asynchronous assignment creation.
    async fn create_account_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<RequestStatus, ApiError>;

    /// Submits an asynchronous assignment deletion.
    async fn delete_account_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<RequestStatus, ApiError>;

    async fn describe_account_assignment_creation_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError>;

    async fn describe_account_assignment_deletion_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError>;

    /// Lists assignments of one permission set on one account.
    async fn list_account_assignments(
        &self,
        instance_arn: &InstanceArn,
        account_id: &AccountId,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<AccountAssignment>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TargetType::AwsAccount).unwrap(),
            "\"AWS_ACCOUNT\""
        );
        assert_eq!(
            serde_json::from_str::<PrincipalType>("\"GROUP\"").unwrap(),
            PrincipalType::Group
        );
        assert_eq!(PrincipalType::User.as_str(), "USER");
    }
}
