use async_trait::async_trait;
use ssoa_api::{
    AccountAssignment, ApiError, AssignmentApi, AssignmentRequest, Page, RequestStatus,
};
use ssoa_id::{AccountId, InstanceArn, PermissionSetArn, RequestId};

use crate::state::{RequestEffect, RequestKind, StoredAssignment};
use crate::{MemoryBackend, Operation};

fn stored(request: &AssignmentRequest) -> StoredAssignment {
    StoredAssignment {
        instance_arn: request.instance_arn.clone(),
        assignment: AccountAssignment {
            account_id: request.target_id.clone(),
            permission_set_arn: request.permission_set_arn.clone(),
            principal_type: request.principal_type,
            principal_id: request.principal_id.clone(),
        },
    }
}

#[async_trait]
impl AssignmentApi for MemoryBackend {
    async fn create_account_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::CreateAccountAssignment, &request.principal_id)?;
        state.permission_set(&request.instance_arn, &request.permission_set_arn)?;
        state.submit(&request.instance_arn, RequestEffect::Assign(stored(request)))
    }

    async fn delete_account_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::DeleteAccountAssignment, &request.principal_id)?;
        let assignment = stored(request);
        if !state.assignments.contains(&assignment) {
            return Err(ApiError::not_found(format!(
                "Assignment for principal {} on account {} not found",
                request.principal_id, request.target_id
            )));
        }
        state.submit(&request.instance_arn, RequestEffect::Unassign(assignment))
    }

    async fn describe_account_assignment_creation_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::DescribeAccountAssignmentCreationStatus, request_id)?;
        state.describe(instance_arn, request_id, RequestKind::AssignmentCreation)
    }

    async fn describe_account_assignment_deletion_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::DescribeAccountAssignmentDeletionStatus, request_id)?;
        state.describe(instance_arn, request_id, RequestKind::AssignmentDeletion)
    }

    async fn list_account_assignments(
        &self,
        instance_arn: &InstanceArn,
        account_id: &AccountId,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<AccountAssignment>, ApiError> {
        let state = self.begin(Operation::ListAccountAssignments, permission_set_arn)?;
        state.permission_set(instance_arn, permission_set_arn)?;
        let items = state
            .assignments
            .iter()
            .filter(|s| {
                s.instance_arn == *instance_arn
                    && s.assignment.account_id == *account_id
                    && s.assignment.permission_set_arn == *permission_set_arn
            })
            .map(|s| s.assignment.clone())
            .collect();
        state.paginate(items, next_token)
    }
}

#[cfg(test)]
mod tests {
    use ssoa_api::StatusValue;

    use super::*;
    use crate::{fixtures, SandboxSettings};

    async fn backend_with_permission_set(pending_polls: u32) -> MemoryBackend {
        let backend = MemoryBackend::with_settings(SandboxSettings {
            page_size: 1,
            pending_polls,
        });
        backend.insert_permission_set(fixtures::permission_set_arn(), fixtures::permission_set_name());
        backend
    }

    #[tokio::test]
    async fn test_assignment_appears_after_success() {
        let backend = backend_with_permission_set(1).await;
        let request = fixtures::assignment_request();

        let submitted = backend.create_account_assignment(&request).await.unwrap();
        assert_eq!(submitted.status, StatusValue::InProgress);

        let instance = fixtures::instance_arn();
        let list = || {
            backend.list_account_assignments(
                &instance,
                &request.target_id,
                &request.permission_set_arn,
                None,
            )
        };
        assert!(list().await.unwrap().items.is_empty());

        let id = &submitted.request_id;
        let first = backend
            .describe_account_assignment_creation_status(&instance, id)
            .await
            .unwrap();
        let second = backend
            .describe_account_assignment_creation_status(&instance, id)
            .await
            .unwrap();
        assert_eq!(
            (first.status, second.status),
            (StatusValue::InProgress, StatusValue::Succeeded)
        );
        assert_eq!(list().await.unwrap().items, vec![fixtures::account_assignment()]);
    }

    #[tokio::test]
    async fn test_delete_missing_assignment_is_not_found() {
        let backend = backend_with_permission_set(0).await;
        let err = backend
            .delete_account_assignment(&fixtures::assignment_request())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_for_unknown_permission_set_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .create_account_assignment(&fixtures::assignment_request())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
