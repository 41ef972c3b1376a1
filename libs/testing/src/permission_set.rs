use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use ssoa_api::{
    ApiError, CustomerManagedPolicyReference, Page, PermissionSetApi, PermissionSetDescription,
    PermissionSetSettings, PermissionsBoundary, ProvisionTarget, RequestStatus, Tag,
};
use ssoa_id::{InstanceArn, ManagedPolicyArn, PermissionSetArn, PermissionSetName, RequestId};
use tracing::info;

use crate::state::{RequestEffect, RequestKind, StoredPermissionSet};
use crate::{MemoryBackend, Operation};

fn new_permission_set_arn(instance_arn: &InstanceArn) -> Result<PermissionSetArn, ApiError> {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let arn = format!(
        "arn:aws:sso:::permissionSet/{}/ps-{}",
        instance_arn.instance_id(),
        &suffix[..16]
    );
    PermissionSetArn::parse(&arn).map_err(|e| ApiError::internal(e.to_string()))
}

fn stored(
    instance_arn: InstanceArn,
    arn: PermissionSetArn,
    name: PermissionSetName,
    settings: PermissionSetSettings,
) -> StoredPermissionSet {
    StoredPermissionSet {
        instance_arn,
        description: PermissionSetDescription {
            permission_set_arn: arn,
            name,
            settings,
            created_date: Utc::now(),
        },
        tags: BTreeMap::new(),
        managed_policies: BTreeSet::new(),
        customer_managed_policies: BTreeSet::new(),
        permissions_boundary: None,
        inline_policy: None,
        provisioned: false,
    }
}

impl MemoryBackend {
    /// Inserts an empty permission set with a known ARN, bypassing the
    /// recorded API.
    pub fn insert_permission_set(&self, arn: PermissionSetArn, name: PermissionSetName) {
        self.with_state(|state| {
            let instance = format!("arn:aws:sso:::instance/{}", arn.instance_id());
            let Ok(instance_arn) = InstanceArn::parse(&instance) else {
                return;
            };
            let key = arn.as_str().to_string();
            let ps = stored(instance_arn, arn, name, PermissionSetSettings::default());
            state.permission_sets.insert(key, ps);
        });
    }
}

#[async_trait]
impl PermissionSetApi for MemoryBackend {
    async fn create_permission_set(
        &self,
        instance_arn: &InstanceArn,
        name: &PermissionSetName,
        settings: &PermissionSetSettings,
        tags: &[Tag],
    ) -> Result<PermissionSetDescription, ApiError> {
        let mut state = self.begin(Operation::CreatePermissionSet, name)?;
        let taken = state
            .permission_sets
            .values()
            .any(|ps| ps.instance_arn == *instance_arn && ps.description.name == *name);
        if taken {
            return Err(ApiError::already_exists(format!(
                "PermissionSet with name {name} already exists"
            )));
        }

        let arn = new_permission_set_arn(instance_arn)?;
        let mut ps = stored(instance_arn.clone(), arn.clone(), name.clone(), settings.clone());
        ps.tags = tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect();
        let description = ps.description.clone();
        state.permission_sets.insert(arn.as_str().to_string(), ps);
        info!(permission_set_arn = %arn, "Permission set created");
        Ok(description)
    }

    async fn update_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        settings: &PermissionSetSettings,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::UpdatePermissionSet, permission_set_arn)?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.description.settings = settings.clone();
        ps.provisioned = false;
        Ok(())
    }

    async fn describe_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<PermissionSetDescription, ApiError> {
        let state = self.begin(Operation::DescribePermissionSet, permission_set_arn)?;
        Ok(state
            .permission_set(instance_arn, permission_set_arn)?
            .description
            .clone())
    }

    async fn delete_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::DeletePermissionSet, permission_set_arn)?;
        state.permission_set(instance_arn, permission_set_arn)?;
        state.permission_sets.remove(permission_set_arn.as_str());
        Ok(())
    }

    async fn list_permission_sets(
        &self,
        instance_arn: &InstanceArn,
        next_token: Option<String>,
    ) -> Result<Page<PermissionSetArn>, ApiError> {
        let state = self.begin(Operation::ListPermissionSets, instance_arn)?;
        let items = state
            .permission_sets
            .values()
            .filter(|ps| ps.instance_arn == *instance_arn)
            .map(|ps| ps.description.permission_set_arn.clone())
            .collect();
        state.paginate(items, next_token)
    }

    async fn list_tags_for_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<Tag>, ApiError> {
        let state = self.begin(Operation::ListTagsForResource, permission_set_arn)?;
        let items = state
            .permission_set(instance_arn, permission_set_arn)?
            .tags
            .iter()
            .map(|(k, v)| Tag::new(k, v))
            .collect();
        state.paginate(items, next_token)
    }

    async fn tag_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        tags: &[Tag],
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::TagResource, permission_set_arn)?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        for tag in tags {
            ps.tags.insert(tag.key.clone(), tag.value.clone());
        }
        Ok(())
    }

    async fn untag_resource(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        keys: &[String],
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::UntagResource, permission_set_arn)?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        for key in keys {
            ps.tags.remove(key);
        }
        Ok(())
    }

    async fn list_managed_policies_in_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<ManagedPolicyArn>, ApiError> {
        let state = self.begin(Operation::ListManagedPoliciesInPermissionSet, permission_set_arn)?;
        let items = state
            .permission_set(instance_arn, permission_set_arn)?
            .managed_policies
            .iter()
            .cloned()
            .collect();
        state.paginate(items, next_token)
    }

    async fn attach_managed_policy_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        policy_arn: &ManagedPolicyArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::AttachManagedPolicyToPermissionSet, policy_arn)?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.managed_policies.insert(policy_arn.clone());
        ps.provisioned = false;
        Ok(())
    }

    async fn detach_managed_policy_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        policy_arn: &ManagedPolicyArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::DetachManagedPolicyFromPermissionSet, policy_arn)?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        if !ps.managed_policies.remove(policy_arn) {
            return Err(ApiError::not_found(format!(
                "Managed policy {policy_arn} is not attached"
            )));
        }
        ps.provisioned = false;
        Ok(())
    }

    async fn list_customer_managed_policy_references_in_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        next_token: Option<String>,
    ) -> Result<Page<CustomerManagedPolicyReference>, ApiError> {
        let state = self.begin(
            Operation::ListCustomerManagedPolicyReferencesInPermissionSet,
            permission_set_arn,
        )?;
        let items = state
            .permission_set(instance_arn, permission_set_arn)?
            .customer_managed_policies
            .iter()
            .cloned()
            .collect();
        state.paginate(items, next_token)
    }

    async fn attach_customer_managed_policy_reference_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        reference: &CustomerManagedPolicyReference,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::AttachCustomerManagedPolicyReferenceToPermissionSet,
            &reference.name,
        )?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.customer_managed_policies.insert(reference.clone());
        ps.provisioned = false;
        Ok(())
    }

    async fn detach_customer_managed_policy_reference_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        reference: &CustomerManagedPolicyReference,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::DetachCustomerManagedPolicyReferenceFromPermissionSet,
            &reference.name,
        )?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        if !ps.customer_managed_policies.remove(reference) {
            return Err(ApiError::not_found(format!(
                "Customer managed policy reference {}{} is not attached",
                reference.path, reference.name
            )));
        }
        ps.provisioned = false;
        Ok(())
    }

    async fn get_permissions_boundary_for_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<Option<PermissionsBoundary>, ApiError> {
        let state = self.begin(
            Operation::GetPermissionsBoundaryForPermissionSet,
            permission_set_arn,
        )?;
        Ok(state
            .permission_set(instance_arn, permission_set_arn)?
            .permissions_boundary
            .clone())
    }

    async fn put_permissions_boundary_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        boundary: &PermissionsBoundary,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::PutPermissionsBoundaryToPermissionSet,
            permission_set_arn,
        )?;
        if !boundary.is_valid() {
            return Err(ApiError::validation(
                "Exactly one of ManagedPolicyArn or CustomerManagedPolicyReference must be set",
            ));
        }
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.permissions_boundary = Some(boundary.clone());
        ps.provisioned = false;
        Ok(())
    }

    async fn delete_permissions_boundary_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::DeletePermissionsBoundaryFromPermissionSet,
            permission_set_arn,
        )?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        if ps.permissions_boundary.take().is_none() {
            return Err(ApiError::not_found("No permissions boundary attached"));
        }
        ps.provisioned = false;
        Ok(())
    }

    async fn get_inline_policy_for_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<Option<String>, ApiError> {
        let state = self.begin(Operation::GetInlinePolicyForPermissionSet, permission_set_arn)?;
        Ok(state
            .permission_set(instance_arn, permission_set_arn)?
            .inline_policy
            .clone())
    }

    async fn put_inline_policy_to_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        inline_policy: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::PutInlinePolicyToPermissionSet, permission_set_arn)?;
        if serde_json::from_str::<serde_json::Value>(inline_policy).is_err() {
            return Err(ApiError::validation("The inline policy is not valid JSON"));
        }
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.inline_policy = Some(inline_policy.to_string());
        ps.provisioned = false;
        Ok(())
    }

    async fn delete_inline_policy_from_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::DeleteInlinePolicyFromPermissionSet,
            permission_set_arn,
        )?;
        let ps = state.permission_set_mut(instance_arn, permission_set_arn)?;
        ps.inline_policy = None;
        ps.provisioned = false;
        Ok(())
    }

    async fn provision_permission_set(
        &self,
        instance_arn: &InstanceArn,
        permission_set_arn: &PermissionSetArn,
        _target: ProvisionTarget,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::ProvisionPermissionSet, permission_set_arn)?;
        state.permission_set(instance_arn, permission_set_arn)?;
        state.submit(
            instance_arn,
            RequestEffect::Provision(permission_set_arn.clone()),
        )
    }

    async fn describe_permission_set_provisioning_status(
        &self,
        instance_arn: &InstanceArn,
        request_id: &RequestId,
    ) -> Result<RequestStatus, ApiError> {
        let mut state = self.begin(Operation::DescribePermissionSetProvisioningStatus, request_id)?;
        state.describe(instance_arn, request_id, RequestKind::Provisioning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures, SandboxSettings};

    #[tokio::test]
    async fn test_duplicate_name_already_exists() {
        let backend = MemoryBackend::new();
        let instance = fixtures::instance_arn();
        let name = fixtures::permission_set_name();
        let settings = PermissionSetSettings::default();

        let created = backend
            .create_permission_set(&instance, &name, &settings, &[Tag::new("team", "infra")])
            .await
            .unwrap();
        assert!(created.permission_set_arn.belongs_to(&instance));
        assert_eq!(
            backend.snapshot().tags_of(&created.permission_set_arn).get("team"),
            Some(&"infra".to_string())
        );

        let err = backend
            .create_permission_set(&instance, &name, &settings, &[])
            .await
            .unwrap_err();
        assert_eq!(err.code, ssoa_api::ApiErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_tags_paginate() {
        let backend = MemoryBackend::with_settings(SandboxSettings {
            page_size: 2,
            pending_polls: 0,
        });
        let instance = fixtures::instance_arn();
        let arn = fixtures::permission_set_arn();
        backend.insert_permission_set(arn.clone(), fixtures::permission_set_name());
        let tags: Vec<Tag> = (0..5).map(|i| Tag::new(format!("k{i}"), "v")).collect();
        backend.tag_resource(&instance, &arn, &tags).await.unwrap();

        let all = all_tags(&backend, &instance, &arn).await;
        assert_eq!(all, tags);
        assert_eq!(backend.calls_to(Operation::ListTagsForResource), 3);
    }

    async fn all_tags(
        backend: &MemoryBackend,
        instance: &InstanceArn,
        arn: &PermissionSetArn,
    ) -> Vec<Tag> {
        let mut token = None;
        let mut tags = Vec::new();
        loop {
            let page = backend
                .list_tags_for_resource(instance, arn, token)
                .await
                .unwrap();
            tags.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => return tags,
            }
        }
    }

    #[tokio::test]
    async fn test_provisioning_marks_permission_set_provisioned() {
        let backend = MemoryBackend::with_settings(SandboxSettings {
            pending_polls: 0,
            ..SandboxSettings::default()
        });
        let instance = fixtures::instance_arn();
        let arn = fixtures::permission_set_arn();
        backend.insert_permission_set(arn.clone(), fixtures::permission_set_name());
        backend
            .put_inline_policy_to_permission_set(&instance, &arn, r#"{"Version":"2012-10-17"}"#)
            .await
            .unwrap();
        assert!(!backend.snapshot().is_provisioned(&arn));

        let request = backend
            .provision_permission_set(&instance, &arn, ProvisionTarget::AllProvisionedAccounts)
            .await
            .unwrap();
        let status = backend
            .describe_permission_set_provisioning_status(&instance, &request.request_id)
            .await
            .unwrap();
        assert_eq!(status.status, ssoa_api::StatusValue::Succeeded);
        assert!(backend.snapshot().is_provisioned(&arn));
    }

    #[tokio::test]
    async fn test_invalid_inline_policy_is_rejected() {
        let backend = MemoryBackend::new();
        let arn = fixtures::permission_set_arn();
        backend.insert_permission_set(arn.clone(), fixtures::permission_set_name());
        let err = backend
            .put_inline_policy_to_permission_set(&fixtures::instance_arn(), &arn, "{not json")
            .await
            .unwrap_err();
        assert_eq!(err.code, ssoa_api::ApiErrorCode::Validation);
    }
}
