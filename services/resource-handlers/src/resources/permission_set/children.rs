//! Set-valued sub-resources of a permission set.

use std::collections::BTreeSet;

use async_trait::async_trait;
use ssoa_api::{CustomerManagedPolicyReference, PermissionSetApi, Tag};
use ssoa_id::{InstanceArn, ManagedPolicyArn, PermissionSetArn};
use ssoa_reconcile::{collect_all, ApiError, ChildSet};

/// Addresses one permission set's sub-resources.
#[derive(Clone, Copy)]
pub(super) struct Target<'a> {
    pub api: &'a dyn PermissionSetApi,
    pub instance_arn: &'a InstanceArn,
    pub permission_set_arn: &'a PermissionSetArn,
}

/// Tags keyed by `(key, value)`. A changed value is a removal plus an add.
pub(super) struct Tags<'a>(pub Target<'a>);

#[async_trait]
impl ChildSet<Tag> for Tags<'_> {
    async fn members(&self) -> Result<BTreeSet<Tag>, ApiError> {
        let t = self.0;
        let tags = collect_all(|token| {
            t.api
                .list_tags_for_resource(t.instance_arn, t.permission_set_arn, token)
        })
        .await?;
        Ok(tags.into_iter().collect())
    }

    async fn add(&self, item: &Tag) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .tag_resource(t.instance_arn, t.permission_set_arn, std::slice::from_ref(item))
            .await
    }

    async fn remove(&self, item: &Tag) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .untag_resource(t.instance_arn, t.permission_set_arn, &[item.key.clone()])
            .await
    }
}

pub(super) struct ManagedPolicies<'a>(pub Target<'a>);

#[async_trait]
impl ChildSet<ManagedPolicyArn> for ManagedPolicies<'_> {
    async fn members(&self) -> Result<BTreeSet<ManagedPolicyArn>, ApiError> {
        let t = self.0;
        let policies = collect_all(|token| {
            t.api
                .list_managed_policies_in_permission_set(t.instance_arn, t.permission_set_arn, token)
        })
        .await?;
        Ok(policies.into_iter().collect())
    }

    async fn add(&self, item: &ManagedPolicyArn) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .attach_managed_policy_to_permission_set(t.instance_arn, t.permission_set_arn, item)
            .await
    }

    async fn remove(&self, item: &ManagedPolicyArn) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .detach_managed_policy_from_permission_set(t.instance_arn, t.permission_set_arn, item)
            .await
    }
}

pub(super) struct CustomerManagedPolicies<'a>(pub Target<'a>);

#[async_trait]
impl ChildSet<CustomerManagedPolicyReference> for CustomerManagedPolicies<'_> {
    async fn members(&self) -> Result<BTreeSet<CustomerManagedPolicyReference>, ApiError> {
        let t = self.0;
        let references = collect_all(|token| {
            t.api.list_customer_managed_policy_references_in_permission_set(
                t.instance_arn,
                t.permission_set_arn,
                token,
            )
        })
        .await?;
        Ok(references.into_iter().collect())
    }

    async fn add(&self, item: &CustomerManagedPolicyReference) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .attach_customer_managed_policy_reference_to_permission_set(
                t.instance_arn,
                t.permission_set_arn,
                item,
            )
            .await
    }

    async fn remove(&self, item: &CustomerManagedPolicyReference) -> Result<(), ApiError> {
        let t = self.0;
        t.api
            .detach_customer_managed_policy_reference_from_permission_set(
                t.instance_arn,
                t.permission_set_arn,
                item,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use ssoa_reconcile::reconcile_set;
    use ssoa_testing::{fixtures, MemoryBackend, Operation};

    use super::*;

    #[tokio::test]
    async fn test_changed_tag_value_is_replaced() {
        let backend = MemoryBackend::new();
        backend.insert_permission_set(fixtures::permission_set_arn(), fixtures::permission_set_name());
        let instance_arn = fixtures::instance_arn();
        let arn = fixtures::permission_set_arn();
        let target = Target {
            api: &backend,
            instance_arn: &instance_arn,
            permission_set_arn: &arn,
        };
        backend
            .tag_resource(&instance_arn, &arn, &[Tag::new("env", "dev")])
            .await
            .unwrap();

        let desired = BTreeSet::from([Tag::new("env", "prod")]);
        let plan = reconcile_set(&Tags(target), &desired).await.unwrap();
        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(Tags(target).members().await.unwrap(), desired);
        assert_eq!(backend.calls_to(Operation::UntagResource), 1);
    }

    #[tokio::test]
    async fn test_policies_converge() {
        let backend = MemoryBackend::new();
        backend.insert_permission_set(fixtures::permission_set_arn(), fixtures::permission_set_name());
        let instance_arn = fixtures::instance_arn();
        let arn = fixtures::permission_set_arn();
        let target = Target {
            api: &backend,
            instance_arn: &instance_arn,
            permission_set_arn: &arn,
        };

        let managed = BTreeSet::from([fixtures::managed_policy(fixtures::BILLING_POLICY)]);
        reconcile_set(&ManagedPolicies(target), &managed).await.unwrap();
        assert_eq!(ManagedPolicies(target).members().await.unwrap(), managed);

        let references = BTreeSet::from([CustomerManagedPolicyReference::new("Audit", "/team/")]);
        reconcile_set(&CustomerManagedPolicies(target), &references)
            .await
            .unwrap();
        assert_eq!(
            CustomerManagedPolicies(target).members().await.unwrap(),
            references
        );

        reconcile_set(&ManagedPolicies(target), &BTreeSet::new())
            .await
            .unwrap();
        assert!(ManagedPolicies(target).members().await.unwrap().is_empty());
    }
}
