use async_trait::async_trait;
use ssoa_api::{
    AccessControlApi, AccessControlAttribute, AccessControlConfiguration, ApiError,
    ConfigurationStatus,
};
use ssoa_id::InstanceArn;

use crate::state::StoredConfiguration;
use crate::{MemoryBackend, Operation};

fn not_found(instance_arn: &InstanceArn) -> ApiError {
    ApiError::not_found(format!(
        "No access control attribute configuration for instance {instance_arn}"
    ))
}

#[async_trait]
impl AccessControlApi for MemoryBackend {
    async fn create_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
        attributes: &[AccessControlAttribute],
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::CreateInstanceAccessControlAttributeConfiguration,
            instance_arn,
        )?;
        if state.access_control.contains_key(instance_arn.as_str()) {
            return Err(ApiError::already_exists(format!(
                "Access control attribute configuration already exists for instance {instance_arn}"
            )));
        }
        let mut config = StoredConfiguration {
            attributes: attributes.to_vec(),
            status: ConfigurationStatus::CreationInProgress,
            status_reason: None,
            polls_remaining: state.settings.pending_polls,
            failure: state.pending_failure.take(),
        };
        if config.polls_remaining == 0 {
            config.observe();
        }
        state
            .access_control
            .insert(instance_arn.as_str().to_string(), config);
        Ok(())
    }

    async fn update_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
        attributes: &[AccessControlAttribute],
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::UpdateInstanceAccessControlAttributeConfiguration,
            instance_arn,
        )?;
        let pending_polls = state.settings.pending_polls;
        let failure = state.pending_failure.take();
        let config = state
            .access_control
            .get_mut(instance_arn.as_str())
            .ok_or_else(|| not_found(instance_arn))?;
        config.attributes = attributes.to_vec();
        config.status = ConfigurationStatus::CreationInProgress;
        config.status_reason = None;
        config.polls_remaining = pending_polls;
        config.failure = failure;
        if pending_polls == 0 {
            config.observe();
        }
        Ok(())
    }

    async fn delete_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
    ) -> Result<(), ApiError> {
        let mut state = self.begin(
            Operation::DeleteInstanceAccessControlAttributeConfiguration,
            instance_arn,
        )?;
        state
            .access_control
            .remove(instance_arn.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(instance_arn))
    }

    async fn describe_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
    ) -> Result<AccessControlConfiguration, ApiError> {
        let mut state = self.begin(
            Operation::DescribeInstanceAccessControlAttributeConfiguration,
            instance_arn,
        )?;
        let config = state
            .access_control
            .get_mut(instance_arn.as_str())
            .ok_or_else(|| not_found(instance_arn))?;
        config.observe();
        Ok(AccessControlConfiguration {
            attributes: config.attributes.clone(),
            status: config.status,
            status_reason: config.status_reason.clone(),
        })
    }
}
