//! Instance access control attribute configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssoa_id::InstanceArn;
use ssoa_reconcile::PollStatus;

use crate::ApiError;

/// Sources an attribute value is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlAttributeValue {
    pub source: Vec<String>,
}

/// One attribute made available for access control decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlAttribute {
    pub key: String,
    pub value: AccessControlAttributeValue,
}

impl AccessControlAttribute {
    pub fn new(key: impl Into<String>, sources: &[&str]) -> Self {
        Self {
            key: key.into(),
            value: AccessControlAttributeValue {
                source: sources.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

/// State of an instance's attribute configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationStatus {
    Enabled,
    CreationInProgress,
    CreationFailed,
}

/// Result of describing an instance's attribute configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlConfiguration {
    pub attributes: Vec<AccessControlAttribute>,
    pub status: ConfigurationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl AccessControlConfiguration {
    pub fn poll_status(&self) -> PollStatus<Vec<AccessControlAttribute>> {
        match self.status {
            ConfigurationStatus::CreationInProgress => PollStatus::Pending,
            ConfigurationStatus::Enabled => PollStatus::Succeeded(self.attributes.clone()),
            ConfigurationStatus::CreationFailed => PollStatus::Failed(
                self.status_reason
                    .clone()
                    .unwrap_or_else(|| "Attribute configuration creation failed".to_string()),
            ),
        }
    }
}

#[async_trait]
pub trait AccessControlApi: Send + Sync {
    async fn create_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
        attributes: &[AccessControlAttribute],
    ) -> Result<(), ApiError>;

    async fn update_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
        attributes: &[AccessControlAttribute],
    ) -> Result<(), ApiError>;

    async fn delete_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
    ) -> Result<(), ApiError>;

    /// Fails with a not-found error when the instance has no configuration.
    async fn describe_instance_access_control_attribute_configuration(
        &self,
        instance_arn: &InstanceArn,
    ) -> Result<AccessControlConfiguration, ApiError>;
}
