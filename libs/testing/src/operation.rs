//! Backend operation names.

use serde::{Deserialize, Serialize};

/// Every backend operation the sandbox implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    CreateAccountAssignment,
    DeleteAccountAssignment,
    DescribeAccountAssignmentCreationStatus,
    DescribeAccountAssignmentDeletionStatus,
    ListAccountAssignments,

    CreateInstanceAccessControlAttributeConfiguration,
    UpdateInstanceAccessControlAttributeConfiguration,
    DeleteInstanceAccessControlAttributeConfiguration,
    DescribeInstanceAccessControlAttributeConfiguration,

    CreatePermissionSet,
    UpdatePermissionSet,
    DescribePermissionSet,
    DeletePermissionSet,
    ListPermissionSets,
    ListTagsForResource,
    TagResource,
    UntagResource,
    ListManagedPoliciesInPermissionSet,
    AttachManagedPolicyToPermissionSet,
    DetachManagedPolicyFromPermissionSet,
    ListCustomerManagedPolicyReferencesInPermissionSet,
    AttachCustomerManagedPolicyReferenceToPermissionSet,
    DetachCustomerManagedPolicyReferenceFromPermissionSet,
    GetPermissionsBoundaryForPermissionSet,
    PutPermissionsBoundaryToPermissionSet,
    DeletePermissionsBoundaryFromPermissionSet,
    GetInlinePolicyForPermissionSet,
    PutInlinePolicyToPermissionSet,
    DeleteInlinePolicyFromPermissionSet,
    ProvisionPermissionSet,
    DescribePermissionSetProvisioningStatus,
}

impl Operation {
    /// Returns true if the operation changes backend state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Operation::DescribeAccountAssignmentCreationStatus
                | Operation::DescribeAccountAssignmentDeletionStatus
                | Operation::ListAccountAssignments
                | Operation::DescribeInstanceAccessControlAttributeConfiguration
                | Operation::DescribePermissionSet
                | Operation::ListPermissionSets
                | Operation::ListTagsForResource
                | Operation::ListManagedPoliciesInPermissionSet
                | Operation::ListCustomerManagedPolicyReferencesInPermissionSet
                | Operation::GetPermissionsBoundaryForPermissionSet
                | Operation::GetInlinePolicyForPermissionSet
                | Operation::DescribePermissionSetProvisioningStatus
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown operation: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let op: Operation = "TagResource".parse().unwrap();
        assert_eq!(op, Operation::TagResource);
        assert_eq!(op.to_string(), "TagResource");
        assert!("Tag".parse::<Operation>().is_err());
    }

    #[test]
    fn test_reads_are_not_mutating() {
        assert!(!Operation::ListTagsForResource.is_mutating());
        assert!(!Operation::DescribePermissionSetProvisioningStatus.is_mutating());
        assert!(Operation::CreateAccountAssignment.is_mutating());
        assert!(Operation::UntagResource.is_mutating());
    }
}
