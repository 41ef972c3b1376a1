//! Well-formed identifiers and records for tests.

use ssoa_api::{AccountAssignment, AssignmentRequest, PrincipalType, TargetType};
use ssoa_id::{
    AccountId, InstanceArn, ManagedPolicyArn, PermissionSetArn, PermissionSetName, PrincipalId,
};

pub const INSTANCE_ARN: &str = "arn:aws:sso:::instance/ssoins-1234567890abcdef";
pub const PERMISSION_SET_ARN: &str =
    "arn:aws:sso:::permissionSet/ssoins-1234567890abcdef/ps-abcdef0123456789";
pub const PERMISSION_SET_NAME: &str = "ReadOnly";
pub const ACCOUNT_ID: &str = "111122223333";
pub const PRINCIPAL_ID: &str = "9a672b2c4e-1d2c3b4a-5e6f-7a8b-9c0d-1e2f3a4b5c6d";
pub const READ_ONLY_POLICY: &str = "arn:aws:iam::aws:policy/ReadOnlyAccess";
pub const BILLING_POLICY: &str = "arn:aws:iam::aws:policy/job-function/Billing";

fn parsed<T: std::str::FromStr>(s: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    s.parse()
        .unwrap_or_else(|e| panic!("fixture '{s}' does not parse: {e:?}"))
}

pub fn instance_arn() -> InstanceArn {
    parsed(INSTANCE_ARN)
}

pub fn permission_set_arn() -> PermissionSetArn {
    parsed(PERMISSION_SET_ARN)
}

pub fn permission_set_name() -> PermissionSetName {
    parsed(PERMISSION_SET_NAME)
}

pub fn account_id() -> AccountId {
    parsed(ACCOUNT_ID)
}

pub fn principal_id() -> PrincipalId {
    parsed(PRINCIPAL_ID)
}

pub fn managed_policy(arn: &str) -> ManagedPolicyArn {
    parsed(arn)
}

pub fn assignment_request() -> AssignmentRequest {
    AssignmentRequest {
        instance_arn: instance_arn(),
        target_id: account_id(),
        target_type: TargetType::AwsAccount,
        permission_set_arn: permission_set_arn(),
        principal_type: PrincipalType::Group,
        principal_id: principal_id(),
    }
}

pub fn account_assignment() -> AccountAssignment {
    AccountAssignment {
        account_id: account_id(),
        permission_set_arn: permission_set_arn(),
        principal_type: PrincipalType::Group,
        principal_id: principal_id(),
    }
}
