//! Typed identifier definitions.
//!
//! Each identifier has a validator that checks its canonical syntax.
//! ARNs are validated structurally; the backend remains the authority
//! on whether the referenced resource exists.

use crate::{define_id, IdError};

/// ARN partitions accepted by the backend.
pub const PARTITIONS: &[&str] = &["aws", "aws-cn", "aws-us-gov", "aws-iso", "aws-iso-b"];

const INSTANCE_PREFIXES: &[&str] = &["ssoins-", "ins-"];
const INSTANCE_SUFFIX_LEN: usize = 16;
const PERMISSION_SET_PREFIX: &str = "ps-";
const PERMISSION_SET_SUFFIX_LEN: usize = 16;

// =============================================================================
// Identity-center instances and permission sets
// =============================================================================

define_id!(InstanceArn, "instance ARN", validate_instance_arn);
define_id!(PermissionSetArn, "permission set ARN", validate_permission_set_arn);
define_id!(PermissionSetName, "permission set name", validate_permission_set_name);

impl InstanceArn {
    /// Returns the `ssoins-...` segment of the ARN.
    pub fn instance_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl PermissionSetArn {
    /// Returns the instance segment embedded in the permission set ARN.
    pub fn instance_id(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    /// Returns the `ps-...` segment of the ARN.
    pub fn permission_set_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns true if this permission set lives in the given instance.
    pub fn belongs_to(&self, instance: &InstanceArn) -> bool {
        self.instance_id() == instance.instance_id()
    }
}

// =============================================================================
// Targets and principals
// =============================================================================

define_id!(AccountId, "account id", validate_account_id);
define_id!(PrincipalId, "principal id", validate_principal_id);

// =============================================================================
// Policies
// =============================================================================

define_id!(ManagedPolicyArn, "managed policy ARN", validate_managed_policy_arn);

// =============================================================================
// Asynchronous operations
// =============================================================================

define_id!(RequestId, "request id", validate_request_id);

// =============================================================================
// Validators
// =============================================================================

/// Splits `arn:{partition}:{service}:{region}:{account}:{resource}` and checks
/// partition and service. Returns `(account, resource)`.
fn split_arn<'a>(
    kind: &'static str,
    s: &'a str,
    service: &str,
) -> Result<(&'a str, &'a str), IdError> {
    let Some(rest) = s.strip_prefix("arn:") else {
        let actual = s.split(':').next().unwrap_or_default().to_string();
        return Err(IdError::InvalidPrefix {
            kind,
            expected: "arn:",
            actual,
        });
    };

    let parts: Vec<&str> = rest.splitn(5, ':').collect();
    let [partition, svc, _region, account, resource] = parts.as_slice() else {
        return Err(IdError::format(kind, "expected six colon-separated fields"));
    };

    if !PARTITIONS.contains(partition) {
        return Err(IdError::format(kind, format!("unknown partition '{partition}'")));
    }
    if *svc != service {
        return Err(IdError::format(
            kind,
            format!("expected service '{service}', got '{svc}'"),
        ));
    }

    Ok((*account, *resource))
}

fn check_suffix(
    kind: &'static str,
    value: &str,
    prefixes: &[&str],
    len: usize,
) -> Result<(), IdError> {
    let Some(suffix) = prefixes.iter().find_map(|p| value.strip_prefix(*p)) else {
        return Err(IdError::format(
            kind,
            format!("'{value}' must start with one of {prefixes:?}"),
        ));
    };
    if suffix.len() != len {
        return Err(IdError::format(
            kind,
            format!("'{value}' must have a {len}-character suffix"),
        ));
    }
    if !suffix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(IdError::format(
            kind,
            format!("'{value}' contains invalid characters"),
        ));
    }
    Ok(())
}

fn check_length(kind: &'static str, s: &str, max: usize) -> Result<(), IdError> {
    if s.len() > max {
        return Err(IdError::TooLong {
            kind,
            max,
            actual: s.len(),
        });
    }
    Ok(())
}

fn validate_instance_arn(s: &str) -> Result<(), IdError> {
    let kind = InstanceArn::KIND;
    check_length(kind, s, 1224)?;
    let (account, resource) = split_arn(kind, s, "sso")?;
    if !account.is_empty() {
        return Err(IdError::format(kind, "account field must be empty"));
    }
    let Some(instance) = resource.strip_prefix("instance/") else {
        return Err(IdError::format(kind, "resource must be 'instance/<id>'"));
    };
    check_suffix(kind, instance, INSTANCE_PREFIXES, INSTANCE_SUFFIX_LEN)
}

fn validate_permission_set_arn(s: &str) -> Result<(), IdError> {
    let kind = PermissionSetArn::KIND;
    check_length(kind, s, 1224)?;
    let (account, resource) = split_arn(kind, s, "sso")?;
    if !account.is_empty() {
        return Err(IdError::format(kind, "account field must be empty"));
    }
    let segments: Vec<&str> = resource.split('/').collect();
    let ["permissionSet", instance, permission_set] = segments.as_slice() else {
        return Err(IdError::format(
            kind,
            "resource must be 'permissionSet/<instance>/<permission set>'",
        ));
    };
    check_suffix(kind, instance, INSTANCE_PREFIXES, INSTANCE_SUFFIX_LEN)?;
    check_suffix(
        kind,
        permission_set,
        &[PERMISSION_SET_PREFIX],
        PERMISSION_SET_SUFFIX_LEN,
    )
}

fn validate_permission_set_name(s: &str) -> Result<(), IdError> {
    let kind = PermissionSetName::KIND;
    check_length(kind, s, 32)?;
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "_+=,.@-".contains(*c)))
    {
        return Err(IdError::format(kind, format!("character '{c}' not allowed")));
    }
    Ok(())
}

fn validate_account_id(s: &str) -> Result<(), IdError> {
    let kind = AccountId::KIND;
    if s.len() != 12 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(IdError::format(kind, "must be exactly 12 digits"));
    }
    Ok(())
}

fn validate_principal_id(s: &str) -> Result<(), IdError> {
    let kind = PrincipalId::KIND;
    check_length(kind, s, 47)?;
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(IdError::format(kind, "only letters, digits and '-' allowed"));
    }
    Ok(())
}

fn validate_managed_policy_arn(s: &str) -> Result<(), IdError> {
    let kind = ManagedPolicyArn::KIND;
    check_length(kind, s, 2048)?;
    let (account, resource) = split_arn(kind, s, "iam")?;
    if account != "aws" && validate_account_id(account).is_err() {
        return Err(IdError::format(
            kind,
            "account field must be 'aws' or a 12-digit account id",
        ));
    }
    match resource.strip_prefix("policy/") {
        Some(name) if !name.is_empty() && !name.ends_with('/') => Ok(()),
        _ => Err(IdError::format(kind, "resource must be 'policy/<name>'")),
    }
}

fn validate_request_id(s: &str) -> Result<(), IdError> {
    let kind = RequestId::KIND;
    check_length(kind, s, 64)?;
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(IdError::format(kind, "only letters, digits and '-' allowed"));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
