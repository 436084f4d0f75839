//! Role and permission set types owned by the identity service and cached
//! by the gateway.

use std::collections::HashSet;

/// A set of short role identifiers, e.g. `"ADMIN"`, `"DEVELOPER"`.
pub type RoleSet = HashSet<String>;

/// A set of short permission identifiers, e.g. `"USER_REQUEST_APPROVE"`.
pub type PermissionSet = HashSet<String>;

/// An authorization policy attached to a route.
///
/// Policies are evaluated against a user's cached [`RoleSet`] or
/// [`PermissionSet`]; `ROLE_` prefixes used by some identity providers are
/// stripped before comparison.
#[derive(Debug, Clone)]
pub enum AuthzPolicy {
    /// No policy: any authenticated session is sufficient.
    Public,
    /// User must hold at least one of the listed roles.
    AnyRoleOf(Vec<String>),
    /// User must hold the listed permission.
    HasPermission(String),
}

impl AuthzPolicy {
    /// Evaluate this policy against a user's cached roles/permissions.
    ///
    /// Returns `Ok(())` when permitted, or `Err(denied)` with the roles/
    /// permissions that would have satisfied the policy (for debug-only
    /// logging, never surfaced to the client at non-debug level).
    pub fn evaluate(&self, roles: &RoleSet, permissions: &PermissionSet) -> Result<(), Vec<String>> {
        match self {
            AuthzPolicy::Public => Ok(()),
            AuthzPolicy::AnyRoleOf(required) => {
                let normalized: HashSet<String> = roles.iter().map(|r| strip_role_prefix(r)).collect();
                if required.iter().any(|r| normalized.contains(strip_role_prefix(r).as_str())) {
                    Ok(())
                } else {
                    Err(required.clone())
                }
            }
            AuthzPolicy::HasPermission(required) => {
                if permissions.contains(required) {
                    Ok(())
                } else {
                    Err(vec![required.clone()])
                }
            }
        }
    }
}

/// Strip a `ROLE_` prefix some identity providers add to realm roles.
pub fn strip_role_prefix(role: &str) -> String {
    role.strip_prefix("ROLE_").unwrap_or(role).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(values: &[&str]) -> RoleSet {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn any_role_of_matches_normalized_prefix() {
        let policy = AuthzPolicy::AnyRoleOf(vec!["ADMIN".to_string()]);
        let roles = roles(&["ROLE_ADMIN"]);
        assert!(policy.evaluate(&roles, &PermissionSet::new()).is_ok());
    }

    #[test]
    fn any_role_of_denies_and_reports_required() {
        let policy = AuthzPolicy::AnyRoleOf(vec!["ADMIN".to_string(), "DEVELOPER".to_string()]);
        let roles = roles(&["USER"]);
        let err = policy.evaluate(&roles, &PermissionSet::new()).unwrap_err();
        assert_eq!(err, vec!["ADMIN".to_string(), "DEVELOPER".to_string()]);
    }

    #[test]
    fn has_permission_checks_exact_match() {
        let policy = AuthzPolicy::HasPermission("USER_REQUEST_APPROVE".to_string());
        let mut perms = PermissionSet::new();
        perms.insert("USER_REQUEST_APPROVE".to_string());
        assert!(policy.evaluate(&RoleSet::new(), &perms).is_ok());
    }

    #[test]
    fn public_policy_always_permits() {
        assert!(AuthzPolicy::Public
            .evaluate(&RoleSet::new(), &PermissionSet::new())
            .is_ok());
    }
}
