//! Preconditions that gate every pipeline run.
//!
//! The checks run in a fixed order and stop at the first failure:
//!
//! 1. the AWS API answers with the current credentials,
//! 2. the caller may perform every required action (IAM policy simulation),
//! 3. the caller belongs to an organization,
//! 4. the caller is that organization's management account,
//! 5. the service control policy type is enabled.
//!
//! None of the checks mutates anything and none attempts remediation.

use crate::api::{CallerIdentity, EvalDecision, OrgApi, OrganizationInfo};
use crate::error::PreconditionError;
use serde::Serialize;
use std::fmt;

/// Actions the pipeline performs, checked against the caller's IAM policy.
pub const REQUIRED_ACTIONS: &[&str] = &[
    "organizations:AttachPolicy",
    "organizations:CreateAccount",
    "organizations:CreateOrganization",
    "organizations:CreateOrganizationalUnit",
    "organizations:CreatePolicy",
    "organizations:DescribeCreateAccountStatus",
    "organizations:DescribeOrganization",
    "organizations:DescribePolicy",
    "organizations:ListAccountsForParent",
    "organizations:ListOrganizationalUnitsForParent",
    "organizations:ListPolicies",
    "organizations:ListRoots",
    "organizations:ListTagsForResource",
    "organizations:MoveAccount",
    "organizations:TagResource",
    "organizations:UntagResource",
    "iam:SimulatePrincipalPolicy",
    "sts:GetCallerIdentity",
];

// ---------------------------------------------------------------------------
// PreflightCheck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightCheck {
    ApiConnection,
    Permissions,
    OrganizationExists,
    ManagementAccount,
    ScpEnabled,
}

impl PreflightCheck {
    pub fn all() -> &'static [PreflightCheck] {
        &[
            PreflightCheck::ApiConnection,
            PreflightCheck::Permissions,
            PreflightCheck::OrganizationExists,
            PreflightCheck::ManagementAccount,
            PreflightCheck::ScpEnabled,
        ]
    }

    pub fn description(self) -> &'static str {
        match self {
            PreflightCheck::ApiConnection => "AWS API connection established",
            PreflightCheck::Permissions => "AWS API actions permissions",
            PreflightCheck::OrganizationExists => "AWS organization existence",
            PreflightCheck::ManagementAccount => "AWS API caller is management account",
            PreflightCheck::ScpEnabled => "SCP enabled",
        }
    }
}

impl fmt::Display for PreflightCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl PreconditionError {
    /// The check that produced this error.
    pub fn check(&self) -> PreflightCheck {
        match self {
            PreconditionError::Connection(_) => PreflightCheck::ApiConnection,
            PreconditionError::PolicySimulation { .. } | PreconditionError::ActionsDenied { .. } => {
                PreflightCheck::Permissions
            }
            PreconditionError::OrganizationMissing(_) => PreflightCheck::OrganizationExists,
            PreconditionError::NotManagementAccount { .. } => PreflightCheck::ManagementAccount,
            PreconditionError::ScpDisabled(_) => PreflightCheck::ScpEnabled,
        }
    }
}

// ---------------------------------------------------------------------------
// PreflightReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub caller: CallerIdentity,
    pub organization: OrganizationInfo,
    pub passed: Vec<PreflightCheck>,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

pub fn check_api_connection<A: OrgApi>(api: &A) -> Result<CallerIdentity, PreconditionError> {
    api.get_caller_identity()
        .map_err(PreconditionError::Connection)
}

pub fn check_permissions<A: OrgApi>(
    api: &A,
    caller: &CallerIdentity,
    required_actions: &[String],
) -> Result<(), PreconditionError> {
    let evaluations = api
        .simulate_principal_policy(&caller.arn, required_actions)
        .map_err(|source| PreconditionError::PolicySimulation {
            arn: caller.arn.clone(),
            source,
        })?;

    let denied: Vec<String> = evaluations
        .into_iter()
        .filter(|e| e.decision != EvalDecision::Allowed)
        .map(|e| e.action)
        .collect();

    if denied.is_empty() {
        Ok(())
    } else {
        Err(PreconditionError::ActionsDenied {
            arn: caller.arn.clone(),
            denied,
        })
    }
}

pub fn check_organization_exists<A: OrgApi>(api: &A) -> Result<OrganizationInfo, PreconditionError> {
    api.describe_organization()
        .map_err(PreconditionError::OrganizationMissing)
}

pub fn check_management_account(
    caller: &CallerIdentity,
    organization: &OrganizationInfo,
) -> Result<(), PreconditionError> {
    if caller.account == organization.management_account_id {
        return Ok(());
    }
    Err(PreconditionError::NotManagementAccount {
        caller: caller.account.clone(),
        management: organization.management_account_id.clone(),
    })
}

pub fn check_scp_enabled(organization: &OrganizationInfo) -> Result<(), PreconditionError> {
    if organization.scp_enabled() {
        return Ok(());
    }
    Err(PreconditionError::ScpDisabled(organization.id.clone()))
}

/// Run all checks in order; the first failure is returned immediately.
pub fn run_preconditions<A: OrgApi>(
    api: &A,
    required_actions: &[String],
) -> Result<PreflightReport, PreconditionError> {
    let mut passed = Vec::with_capacity(PreflightCheck::all().len());
    let mut pass = |check: PreflightCheck| {
        tracing::info!("pipeline precondition success: {check}");
        passed.push(check);
    };

    let caller = logged(check_api_connection(api))?;
    pass(PreflightCheck::ApiConnection);

    logged(check_permissions(api, &caller, required_actions))?;
    pass(PreflightCheck::Permissions);

    let organization = logged(check_organization_exists(api))?;
    pass(PreflightCheck::OrganizationExists);

    logged(check_management_account(&caller, &organization))?;
    pass(PreflightCheck::ManagementAccount);

    logged(check_scp_enabled(&organization))?;
    pass(PreflightCheck::ScpEnabled);

    Ok(PreflightReport {
        caller,
        organization,
        passed,
    })
}

fn logged<T>(result: Result<T, PreconditionError>) -> Result<T, PreconditionError> {
    if let Err(e) = &result {
        tracing::error!(check = ?e.check(), "pipeline precondition failed: {e}");
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOrg;

    fn actions() -> Vec<String> {
        REQUIRED_ACTIONS.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn all_checks_pass_in_order() {
        let org = FakeOrg::new();
        let report = run_preconditions(&org, &actions()).unwrap();
        assert_eq!(report.passed, PreflightCheck::all());
        assert_eq!(report.organization.management_account_id, report.caller.account);
    }

    #[test]
    fn denied_action_short_circuits() {
        let org = FakeOrg::new();
        org.deny_action("organizations:MoveAccount", EvalDecision::ImplicitDeny);
        org.deny_action("organizations:CreateAccount", EvalDecision::ExplicitDeny);

        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert_eq!(err.check(), PreflightCheck::Permissions);
        match &err {
            PreconditionError::ActionsDenied { denied, .. } => {
                assert_eq!(
                    denied,
                    &vec![
                        "organizations:CreateAccount".to_string(),
                        "organizations:MoveAccount".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(org.calls("simulate_principal_policy"), 1);
        assert_eq!(org.calls("describe_organization"), 0);
    }

    #[test]
    fn unreachable_api_fails_first() {
        let org = FakeOrg::new();
        org.fail_on("get_caller_identity", "InvalidClientTokenId");

        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert_eq!(err.check(), PreflightCheck::ApiConnection);
        assert_eq!(org.calls("simulate_principal_policy"), 0);
    }

    #[test]
    fn simulation_error_is_a_permission_failure() {
        let org = FakeOrg::new();
        org.fail_on("simulate_principal_policy", "AccessDenied");

        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert!(matches!(err, PreconditionError::PolicySimulation { .. }));
        assert_eq!(org.calls("describe_organization"), 0);
    }

    #[test]
    fn missing_organization() {
        let org = FakeOrg::without_organization();
        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert_eq!(err.check(), PreflightCheck::OrganizationExists);
    }

    #[test]
    fn member_account_caller_is_rejected() {
        let org = FakeOrg::new();
        org.set_caller_account("222222222222");

        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert_eq!(
            err,
            PreconditionError::NotManagementAccount {
                caller: "222222222222".to_string(),
                management: crate::testing::MANAGEMENT_ACCOUNT.to_string(),
            }
        );
    }

    #[test]
    fn disabled_scp_is_the_last_check() {
        let org = FakeOrg::new();
        org.disable_scp();

        let err = run_preconditions(&org, &actions()).unwrap_err();
        assert_eq!(err.check(), PreflightCheck::ScpEnabled);
        assert!(err.to_string().contains("o-fake"));
    }
}
