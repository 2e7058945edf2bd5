//! Mapping between SDK shapes and the `orgsync_core::api` types.

use aws_sdk_iam::types::{EvaluationResult, PolicyEvaluationDecisionType};
use aws_sdk_organizations::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_organizations::types as org;
use orgsync_core::api::{
    Account, ActionEvaluation, CreateAccountState, CreateAccountStatus, EvalDecision,
    OrganizationInfo, OrganizationalUnit, PolicySummary, PolicyTypeSummary, Root, Tag,
};
use orgsync_core::error::{ApiError, ApiResult};

const UNKNOWN_CODE: &str = "Unknown";

/// Turn any SDK error into an [`ApiError`] keyed by the provider's error code.
pub fn api_error<E>(operation: &str, err: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().unwrap_or(UNKNOWN_CODE).to_string();
    let message = match err.message() {
        Some(m) => m.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    tracing::debug!(operation, code = %code, "AWS call failed: {message}");
    ApiError::new(operation, code, message)
}

/// An expected field the provider left out.
pub fn missing(operation: &str, field: &str) -> ApiError {
    ApiError::new(
        operation,
        "MissingField",
        format!("response carried no {field}"),
    )
}

pub fn tags_to_sdk(operation: &str, tags: &[Tag]) -> ApiResult<Vec<org::Tag>> {
    tags.iter()
        .map(|t| {
            org::Tag::builder()
                .key(&t.key)
                .value(&t.value)
                .build()
                .map_err(|e| ApiError::new(operation, "InvalidTag", e.to_string()))
        })
        .collect()
}

pub fn tag(t: &org::Tag) -> Tag {
    Tag::new(t.key(), t.value())
}

pub fn organization(o: &org::Organization) -> OrganizationInfo {
    OrganizationInfo {
        id: o.id().unwrap_or_default().to_string(),
        arn: o.arn().map(str::to_string),
        feature_set: o.feature_set().map(|f| f.as_str().to_string()),
        management_account_id: o.master_account_id().unwrap_or_default().to_string(),
        management_account_email: o.master_account_email().map(str::to_string),
        available_policy_types: o
            .available_policy_types()
            .iter()
            .map(|p| PolicyTypeSummary {
                policy_type: p.r#type().map(|t| t.as_str()).unwrap_or_default().to_string(),
                status: p.status().map(|s| s.as_str()).unwrap_or_default().to_string(),
            })
            .collect(),
    }
}

pub fn root(r: &org::Root) -> Root {
    Root {
        id: r.id().unwrap_or_default().to_string(),
        name: r.name().map(str::to_string),
    }
}

pub fn organizational_unit(ou: &org::OrganizationalUnit) -> OrganizationalUnit {
    OrganizationalUnit {
        id: ou.id().unwrap_or_default().to_string(),
        name: ou.name().unwrap_or_default().to_string(),
    }
}

pub fn account(a: &org::Account) -> Account {
    Account {
        id: a.id().unwrap_or_default().to_string(),
        email: a.email().unwrap_or_default().to_string(),
        name: a.name().map(str::to_string),
    }
}

pub fn create_account_status(operation: &str, s: &org::CreateAccountStatus) -> ApiResult<CreateAccountStatus> {
    let request_id = s.id().ok_or_else(|| missing(operation, "request id"))?;
    let state = match s.state() {
        Some(org::CreateAccountState::Succeeded) => CreateAccountState::Succeeded,
        Some(org::CreateAccountState::Failed) => CreateAccountState::Failed,
        _ => CreateAccountState::InProgress,
    };
    Ok(CreateAccountStatus {
        request_id: request_id.to_string(),
        state,
        account_id: s.account_id().map(str::to_string),
        failure_reason: s.failure_reason().map(|r| r.as_str().to_string()),
    })
}

pub fn policy_summary(p: &org::PolicySummary) -> PolicySummary {
    PolicySummary {
        id: p.id().unwrap_or_default().to_string(),
        name: p.name().unwrap_or_default().to_string(),
        aws_managed: p.aws_managed(),
    }
}

pub fn action_evaluation(r: &EvaluationResult) -> ActionEvaluation {
    let decision = match r.eval_decision() {
        PolicyEvaluationDecisionType::Allowed => EvalDecision::Allowed,
        PolicyEvaluationDecisionType::ExplicitDeny => EvalDecision::ExplicitDeny,
        _ => EvalDecision::ImplicitDeny,
    };
    ActionEvaluation {
        action: r.eval_action_name().to_string(),
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_fields_are_mapped() {
        let sdk = org::Organization::builder()
            .id("o-abc")
            .master_account_id("111111111111")
            .feature_set(org::OrganizationFeatureSet::All)
            .available_policy_types(
                org::PolicyTypeSummary::builder()
                    .r#type(org::PolicyType::ServiceControlPolicy)
                    .status(org::PolicyTypeStatus::Enabled)
                    .build(),
            )
            .build();
        let info = organization(&sdk);
        assert_eq!(info.id, "o-abc");
        assert_eq!(info.management_account_id, "111111111111");
        assert_eq!(info.feature_set.as_deref(), Some("ALL"));
        assert!(info.scp_enabled());
    }

    #[test]
    fn create_account_status_requires_request_id() {
        let pending = org::CreateAccountStatus::builder()
            .state(org::CreateAccountState::InProgress)
            .build();
        assert_eq!(
            create_account_status("describe_create_account_status", &pending)
                .unwrap_err()
                .code,
            "MissingField"
        );

        let failed = org::CreateAccountStatus::builder()
            .id("car-1")
            .state(org::CreateAccountState::Failed)
            .failure_reason(org::CreateAccountFailureReason::EmailAlreadyExists)
            .build();
        let status = create_account_status("describe_create_account_status", &failed).unwrap();
        assert_eq!(status.state, CreateAccountState::Failed);
        assert_eq!(status.failure_reason.as_deref(), Some("EMAIL_ALREADY_EXISTS"));
    }

    #[test]
    fn tags_convert_both_ways() {
        let tags = vec![Tag::new("project_slug", "alpha")];
        let sdk = tags_to_sdk("tag_resource", &tags).unwrap();
        assert_eq!(sdk.iter().map(tag).collect::<Vec<_>>(), tags);
    }
}
