use crate::api::{OrgApi, PolicySummary};
use crate::config::PolicyConfig;
use crate::error::ApiResult;
use serde::Serialize;

/// Service control policy denying every action.
pub const DENY_ALL_POLICY: &str =
    r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Action":"*","Resource":"*"}]}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Attached,
    AlreadyAttached,
}

/// Find or create the configured service control policy.
///
/// A configured `policy_id` is verified with `describe_policy`. Otherwise a
/// customer-managed SCP with the configured name is reused, and only when
/// none exists is a new one created.
pub fn ensure_policy<A: OrgApi>(api: &A, cfg: &PolicyConfig) -> ApiResult<PolicySummary> {
    if let Some(id) = &cfg.policy_id {
        let policy = api.describe_policy(id)?;
        tracing::info!(policy = %policy.id, name = %policy.name, "using configured SCP policy");
        return Ok(policy);
    }

    if let Some(existing) = api
        .list_policies()?
        .into_iter()
        .find(|p| !p.aws_managed && p.name == cfg.name)
    {
        tracing::info!(policy = %existing.id, name = %existing.name, "reusing existing SCP policy");
        return Ok(existing);
    }

    let created = api.create_policy(&cfg.name, &cfg.description, cfg.content())?;
    tracing::info!(policy = %created.id, name = %created.name, "created SCP policy");
    Ok(created)
}

/// Attach `policy_id` to `target_id`. An existing attachment counts as success;
/// every other provider error propagates.
pub fn attach_policy<A: OrgApi>(api: &A, target_id: &str, policy_id: &str) -> ApiResult<Attachment> {
    match api.attach_policy(target_id, policy_id) {
        Ok(()) => {
            tracing::info!(target = %target_id, policy = %policy_id, "attached SCP policy");
            Ok(Attachment::Attached)
        }
        Err(e) if e.is_duplicate_policy_attachment() => {
            tracing::debug!(target = %target_id, policy = %policy_id, "SCP policy already attached");
            Ok(Attachment::AlreadyAttached)
        }
        Err(e) => {
            tracing::error!("something went wrong attaching an SCP policy to a target");
            tracing::debug!(error = %e, "attach_policy failed");
            Err(e)
        }
    }
}
