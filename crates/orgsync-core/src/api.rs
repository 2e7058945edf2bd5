//! Capability surface over the AWS Organizations, IAM and STS APIs.
//!
//! `OrgApi` is a thin, blocking request/response mapping. It carries no
//! business logic and never retries; every provider failure surfaces as an
//! [`ApiError`] with the provider's error code. Components receive the client
//! as an explicit `&A where A: OrgApi` handle.

use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Collapse a tag list into a key → value map (later keys win).
pub fn tag_map(tags: &[Tag]) -> HashMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureSet {
    All,
    ConsolidatedBilling,
}

impl FeatureSet {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureSet::All => "ALL",
            FeatureSet::ConsolidatedBilling => "CONSOLIDATED_BILLING",
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SERVICE_CONTROL_POLICY: &str = "SERVICE_CONTROL_POLICY";
pub const POLICY_TYPE_ENABLED: &str = "ENABLED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTypeSummary {
    pub policy_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub id: String,
    pub arn: Option<String>,
    pub feature_set: Option<String>,
    pub management_account_id: String,
    pub management_account_email: Option<String>,
    pub available_policy_types: Vec<PolicyTypeSummary>,
}

impl OrganizationInfo {
    pub fn scp_enabled(&self) -> bool {
        self.available_policy_types
            .iter()
            .any(|p| p.policy_type == SERVICE_CONTROL_POLICY && p.status == POLICY_TYPE_ENABLED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Account creation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateAccountState {
    InProgress,
    Succeeded,
    Failed,
}

/// Status of an asynchronous account-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountStatus {
    pub request_id: String,
    pub state: CreateAccountState,
    pub account_id: Option<String>,
    pub failure_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub id: String,
    pub name: String,
    pub aws_managed: bool,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalDecision {
    Allowed,
    ImplicitDeny,
    ExplicitDeny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvaluation {
    pub action: String,
    pub decision: EvalDecision,
}

// ---------------------------------------------------------------------------
// OrgApi
// ---------------------------------------------------------------------------

pub trait OrgApi {
    /// Fails with `AlreadyInOrganizationException` if the caller is already a member.
    fn create_organization(&self, feature_set: FeatureSet) -> ApiResult<OrganizationInfo>;

    fn describe_organization(&self) -> ApiResult<OrganizationInfo>;

    fn list_roots(&self) -> ApiResult<Vec<Root>>;

    fn create_organizational_unit(
        &self,
        parent_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> ApiResult<OrganizationalUnit>;

    fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
    ) -> ApiResult<Vec<OrganizationalUnit>>;

    fn list_accounts_for_parent(&self, parent_id: &str) -> ApiResult<Vec<Account>>;

    fn list_tags_for_resource(&self, resource_id: &str) -> ApiResult<Vec<Tag>>;

    fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()>;

    fn untag_resource(&self, resource_id: &str, tag_keys: &[String]) -> ApiResult<()>;

    /// Starts account creation and returns the pending request, not a finished account.
    fn create_account(&self, email: &str, name: &str, tags: &[Tag])
        -> ApiResult<CreateAccountStatus>;

    fn describe_create_account_status(&self, request_id: &str) -> ApiResult<CreateAccountStatus>;

    fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> ApiResult<()>;

    /// Creates a service control policy.
    fn create_policy(&self, name: &str, description: &str, content: &str)
        -> ApiResult<PolicySummary>;

    /// Lists service control policies.
    fn list_policies(&self) -> ApiResult<Vec<PolicySummary>>;

    fn describe_policy(&self, policy_id: &str) -> ApiResult<PolicySummary>;

    /// Fails with `DuplicatePolicyAttachmentException` when already attached.
    fn attach_policy(&self, target_id: &str, policy_id: &str) -> ApiResult<()>;

    fn simulate_principal_policy(
        &self,
        principal_arn: &str,
        action_names: &[String],
    ) -> ApiResult<Vec<ActionEvaluation>>;

    fn get_caller_identity(&self) -> ApiResult<CallerIdentity>;
}
