//! Brings the organization in line with the course's desired state.
//!
//! Sync is additive: records present in the organization but absent from the
//! desired state are left alone.

use crate::api::{CreateAccountState, OrgApi, Tag};
use crate::checks::check_tree;
use crate::config::{AccountsConfig, Config, OrganizationConfig, PollingConfig};
use crate::course::{desired_state, CourseCatalog};
use crate::error::{ApiError, ApiResult, OrgSyncError};
use crate::extract::{extract, TagAnomaly};
use crate::pipeline::{FailureReason, PipelineResult, Stage, StageFailure};
use crate::policy::{attach_policy, ensure_policy};
use crate::preflight::run_preconditions;
use crate::types::{OrgTree, SyncRecord, PROJECT_SEMESTER_TAG, PROJECT_SLUG_TAG};
use serde::Serialize;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Records in `desired` that are not in `actual`, in `desired` order.
/// A record listed twice in `desired` is returned once.
pub fn generate_sync_diff(desired: &[SyncRecord], actual: &[SyncRecord]) -> Vec<SyncRecord> {
    let existing: HashSet<&SyncRecord> = actual.iter().collect();
    let mut seen = HashSet::new();
    desired
        .iter()
        .filter(|r| !existing.contains(r) && seen.insert(*r))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Iteration OU
// ---------------------------------------------------------------------------

/// Id of the OU named `semester` directly under the tree's parent, creating
/// it when the tree has none.
pub fn ensure_iteration_ou<A: OrgApi>(api: &A, tree: &OrgTree, semester: &str) -> ApiResult<String> {
    if let Some(iteration) = tree.find_iteration(semester) {
        tracing::info!(ou = %iteration.ou_id, name = %semester, "reusing course iteration OU");
        return Ok(iteration.ou_id.clone());
    }
    let ou = api.create_organizational_unit(&tree.ou_id, semester, &[])?;
    tracing::info!(ou = %ou.id, name = %semester, parent = %tree.ou_id, "created course iteration OU");
    Ok(ou.id)
}

// ---------------------------------------------------------------------------
// Account creation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccountCreation {
    Succeeded { account_id: String },
    Failed { reason: String },
    /// Still pending after the last poll. The request may yet complete.
    StillInProgress,
}

/// Tags attached to a new member account at creation time.
pub fn creation_tags(record: &SyncRecord, accounts: &AccountsConfig) -> Vec<Tag> {
    vec![
        Tag::new(PROJECT_SLUG_TAG, &record.project_slug),
        Tag::new(PROJECT_SEMESTER_TAG, &record.project_semester),
        Tag::new(&accounts.temporary_tag_key, &accounts.temporary_tag_value),
    ]
}

/// Request a member account for `record` and poll until the request settles
/// or `polling.max_attempts` polls have been spent.
///
/// Provider errors from the request or a poll are returned as-is; a
/// creation the provider reports as failed is an `Ok` outcome.
pub fn create_account<A: OrgApi>(
    api: &A,
    record: &SyncRecord,
    tags: &[Tag],
    polling: &PollingConfig,
) -> ApiResult<AccountCreation> {
    let request = api.create_account(&record.member_email, &record.account_name(), tags)?;
    tracing::debug!(request = %request.request_id, email = %record.member_email, "account creation requested");

    for attempt in 1..=polling.max_attempts {
        let status = api.describe_create_account_status(&request.request_id)?;
        tracing::debug!(
            request = %request.request_id,
            attempt,
            state = ?status.state,
            "account creation status"
        );
        match status.state {
            CreateAccountState::Succeeded => {
                return Ok(match status.account_id {
                    Some(account_id) => AccountCreation::Succeeded { account_id },
                    None => AccountCreation::Failed {
                        reason: "SUCCEEDED_WITHOUT_ACCOUNT_ID".to_string(),
                    },
                });
            }
            CreateAccountState::Failed => {
                return Ok(AccountCreation::Failed {
                    reason: status
                        .failure_reason
                        .unwrap_or_else(|| "UNKNOWN".to_string()),
                });
            }
            CreateAccountState::InProgress => {
                if attempt < polling.max_attempts {
                    std::thread::sleep(polling.interval());
                }
            }
        }
    }
    Ok(AccountCreation::StillInProgress)
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccountOutcome {
    /// Created, moved into the iteration OU and untagged.
    Placed { account_id: String },
    /// The provider rejected the creation request.
    CreationFailed { reason: String },
    StillInProgress,
    /// A call failed before the creation outcome was known.
    RequestFailed { error: String },
    /// Created, but left in the root or still carrying the temporary tag.
    PlacementFailed { account_id: String, error: String },
}

impl AccountOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AccountOutcome::Placed { .. })
    }

    pub fn account_id(&self) -> Option<&str> {
        match self {
            AccountOutcome::Placed { account_id }
            | AccountOutcome::PlacementFailed { account_id, .. } => Some(account_id.as_str()),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AccountOutcome::Placed { account_id } => format!("placed as {account_id}"),
            AccountOutcome::CreationFailed { reason } => format!("creation failed: {reason}"),
            AccountOutcome::StillInProgress => "creation still in progress".to_string(),
            AccountOutcome::RequestFailed { error } => format!("request failed: {error}"),
            AccountOutcome::PlacementFailed { account_id, error } => {
                format!("{account_id} created but not placed: {error}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub record: SyncRecord,
    pub outcome: AccountOutcome,
}

/// Create every record's account and move it from the organization root into
/// `destination_ou_id`. Each record is handled on its own: a failure is
/// recorded in its report and the next record is still attempted.
pub fn create_and_place_accounts<A: OrgApi>(
    api: &A,
    records: &[SyncRecord],
    root_id: &str,
    destination_ou_id: &str,
    config: &Config,
) -> Vec<AccountReport> {
    records
        .iter()
        .map(|record| {
            let outcome = provision(api, record, root_id, destination_ou_id, config);
            if outcome.is_success() {
                tracing::info!(email = %record.member_email, "account {}", outcome.describe());
            } else {
                tracing::error!(email = %record.member_email, "account {}", outcome.describe());
            }
            AccountReport {
                record: record.clone(),
                outcome,
            }
        })
        .collect()
}

fn provision<A: OrgApi>(
    api: &A,
    record: &SyncRecord,
    root_id: &str,
    destination_ou_id: &str,
    config: &Config,
) -> AccountOutcome {
    let tags = creation_tags(record, &config.accounts);
    let account_id = match create_account(api, record, &tags, &config.polling) {
        Ok(AccountCreation::Succeeded { account_id }) => account_id,
        Ok(AccountCreation::Failed { reason }) => return AccountOutcome::CreationFailed { reason },
        Ok(AccountCreation::StillInProgress) => return AccountOutcome::StillInProgress,
        Err(e) => return AccountOutcome::RequestFailed { error: e.to_string() },
    };

    let placed = api
        .move_account(&account_id, root_id, destination_ou_id)
        .and_then(|()| {
            api.untag_resource(&account_id, &[config.accounts.temporary_tag_key.clone()])
        });
    match placed {
        Ok(()) => AccountOutcome::Placed { account_id },
        Err(e) => AccountOutcome::PlacementFailed {
            account_id,
            error: e.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The organization root id, and the OU whose children are the course
/// iterations (the configured parent, else the root).
pub fn resolve_parent<A: OrgApi>(
    api: &A,
    organization: &OrganizationConfig,
) -> Result<(String, String), OrgSyncError> {
    let root_id = api
        .list_roots()?
        .into_iter()
        .next()
        .map(|root| root.id)
        .ok_or(OrgSyncError::NoRoot)?;
    let parent = organization
        .parent_ou_id
        .clone()
        .unwrap_or_else(|| root_id.clone());
    Ok((root_id, parent))
}

/// What a run would do, computed without mutating anything.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub root_id: String,
    pub semester: String,
    pub tree: OrgTree,
    pub anomalies: Vec<TagAnomaly>,
    pub desired: Vec<SyncRecord>,
    pub to_create: Vec<SyncRecord>,
}

struct Snapshot {
    root_id: String,
    tree: OrgTree,
    anomalies: Vec<TagAnomaly>,
}

pub struct Reconciler<'a, A: OrgApi, C: CourseCatalog + ?Sized> {
    api: &'a A,
    catalog: &'a C,
    config: &'a Config,
}

impl<'a, A: OrgApi, C: CourseCatalog + ?Sized> Reconciler<'a, A, C> {
    pub fn new(api: &'a A, catalog: &'a C, config: &'a Config) -> Self {
        Self {
            api,
            catalog,
            config,
        }
    }

    /// Run every stage in order, stopping at the first failed one.
    pub fn run(&self) -> PipelineResult {
        let mut result = PipelineResult::started();
        match self.drive(&mut result) {
            Ok(()) => result.finish(),
            Err(failure) => result.fail(failure),
        }
        result
    }

    /// Extract and diff only. Preconditions are not checked.
    pub fn plan(&self) -> Result<Plan, StageFailure> {
        let snapshot = self.snapshot()?;
        self.diff(snapshot)
    }

    fn drive(&self, result: &mut PipelineResult) -> Result<(), StageFailure> {
        let errors = self.config.errors();
        if !errors.is_empty() {
            let messages: Vec<&str> = errors.iter().map(|w| w.message.as_str()).collect();
            return Err(StageFailure::new(
                Stage::Start,
                FailureReason::InvalidConfig,
                messages.join("; "),
            ));
        }

        result.enter(Stage::Preconditions);
        run_preconditions(self.api, &self.config.required_actions).map_err(|e| {
            StageFailure::new(Stage::Preconditions, FailureReason::PreconditionFailed, e)
        })?;

        result.enter(Stage::Extract);
        let snapshot = self.snapshot()?;
        result.anomalies = snapshot.anomalies.clone();

        result.enter(Stage::Diff);
        let plan = self.diff(snapshot)?;

        result.enter(Stage::EnsureIterationOu);
        let ou_id = ensure_iteration_ou(self.api, &plan.tree, &plan.semester).map_err(|e| {
            StageFailure::new(
                Stage::EnsureIterationOu,
                FailureReason::IterationOuUnavailable,
                e,
            )
        })?;
        result.iteration_ou_id = Some(ou_id.clone());

        result.enter(Stage::ApplyPolicy);
        let policy_failure =
            |e: ApiError| StageFailure::new(Stage::ApplyPolicy, FailureReason::PolicyUnavailable, e);
        let policy = ensure_policy(self.api, &self.config.policy).map_err(policy_failure)?;
        attach_policy(self.api, &ou_id, &policy.id).map_err(policy_failure)?;
        result.policy_id = Some(policy.id);

        result.enter(Stage::CreateAndPlaceAccounts);
        result.accounts =
            create_and_place_accounts(self.api, &plan.to_create, &plan.root_id, &ou_id, self.config);
        let failed = result.failed_accounts().count();
        if failed > 0 {
            return Err(StageFailure::new(
                Stage::CreateAndPlaceAccounts,
                FailureReason::AccountsFailed,
                format!(
                    "{failed} of {} accounts were not provisioned",
                    result.accounts.len()
                ),
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Snapshot, StageFailure> {
        let extraction_failure =
            |e: &dyn std::fmt::Display| StageFailure::new(Stage::Extract, FailureReason::ExtractionFailed, e);

        let (root_id, parent) =
            resolve_parent(self.api, &self.config.organization).map_err(|e| extraction_failure(&e))?;

        let extraction = extract(self.api, &parent).map_err(|e| extraction_failure(&e))?;
        check_tree(&extraction.tree).map_err(|e| {
            StageFailure::new(Stage::Extract, FailureReason::ConsistencyViolation, e)
        })?;

        Ok(Snapshot {
            root_id,
            tree: extraction.tree,
            anomalies: extraction.anomalies,
        })
    }

    fn diff(&self, snapshot: Snapshot) -> Result<Plan, StageFailure> {
        let unavailable =
            |e: OrgSyncError| StageFailure::new(Stage::Diff, FailureReason::DesiredStateUnavailable, e);
        let semester = self.catalog.current_semester().map_err(unavailable)?.label();
        let desired = desired_state(self.catalog).map_err(unavailable)?;
        let to_create = generate_sync_diff(&desired, &snapshot.tree.sync_records());
        tracing::info!(
            semester = %semester,
            desired = desired.len(),
            to_create = to_create.len(),
            "computed sync diff"
        );

        Ok(Plan {
            root_id: snapshot.root_id,
            semester,
            tree: snapshot.tree,
            anomalies: snapshot.anomalies,
            desired,
            to_create,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
