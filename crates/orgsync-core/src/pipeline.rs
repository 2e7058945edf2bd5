//! Outer boundary of a reconciliation run.
//!
//! [`run_pipeline`] never returns an error: every failure is folded into a
//! [`PipelineResult`] carrying the stage it happened in and a
//! machine-readable [`FailureReason`].

use crate::api::OrgApi;
use crate::config::Config;
use crate::course::CourseCatalog;
use crate::extract::TagAnomaly;
use crate::reconcile::{AccountReport, Reconciler};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Preconditions,
    Extract,
    Diff,
    EnsureIterationOu,
    ApplyPolicy,
    CreateAndPlaceAccounts,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Preconditions => "preconditions",
            Stage::Extract => "extract",
            Stage::Diff => "diff",
            Stage::EnsureIterationOu => "ensure_iteration_ou",
            Stage::ApplyPolicy => "apply_policy",
            Stage::CreateAndPlaceAccounts => "create_and_place_accounts",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureReason
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InvalidConfig,
    PreconditionFailed,
    ExtractionFailed,
    ConsistencyViolation,
    DesiredStateUnavailable,
    IterationOuUnavailable,
    PolicyUnavailable,
    AccountsFailed,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::InvalidConfig => "INVALID_CONFIG",
            FailureReason::PreconditionFailed => "PRECONDITION_FAILED",
            FailureReason::ExtractionFailed => "EXTRACTION_FAILED",
            FailureReason::ConsistencyViolation => "CONSISTENCY_VIOLATION",
            FailureReason::DesiredStateUnavailable => "DESIRED_STATE_UNAVAILABLE",
            FailureReason::IterationOuUnavailable => "ITERATION_OU_UNAVAILABLE",
            FailureReason::PolicyUnavailable => "POLICY_UNAVAILABLE",
            FailureReason::AccountsFailed => "ACCOUNTS_FAILED",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why and where a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed ({reason}): {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: FailureReason,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, reason: FailureReason, cause: impl fmt::Display) -> Self {
        Self {
            stage,
            reason,
            message: cause.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    /// `Done` on success, otherwise the stage that failed.
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_ou_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub anomalies: Vec<TagAnomaly>,
    pub accounts: Vec<AccountReport>,
}

impl PipelineResult {
    pub(crate) fn started() -> Self {
        Self {
            success: false,
            stage: Stage::Start,
            failure_reason: None,
            message: None,
            iteration_ou_id: None,
            policy_id: None,
            anomalies: Vec::new(),
            accounts: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        tracing::info!(stage = %stage, "pipeline stage");
        self.stage = stage;
    }

    pub(crate) fn finish(&mut self) {
        self.enter(Stage::Done);
        self.success = true;
    }

    pub(crate) fn fail(&mut self, failure: StageFailure) {
        tracing::error!(
            stage = %failure.stage,
            reason = %failure.reason,
            "pipeline failed: {}",
            failure.message
        );
        self.success = false;
        self.stage = failure.stage;
        self.failure_reason = Some(failure.reason);
        self.message = Some(failure.message);
    }

    pub fn failed_accounts(&self) -> impl Iterator<Item = &AccountReport> {
        self.accounts.iter().filter(|r| !r.outcome.is_success())
    }
}

/// Run one reconciliation pass and report its outcome.
pub fn run_pipeline<A, C>(api: &A, catalog: &C, config: &Config) -> PipelineResult
where
    A: OrgApi,
    C: CourseCatalog + ?Sized,
{
    Reconciler::new(api, catalog, config).run()
}
