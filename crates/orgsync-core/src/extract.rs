//! Walks the live organization hierarchy beneath a parent OU.
//!
//! Each direct child OU becomes an [`Iteration`]; each account inside it
//! becomes a [`SyncRecord`] built from its `project_slug` and
//! `project_semester` tags. Accounts missing either tag are skipped and
//! reported as [`TagAnomaly`] values so one mistagged account never aborts
//! the walk. A failed provider call, by contrast, aborts the whole
//! extraction: no partial tree is returned.

use crate::api::{tag_map, OrgApi};
use crate::error::{ApiError, ExtractionError};
use crate::types::{Iteration, OrgTree, SyncRecord, PROJECT_SEMESTER_TAG, PROJECT_SLUG_TAG};
use serde::Serialize;

pub const TREE_ROOT_NAME: &str = "root";

/// An account that could not be turned into a [`SyncRecord`]. It needs
/// manual remediation: it is neither diffed nor corrected automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAnomaly {
    pub account_id: String,
    pub email: String,
    pub iteration: String,
    pub missing_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub tree: OrgTree,
    pub anomalies: Vec<TagAnomaly>,
}

pub fn extract<A: OrgApi>(api: &A, parent_ou_id: &str) -> Result<Extraction, ExtractionError> {
    walk(api, parent_ou_id).map_err(|source| {
        tracing::error!("something went wrong extracting the AWS setup");
        tracing::debug!(error = %source, "extraction aborted");
        ExtractionError {
            parent_id: parent_ou_id.to_string(),
            source,
        }
    })
}

fn walk<A: OrgApi>(api: &A, parent_ou_id: &str) -> Result<Extraction, ApiError> {
    let mut tree = OrgTree::new(TREE_ROOT_NAME, parent_ou_id, Vec::new());
    let mut anomalies = Vec::new();

    for ou in api.list_organizational_units_for_parent(parent_ou_id)? {
        let mut members = Vec::new();

        for account in api.list_accounts_for_parent(&ou.id)? {
            let tags = tag_map(&api.list_tags_for_resource(&account.id)?);
            tracing::debug!(account = %account.id, tags = ?tags, "account tags");

            match (tags.get(PROJECT_SLUG_TAG), tags.get(PROJECT_SEMESTER_TAG)) {
                (Some(slug), Some(semester)) => {
                    members.push(SyncRecord::new(&account.email, slug, semester));
                }
                (slug, semester) => {
                    let missing_tags: Vec<String> = [
                        (PROJECT_SLUG_TAG, slug.is_none()),
                        (PROJECT_SEMESTER_TAG, semester.is_none()),
                    ]
                    .into_iter()
                    .filter(|(_, missing)| *missing)
                    .map(|(key, _)| key.to_string())
                    .collect();
                    tracing::warn!(
                        account = %account.id,
                        email = %account.email,
                        iteration = %ou.name,
                        missing = ?missing_tags,
                        "account is missing project tags; skipping it"
                    );
                    anomalies.push(TagAnomaly {
                        account_id: account.id.clone(),
                        email: account.email.clone(),
                        iteration: ou.name.clone(),
                        missing_tags,
                    });
                }
            }
        }

        tree.iterations.push(Iteration::new(ou.name, ou.id, members));
    }

    tracing::info!(
        parent = %parent_ou_id,
        iterations = tree.iterations.len(),
        members = tree.iterations.iter().map(|i| i.members.len()).sum::<usize>(),
        anomalies = anomalies.len(),
        "extracted organization tree"
    );
    Ok(Extraction { tree, anomalies })
}
