//! Invariants over an extracted [`OrgTree`], checked before the tree is
//! trusted for diffing.

use crate::error::ConsistencyViolation;
use crate::types::OrgTree;
use std::collections::HashMap;

/// Every member's `project_semester` tag must equal its iteration's name.
pub fn check_members_match_iteration_semester(
    tree: &OrgTree,
) -> Result<(), ConsistencyViolation> {
    let mistagged: Vec<String> = tree
        .iterations
        .iter()
        .flat_map(|iteration| {
            iteration
                .members
                .iter()
                .filter(move |m| m.project_semester != iteration.name)
                .map(|m| m.member_email.clone())
        })
        .collect();

    if mistagged.is_empty() {
        return Ok(());
    }
    tracing::error!(
        "there are members in a course iteration OU with an inconsistent course iteration tag"
    );
    tracing::debug!(emails = ?mistagged, "mistagged members");
    Err(ConsistencyViolation::MismatchedSemesterTags(mistagged))
}

/// Iteration names must be unique among the children of the tree root.
pub fn check_no_duplicate_iteration_names(tree: &OrgTree) -> Result<(), ConsistencyViolation> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for iteration in &tree.iterations {
        *counts.entry(iteration.name.as_str()).or_default() += 1;
    }

    // Report in first-seen order, each name once.
    let mut duplicates: Vec<String> = Vec::new();
    for iteration in &tree.iterations {
        if counts[iteration.name.as_str()] > 1 && !duplicates.contains(&iteration.name) {
            duplicates.push(iteration.name.clone());
        }
    }

    if duplicates.is_empty() {
        return Ok(());
    }
    tracing::error!("there are multiple course iteration OUs with the same name");
    tracing::debug!(names = ?duplicates, "duplicate iteration names");
    Err(ConsistencyViolation::DuplicateIterationNames(duplicates))
}

/// Run every tree check, stopping at the first violation.
pub fn check_tree(tree: &OrgTree) -> Result<(), ConsistencyViolation> {
    check_no_duplicate_iteration_names(tree)?;
    check_members_match_iteration_semester(tree)
}
