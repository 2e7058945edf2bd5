//! Desired state, as seen from the course database.
//!
//! The pipeline only needs two things from the course side: the current
//! semester and the contact address of every project team in it. Those are
//! behind [`CourseCatalog`]; [`Roster`] implements it over a YAML export.

use crate::error::{OrgSyncError, Result};
use crate::paths;
use crate::types::{Semester, SyncRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContact {
    pub slug: String,
    pub email: String,
}

pub trait CourseCatalog {
    fn current_semester(&self) -> Result<Semester>;

    /// Projects of the current semester that have a contact address.
    fn project_contacts(&self) -> Result<Vec<ProjectContact>>;
}

/// Build the desired state: one record per contactable project this semester.
pub fn desired_state<C: CourseCatalog + ?Sized>(catalog: &C) -> Result<Vec<SyncRecord>> {
    let semester = catalog.current_semester()?.label();
    let records: Vec<SyncRecord> = catalog
        .project_contacts()?
        .into_iter()
        .map(|c| SyncRecord::new(c.email, c.slug, semester.as_str()))
        .collect();
    tracing::debug!(semester = %semester, records = ?records, "desired state");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterProject {
    pub slug: String,
    pub semester: Semester,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailing_list: Option<String>,
}

/// Export of the course database's projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Defaults to the semester running today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_semester: Option<Semester>,
    #[serde(default)]
    pub projects: Vec<RosterProject>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(OrgSyncError::RosterNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let roster: Roster = serde_yaml::from_str(&data)?;
        for project in &roster.projects {
            paths::validate_slug(&project.slug)?;
        }
        Ok(roster)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }
}

impl CourseCatalog for Roster {
    fn current_semester(&self) -> Result<Semester> {
        Ok(self.current_semester.unwrap_or_else(Semester::current))
    }

    fn project_contacts(&self) -> Result<Vec<ProjectContact>> {
        let current = self.current_semester()?;
        Ok(self
            .projects
            .iter()
            .filter(|p| p.semester == current)
            .filter_map(|p| {
                let email = p.mailing_list.as_deref().map(str::trim)?;
                (!email.is_empty()).then(|| ProjectContact {
                    slug: p.slug.clone(),
                    email: email.to_string(),
                })
            })
            .collect())
    }
}
