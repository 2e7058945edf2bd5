use crate::error::OrgSyncError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag key holding the project slug of a member account.
pub const PROJECT_SLUG_TAG: &str = "project_slug";
/// Tag key holding the canonical semester label of a member account.
pub const PROJECT_SEMESTER_TAG: &str = "project_semester";

// ---------------------------------------------------------------------------
// SyncRecord
// ---------------------------------------------------------------------------

/// One member account's association to a project team in a semester.
///
/// Equality is structural over all three fields. `PartialEq` exists only
/// against another `SyncRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRecord {
    pub member_email: String,
    pub project_slug: String,
    pub project_semester: String,
}

impl SyncRecord {
    pub fn new(
        member_email: impl Into<String>,
        project_slug: impl Into<String>,
        project_semester: impl Into<String>,
    ) -> Self {
        Self {
            member_email: member_email.into(),
            project_slug: project_slug.into(),
            project_semester: project_semester.into(),
        }
    }

    /// Account name used when the record is provisioned.
    pub fn account_name(&self) -> String {
        format!("{}_{}", self.project_slug, self.project_semester)
    }
}

impl fmt::Display for SyncRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} / {})",
            self.member_email, self.project_slug, self.project_semester
        )
    }
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// A course iteration OU and the tagged member accounts found inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub name: String,
    pub ou_id: String,
    pub members: Vec<SyncRecord>,
}

impl Iteration {
    pub fn new(name: impl Into<String>, ou_id: impl Into<String>, members: Vec<SyncRecord>) -> Self {
        Self {
            name: name.into(),
            ou_id: ou_id.into(),
            members,
        }
    }
}

// ---------------------------------------------------------------------------
// OrgTree
// ---------------------------------------------------------------------------

/// Snapshot of the hierarchy beneath a parent OU at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgTree {
    pub name: String,
    pub ou_id: String,
    pub iterations: Vec<Iteration>,
}

impl OrgTree {
    pub fn new(name: impl Into<String>, ou_id: impl Into<String>, iterations: Vec<Iteration>) -> Self {
        Self {
            name: name.into(),
            ou_id: ou_id.into(),
            iterations,
        }
    }

    /// All members across all iterations, in iteration order then member order.
    pub fn sync_records(&self) -> Vec<SyncRecord> {
        self.iterations
            .iter()
            .flat_map(|iteration| iteration.members.iter().cloned())
            .collect()
    }

    pub fn find_iteration(&self, name: &str) -> Option<&Iteration> {
        self.iterations.iter().find(|i| i.name == name)
    }
}

// ---------------------------------------------------------------------------
// Semester
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Fall,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A course semester. Its `Display` form ("Spring 2023") is the canonical
/// label used for OU names and the `project_semester` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Semester {
    pub year: i32,
    pub season: Season,
}

impl Semester {
    pub fn new(year: i32, season: Season) -> Self {
        Self { year, season }
    }

    /// The semester running on `date`.
    ///
    /// February through July is spring; August through December is fall of
    /// the same year, and January still belongs to the previous fall.
    pub fn containing(date: NaiveDate) -> Self {
        match date.month() {
            1 => Self::new(date.year() - 1, Season::Fall),
            2..=7 => Self::new(date.year(), Season::Spring),
            _ => Self::new(date.year(), Season::Fall),
        }
    }

    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

impl std::str::FromStr for Semester {
    type Err = OrgSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OrgSyncError::InvalidSemester(s.to_string());
        let mut parts = s.split_whitespace();
        let (Some(season), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let season = match season.to_ascii_lowercase().as_str() {
            "spring" => Season::Spring,
            "fall" => Season::Fall,
            _ => return Err(invalid()),
        };
        let year: i32 = year.parse().map_err(|_| invalid())?;
        Ok(Semester::new(year, season))
    }
}

impl Serialize for Semester {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Semester {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
