pub mod api;
pub mod checks;
pub mod config;
pub mod course;
pub mod error;
pub mod extract;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod preflight;
pub mod reconcile;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{OrgSyncError, Result};
