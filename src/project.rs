//! Per-project report configuration.
//!
//! The bot's on-wiki JSON config maps each project page to its assessment
//! project name, report size and report page:
//!
//! ```json
//! {
//!   "description": "free text, ignored",
//!   "Wikipedia:WikiProject Medicine": {
//!     "Name": "Medicine",
//!     "Limit": 1000,
//!     "Report": "Wikipedia:WikiProject Medicine/Popular pages"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Raw entry as written on-wiki; every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectEntry {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Limit")]
    pub limit: Option<i64>,
    #[serde(rename = "Report")]
    pub report: Option<String>,
}

/// A validated project entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project page the entry is keyed by.
    pub key: String,
    pub name: String,
    pub limit: i64,
    pub report: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProjectConfigError {
    #[error("incomplete config for {key}: missing {field}")]
    Incomplete { key: String, field: &'static str },
    #[error("{key} is configured to write to the mainspace")]
    MainspaceReport { key: String },
    #[error("{key} has invalid limit {limit}")]
    InvalidLimit { key: String, limit: i64 },
    #[error("no config entry for {0}")]
    Missing(String),
}

impl ProjectEntry {
    pub fn validate(self, key: &str) -> Result<ProjectConfig, ProjectConfigError> {
        let incomplete = |field: &'static str| ProjectConfigError::Incomplete {
            key: key.to_owned(),
            field,
        };
        let name = self.name.ok_or_else(|| incomplete("Name"))?;
        let limit = self.limit.ok_or_else(|| incomplete("Limit"))?;
        let report = self.report.ok_or_else(|| incomplete("Report"))?;

        // Reports must live outside the mainspace; a namespace prefix is
        // the only thing distinguishing them here.
        if !report.find(':').is_some_and(|i| i > 0) {
            return Err(ProjectConfigError::MainspaceReport {
                key: key.to_owned(),
            });
        }
        if limit <= 0 {
            return Err(ProjectConfigError::InvalidLimit {
                key: key.to_owned(),
                limit,
            });
        }

        Ok(ProjectConfig {
            key: key.to_owned(),
            name,
            limit,
            report,
        })
    }
}

/// All project entries from a config document, in document order.
///
/// The `description` key is dropped. Entries that are not objects are logged
/// and skipped rather than failing the whole document.
pub fn parse_projects(json: &str) -> Result<IndexMap<String, ProjectEntry>> {
    let raw: IndexMap<String, serde_json::Value> =
        serde_json::from_str(json).context("project config is not a JSON object")?;

    let mut entries = IndexMap::with_capacity(raw.len());
    for (key, value) in raw {
        if key == "description" {
            continue;
        }
        match serde_json::from_value::<ProjectEntry>(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => warn!(project = %key, error = %e, "Skipping unreadable project entry"),
        }
    }
    Ok(entries)
}

/// Load the config file and validate the entry for `key`.
pub fn load_project(path: &Path, key: &str) -> Result<ProjectConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project config {}", path.display()))?;
    let mut projects = parse_projects(&text)?;
    let entry = projects
        .shift_remove(key)
        .ok_or_else(|| ProjectConfigError::Missing(key.to_owned()))?;
    Ok(entry.validate(key)?)
}
