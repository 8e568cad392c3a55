use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// The two equivalent ways of addressing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryRef {
    Name { owner: String, name: String },
    Id(u64),
}

impl RepositoryRef {
    pub fn by_name(owner: impl Into<String>, name: impl Into<String>) -> Self {
        RepositoryRef::Name {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn by_id(id: u64) -> Self {
        RepositoryRef::Id(id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RepositoryRef::Name { owner, name } => {
                check_segment("owner", owner)?;
                check_segment("name", name)
            }
            RepositoryRef::Id(0) => Err(ValidationError::new("repository id must be positive")),
            RepositoryRef::Id(_) => Ok(()),
        }
    }

    /// Path of the repository resource relative to the API root.
    pub fn path(&self) -> String {
        match self {
            RepositoryRef::Name { owner, name } => format!("repos/{owner}/{name}"),
            RepositoryRef::Id(id) => format!("repositories/{id}"),
        }
    }
}

/// Each of owner and name must stay a single path segment.
fn check_segment(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("repository {field} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(ValidationError::new(format!("repository {field} '{value}' is not allowed")));
    }
    if let Some(c) = value
        .chars()
        .find(|&c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::new(format!(
            "repository {field} '{value}' contains invalid character {c:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryRef::Name { owner, name } => write!(f, "{owner}/{name}"),
            RepositoryRef::Id(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RepositoryRef {
    type Err = ValidationError;

    /// Accepts `owner/name` or a decimal repository id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u64>() {
            let repo = RepositoryRef::Id(id);
            repo.validate()?;
            return Ok(repo);
        }

        let Some((owner, name)) = s.split_once('/') else {
            return Err(ValidationError::new(format!(
                "invalid repository '{s}', expected owner/name or a numeric id"
            )));
        };
        if name.contains('/') {
            return Err(ValidationError::new(format!(
                "invalid repository '{s}', expected owner/name or a numeric id"
            )));
        }

        let repo = RepositoryRef::by_name(owner, name);
        repo.validate()?;
        Ok(repo)
    }
}
