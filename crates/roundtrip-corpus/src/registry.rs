//! Corpus registry: the external projects whose sources are round-tripped.
//!
//! The registry is a TOML document of `[[project]]` tables:
//!
//! ```toml
//! [[project]]
//! name = "toy-stdlib"
//! repo_uri = "https://example.invalid/toy-stdlib.git"
//! repo_ref = "v1.2.0"
//! exclude = ["vendor/**", "spec/fixtures/*.toy"]
//! ```
//!
//! Every field is required and no other field is accepted. A registry is
//! loaded once and handed to whoever needs it; nothing here is global.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const EMBEDDED: &str = include_str!("../corpus.toml");

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry {path}: cannot read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry {origin}: malformed: {message}")]
    Malformed { origin: String, message: String },

    #[error("registry {origin}: duplicate project name: {name}")]
    DuplicateProject { origin: String, name: String },

    #[error("registry {origin}: project {project}: invalid exclude glob {pattern:?}: {message}")]
    InvalidGlob {
        origin: String,
        project: String,
        pattern: String,
        message: String,
    },

    #[error("unknown project: {name} (known: {known})")]
    UnknownProject { name: String, known: String },
}

impl RegistryError {
    /// The registry itself is broken, as opposed to a bad lookup.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::UnknownProject { .. })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
    project: Vec<ProjectRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectRow {
    name: String,
    repo_uri: String,
    repo_ref: String,
    exclude: Vec<String>,
}

/// One external project. Immutable once loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub repo_uri: String,
    pub repo_ref: String,
    pub exclude: Vec<String>,
    #[serde(skip)]
    patterns: Vec<Pattern>,
}

impl ProjectDescriptor {
    /// Whether `relative_path` (relative to the checkout root) matches an
    /// exclusion glob.
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
    }
}

/// The loaded list of projects, in document order.
#[derive(Debug, Clone)]
pub struct Registry {
    origin: String,
    projects: Vec<ProjectDescriptor>,
}

impl Registry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// The registry compiled into the binary.
    pub fn embedded() -> Result<Self, RegistryError> {
        Self::from_toml_str(EMBEDDED, "<embedded>")
    }

    /// Parse a registry document; `origin` names it in error messages.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument =
            toml::from_str(text).map_err(|error| RegistryError::Malformed {
                origin: origin.to_string(),
                message: error.message().to_string(),
            })?;

        let mut seen = BTreeSet::new();
        let mut projects = Vec::with_capacity(document.project.len());
        for row in document.project {
            if !seen.insert(row.name.clone()) {
                return Err(RegistryError::DuplicateProject {
                    origin: origin.to_string(),
                    name: row.name,
                });
            }
            let patterns = row
                .exclude
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern).map_err(|error| RegistryError::InvalidGlob {
                        origin: origin.to_string(),
                        project: row.name.clone(),
                        pattern: pattern.clone(),
                        message: error.msg.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            projects.push(ProjectDescriptor {
                name: row.name,
                repo_uri: row.repo_uri,
                repo_ref: row.repo_ref,
                exclude: row.exclude,
                patterns,
            });
        }

        Ok(Self {
            origin: origin.to_string(),
            projects,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn projects(&self) -> &[ProjectDescriptor] {
        &self.projects
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|project| project.name.as_str())
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Result<&ProjectDescriptor, RegistryError> {
        self.projects
            .iter()
            .find(|project| project.name == name)
            .ok_or_else(|| RegistryError::UnknownProject {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Projects named by `names`, in the order given. No names selects
    /// every project in registry order.
    pub fn select<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<&ProjectDescriptor>, RegistryError> {
        if names.is_empty() {
            return Ok(self.projects.iter().collect());
        }
        names.iter().map(|name| self.get(name.as_ref())).collect()
    }
}
