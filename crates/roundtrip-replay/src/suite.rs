//! External grammar suites.
//!
//! An [`ExternalSuite`] is a named set of test methods, each of which calls
//! into an [`Assertions`] implementation. [`DocumentSuite`] reads suites
//! written down as JSON:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "tests": [
//!     { "name": "test_int",
//!       "calls": [
//!         { "assert_parses": { "node": "(int 42)", "source": "42" } },
//!         { "with_versions": { "versions": ["1.0"], "calls": [ ... ] } }
//!       ] }
//!   ]
//! }
//! ```

use crate::adapter::{Assertions, Versions};
use roundtrip_git::{GitClient, GitError};
use roundtrip_kernel::{Node, Tree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Where the canonical toy grammar suite lives.
pub const UPSTREAM_SUITE_URI: &str = "https://github.com/roundtrip/toy-grammar-suite.git";

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("suite {}: cannot read: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("suite {}: invalid document: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("suite test {test} defined twice")]
    DuplicateTest { test: String },

    #[error("suite test {test}: invalid node {node:?}: {message}")]
    InvalidNode {
        test: String,
        node: String,
        message: String,
    },

    #[error("suite has no test named {0}")]
    UnknownTest(String),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// A suite of grammar tests driven through [`Assertions`].
pub trait ExternalSuite {
    /// Test method names, in definition order.
    fn test_names(&self) -> Vec<String>;

    fn run_test(&self, name: &str, assertions: &mut dyn Assertions) -> Result<(), SuiteError>;
}

/// One recorded assertion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    AssertParses {
        node: String,
        source: String,
        #[serde(default)]
        versions: Versions,
    },
    AssertDiagnoses {
        diagnostic: String,
        source: String,
        #[serde(default)]
        versions: Versions,
    },
    AssertSourceMaps {
        source: String,
        #[serde(default)]
        versions: Versions,
    },
    WithVersions {
        versions: Versions,
        calls: Vec<Call>,
    },
    SetBuilderAttribute {
        name: String,
        value: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestDocument {
    pub name: String,
    pub calls: Vec<Call>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteDocument {
    pub version: String,
    pub tests: Vec<TestDocument>,
}

/// A suite backed by one or more JSON documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentSuite {
    versions: Vec<String>,
    order: Vec<String>,
    tests: BTreeMap<String, Vec<Call>>,
}

impl DocumentSuite {
    /// Load a single document, or every `*.json` under a directory in path order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SuiteError> {
        let path = path.as_ref();
        let mut suite = Self::default();
        for file in document_paths(path)? {
            let text = std::fs::read_to_string(&file).map_err(|source| SuiteError::Io {
                path: file.clone(),
                source,
            })?;
            let document: SuiteDocument =
                serde_json::from_str(&text).map_err(|source| SuiteError::Document {
                    path: file.clone(),
                    source,
                })?;
            debug!(path = %file.display(), tests = document.tests.len(), "suite document");
            suite.add(document)?;
        }
        Ok(suite)
    }

    pub fn from_document(document: SuiteDocument) -> Result<Self, SuiteError> {
        let mut suite = Self::default();
        suite.add(document)?;
        Ok(suite)
    }

    fn add(&mut self, document: SuiteDocument) -> Result<(), SuiteError> {
        if !self.versions.contains(&document.version) {
            self.versions.push(document.version);
        }
        for test in document.tests {
            if self.tests.contains_key(&test.name) {
                return Err(SuiteError::DuplicateTest { test: test.name });
            }
            self.order.push(test.name.clone());
            self.tests.insert(test.name, test.calls);
        }
        Ok(())
    }

    /// Grammar versions declared by the loaded documents.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }
}

impl ExternalSuite for DocumentSuite {
    fn test_names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn run_test(&self, name: &str, assertions: &mut dyn Assertions) -> Result<(), SuiteError> {
        let calls = self
            .tests
            .get(name)
            .ok_or_else(|| SuiteError::UnknownTest(name.to_string()))?;
        replay_calls(name, calls, assertions)
    }
}

fn replay_calls(
    test: &str,
    calls: &[Call],
    assertions: &mut dyn Assertions,
) -> Result<(), SuiteError> {
    for call in calls {
        match call {
            Call::AssertParses {
                node,
                source,
                versions,
            } => {
                let parsed = Node::parse_sexp(node).map_err(|message| SuiteError::InvalidNode {
                    test: test.to_string(),
                    node: node.clone(),
                    message,
                })?;
                assertions.assert_parses(Tree::from(parsed), source, versions);
            }
            Call::AssertDiagnoses {
                diagnostic,
                source,
                versions,
            } => assertions.assert_diagnoses(diagnostic, source, versions),
            Call::AssertSourceMaps { source, versions } => {
                assertions.assert_source_maps(source, versions);
            }
            Call::WithVersions { versions, calls } => {
                assertions.with_versions(versions, &mut |inner| replay_calls(test, calls, inner))?;
            }
            Call::SetBuilderAttribute { name, value } => {
                assertions.set_builder_attribute(name, *value);
            }
        }
    }
    Ok(())
}

fn document_paths(path: &Path) -> Result<Vec<PathBuf>, SuiteError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|error| SuiteError::Io {
            path: path.to_path_buf(),
            source: error.into(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Make sure the upstream suite is present under `workdir`, checking it out
/// at the tag for `version` (`v{version}`) when it is not.
pub fn fetch_upstream(
    git: &GitClient,
    uri: &str,
    workdir: &Path,
    version: &str,
) -> Result<PathBuf, SuiteError> {
    let path = workdir.join(format!("toy-grammar-suite-{version}"));
    if path.is_dir() {
        debug!(path = %path.display(), "upstream suite already present");
        return Ok(path);
    }
    let tag = format!("v{version}");
    info!(uri, tag = %tag, "fetching upstream suite");
    git.checkout(uri, &tag, &path)?;
    Ok(path)
}
