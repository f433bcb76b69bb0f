//! Verification of one registered project.
//!
//! Checkout and verification of a project are one exclusive section: the
//! checkout directory is reset in place and then read by the driver's
//! workers. Projects never share a directory.

use crate::driver::{Driver, DriverError};
use crate::registry::ProjectDescriptor;
use roundtrip_git::{GitClient, GitError};
use roundtrip_kernel::{
    FailureRecord, SourceGenerator, SourceParser, SourceText, TOY_EXTENSION, Validation,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("project {name}: no checkout at {}", path.display())]
    MissingCheckout { name: String, path: PathBuf },

    #[error("project {name}: cannot walk {}: {message}", path.display())]
    Walk {
        name: String,
        path: PathBuf,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub driver: Driver,
    pub git: GitClient,
    /// Fetch and reset the checkout first. When false an existing tree is
    /// verified as found.
    pub checkout: bool,
    pub extension: String,
    /// Print each failure report to stdout.
    pub print_reports: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            git: GitClient::default(),
            checkout: true,
            extension: TOY_EXTENSION.to_string(),
            print_reports: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectOutcome {
    pub name: String,
    /// Commit the checkout was verified at, when git was used.
    pub head: Option<String>,
    pub total: usize,
    pub failures: Vec<FailureRecord>,
}

impl ProjectOutcome {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Directory a project is checked out into.
pub fn checkout_dir(workdir: &Path, project: &ProjectDescriptor) -> PathBuf {
    workdir.join(&project.name)
}

/// Check out `project` under `workdir`, round-trip every source file and
/// print the report of each failure.
pub fn verify_project<P, G>(
    project: &ProjectDescriptor,
    workdir: &Path,
    options: &VerifyOptions,
    parser: &P,
    generator: &G,
) -> Result<ProjectOutcome, ProjectError>
where
    P: SourceParser + Sync + ?Sized,
    G: SourceGenerator + Sync + ?Sized,
{
    let root = checkout_dir(workdir, project);
    let head = if options.checkout {
        let snapshot = options
            .git
            .checkout(&project.repo_uri, &project.repo_ref, &root)?;
        Some(snapshot.head)
    } else if root.is_dir() {
        None
    } else {
        return Err(ProjectError::MissingCheckout {
            name: project.name.clone(),
            path: root,
        });
    };

    let files = source_files(project, &root, &options.extension)?;
    info!(project = %project.name, files = files.len(), "verifying");

    let state = options.driver.run(&files, |relative| {
        let path = root.join(relative);
        let bytes = std::fs::read(&path)
            .map_err(|error| format!("cannot read {}: {error}", path.display()))?;
        let identification = format!("{}/{}", project.name, relative.display());
        let validation =
            Validation::from_source(identification, SourceText::detect(bytes), parser, generator);
        Ok(validation.failure_record())
    })?;

    if options.print_reports {
        for failure in &state.errors {
            println!("{}", failure.report);
        }
    }
    if !state.errors.is_empty() {
        warn!(project = %project.name, failures = state.errors.len(), "round-trip failures");
    }

    Ok(ProjectOutcome {
        name: project.name.clone(),
        head,
        total: state.total,
        failures: state.errors,
    })
}

/// Source files under `root`, relative to it, sorted, with exclusions dropped.
pub fn source_files(
    project: &ProjectDescriptor,
    root: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, ProjectError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|error| ProjectError::Walk {
            name: project.name.clone(),
            path: root.to_path_buf(),
            message: error.to_string(),
        })?;
        if !entry.file_type().is_file()
            || entry.path().extension().is_none_or(|ext| ext != extension)
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if project.is_excluded(relative) {
            continue;
        }
        files.push(relative.to_path_buf());
    }
    files.sort();
    Ok(files)
}
