//! Corpus verification for roundtrip.
//!
//! ```text
//! Registry ──select──▶ ProjectDescriptor ──verify_project──▶ ProjectOutcome
//!                                │
//!                       GitClient::checkout
//!                                │
//!                       source_files (globs)
//!                                │
//!                 Driver::run ── workers ── Validation ──▶ Sink
//! ```
//!
//! The registry is an ordinary value: load it once, pass it down.

pub mod driver;
pub mod project;
pub mod registry;
pub mod sink;

pub use driver::{Driver, DriverError};
pub use project::{
    ProjectError, ProjectOutcome, VerifyOptions, checkout_dir, source_files, verify_project,
};
pub use registry::{ProjectDescriptor, Registry, RegistryError};
pub use sink::{Response, Sink, SinkState, WorkerFault};
