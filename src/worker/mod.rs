pub mod launch;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use launch::{LaunchSpec, ProcessControl};

/// Failure of a single remote call to the worker.
///
/// `Disconnected` means the worker vanished mid call (connection severed,
/// end of stream). That is the expected aftermath of a crash or reset and
/// is swallowed by the callers. Anything else is `Failed` and gets recorded
/// before the caller degrades to its neutral result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("worker connection closed")]
    Disconnected,

    #[error("worker transport failure: `{0}`")]
    Failed(String),
}

/// Outcome of one evaluation on the worker. Exactly one tag per call.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    NoValue,
    Object(String),
    Boolean(bool),
    Number(String),
    Str(String),
    Char(char),
    Exception(String),
    UnexpectedFault(String),
    Busy,
}

/// Category a class path entry is registered under on the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPathKind {
    Project,
    BuildOutput,
    ProjectFiles,
    ExternalFiles,
    Extra,
}

/// Answer to an interpreter-selection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterStatus {
    pub changed: bool,
    pub busy: bool,
}

/// Live RPC endpoint of a connected worker.
///
/// A session is only valid while the lifecycle state that holds it is
/// current; callers obtain it per call and must not retain it across calls.
#[cfg_attr(test, mockall::automock)]
pub trait WorkerSession: Send + Sync {
    fn evaluate(&self, text: &str) -> Result<EvalOutcome, TransportError>;

    fn variable_to_text(&self, name: &str) -> Result<Option<String>, TransportError>;

    fn variable_type(&self, name: &str) -> Result<Option<String>, TransportError>;

    fn add_class_path(&self, kind: ClassPathKind, path: &Path) -> Result<(), TransportError>;

    fn class_path(&self) -> Result<Vec<PathBuf>, TransportError>;

    fn set_package_scope(&self, name: &str) -> Result<(), TransportError>;

    fn find_test_classes(
        &self,
        class_names: &[String],
        files: &[PathBuf],
    ) -> Result<Vec<String>, TransportError>;

    fn run_test_suite(&self) -> Result<(), TransportError>;

    fn add_interpreter(&self, name: &str) -> Result<(), TransportError>;

    fn remove_interpreter(&self, name: &str) -> Result<(), TransportError>;

    fn set_active_interpreter(&self, name: &str) -> Result<InterpreterStatus, TransportError>;

    fn set_default_interpreter(&self) -> Result<InterpreterStatus, TransportError>;

    fn set_private_access(&self, allow: bool) -> Result<(), TransportError>;
}
