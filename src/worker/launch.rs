use std::path::PathBuf;

use ulid::Ulid;

/// Everything the process-supervision layer needs to launch one worker.
///
/// A fresh spec is assembled per spawn attempt and carries its own launch
/// id so retries can be told apart in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub id: String,
    pub class_path: Vec<PathBuf>,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(class_path: Vec<PathBuf>, working_dir: PathBuf, args: Vec<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            class_path,
            working_dir,
            args,
        }
    }
}

/// Interface to the external process-supervision layer.
///
/// `spawn` is fire and forget: failures come back asynchronously as a
/// worker-failed-to-start event, success as worker-connected. `quit` asks
/// the current worker to terminate; termination is observed later as a
/// worker-quit event. `release` frees whatever the layer holds once the
/// supervisor is disposed.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessControl: Send + Sync {
    fn spawn(&self, spec: LaunchSpec);

    fn quit(&self);

    fn release(&self);
}
