use std::path::{Path, PathBuf};

/// Rendering rule applied to an evaluation result before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStyle {
    Object,
    Number,
    String,
    Character,
}

/// One failed or erroring test reported at the end of a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    pub name: String,
    pub message: String,
    pub was_error: bool,
}

/// Host side of the interactions surface. Receives evaluation results and
/// worker lifecycle announcements, and supplies console input on demand.
///
/// Listener slots start out with a no-op implementation and may be replaced
/// by the host at any time; the last write wins and notifiers tolerate the
/// listener changing between two calls.
pub trait InteractionsListener: Send + Sync {
    fn returned_void(&self);

    fn returned_result(&self, text: &str, style: ResultStyle);

    fn threw_exception(&self, message: &str);

    fn interpreter_ready(&self, working_dir: &Path);

    fn interpreter_resetting(&self);

    fn interpreter_wont_start(&self, cause: &str);

    /// Code evaluated on the worker called process-exit with this status.
    fn exit_called(&self, status: i32);

    fn stdout(&self, text: &str);

    fn stderr(&self, text: &str);

    /// Blocks the worker until the host supplies a line of input.
    fn console_input(&self) -> String;
}

/// Host side of the test-run surface.
pub trait TestRunListener: Send + Sync {
    fn runner_ready(&self);

    fn suite_started(&self, count: usize);

    fn test_started(&self, name: &str);

    fn test_ended(&self, name: &str, passed: bool, was_error: bool);

    fn suite_ended(&self, failures: &[TestFailure]);

    fn non_test_case(&self, is_run_all: bool);

    fn class_file_error(&self, details: &str);

    fn file_for_class(&self, class_name: &str) -> Option<PathBuf>;
}

/// Host side of the debugger integration.
pub trait DebugListener: Send + Sync {
    /// Port a remote debugger listens on, if one is attached.
    fn debug_port(&self) -> Option<u16>;
}

/// Default interactions listener: discards every notification.
pub struct NoopInteractions;

impl InteractionsListener for NoopInteractions {
    fn returned_void(&self) {}

    fn returned_result(&self, _text: &str, _style: ResultStyle) {}

    fn threw_exception(&self, _message: &str) {}

    fn interpreter_ready(&self, _working_dir: &Path) {}

    fn interpreter_resetting(&self) {}

    fn interpreter_wont_start(&self, _cause: &str) {}

    fn exit_called(&self, _status: i32) {}

    fn stdout(&self, _text: &str) {}

    fn stderr(&self, _text: &str) {}

    fn console_input(&self) -> String {
        // A worker blocked on input with nobody attached to answer is a
        // wiring error on the host side, not a recoverable condition.
        panic!("console input requested with no interactions listener attached");
    }
}

/// Default test-run listener: discards every notification.
pub struct NoopTestRun;

impl TestRunListener for NoopTestRun {
    fn runner_ready(&self) {}

    fn suite_started(&self, _count: usize) {}

    fn test_started(&self, _name: &str) {}

    fn test_ended(&self, _name: &str, _passed: bool, _was_error: bool) {}

    fn suite_ended(&self, _failures: &[TestFailure]) {}

    fn non_test_case(&self, _is_run_all: bool) {}

    fn class_file_error(&self, _details: &str) {}

    fn file_for_class(&self, _class_name: &str) -> Option<PathBuf> {
        None
    }
}

/// Default debug listener: no debugger attached.
pub struct NoopDebug;

impl DebugListener for NoopDebug {
    fn debug_port(&self) -> Option<u16> {
        None
    }
}
