use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, trace, warn};
use ulid::Ulid;

use crate::config::SupervisorConfig;
use crate::listener::{
    DebugListener, InteractionsListener, NoopDebug, NoopInteractions, NoopTestRun, TestFailure,
    TestRunListener,
};
use crate::supervisor::cell::StateCell;
use crate::supervisor::dispatch::dispatch;
use crate::supervisor::error::SupervisorError;
use crate::supervisor::state::Lifecycle;
use crate::worker::{
    ClassPathKind, InterpreterStatus, LaunchSpec, ProcessControl, TransportError, WorkerSession,
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Supervises one out-of-process worker and exposes its capabilities behind
/// a crash-tolerant surface.
///
/// All coordination is optimistic compare-and-set on a single [`StateCell`];
/// whenever a CAS loses a race the operation re-reads and delegates to
/// whatever state is current, so the visible state history is one linear
/// sequence with no lost updates.
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Fresh
///     Fresh --> Starting: start / restart
///     Starting --> FreshRunning: worker connected
///     Starting --> Starting: spawn failed below bound
///     Starting --> Fresh: spawn failed at bound
///     FreshRunning --> Running: first real use
///     FreshRunning --> Restarting: forced restart / unsolicited quit
///     FreshRunning --> Stopping: stop
///     Running --> Restarting: restart / unsolicited quit
///     Running --> Stopping: stop
///     Restarting --> Fresh: worker quit, respawns
///     Restarting --> Stopping: stop
///     Stopping --> Restarting: restart
///     Stopping --> Fresh: worker quit
///     Fresh --> Disposed: dispose
///     Restarting --> Disposed: dispose
///     Stopping --> Disposed: dispose
///     Disposed --> [*]
/// ```
pub struct Supervisor<C> {
    id: String,
    cell: StateCell<Lifecycle>,
    control: C,
    config: SupervisorConfig,
    interactions: RwLock<Arc<dyn InteractionsListener>>,
    tests: RwLock<Arc<dyn TestRunListener>>,
    debug: RwLock<Arc<dyn DebugListener>>,
    allow_assertions: AtomicBool,
    allow_private_access: AtomicBool,
    class_path: RwLock<Vec<PathBuf>>,
    working_dir: RwLock<PathBuf>,
    extra_args: RwLock<Vec<String>>,
}

impl<C> Supervisor<C>
where
    C: ProcessControl,
{
    /// Builds an inert supervisor in the fresh state. The startup class path
    /// defaults to the `CLASSPATH` environment variable, the working
    /// directory to the current one; both are adjustable before `start`.
    pub fn new(control: C, config: SupervisorConfig) -> Self {
        let class_path = env::var_os("CLASSPATH")
            .map(|raw| env::split_paths(&raw).collect())
            .unwrap_or_default();
        let working_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            id: Ulid::new().to_string(),
            cell: StateCell::new(Lifecycle::Fresh),
            control,
            allow_assertions: AtomicBool::new(config.allow_assertions),
            allow_private_access: AtomicBool::new(config.allow_private_access),
            extra_args: RwLock::new(config.extra_args()),
            config,
            interactions: RwLock::new(Arc::new(NoopInteractions)),
            tests: RwLock::new(Arc::new(NoopTestRun)),
            debug: RwLock::new(Arc::new(NoopDebug)),
            class_path: RwLock::new(class_path),
            working_dir: RwLock::new(working_dir),
        }
    }

    ////////////////////////////////////////////////////////////////////////
    //// Lifecycle operations

    /// Requests a worker. Returns once the spawn has been triggered (or was
    /// already in flight); readiness is announced later through the
    /// interactions listener.
    pub fn start(&self) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Fresh => {
                    if self.advance(&state, Lifecycle::Starting { failures: 0 }) {
                        self.spawn_worker();
                        return Ok(());
                    }
                }
                Lifecycle::Starting { .. }
                | Lifecycle::FreshRunning { .. }
                | Lifecycle::Running { .. }
                | Lifecycle::Restarting => return Ok(()),
                Lifecycle::Stopping => {
                    self.await_change(&state)?;
                }
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
            }
        }
    }

    /// Shuts the current worker down with no replacement.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Fresh | Lifecycle::Stopping => return Ok(()),
                Lifecycle::Starting { .. } => {
                    self.await_change(&state)?;
                }
                Lifecycle::FreshRunning { .. } | Lifecycle::Running { .. } => {
                    if self.advance(&state, Lifecycle::Stopping) {
                        info!(supervisor = %self.id, "asking worker to quit");
                        self.control.quit();
                        return Ok(());
                    }
                }
                Lifecycle::Restarting => {
                    // quit was already signalled when Restarting was entered
                    if self.advance(&state, Lifecycle::Stopping) {
                        return Ok(());
                    }
                }
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
            }
        }
    }

    /// Replaces the current worker with a fresh one. With `force` unset, a
    /// worker that was never used is kept and only re-announced as ready.
    pub fn restart(&self, force: bool) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Fresh => return self.start(),
                Lifecycle::Starting { .. } => {
                    self.await_change(&state)?;
                }
                Lifecycle::FreshRunning { .. } if !force => {
                    self.interactions().interpreter_ready(&self.working_dir());
                    return Ok(());
                }
                Lifecycle::FreshRunning { .. } | Lifecycle::Running { .. } => {
                    if self.advance(&state, Lifecycle::Restarting) {
                        self.interactions().interpreter_resetting();
                        info!(supervisor = %self.id, "asking worker to quit for restart");
                        self.control.quit();
                        return Ok(());
                    }
                }
                Lifecycle::Restarting => return Ok(()),
                Lifecycle::Stopping => {
                    if self.advance(&state, Lifecycle::Restarting) {
                        return Ok(());
                    }
                }
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
            }
        }
    }

    /// Stops any worker and renders the supervisor permanently inert.
    /// Idempotent; disposing twice is safe.
    pub fn dispose(&self) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Fresh | Lifecycle::Restarting | Lifecycle::Stopping => {
                    if self.advance(&state, Lifecycle::Disposed) {
                        info!(supervisor = %self.id, "disposed, releasing supervision resources");
                        self.control.release();
                        return Ok(());
                    }
                }
                Lifecycle::Starting { .. }
                | Lifecycle::FreshRunning { .. }
                | Lifecycle::Running { .. } => {
                    self.stop()?;
                }
                Lifecycle::Disposed => return Ok(()),
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    //// Worker lifecycle events, delivered by the process-supervision layer

    /// A bidirectional channel to a newly spawned worker is established.
    pub fn worker_connected(
        &self,
        session: Arc<dyn WorkerSession>,
    ) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Starting { .. } => {
                    let next = Lifecycle::FreshRunning {
                        session: Arc::clone(&session),
                    };
                    if self.advance(&state, next) {
                        let allow = self.allow_private_access.load(Ordering::Relaxed);
                        if let Err(err) = session.set_private_access(allow) {
                            self.report_transport("set-private-access", &err);
                        }
                        info!(supervisor = %self.id, "worker connected");
                        self.interactions().interpreter_ready(&self.working_dir());
                        self.tests().runner_ready();
                        return Ok(());
                    }
                }
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
                other => {
                    return Err(SupervisorError::UnexpectedEvent {
                        event: "worker-connected",
                        state: other.name(),
                    })
                }
            }
        }
    }

    /// The worker process terminated, for any reason.
    pub fn worker_quit(&self, status: i32) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::FreshRunning { .. } | Lifecycle::Running { .. } => {
                    // unsolicited quit: evaluated code exited or the worker
                    // crashed; announce it, then fall through to respawn
                    if self.advance(&state, Lifecycle::Restarting) {
                        warn!(supervisor = %self.id, status, "worker quit unsolicited");
                        let interactions = self.interactions();
                        interactions.exit_called(status);
                        interactions.interpreter_resetting();
                    }
                }
                Lifecycle::Restarting => {
                    if self.advance(&state, Lifecycle::Fresh) {
                        return self.start();
                    }
                }
                Lifecycle::Stopping => {
                    if self.advance(&state, Lifecycle::Fresh) {
                        info!(supervisor = %self.id, status, "worker quit, supervisor idle");
                        return Ok(());
                    }
                }
                Lifecycle::Disposed => return Ok(()),
                other => {
                    return Err(SupervisorError::UnexpectedEvent {
                        event: "worker-quit",
                        state: other.name(),
                    })
                }
            }
        }
    }

    /// The spawn or handshake failed before a connection was established.
    pub fn worker_failed_to_start(&self, cause: &str) -> Result<(), SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Starting { failures } => {
                    let count = failures + 1;
                    if count < self.config.max_startup_failures {
                        if self.advance(&state, Lifecycle::Starting { failures: count }) {
                            warn!(supervisor = %self.id, attempt = count + 1, cause, "worker failed to start, retrying");
                            self.spawn_worker();
                            return Ok(());
                        }
                    } else if self.advance(&state, Lifecycle::Fresh) {
                        error!(supervisor = %self.id, cause, "worker failed to start, giving up");
                        self.interactions().interpreter_wont_start(cause);
                        return Ok(());
                    }
                }
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
                other => {
                    return Err(SupervisorError::UnexpectedEvent {
                        event: "worker-failed-to-start",
                        state: other.name(),
                    })
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    //// RPC-delegating operations

    /// Evaluates `text` on the worker and dispatches the outcome to the
    /// interactions listener. Returns whether a worker handled the call.
    pub fn evaluate(&self, text: &str) -> Result<bool, SupervisorError> {
        let Some(session) = self.session(true)? else {
            return Ok(false);
        };
        let outcome = match session.evaluate(text) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_transport("evaluate", &err);
                return Ok(false);
            }
        };
        dispatch(outcome, self.interactions().as_ref())?;
        Ok(true)
    }

    pub fn variable_to_text(&self, name: &str) -> Result<Option<String>, SupervisorError> {
        self.delegate(false, "variable-to-text", || None, |s| s.variable_to_text(name))
    }

    pub fn variable_type(&self, name: &str) -> Result<Option<String>, SupervisorError> {
        self.delegate(false, "variable-type", || None, |s| s.variable_type(name))
    }

    pub fn add_class_path(
        &self,
        kind: ClassPathKind,
        path: &Path,
    ) -> Result<bool, SupervisorError> {
        self.delegate(false, "add-class-path", || false, |s| {
            s.add_class_path(kind, path).map(|()| true)
        })
    }

    pub fn class_path(&self) -> Result<Option<Vec<PathBuf>>, SupervisorError> {
        self.delegate(false, "class-path", || None, |s| s.class_path().map(Some))
    }

    pub fn set_package_scope(&self, name: &str) -> Result<bool, SupervisorError> {
        self.delegate(false, "set-package-scope", || false, |s| {
            s.set_package_scope(name).map(|()| true)
        })
    }

    pub fn find_test_classes(
        &self,
        class_names: &[String],
        files: &[PathBuf],
    ) -> Result<Option<Vec<String>>, SupervisorError> {
        self.delegate(false, "find-test-classes", || None, |s| {
            s.find_test_classes(class_names, files).map(Some)
        })
    }

    /// Runs the test suite previously located with `find_test_classes`.
    /// Counts as real use of the worker.
    pub fn run_test_suite(&self) -> Result<bool, SupervisorError> {
        self.delegate(true, "run-test-suite", || false, |s| {
            s.run_test_suite().map(|()| true)
        })
    }

    pub fn add_interpreter(&self, name: &str) -> Result<bool, SupervisorError> {
        self.delegate(false, "add-interpreter", || false, |s| {
            s.add_interpreter(name).map(|()| true)
        })
    }

    pub fn remove_interpreter(&self, name: &str) -> Result<bool, SupervisorError> {
        self.delegate(false, "remove-interpreter", || false, |s| {
            s.remove_interpreter(name).map(|()| true)
        })
    }

    pub fn set_active_interpreter(
        &self,
        name: &str,
    ) -> Result<Option<InterpreterStatus>, SupervisorError> {
        self.delegate(false, "set-active-interpreter", || None, |s| {
            s.set_active_interpreter(name).map(Some)
        })
    }

    pub fn set_default_interpreter(&self) -> Result<Option<InterpreterStatus>, SupervisorError> {
        self.delegate(false, "set-default-interpreter", || None, |s| {
            s.set_default_interpreter().map(Some)
        })
    }

    /// Records the privileged-access flag for future workers and pushes it
    /// to the current one, if any.
    pub fn set_private_access(&self, allow: bool) -> Result<bool, SupervisorError> {
        self.allow_private_access.store(allow, Ordering::Relaxed);
        self.delegate(false, "set-private-access", || false, |s| {
            s.set_private_access(allow).map(|()| true)
        })
    }

    ////////////////////////////////////////////////////////////////////////
    //// Host-side configuration

    pub fn set_interactions_listener(&self, listener: Arc<dyn InteractionsListener>) {
        *self
            .interactions
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn set_test_listener(&self, listener: Arc<dyn TestRunListener>) {
        *self.tests.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn set_debug_listener(&self, listener: Arc<dyn DebugListener>) {
        *self.debug.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    /// Takes effect on the next spawn.
    pub fn set_allow_assertions(&self, allow: bool) {
        self.allow_assertions.store(allow, Ordering::Relaxed);
    }

    /// Takes effect on the next spawn.
    pub fn set_startup_class_path(&self, paths: Vec<PathBuf>) {
        *self
            .class_path
            .write()
            .unwrap_or_else(PoisonError::into_inner) = paths;
    }

    /// Takes effect on the next spawn.
    pub fn set_working_dir(&self, dir: PathBuf) {
        *self
            .working_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir;
    }

    /// Replaces the user-supplied extra worker arguments, split on
    /// whitespace. Takes effect on the next spawn.
    pub fn set_startup_args(&self, args: &str) {
        *self
            .extra_args
            .write()
            .unwrap_or_else(PoisonError::into_inner) =
            args.split_whitespace().map(str::to_owned).collect();
    }

    ////////////////////////////////////////////////////////////////////////
    //// Worker-to-host callbacks, forwarded to the listeners

    pub fn emit_stdout(&self, text: &str) {
        self.interactions().stdout(text);
    }

    pub fn emit_stderr(&self, text: &str) {
        self.interactions().stderr(text);
    }

    /// Blocks until the host supplies a line of console input.
    pub fn request_console_input(&self) -> String {
        self.interactions().console_input()
    }

    pub fn suite_started(&self, count: usize) {
        self.tests().suite_started(count);
    }

    pub fn test_started(&self, name: &str) {
        self.tests().test_started(name);
    }

    pub fn test_ended(&self, name: &str, passed: bool, was_error: bool) {
        self.tests().test_ended(name, passed, was_error);
    }

    pub fn suite_ended(&self, failures: &[TestFailure]) {
        self.tests().suite_ended(failures);
    }

    pub fn non_test_case(&self, is_run_all: bool) {
        self.tests().non_test_case(is_run_all);
    }

    pub fn class_file_error(&self, details: &str) {
        self.tests().class_file_error(details);
    }

    pub fn file_for_class(&self, class_name: &str) -> Option<PathBuf> {
        self.tests().file_for_class(class_name)
    }

    ////////////////////////////////////////////////////////////////////////
    //// Internals

    /// Looks up the current worker session, blocking through in-flight
    /// starts and restarts up to the startup timeout. `used` marks the call
    /// as real work and consumes the worker's freshness.
    fn session(&self, used: bool) -> Result<Option<Arc<dyn WorkerSession>>, SupervisorError> {
        loop {
            let state = self.cell.get();
            match &*state {
                Lifecycle::Fresh | Lifecycle::Stopping => return Ok(None),
                Lifecycle::Starting { .. } => {
                    if self
                        .cell
                        .await_change_from(&state, self.config.startup_timeout)
                        .is_err()
                    {
                        trace!(supervisor = %self.id, "worker not ready in time");
                        return Ok(None);
                    }
                }
                Lifecycle::Restarting => {
                    if self
                        .cell
                        .await_change_from(&state, self.config.startup_timeout)
                        .is_err()
                    {
                        trace!(supervisor = %self.id, "restart not finished in time");
                        return Ok(None);
                    }
                    // the restart may have settled back into fresh; make
                    // sure a genuinely new worker spawns before delegating
                    self.start()?;
                }
                Lifecycle::FreshRunning { session } => {
                    if !used {
                        return Ok(Some(Arc::clone(session)));
                    }
                    let next = Lifecycle::Running {
                        session: Arc::clone(session),
                    };
                    // CAS result is irrelevant, someone else may have
                    // demoted or replaced the state first
                    self.advance(&state, next);
                }
                Lifecycle::Running { session } => return Ok(Some(Arc::clone(session))),
                Lifecycle::Disposed => return Err(SupervisorError::Disposed),
            }
        }
    }

    fn delegate<T>(
        &self,
        used: bool,
        operation: &'static str,
        neutral: impl Fn() -> T,
        call: impl FnOnce(&dyn WorkerSession) -> Result<T, TransportError>,
    ) -> Result<T, SupervisorError> {
        let Some(session) = self.session(used)? else {
            return Ok(neutral());
        };
        match call(session.as_ref()) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.report_transport(operation, &err);
                Ok(neutral())
            }
        }
    }

    fn report_transport(&self, operation: &'static str, err: &TransportError) {
        match err {
            TransportError::Disconnected => {
                trace!(supervisor = %self.id, operation, "worker vanished mid call");
            }
            TransportError::Failed(cause) => {
                error!(supervisor = %self.id, operation, cause, "worker transport failure");
            }
        }
    }

    fn advance(&self, from: &Arc<Lifecycle>, next: Lifecycle) -> bool {
        let to = next.name();
        if self.cell.compare_and_set(from, Arc::new(next)) {
            debug!(supervisor = %self.id, from = from.name(), to, "lifecycle transition");
            true
        } else {
            false
        }
    }

    fn await_change(&self, from: &Arc<Lifecycle>) -> Result<Arc<Lifecycle>, SupervisorError> {
        self.cell
            .await_change_from(from, self.config.startup_timeout)
            .map_err(|_| SupervisorError::StateWaitTimeout { state: from.name() })
    }

    fn spawn_worker(&self) {
        let spec = self.launch_spec();
        info!(supervisor = %self.id, launch = %spec.id, "spawning worker");
        self.control.spawn(spec);
    }

    fn launch_spec(&self) -> LaunchSpec {
        let mut args = Vec::new();
        if self.allow_assertions.load(Ordering::Relaxed) {
            args.push("-ea".to_owned());
        }
        if let Some(port) = self.debug().debug_port() {
            args.push(format!(
                "-Xrunjdwp:transport=dt_socket,server=y,suspend=n,address={port}"
            ));
            args.push("-Xdebug".to_owned());
            args.push("-Xnoagent".to_owned());
            args.push("-Djava.compiler=NONE".to_owned());
        }
        if let Some(mb) = self.config.heap_size_mb {
            args.push(format!("-Xmx{mb}M"));
        }
        if cfg!(target_os = "macos") {
            args.push("-Xdock:name=Interactions".to_owned());
        }
        args.extend(
            self.extra_args
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );
        let class_path = self
            .class_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        LaunchSpec::new(class_path, self.working_dir(), args)
    }

    fn interactions(&self) -> Arc<dyn InteractionsListener> {
        Arc::clone(&self.interactions.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn tests(&self) -> Arc<dyn TestRunListener> {
        Arc::clone(&self.tests.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn debug(&self) -> Arc<dyn DebugListener> {
        Arc::clone(&self.debug.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn working_dir(&self) -> PathBuf {
        self.working_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

////////////////////////////////////////////////////////////////////////
//// Tests
