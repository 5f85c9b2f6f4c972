use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("supervisor already disposed")]
    Disposed,

    #[error("unexpected `{event}` event in state `{state}`")]
    UnexpectedEvent {
        event: &'static str,
        state: &'static str,
    },

    #[error("gave up waiting for a state change out of `{state}`")]
    StateWaitTimeout { state: &'static str },

    #[error("worker reported busy with no call outstanding")]
    WorkerBusy,

    #[error("worker reported an internal fault: `{0}`")]
    WorkerFault(String),
}
