use std::fmt::Debug;
use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

pub struct Logging;

impl Logging {
    /// Installs the global tracing subscriber. Level defaults to `info`,
    /// overridable per target through the `RUST_LOG` environment variable.
    pub fn try_init() -> Result<(), LoggingError> {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .fmt_fields(PrettyFields::new())
            .try_init()
            .map_err(|err| LoggingError::TryInitError(err.to_string()))
    }
}
