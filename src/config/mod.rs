use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MAX_STARTUP_FAILURES: u32 = 3;
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error parsing supervisor config: `{0}`")]
    Parse(#[from] serde_yaml::Error),

    #[error("error reading supervisor config: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("max_startup_failures must be greater than zero")]
    ZeroStartupBound,
}

/// Tunables of one supervisor.
///
/// Normally provided as a YAML document:
///
/// ```yaml
/// max_startup_failures: 3
/// startup_timeout: 10s
/// allow_assertions: true
/// heap_size_mb: 512
/// extra_args: "-quiet"
/// ```
///
/// Missing keys take the same defaults as [`SupervisorConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Spawn attempts before the supervisor gives up and reports the worker
    /// as unable to start.
    pub max_startup_failures: u32,
    /// Upper bound on blocking for an in-flight start or restart.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub startup_timeout: Duration,
    /// Launch workers with assertions enabled.
    pub allow_assertions: bool,
    /// Let evaluated code touch private members.
    pub allow_private_access: bool,
    /// Worker heap cap in megabytes, unlimited when absent.
    pub heap_size_mb: Option<u32>,
    /// Extra worker arguments, split on whitespace.
    pub extra_args: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_startup_failures: DEFAULT_MAX_STARTUP_FAILURES,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            allow_assertions: false,
            allow_private_access: false,
            heap_size_mb: None,
            extra_args: None,
        }
    }
}

impl SupervisorConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = serde_yaml::from_str(content)?;
        if config.max_startup_failures == 0 {
            return Err(ConfigError::ZeroStartupBound);
        }
        Ok(config)
    }

    pub(crate) fn extra_args(&self) -> Vec<String> {
        self.extra_args
            .as_deref()
            .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const EXAMPLE_CONFIG: &str = r#"
max_startup_failures: 5
startup_timeout: 2m30s
allow_assertions: true
heap_size_mb: 256
extra_args: "-quiet -verbose"
"#;

    #[test]
    fn example_config() {
        let actual = SupervisorConfig::from_yaml(EXAMPLE_CONFIG).unwrap();

        assert_eq!(5, actual.max_startup_failures);
        assert_eq!(Duration::from_secs(150), actual.startup_timeout);
        assert!(actual.allow_assertions);
        assert!(!actual.allow_private_access);
        assert_eq!(Some(256), actual.heap_size_mb);
        assert_eq!(
            vec!["-quiet".to_owned(), "-verbose".to_owned()],
            actual.extra_args()
        );
    }

    #[test]
    fn empty_document_matches_the_defaults() {
        let actual = SupervisorConfig::from_yaml("{}").unwrap();

        assert_eq!(SupervisorConfig::default(), actual);
        assert_eq!(3, actual.max_startup_failures);
        assert_eq!(Duration::from_secs(10), actual.startup_timeout);
        assert!(actual.extra_args().is_empty());
    }

    #[test]
    fn config_loads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.yaml");
        fs::write(&path, EXAMPLE_CONFIG).unwrap();

        let actual = SupervisorConfig::from_path(&path).unwrap();

        assert_eq!(5, actual.max_startup_failures);
        assert_eq!(Some(256), actual.heap_size_mb);
    }

    #[test]
    fn zero_startup_bound_is_rejected() {
        let actual = SupervisorConfig::from_yaml("max_startup_failures: 0");

        assert_matches!(actual, Err(ConfigError::ZeroStartupBound));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let actual = SupervisorConfig::from_yaml("max_startup_failures: many");

        assert_matches!(actual, Err(ConfigError::Parse(_)));
    }
}
