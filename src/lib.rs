pub mod config;
pub mod listener;
pub mod logging;
pub mod supervisor;
pub mod worker;

pub use crate::config::SupervisorConfig;
pub use crate::supervisor::{Supervisor, SupervisorError};
