pub mod cell;
mod dispatch;
pub mod error;
pub mod state;
#[allow(clippy::module_inception)]
mod supervisor;

pub use error::SupervisorError;
pub use supervisor::Supervisor;
