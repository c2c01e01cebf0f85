//! dmrelay Core - Dispatch engine and session collaborators

pub mod dispatch;
pub mod session;

pub use dispatch::{Orchestrator, RunReport};
pub use session::Collaborators;
