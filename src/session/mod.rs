//! Session management for per-user application containers
//!
//! Handles:
//! - Allocating host ports for session containers
//! - Tracking one live session per user
//! - Probing new containers until they answer
//! - Announcing routes to the proxy layer
//! - Tearing containers down, inline or in the background

mod error;
mod listeners;
mod manager;
mod model;
mod ports;
mod probe;
mod registry;
mod teardown;

#[cfg(test)]
pub(crate) mod testing;

pub use error::SessionError;
pub use listeners::{ListenerHub, MappingListener};
pub use manager::{ManagerSettings, SessionManager};
pub use model::{Session, SessionState};
pub use ports::PortAllocator;
pub use probe::{HttpProber, ProbePolicy, ReadinessProbe};
pub use registry::SessionRegistry;
pub use teardown::{ExecutorStopped, TeardownExecutor, TeardownTask};
