//! Per-controller state for the management driver.
//!
//! Controllers are addressed by small integer indices. The registry owns
//! one [`ControllerRecord`] per known index; each record carries the
//! controller's identity, settings, open connections and the
//! [`PendingOps`] state machine that serializes UUID commands.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod pending;
pub mod record;
pub mod registry;

// Re-export main types
pub use error::RegistryError;
pub use pending::{Drain, IdentifierOp, IdentifierState, PendingOps};
pub use record::{ControllerRecord, SettingsTransition};
pub use registry::ControllerRegistry;
