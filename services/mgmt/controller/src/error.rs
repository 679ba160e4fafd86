//! Registry error types.

use thiserror::Error;

/// Controller registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Index beyond the table or slot not occupied
    #[error("unknown controller index {0}")]
    UnknownController(u16),
}
