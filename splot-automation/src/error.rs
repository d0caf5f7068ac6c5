//! Errors from the primitive runtime and action dispatcher.

use splot_core::CoreError;
use splot_sae::SaeError;
use thiserror::Error;

/// Errors raised registering or running automation primitives.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AutomationError {
    /// A resource-link or property operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An SAE program failed to compile or run.
    #[error(transparent)]
    Sae(#[from] SaeError),

    /// A dispatched REST call to an action's target failed.
    #[error("action call to {uri} failed: {message}")]
    RestCallFailed {
        /// The target URI.
        uri: String,
        /// The underlying error.
        message: String,
    },

    /// A primitive (pairing/rule/timer) with this ID is already
    /// registered.
    #[error("primitive {0} is already registered")]
    AlreadyRegistered(String),

    /// No primitive with this ID is registered.
    #[error("primitive {0} is not registered")]
    NotFound(String),
}
