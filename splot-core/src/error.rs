//! Error taxonomy for the thing/value/resource-link protocol boundary.

use thiserror::Error;

/// Errors raised by the data model, property table, and resource-link
/// protocols.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value failed to coerce to the requested type, or failed to parse.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A single modifier key or value was malformed.
    #[error("invalid modifier: {0}")]
    InvalidModifier(String),

    /// A modifier query string as a whole could not be parsed.
    #[error("invalid modifier list: {0}")]
    InvalidModifierList(String),

    /// A property write was rejected by the trait's validator, or (for
    /// SAE-bearing config properties) by a compile failure.
    #[error("invalid property value for {key}: {message}")]
    InvalidPropertyValue {
        /// Canonical key of the rejected property.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// No property with this key is registered on the thing.
    #[error("property not found: {0}")]
    PropertyNotFound(String),

    /// No method with this key is registered on the thing.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A method was invoked with the wrong argument shape.
    #[error("invalid method arguments for {method}: {message}")]
    InvalidMethodArguments {
        /// Canonical key of the method.
        method: String,
        /// Why the arguments were rejected.
        message: String,
    },

    /// A URI does not name any resource this technology can resolve.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// A path-only URI was used against a thing that is not locally hosted.
    #[error("unassociated resource: {0}")]
    UnassociatedResource(String),

    /// A transport-layer failure not otherwise classified.
    #[error("technology error: {0}")]
    Technology(String),

    /// A technology refused to host a thing that does not meet its
    /// requirements.
    #[error("technology cannot host this thing: {0}")]
    TechnologyCannotHost(String),

    /// A thing was rejected for hosting by policy or shape.
    #[error("unacceptable thing: {0}")]
    UnacceptableThing(String),

    /// A persistent-state snapshot could not be applied.
    #[error("corrupt persistent state: {0}")]
    CorruptPersistentState(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience alias used throughout `splot-core`.
pub type Result<T> = std::result::Result<T, CoreError>;
