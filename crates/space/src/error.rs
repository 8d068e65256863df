//! Errors raised while declaring or enumerating a configuration space.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpaceError {
    #[error("parameter '{0}' is already declared")]
    DuplicateParameter(String),

    #[error("constraint references {expected} parameters but only {found} resolved in the configuration")]
    MalformedConstraint { expected: usize, found: usize },

    #[error("thread-size modifier '{0}' does not match any tuning parameter")]
    UnresolvedModifier(String),

    #[error("global range has {global} dimensions but local range has {local}")]
    MismatchedDimensions { global: usize, local: usize },

    #[error("thread-size modifier divides by parameter '{0}' which is zero in this configuration")]
    ZeroDivisor(String),

    #[error("thread-size modifier '{0}' makes the launch size overflow")]
    SizeOverflow(String),
}
