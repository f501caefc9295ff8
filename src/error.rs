//! Error types shared across the crate.
//!
//! Request-level problems never surface as these errors: the dispatcher folds
//! them into [`Failure`](crate::result::Failure) values. The types here are
//! either carried inside a failure ([`OperationCanceled`], [`RestFailureError`])
//! or returned from setup-time APIs ([`RegistrationError`], [`SelectError`]).

use crate::identity::ResourceType;
use crate::result::{Failure, ResultKind};
use http::Method;
use std::fmt;

/// The cooperative cancellation token fired before the work completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationCanceled;

impl fmt::Display for OperationCanceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation was canceled")
    }
}

impl std::error::Error for OperationCanceled {}

/// A capability's explicit, pre-built failure raised through `?`.
///
/// The dispatcher treats it exactly like a returned `RestResult::Failure`:
/// it is ranked against the other candidates instead of aborting dispatch.
#[derive(Debug, Clone)]
pub struct RestFailureError(pub Failure);

impl fmt::Display for RestFailureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rest failure: {}", self.0)
    }
}

impl std::error::Error for RestFailureError {}

impl From<Failure> for RestFailureError {
    fn from(failure: Failure) -> Self {
        Self(failure)
    }
}

/// Capability registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The capability addresses a different resource type than the repository.
    EntityMismatch {
        capability: Method,
        expected: ResourceType,
        found: ResourceType,
    },
    /// The registered object declares no capabilities at all.
    NoCapabilities { type_name: &'static str },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::EntityMismatch {
                capability,
                expected,
                found,
            } => write!(
                f,
                "capability {} targets {} but the repository serves {}",
                capability,
                found.name(),
                expected.name()
            ),
            RegistrationError::NoCapabilities { type_name } => {
                write!(f, "{type_name} declares no capabilities")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// `RestResponse::select` produced a result of a different variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectError {
    pub expected: ResultKind,
    pub found: ResultKind,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "select must preserve the result variant: expected {:?}, got {:?}",
            self.expected, self.found
        )
    }
}

impl std::error::Error for SelectError {}
