use crate::identity::{Address, Payload, Resource};
use crate::jobs::Job;
use crate::metadata::Metadata;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::{RestResponse, RestValue};

/// Granularity at which a `NotFound` failure occurred.
///
/// The transport layer maps these to distinct status semantics
/// (`Capability` is "method not allowed", the rest are "not found").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureOn {
    General,
    Repository,
    Capability,
    Resource,
}

/// Reason code of a failure, used to rank failed dispatch candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    BadRequest,
    NotFound,
    Error,
    NotExecuted,
}

impl Reason {
    /// Ranking among failed candidates; the lowest number wins.
    ///
    /// BadRequest(0) < Error(1) < NotFound(2) < everything else(3).
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Reason::BadRequest => 0,
            Reason::Error => 1,
            Reason::NotFound => 2,
            Reason::NotExecuted => 3,
        }
    }
}

/// Terminal failure variants.
#[derive(Clone, Debug)]
pub enum Failure {
    /// Client error, carrying arbitrary diagnostic data.
    BadRequest(Value),
    NotFound(FailureOn),
    /// Unexpected error (including cancellation).
    Error(Arc<anyhow::Error>),
    NotExecuted,
}

impl Failure {
    pub fn bad_request(data: impl Into<Value>) -> Self {
        Failure::BadRequest(data.into())
    }

    pub fn error(err: impl Into<anyhow::Error>) -> Self {
        Failure::Error(Arc::new(err.into()))
    }

    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Failure::BadRequest(_) => Reason::BadRequest,
            Failure::NotFound(_) => Reason::NotFound,
            Failure::Error(_) => Reason::Error,
            Failure::NotExecuted => Reason::NotExecuted,
        }
    }

    #[must_use]
    pub fn failure_on(&self) -> Option<FailureOn> {
        match self {
            Failure::NotFound(on) => Some(*on),
            _ => None,
        }
    }

    /// The error carried by an `Error` failure.
    #[must_use]
    pub fn as_error(&self) -> Option<&anyhow::Error> {
        match self {
            Failure::Error(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_response(self) -> RestResponse {
        RestResult::<Payload>::Failure(self).to_response()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::BadRequest(data) => write!(f, "bad request: {data}"),
            Failure::NotFound(on) => write!(f, "not found ({on:?})"),
            Failure::Error(e) => write!(f, "error: {e}"),
            Failure::NotExecuted => f.write_str("not executed"),
        }
    }
}

/// Redirect variants; each carries the target identity.
#[derive(Clone, Debug, PartialEq)]
pub enum Redirect {
    Permanent(Address),
    Temporary(Address),
    /// The caller's copy is current (a conditional GET matched).
    NotNecessary(Address),
}

impl Redirect {
    #[must_use]
    pub fn target(&self) -> &Address {
        match self {
            Redirect::Permanent(a) | Redirect::Temporary(a) | Redirect::NotNecessary(a) => a,
        }
    }
}

/// Discriminant of a [`RestResult`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Success,
    BadRequest,
    NotFound,
    Error,
    NotExecuted,
    RedirectPermanent,
    RedirectTemporary,
    NotNecessary,
    Pending,
}

/// The typed outcome of handling a request. Exactly one variant is active.
#[derive(Clone, Debug)]
pub enum RestResult<T = Payload> {
    Success(RestValue<T>),
    Failure(Failure),
    Redirect(Redirect),
    Pending(Job),
}

impl<T> RestResult<T> {
    /// Success with a bare value (no links, no embeddings).
    pub fn ok(value: T) -> Self {
        RestResult::Success(RestValue::new(value))
    }

    pub fn bad_request(data: impl Into<Value>) -> Self {
        RestResult::Failure(Failure::bad_request(data))
    }

    #[must_use]
    pub fn not_found(on: FailureOn) -> Self {
        RestResult::Failure(Failure::NotFound(on))
    }

    pub fn error(err: impl Into<anyhow::Error>) -> Self {
        RestResult::Failure(Failure::error(err))
    }

    #[must_use]
    pub fn not_executed() -> Self {
        RestResult::Failure(Failure::NotExecuted)
    }

    #[must_use]
    pub fn pending(job: Job) -> Self {
        RestResult::Pending(job)
    }

    #[must_use]
    pub fn kind(&self) -> ResultKind {
        match self {
            RestResult::Success(_) => ResultKind::Success,
            RestResult::Failure(Failure::BadRequest(_)) => ResultKind::BadRequest,
            RestResult::Failure(Failure::NotFound(_)) => ResultKind::NotFound,
            RestResult::Failure(Failure::Error(_)) => ResultKind::Error,
            RestResult::Failure(Failure::NotExecuted) => ResultKind::NotExecuted,
            RestResult::Redirect(Redirect::Permanent(_)) => ResultKind::RedirectPermanent,
            RestResult::Redirect(Redirect::Temporary(_)) => ResultKind::RedirectTemporary,
            RestResult::Redirect(Redirect::NotNecessary(_)) => ResultKind::NotNecessary,
            RestResult::Pending(_) => ResultKind::Pending,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RestResult::Success(_))
    }

    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        self.failure().map(Failure::reason)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RestResult::Failure(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure_on(&self) -> Option<FailureOn> {
        self.failure().and_then(Failure::failure_on)
    }

    #[must_use]
    pub fn success(&self) -> Option<&RestValue<T>> {
        match self {
            RestResult::Success(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.success().map(RestValue::value)
    }

    /// Map the success value, keeping links and embeddings.
    pub fn map_value<U, F>(self, f: F) -> RestResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            RestResult::Success(v) => RestResult::Success(v.map(f)),
            RestResult::Failure(e) => RestResult::Failure(e),
            RestResult::Redirect(r) => RestResult::Redirect(r),
            RestResult::Pending(j) => RestResult::Pending(j),
        }
    }
}

impl<T: Resource> RestResult<T> {
    /// Erase the value type so results of different capabilities compose.
    #[must_use]
    pub fn erase(self) -> RestResult<Payload> {
        self.map_value(Payload::new)
    }
}

impl RestResult<Payload> {
    /// Wrap into a response carrying empty metadata.
    #[must_use]
    pub fn to_response(self) -> RestResponse {
        RestResponse::with_metadata(self, Metadata::new())
    }

    /// Typed view of the success value.
    #[must_use]
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.value().and_then(Payload::downcast_ref::<T>)
    }
}

impl<T> From<Failure> for RestResult<T> {
    fn from(failure: Failure) -> Self {
        RestResult::Failure(failure)
    }
}

impl<T> From<Redirect> for RestResult<T> {
    fn from(redirect: Redirect) -> Self {
        RestResult::Redirect(redirect)
    }
}

impl<T> From<RestValue<T>> for RestResult<T> {
    fn from(value: RestValue<T>) -> Self {
        RestResult::Success(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut reasons = [
            Reason::NotExecuted,
            Reason::NotFound,
            Reason::Error,
            Reason::BadRequest,
        ];
        reasons.sort_by_key(|r| r.priority());
        assert_eq!(
            reasons,
            [
                Reason::BadRequest,
                Reason::Error,
                Reason::NotFound,
                Reason::NotExecuted
            ]
        );
    }

    #[test]
    fn test_kind_and_reason() {
        let r: RestResult<String> = RestResult::not_found(FailureOn::Capability);
        assert_eq!(r.kind(), ResultKind::NotFound);
        assert_eq!(r.reason(), Some(Reason::NotFound));
        assert_eq!(r.failure_on(), Some(FailureOn::Capability));
        assert!(!r.is_success());
    }

    #[test]
    fn test_erase_keeps_value() {
        let r = RestResult::ok("x".to_string()).erase();
        assert_eq!(r.value_as::<String>().map(String::as_str), Some("x"));
    }
}
