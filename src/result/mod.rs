//! # Result Module
//!
//! The uniform outcome model of the REST core.
//!
//! Every request ends in exactly one [`RestResult`] variant:
//!
//! | variant | meaning |
//! |---|---|
//! | `Success` | a [`RestValue`]: payload, links and embeddings |
//! | `Failure(BadRequest)` | malformed input or validation failure |
//! | `Failure(NotFound)` | nothing at the [`FailureOn`] granularity |
//! | `Failure(Error)` | unexpected error or cancellation |
//! | `Failure(NotExecuted)` | the capability declined to run |
//! | `Redirect(..)` | permanent, temporary or not-necessary (unchanged) |
//! | `Pending` | work continues in a background [`Job`](crate::jobs::Job) |
//!
//! A [`RestResponse`] wraps one result plus type-keyed
//! [`Metadata`](crate::metadata::Metadata). All transforms are
//! non-destructive and return new values.

mod core;
mod response;
mod value;

pub use core::{Failure, FailureOn, Reason, Redirect, RestResult, ResultKind};
pub use response::RestResponse;
pub use value::{Embedding, Link, RestValue};
