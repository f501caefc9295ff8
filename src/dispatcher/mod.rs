//! # Dispatcher Module
//!
//! The dispatcher is the heart of the crate: given a [`RestRequest`](crate::request::RestRequest)
//! it finds the repository for the address's resource type, resolves the
//! candidate capabilities for the verb, and invokes them in registration order
//! until one succeeds.
//!
//! ## Request Flow
//!
//! 1. Resolve the repository; none registered gives `NotFound(Repository)`
//! 2. Resolve candidates for `(verb, type)` from the repository's registry
//! 3. For each candidate:
//!    - coerce the parameters into the declared type (failure is a `BadRequest` for that candidate)
//!    - parse the body for the declared body type, at most once per type
//!    - invoke the bound delegate and await it
//!    - on success, attach static and dynamic provider links (authorized ones only) and stop
//!    - on a domain failure, remember it and try the next candidate
//!    - on an unexpected error or panic, notify the [`ErrorListener`]s and stop with `Failure::Error`
//! 4. No success: the best ranked failure wins (`BadRequest` < `Error` < `NotFound` < others),
//!    or `NotFound(Capability)` when there were no candidates
//! 5. The repository post-processes the response, then the request's
//!    [`Versioning`](crate::metadata::Versioning) is copied onto a response that carries none
//!
//! ## Error Handling
//!
//! Nothing escapes `dispatch`: conversion errors, body errors, returned
//! failures, `RestFailureError`s raised through `?`, other errors and panics
//! all end up as a [`RestResponse`](crate::result::RestResponse).
//!
//! ```rust,ignore
//! let dispatcher = RestDispatcher::builder(repositories)
//!     .links(links)
//!     .authorizer(Arc::new(roles))
//!     .error_listener(Arc::new(|req: &RestRequest, err: &anyhow::Error| {
//!         eprintln!("{} failed: {err}", req.request_id());
//!     }))
//!     .build();
//! let response = dispatcher.dispatch(request).await;
//! ```

mod core;

pub use core::{ErrorListener, RestDispatcher, RestDispatcherBuilder};
