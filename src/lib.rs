//! # brrtrest
//!
//! **brrtrest** is a transport-agnostic REST core: it resolves an inbound
//! request to a capability declared by a repository, coerces parameters and
//! body into the capability's declared types, invokes it, and returns a
//! uniform response envelope enriched with hypermedia links and metadata.
//!
//! ## Overview
//!
//! Resources are addressed by typed identity values instead of routes.
//! Repositories declare capabilities (GET, PUT, POST, DELETE, PATCH) per
//! resource type; several candidates may be registered for the same verb,
//! and the dispatcher falls back through them in order, picking the most
//! informative failure when none succeeds. HTTP binding, codecs and storage
//! are external: adapters build a [`RestRequest`] and render the
//! [`RestResponse`].
//!
//! ## Architecture
//!
//! - **[`identity`]** - resource types, typed identities and erased addresses
//! - **[`metadata`]** - ordered parameter multi-map and type-keyed metadata
//! - **[`result`]** - `RestResult` (success, failures, redirects, pending), values, links, responses
//! - **[`request`]** - the immutable request with its lazy, memoising body
//! - **[`convert`]** - coercion of string parameters into any `Deserialize` type
//! - **[`capability`]** - descriptors, declaration builder and per-type registry
//! - **[`repository`]** - repositories and the map the dispatcher resolves them from
//! - **[`links`]** - static and dynamic link providers plus authorization
//! - **[`dispatcher`]** - the dispatch engine
//! - **[`middleware`]** - pipeline and decorators (cache, version tokens, timeout, pending jobs, self links, tracing, metrics)
//! - **[`jobs`]** - background jobs for requests that outlive their wait budget
//! - **[`runtime_config`]** / **[`logging`]** - environment driven configuration and log setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Adapter as Transport adapter
//!     participant Pipeline as Middleware pipeline
//!     participant Dispatcher
//!     participant Registry as Capability registry
//!     participant Capability
//!
//!     Adapter->>Pipeline: RestRequest
//!     Pipeline->>Dispatcher: decorated request
//!     Dispatcher->>Registry: capabilities(verb, type)
//!     Registry-->>Dispatcher: ordered candidates
//!     loop until success
//!         Dispatcher->>Dispatcher: coerce parameters and body
//!         Dispatcher->>Capability: invoke
//!         Capability-->>Dispatcher: RestResult
//!     end
//!     Dispatcher-->>Pipeline: RestResponse (+ links)
//!     Pipeline-->>Adapter: RestResponse (+ tokens, self links)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtrest::capability::{CapabilityBuilder, DeclareCapabilities};
//! use brrtrest::dispatcher::RestDispatcher;
//! use brrtrest::identity::{Address, Identity};
//! use brrtrest::middleware::{Handler, Pipeline, SelfLinkMiddleware};
//! use brrtrest::repository::{DeclaredRepository, RepositoryMap};
//! use brrtrest::request::RestRequest;
//! use brrtrest::result::RestResult;
//! use http::Method;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Greeting;
//!
//! struct Greeter;
//!
//! impl DeclareCapabilities for Greeter {
//!     fn declare(builder: &mut CapabilityBuilder<Self>) {
//!         builder.get(|_s, id: Identity<Greeting>, (): (), _c| async move {
//!             let name: String = id.value_as().unwrap_or_default();
//!             Ok(RestResult::ok(format!("hello {name}")))
//!         });
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let repositories = RepositoryMap::new()
//!     .with(Arc::new(DeclaredRepository::new::<Greeting, _>(Arc::new(Greeter))?));
//! let handler = Pipeline::new()
//!     .with(Arc::new(SelfLinkMiddleware))
//!     .build(Arc::new(RestDispatcher::new(repositories)));
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let request = RestRequest::new(Method::GET, Address::of::<Greeting>("world"));
//! let response = runtime.block_on(handler.handle(request));
//! assert_eq!(
//!     response.result().value_as::<String>().map(String::as_str),
//!     Some("hello world")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Deadlines, job retention and cache sizing come from
//! [`RuntimeConfig`](runtime_config::RuntimeConfig) (`BRRTR_*` environment
//! variables or a YAML file); logging from [`LogConfig`](logging::LogConfig).

pub mod capability;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod ids;
pub mod jobs;
pub mod links;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod repository;
pub mod request;
pub mod result;
pub mod runtime_config;

pub use capability::{CapabilityBuilder, CapabilityKey, CapabilityRegistry, DeclareCapabilities};
pub use dispatcher::RestDispatcher;
pub use error::{OperationCanceled, RegistrationError, RestFailureError};
pub use identity::{Address, Identity, Payload, Resource, ResourceType};
pub use metadata::{Metadata, Parameters};
pub use repository::{DeclaredRepository, Repository, RepositoryMap};
pub use request::RestRequest;
pub use result::{Failure, FailureOn, Redirect, RestResponse, RestResult, RestValue};
