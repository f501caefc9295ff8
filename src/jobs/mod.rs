//! # Jobs Module
//!
//! Background completion for requests that outlive their wait budget.
//!
//! The pending decorator hands the in-flight work to a [`JobStore`] and
//! answers with `Pending(job)`. The work keeps running; once it finishes its
//! response is retrievable by id, either directly through
//! [`JobStore::get_job`] or by dispatching `GET JobResource/<id>` against a
//! [`JobRepository`].
//!
//! [`InMemoryJobStore`] keeps finished jobs for a retention window (one hour
//! by default) and removes older ones from a sweeper task started with
//! [`InMemoryJobStore::spawn_sweeper`].

mod job;
mod repository;
mod store;

pub use job::{Job, JobResource};
pub use repository::JobRepository;
pub use store::{InMemoryJobStore, JobStore, DEFAULT_JOB_RETENTION, MIN_SWEEP_INTERVAL};
