use crate::ids::JobId;
use crate::identity::{Address, Resource};
use crate::result::RestResponse;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Marker resource type for job identities (`JobResource/<ulid>`).
#[derive(Debug, Clone, Copy)]
pub struct JobResource;

/// Handle to a request whose work outlived its wait budget.
///
/// Clones share the same underlying computation; awaiting any of them (or
/// the store's driver task) moves it forward, and the finished response is
/// kept for every holder.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    handle: Shared<BoxFuture<'static, RestResponse>>,
}

impl Job {
    #[must_use]
    pub fn new(id: JobId, work: BoxFuture<'static, RestResponse>) -> Self {
        Self {
            id,
            handle: work.shared(),
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Identity under which the job can be looked up.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::of::<JobResource>(self.id.to_string())
    }

    /// The finished response, if the work has completed.
    #[must_use]
    pub fn peek(&self) -> Option<RestResponse> {
        self.handle.peek().cloned()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.peek().is_some()
    }

    /// Wait for the work to finish and return its response.
    pub async fn wait(&self) -> RestResponse {
        self.handle.clone().await
    }

    pub(crate) fn driver(&self) -> Shared<BoxFuture<'static, RestResponse>> {
        self.handle.clone()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Serialize for Job {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Job", 2)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("finished", &self.is_finished())?;
        state.end()
    }
}

impl Resource for Job {
    fn identity(&self) -> Option<Address> {
        Some(self.address())
    }
}
