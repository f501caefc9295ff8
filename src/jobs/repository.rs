use super::job::{Job, JobResource};
use super::store::JobStore;
use crate::capability::{CapabilityBuilder, CapabilityRegistry, DeclareCapabilities};
use crate::error::RegistrationError;
use crate::identity::{Identity, ResourceType};
use crate::ids::JobId;
use crate::repository::Repository;
use crate::result::{FailureOn, RestResponse, RestResult};
use std::sync::Arc;
use tracing::debug;

struct JobLookup {
    store: Arc<dyn JobStore>,
}

impl DeclareCapabilities for JobLookup {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        builder.get(
            |lookup: Arc<JobLookup>, id: Identity<JobResource>, (): (), _cancel| async move {
                let job = id
                    .value_as::<String>()
                    .ok()
                    .and_then(|s| s.parse::<JobId>().ok())
                    .and_then(|job_id| lookup.store.get_job(job_id));
                Ok(match job {
                    Some(job) => RestResult::ok(job),
                    None => RestResult::not_found(FailureOn::Resource),
                })
            },
        );
    }
}

/// Exposes `GET JobResource/<id>` over a [`JobStore`].
///
/// The capability itself returns the [`Job`] handle; `process_response`
/// then replaces it with the job's own response once it has finished, or
/// with `Pending` while it is still running.
pub struct JobRepository {
    registry: CapabilityRegistry,
}

impl JobRepository {
    pub fn new(store: Arc<dyn JobStore>) -> Result<Self, RegistrationError> {
        let registry = CapabilityRegistry::from_declared(
            ResourceType::of::<JobResource>(),
            Arc::new(JobLookup { store }),
        )?;
        Ok(Self { registry })
    }
}

impl Repository for JobRepository {
    fn entity_type(&self) -> ResourceType {
        ResourceType::of::<JobResource>()
    }

    fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    fn process_response(&self, response: RestResponse) -> RestResponse {
        let Some(job) = response.value().and_then(|v| v.downcast_ref::<Job>()).cloned() else {
            return response;
        };
        match job.peek() {
            Some(finished) => {
                debug!(job_id = %job.id(), "Job lookup resolved to finished response");
                finished
            }
            None => response.replace_result(RestResult::Pending(job)),
        }
    }
}
