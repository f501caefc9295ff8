//! Tests for pending responses and background job retrieval
//!
//! # Test Coverage
//!
//! - Slow requests become `Pending(job)` and still finish in the background
//! - Fast requests pass through untouched
//! - `GET JobResource/<id>` resolves to the finished response, `Pending`
//!   while running, and `NotFound` for unknown ids
//! - Retention sweeping driven by the sweeper task

mod common;

use brrtrest::capability::{CapabilityBuilder, DeclareCapabilities};
use brrtrest::dispatcher::RestDispatcher;
use brrtrest::identity::{Address, Identity};
use brrtrest::ids::JobId;
use brrtrest::jobs::{InMemoryJobStore, JobRepository, JobResource, JobStore};
use brrtrest::middleware::{Handler, MetricsMiddleware, PendingMiddleware, Pipeline};
use brrtrest::repository::{DeclaredRepository, RepositoryMap};
use brrtrest::request::RestRequest;
use brrtrest::result::{FailureOn, RestResult, ResultKind};
use common::{Pet, PetStore};
use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// GET that answers after `delay`.
struct SlowKennel {
    delay: Duration,
}

impl DeclareCapabilities for SlowKennel {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        builder.get(
            |kennel: Arc<SlowKennel>, id: Identity<Pet>, (): (), _c: CancellationToken| async move {
                tokio::time::sleep(kennel.delay).await;
                let id = id.value_as::<u64>().unwrap_or_default();
                Ok(RestResult::ok(Pet {
                    id,
                    name: "late".to_string(),
                    owner: 0,
                }))
            },
        );
    }
}

struct Fixture {
    store: Arc<InMemoryJobStore>,
    handler: Arc<dyn Handler>,
}

fn fixture(delay: Duration, max_wait: Duration) -> Fixture {
    let store = Arc::new(InMemoryJobStore::default());
    let pets = DeclaredRepository::new::<Pet, _>(Arc::new(SlowKennel { delay })).unwrap();
    let jobs = JobRepository::new(Arc::clone(&store) as Arc<dyn JobStore>).unwrap();
    let repositories = RepositoryMap::new()
        .with(Arc::new(pets))
        .with(Arc::new(jobs));
    let handler = Pipeline::new()
        .with(Arc::new(PendingMiddleware::new(
            max_wait,
            Arc::clone(&store) as Arc<dyn JobStore>,
        )))
        .build(Arc::new(RestDispatcher::new(repositories)));
    Fixture { store, handler }
}

fn get_pet(id: u64) -> RestRequest {
    RestRequest::new(Method::GET, Address::of::<Pet>(id))
}

#[tokio::test]
async fn test_slow_request_becomes_pending() {
    let f = fixture(Duration::from_millis(300), Duration::from_millis(50));

    let started = Instant::now();
    let response = f.handler.handle(get_pet(3)).await;
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(response.result().kind(), ResultKind::Pending);

    let RestResult::Pending(job) = response.result() else {
        panic!("expected a pending result");
    };
    assert!(!job.is_finished());
    assert_eq!(f.store.len(), 1);

    let finished = f.store.get_job(job.id()).unwrap().wait().await;
    let pet = finished.result().value_as::<Pet>().unwrap();
    assert_eq!((pet.id, pet.name.as_str()), (3, "late"));
    assert!(job.is_finished());
}

#[tokio::test]
async fn test_fast_request_is_not_pending() {
    let f = fixture(Duration::ZERO, Duration::from_millis(500));
    let response = f.handler.handle(get_pet(4)).await;
    assert!(response.is_success());
    assert!(f.store.is_empty());
}

#[tokio::test]
async fn test_pending_work_finishes_without_being_awaited() {
    let f = fixture(Duration::from_millis(80), Duration::from_millis(10));
    let response = f.handler.handle(get_pet(5)).await;
    let RestResult::Pending(job) = response.result() else {
        panic!("expected a pending result");
    };
    let id = job.id();
    drop(response);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let job = f.store.get_job(id).unwrap();
    assert!(job.is_finished());
    assert!(job.peek().unwrap().is_success());
}

#[tokio::test]
async fn test_job_lookup_by_address() {
    let f = fixture(Duration::from_millis(150), Duration::from_millis(20));
    let response = f.handler.handle(get_pet(6)).await;
    let RestResult::Pending(job) = response.result() else {
        panic!("expected a pending result");
    };
    let lookup = || RestRequest::new(Method::GET, job.address());

    let running = f.handler.handle(lookup()).await;
    assert_eq!(running.result().kind(), ResultKind::Pending);

    job.wait().await;
    let done = f.handler.handle(lookup()).await;
    assert!(done.is_success());
    assert_eq!(done.result().value_as::<Pet>().map(|p| p.id), Some(6));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let f = fixture(Duration::ZERO, Duration::from_millis(50));

    let unknown = RestRequest::new(
        Method::GET,
        Address::of::<JobResource>(JobId::new().to_string()),
    );
    let response = f.handler.handle(unknown).await;
    assert_eq!(response.result().failure_on(), Some(FailureOn::Resource));

    let garbage = RestRequest::new(Method::GET, Address::of::<JobResource>("not-a-job"));
    let response = f.handler.handle(garbage).await;
    assert_eq!(response.result().failure_on(), Some(FailureOn::Resource));
}

#[tokio::test]
async fn test_pending_is_counted_by_metrics() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::default());
    let metrics = MetricsMiddleware::new();
    let pets = DeclaredRepository::new::<Pet, _>(Arc::new(SlowKennel {
        delay: Duration::from_millis(100),
    }))
    .unwrap();
    let handler = Pipeline::new()
        .with(Arc::new(metrics.clone()))
        .with(Arc::new(PendingMiddleware::new(
            Duration::from_millis(10),
            store,
        )))
        .build(Arc::new(RestDispatcher::new(
            RepositoryMap::new().with(Arc::new(pets)),
        )));

    handler.handle(get_pet(1)).await;
    assert_eq!(metrics.snapshot().pending, 1);
}

#[tokio::test]
async fn test_sweeper_drops_expired_jobs() {
    let store = Arc::new(InMemoryJobStore::new(Duration::from_millis(20)));
    let shutdown = CancellationToken::new();
    let sweeper = store.spawn_sweeper(Duration::from_millis(10), shutdown.clone());

    let pets = DeclaredRepository::new::<Pet, _>(Arc::new(PetStore::seeded())).unwrap();
    let dispatcher = Arc::new(RestDispatcher::new(
        RepositoryMap::new().with(Arc::new(pets)),
    ));
    let work = dispatcher.handle(get_pet(1));
    let job = store.register_job(work);
    assert!(job.wait().await.is_success());
    assert_eq!(store.len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(store.get_job(job.id()).is_none());
    assert!(store.is_empty());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .unwrap()
        .unwrap();
}
