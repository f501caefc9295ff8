//! Tests for results, values and response metadata
//!
//! # Test Coverage
//!
//! - Value, links and embeddings survive type erasure and mapping
//! - Non-destructive metadata transforms and per-tag merge rules
//! - `select` variant checking
//! - Failure classification and display

mod common;

use brrtrest::error::{RestFailureError, SelectError};
use brrtrest::identity::{Address, Payload};
use brrtrest::metadata::{IfNoneMatch, Metadata, VersionToken, Versioning};
use brrtrest::result::{
    Embedding, Failure, FailureOn, Link, Reason, Redirect, RestResponse, RestResult, RestValue,
    ResultKind,
};
use common::Pet;
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn rex() -> Pet {
    Pet {
        id: 1,
        name: "rex".to_string(),
        owner: 7,
    }
}

#[test]
fn test_value_links_and_embeddings_survive_erasure() {
    let value = RestValue::from_parts(
        "x".to_string(),
        vec![Link::new("self", Address::of::<String>("id1"))],
        Vec::new(),
    );
    let response = RestResult::from(value).erase().to_response();

    let success = response.result().success().unwrap();
    assert_eq!(success.value().downcast_ref::<String>(), Some(&"x".to_string()));
    assert_eq!(success.links().len(), 1);
    assert_eq!(success.links()[0].rel, "self");
    assert_eq!(success.links()[0].target, Address::of::<String>("id1"));
    assert!(success.embeddings().is_empty());
}

#[test]
fn test_map_success_keeps_links() {
    let value = RestValue::new(rex())
        .with_links([Link::new("owner", Address::of::<u64>(7))])
        .with_embedding(Embedding::new("sibling", "tom".to_string()));
    let response = RestResult::from(value).erase().to_response();

    let renamed = response.map_success(|v| {
        v.map(|payload| {
            let mut pet = payload.downcast_ref::<Pet>().cloned().unwrap();
            pet.name = "max".to_string();
            Payload::new(pet)
        })
    });
    let success = renamed.result().success().unwrap();
    assert_eq!(renamed.result().value_as::<Pet>().unwrap().name, "max");
    assert_eq!(success.links_for("owner").count(), 1);
    assert_eq!(success.embeddings()[0].rel, "sibling");
}

#[test]
fn test_map_success_ignores_failures() {
    let response = Failure::NotExecuted.to_response();
    let mapped = response.map_success(|_| panic!("must not be called"));
    assert_eq!(mapped.result().kind(), ResultKind::NotExecuted);
}

#[test]
fn test_with_links_on_lazy_value_stays_lazy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let value = RestValue::lazy(rex(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        (vec![Link::new("self", Address::of::<Pet>(1))], Vec::new())
    });
    let response = RestResult::from(value)
        .erase()
        .to_response()
        .with_links(vec![Link::new("edit", Address::of::<Pet>(1)).with_capability(Method::PUT)]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let links = response.result().success().unwrap().links();
    assert_eq!(
        links.iter().map(|l| l.rel.as_str()).collect::<Vec<_>>(),
        ["self", "edit"]
    );
    assert_eq!(links[1].capability.name, Method::PUT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_payload_identity_from_resource() {
    let payload = Payload::new(rex());
    assert!(payload.is::<Pet>());
    assert_eq!(payload.identity(), Some(Address::of::<Pet>(1)));
    assert!(Payload::new("plain".to_string()).identity().is_none());
    assert_eq!(payload.to_json().unwrap()["name"], "rex");
}

#[test]
fn test_add_metadata_is_non_destructive() {
    let original = RestResult::ok(rex()).erase().to_response();
    let tagged = original
        .add_metadata(VersionToken::new("t1"))
        .add_metadata(Versioning::new("1"));

    assert!(original.metadata().is_empty());
    assert_eq!(tagged.metadata().len(), 2);
    assert_eq!(
        tagged.metadata_item::<VersionToken>(),
        Some(&VersionToken::new("t1"))
    );
    let replaced = tagged.add_metadata(VersionToken::new("t2"));
    assert_eq!(replaced.metadata_item::<VersionToken>().unwrap().as_str(), "t2");
    assert_eq!(tagged.metadata_item::<VersionToken>().unwrap().as_str(), "t1");
}

#[test]
fn test_metadata_merge_rules() {
    let metadata = Metadata::new()
        .with(Versioning::new("1").with_supported(["2"]))
        .with(Versioning::new("3"))
        .with(IfNoneMatch::parse("\"a\""))
        .with(IfNoneMatch::parse("W/\"b\", \"c\""));

    let versioning = metadata.get::<Versioning>().unwrap();
    assert_eq!(versioning.current.as_deref(), Some("3"));
    assert_eq!(versioning.supported, ["1", "2", "3"]);

    let tokens = metadata.get::<IfNoneMatch>().unwrap();
    assert_eq!(
        tokens.0,
        ["a", "b", "c"].map(VersionToken::new).to_vec()
    );
    assert!(tokens.matches(&VersionToken::new("b")));
    assert!(!tokens.matches(&VersionToken::new("d")));
}

#[test]
fn test_select_checks_variant() {
    let response = RestResponse::new(RestResult::Redirect(Redirect::Temporary(
        Address::of::<Pet>(2),
    )))
    .with_item(VersionToken::new("kept"));

    let moved = response
        .clone()
        .select(|_| RestResult::Redirect(Redirect::Temporary(Address::of::<Pet>(3))))
        .unwrap();
    assert_eq!(
        moved.result().kind(),
        ResultKind::RedirectTemporary
    );
    assert!(moved.metadata_item::<VersionToken>().is_some());

    let err: SelectError = response
        .select(|_| RestResult::Redirect(Redirect::Permanent(Address::of::<Pet>(3))))
        .unwrap_err();
    assert_eq!(err.expected, ResultKind::RedirectTemporary);
    assert_eq!(err.found, ResultKind::RedirectPermanent);
}

#[test]
fn test_failure_classification() {
    let cases: Vec<(RestResult<Pet>, ResultKind, Option<Reason>)> = vec![
        (RestResult::ok(rex()), ResultKind::Success, None),
        (
            RestResult::bad_request("nope"),
            ResultKind::BadRequest,
            Some(Reason::BadRequest),
        ),
        (
            RestResult::not_found(FailureOn::Capability),
            ResultKind::NotFound,
            Some(Reason::NotFound),
        ),
        (
            RestResult::error(anyhow::anyhow!("disk on fire")),
            ResultKind::Error,
            Some(Reason::Error),
        ),
        (
            RestResult::not_executed(),
            ResultKind::NotExecuted,
            Some(Reason::NotExecuted),
        ),
    ];
    for (result, kind, reason) in cases {
        assert_eq!(result.kind(), kind);
        assert_eq!(result.reason(), reason);
    }
    assert!(Reason::BadRequest.priority() < Reason::Error.priority());
    assert!(Reason::Error.priority() < Reason::NotFound.priority());
    assert!(Reason::NotFound.priority() < Reason::NotExecuted.priority());
}

#[test]
fn test_failure_display() {
    assert_eq!(
        Failure::NotFound(FailureOn::Repository).to_string(),
        "not found (Repository)"
    );
    assert_eq!(
        Failure::bad_request(serde_json::json!({ "field": "name" })).to_string(),
        r#"bad request: {"field":"name"}"#
    );
    assert_eq!(
        Failure::error(anyhow::anyhow!("boom")).to_string(),
        "error: boom"
    );

    let raised = RestFailureError::from(Failure::NotExecuted);
    let err: anyhow::Error = raised.into();
    assert!(err.downcast_ref::<RestFailureError>().is_some());
}
