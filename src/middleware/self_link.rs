use super::{Handler, Middleware};
use crate::identity::Address;
use crate::request::RestRequest;
use crate::result::{Link, RestResponse};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Adds `self` and `describedby` links to values that carry an identity.
///
/// `describedby` points at the schema identity of the value's runtime type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfLinkMiddleware;

impl Middleware for SelfLinkMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(SelfLinkHandler { next })
    }
}

struct SelfLinkHandler {
    next: Arc<dyn Handler>,
}

impl Handler for SelfLinkHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let next = self.next.handle(request);
        async move {
            let response = next.await;
            if !response.is_success() {
                return response;
            }
            response.map_success(|value| {
                let payload = value.value().clone();
                let links = std::iter::once(()).flat_map(move |()| {
                    payload
                        .identity()
                        .map(|id| {
                            vec![
                                Link::new("self", id),
                                Link::new("describedby", Address::schema_for(payload.type_name())),
                            ]
                        })
                        .unwrap_or_default()
                });
                value.with_links(links)
            })
        }
        .boxed()
    }
}
