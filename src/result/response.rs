use crate::error::SelectError;
use crate::identity::Payload;
use crate::metadata::{Metadata, MetadataItem};

use super::{Link, RestResult, RestValue};

/// Immutable envelope around one result and its response metadata.
///
/// Every transform returns a new response; the original stays untouched.
#[derive(Clone, Debug)]
pub struct RestResponse {
    result: RestResult<Payload>,
    metadata: Metadata,
}

impl RestResponse {
    #[must_use]
    pub fn new(result: RestResult<Payload>) -> Self {
        Self::with_metadata(result, Metadata::new())
    }

    #[must_use]
    pub fn with_metadata(result: RestResult<Payload>, metadata: Metadata) -> Self {
        Self { result, metadata }
    }

    #[must_use]
    pub fn result(&self) -> &RestResult<Payload> {
        &self.result
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn into_parts(self) -> (RestResult<Payload>, Metadata) {
        (self.result, self.metadata)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Success value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Payload> {
        self.result.value()
    }

    /// Typed metadata lookup.
    #[must_use]
    pub fn metadata_item<X: MetadataItem>(&self) -> Option<&X> {
        self.metadata.get::<X>()
    }

    /// New response with `item` added under `X`'s static type.
    ///
    /// An existing entry for `X` is combined via `X::merge`.
    #[must_use]
    pub fn add_metadata<X: MetadataItem>(&self, item: X) -> Self {
        Self {
            result: self.result.clone(),
            metadata: self.metadata.clone().with(item),
        }
    }

    /// Consuming form of [`RestResponse::add_metadata`].
    #[must_use]
    pub fn with_item<X: MetadataItem>(mut self, item: X) -> Self {
        self.metadata.insert(item);
        self
    }

    /// Replace the result through `f`, keeping the metadata.
    ///
    /// `f` must return the same variant it was given; anything else is a
    /// programming error reported as [`SelectError`].
    pub fn select<F>(self, f: F) -> Result<Self, SelectError>
    where
        F: FnOnce(RestResult<Payload>) -> RestResult<Payload>,
    {
        let expected = self.result.kind();
        let result = f(self.result);
        let found = result.kind();
        if expected != found {
            return Err(SelectError { expected, found });
        }
        Ok(Self {
            result,
            metadata: self.metadata,
        })
    }

    /// Replace the result with one of any variant, keeping the metadata.
    #[must_use]
    pub fn replace_result(self, result: RestResult<Payload>) -> Self {
        Self {
            result,
            metadata: self.metadata,
        }
    }

    /// Transform the success value (links and embeddings preserved).
    #[must_use]
    pub fn map_success<F>(self, f: F) -> Self
    where
        F: FnOnce(RestValue<Payload>) -> RestValue<Payload>,
    {
        match self.result {
            RestResult::Success(v) => Self {
                result: RestResult::Success(f(v)),
                metadata: self.metadata,
            },
            other => Self {
                result: other,
                metadata: self.metadata,
            },
        }
    }

    /// Append links to a success value; other variants pass through.
    #[must_use]
    pub fn with_links(self, links: Vec<Link>) -> Self {
        if links.is_empty() {
            return self;
        }
        self.map_success(|v| v.with_links(links))
    }
}

impl From<RestResult<Payload>> for RestResponse {
    fn from(result: RestResult<Payload>) -> Self {
        Self::new(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::VersionToken;
    use crate::result::FailureOn;

    #[test]
    fn test_add_metadata_does_not_mutate_original() {
        let original = RestResult::ok("x".to_string()).erase().to_response();
        let updated = original.add_metadata(VersionToken::new("t1"));
        assert!(original.metadata_item::<VersionToken>().is_none());
        assert_eq!(
            updated.metadata_item::<VersionToken>(),
            Some(&VersionToken::new("t1"))
        );
        assert!(updated.is_success());
    }

    #[test]
    fn test_select_rejects_variant_change() {
        let response = RestResult::ok(1_i64).erase().to_response();
        let err = response
            .select(|_| RestResult::not_found(FailureOn::Resource))
            .unwrap_err();
        assert_eq!(err.expected, crate::result::ResultKind::Success);
    }

    #[test]
    fn test_select_same_variant() {
        let response = RestResult::ok(1_i64).erase().to_response();
        let mapped = response
            .select(|r| r.map_value(|_| Payload::new(2_i64)))
            .unwrap();
        assert_eq!(mapped.result().value_as::<i64>(), Some(&2));
    }
}
