//! # Request Module
//!
//! [`RestRequest`] is the transport-independent input of the core: a
//! capability name (the verb), a typed [`Address`], query-style
//! [`Parameters`], a lazily parsed [`Body`], side-channel header pairs,
//! typed [`Metadata`] and a cooperative [`CancellationToken`].
//!
//! Requests are immutable once built; the `with_*` methods consume and return
//! a new request, which is how middleware derives variants of a request.

use crate::capability::TypeInfo;
use crate::ids::RequestId;
use crate::identity::Address;
use crate::metadata::{IfNoneMatch, Metadata, MetadataItem, Parameters, Principal, Versioning};
use futures::future::{BoxFuture, FutureExt};
use http::Method;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Header carrying a caller supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying version tokens for conditional requests.
pub const IF_NONE_MATCH_HEADER: &str = "if-none-match";
/// Header carrying the accepted API versions, comma separated.
pub const ACCEPT_VERSION_HEADER: &str = "accept-version";

/// Body parsing failed or no body was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    Missing,
    Invalid(String),
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyError::Missing => f.write_str("request body is missing"),
            BodyError::Invalid(msg) => write!(f, "request body is invalid: {msg}"),
        }
    }
}

impl std::error::Error for BodyError {}

/// Decodes the raw request body for a declared body type.
///
/// The codec layer owns the wire format; the core receives a JSON value and
/// deserializes it into the declared type itself.
pub type BodyParser =
    Arc<dyn Fn(TypeInfo) -> BoxFuture<'static, Result<Value, BodyError>> + Send + Sync>;

type ParsedBody = Arc<OnceCell<Result<Value, BodyError>>>;

/// Lazy request body, parsed at most once per distinct declared type.
#[derive(Clone, Default)]
pub struct Body {
    parser: Option<BodyParser>,
    parsed: Arc<Mutex<HashMap<TypeId, ParsedBody>>>,
}

impl Body {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_parser(parser: BodyParser) -> Self {
        Self {
            parser: Some(parser),
            parsed: Arc::default(),
        }
    }

    /// A body that is already decoded; every declared type sees the same value.
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::from_parser(Arc::new(move |_ty: TypeInfo| {
            let value = value.clone();
            async move { Ok::<_, BodyError>(value) }.boxed()
        }))
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.parser.is_some()
    }

    /// Parse the body for `ty`, reusing an earlier parse of the same type.
    pub async fn parse(&self, ty: TypeInfo) -> Result<Value, BodyError> {
        let Some(parser) = self.parser.as_ref() else {
            return Err(BodyError::Missing);
        };
        let cell = {
            let mut parsed = self
                .parsed
                .lock()
                .map_err(|_| BodyError::Invalid("body cache poisoned".to_string()))?;
            Arc::clone(parsed.entry(ty.type_id()).or_default())
        };
        cell.get_or_init(|| parser(ty)).await.clone()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("present", &self.is_present())
            .finish()
    }
}

/// Transport-independent request.
#[derive(Clone, Debug)]
pub struct RestRequest {
    request_id: RequestId,
    capability: Method,
    address: Address,
    parameters: Parameters,
    headers: Parameters,
    body: Body,
    metadata: Metadata,
    cancellation: CancellationToken,
}

impl RestRequest {
    #[must_use]
    pub fn new(capability: Method, address: Address) -> Self {
        Self {
            request_id: RequestId::new(),
            capability,
            address,
            parameters: Parameters::new(),
            headers: Parameters::new(),
            body: Body::empty(),
            metadata: Metadata::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Inbound contract used by transport adapters.
    ///
    /// Well-known header pairs are lifted into typed metadata:
    /// `if-none-match` becomes [`IfNoneMatch`], `accept-version` becomes
    /// [`Versioning`] and `x-request-id` seeds the request id.
    #[must_use]
    pub fn create(
        capability: Method,
        address: Address,
        parameters: Parameters,
        body_parser: Option<BodyParser>,
        headers: Parameters,
    ) -> Self {
        let mut metadata = Metadata::new();
        if let Some(inm) = headers.get_ignore_case(IF_NONE_MATCH_HEADER) {
            metadata.insert(IfNoneMatch::parse(inm));
        }
        if let Some(versions) = headers.get_ignore_case(ACCEPT_VERSION_HEADER) {
            let supported: Vec<&str> = versions
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            if !supported.is_empty() {
                metadata.insert(Versioning::default().with_supported(supported));
            }
        }
        Self {
            request_id: RequestId::from_header_or_new(headers.get_ignore_case(REQUEST_ID_HEADER)),
            capability,
            address,
            parameters,
            headers,
            body: body_parser.map(Body::from_parser).unwrap_or_default(),
            metadata,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn capability(&self) -> &Method {
        &self.capability
    }

    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn headers(&self) -> &Parameters {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn metadata_item<X: MetadataItem>(&self) -> Option<&X> {
        self.metadata.get::<X>()
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.metadata.get::<Principal>()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Method) -> Self {
        self.capability = capability;
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.push(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Parameters) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_json_body(self, value: Value) -> Self {
        self.with_body(Body::json(value))
    }

    #[must_use]
    pub fn with_metadata<X: MetadataItem>(mut self, item: X) -> Self {
        self.metadata.insert(item);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = id;
        self
    }
}
