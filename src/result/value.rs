use crate::capability::CapabilityKey;
use crate::identity::{Address, Payload, Resource};
use http::Method;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A hypermedia reference from a value to another resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    /// Relation type (`self`, `describedby`, `next`, ...)
    pub rel: String,
    pub target: Address,
    /// Opaque query parameters to send along when following the link.
    pub parameters: Option<Value>,
    /// Capability exercised by following the link.
    pub capability: CapabilityKey,
}

impl Link {
    /// A link followed with GET on the target's resource type.
    pub fn new(rel: impl Into<String>, target: Address) -> Self {
        let capability = CapabilityKey::new(Method::GET, target.resource_type());
        Self {
            rel: rel.into(),
            target,
            parameters: None,
            capability,
        }
    }

    #[must_use]
    pub fn with_capability(mut self, verb: Method) -> Self {
        self.capability = CapabilityKey::new(verb, self.target.resource_type());
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// A related object embedded into a value, tagged with its relation type.
#[derive(Clone, Debug)]
pub struct Embedding {
    pub rel: String,
    pub value: Payload,
}

impl Embedding {
    pub fn new<T: Resource>(rel: impl Into<String>, value: T) -> Self {
        Self {
            rel: rel.into(),
            value: Payload::new(value),
        }
    }
}

#[derive(Clone, Default)]
struct Hypermedia {
    links: Vec<Link>,
    embeddings: Vec<Embedding>,
}

type HypermediaInit = Box<dyn FnOnce() -> Hypermedia + Send>;
type SharedHypermedia = Arc<Lazy<Hypermedia, HypermediaInit>>;

fn deferred<F>(compute: F) -> SharedHypermedia
where
    F: FnOnce() -> Hypermedia + Send + 'static,
{
    let init: HypermediaInit = Box::new(compute);
    Arc::new(Lazy::new(init))
}

/// A payload plus its links and embedded related objects.
///
/// The lazy form defers computing links and embeddings until first access
/// and memoizes them; callers that only read the raw value never pay for it.
pub struct RestValue<T = Payload> {
    value: T,
    hypermedia: SharedHypermedia,
}

impl<T> RestValue<T> {
    pub fn new(value: T) -> Self {
        Self::from_parts(value, Vec::new(), Vec::new())
    }

    pub fn from_parts(value: T, links: Vec<Link>, embeddings: Vec<Embedding>) -> Self {
        let eager = Hypermedia { links, embeddings };
        Self {
            value,
            hypermedia: deferred(move || eager),
        }
    }

    /// Links and embeddings computed on first access.
    pub fn lazy<F>(value: T, compute: F) -> Self
    where
        F: FnOnce() -> (Vec<Link>, Vec<Embedding>) + Send + 'static,
    {
        Self {
            value,
            hypermedia: deferred(move || {
                let (links, embeddings) = compute();
                Hypermedia { links, embeddings }
            }),
        }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.hypermedia.links
    }

    #[must_use]
    pub fn embeddings(&self) -> &[Embedding] {
        &self.hypermedia.embeddings
    }

    /// Links for a relation type.
    pub fn links_for<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links().iter().filter(move |l| l.rel == rel)
    }

    /// New value with `extra` appended after the existing links.
    ///
    /// Stays lazy: the existing links are not forced until the result is read.
    #[must_use]
    pub fn with_links<I>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = Link>,
        I::IntoIter: Send + 'static,
    {
        let previous = self.hypermedia;
        let extra = extra.into_iter();
        Self {
            value: self.value,
            hypermedia: deferred(move || {
                let mut hm = (**previous).clone();
                hm.links.extend(extra);
                hm
            }),
        }
    }

    /// New value with only the links accepted by `keep`.
    #[must_use]
    pub fn retain_links<F>(self, keep: F) -> Self
    where
        F: Fn(&Link) -> bool + Send + 'static,
    {
        let previous = self.hypermedia;
        Self {
            value: self.value,
            hypermedia: deferred(move || {
                let mut hm = (**previous).clone();
                hm.links.retain(|l| keep(l));
                hm
            }),
        }
    }

    #[must_use]
    pub fn with_embedding(self, embedding: Embedding) -> Self {
        let previous = self.hypermedia;
        Self {
            value: self.value,
            hypermedia: deferred(move || {
                let mut hm = (**previous).clone();
                hm.embeddings.push(embedding);
                hm
            }),
        }
    }

    /// Map the value, sharing the (possibly still lazy) hypermedia.
    pub fn map<U, F>(self, f: F) -> RestValue<U>
    where
        F: FnOnce(T) -> U,
    {
        RestValue {
            value: f(self.value),
            hypermedia: self.hypermedia,
        }
    }
}

impl<T: Resource> RestValue<T> {
    #[must_use]
    pub fn erase(self) -> RestValue<Payload> {
        self.map(Payload::new)
    }
}

impl<T: Clone> Clone for RestValue<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            hypermedia: Arc::clone(&self.hypermedia),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RestValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RestValue");
        d.field("value", &self.value);
        match Lazy::get(&*self.hypermedia) {
            Some(hm) => d
                .field("links", &hm.links)
                .field("embeddings", &hm.embeddings),
            None => d.field("hypermedia", &"<lazy>"),
        };
        d.finish()
    }
}
