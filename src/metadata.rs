//! # Metadata Module
//!
//! Two shapes of side-channel data travel with requests and responses:
//!
//! - [`Parameters`] - an ordered string multi-map (query-string style input,
//!   raw header pairs). Stack-allocated for the common case of ≤8 entries.
//! - [`Metadata`] - a type-keyed heterogeneous map. Each semantic tag type
//!   holds at most one value; inserting an existing tag combines the values
//!   through [`MetadataItem::merge`].
//!
//! The standard tags understood by the core are [`Versioning`],
//! [`VersionToken`], [`IfNoneMatch`], [`CachePolicy`] and [`Principal`].

use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maximum number of parameters stored inline before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Names use `Arc<str>` since they repeat across requests and clone in O(1).
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Ordered string multi-map. Defaults to empty, never absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Parameters(ParamVec);

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self(ParamVec::new())
    }

    /// Append a pair, keeping earlier pairs with the same name.
    pub fn push(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Builder form of [`Parameters::push`].
    #[must_use]
    pub fn with(mut self, name: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Get a parameter by name.
    ///
    /// Uses "last write wins" semantics: `?limit=10&limit=20` yields `20`.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup, for header-shaped pairs.
    #[must_use]
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a name, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[(Arc<str>, String)] {
        &self.0
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A semantic metadata tag.
///
/// The default merge replaces the existing value; tags with their own
/// combination rule override it.
pub trait MetadataItem: Any + Clone + Send + Sync + fmt::Debug {
    fn merge(existing: &Self, incoming: Self) -> Self {
        let _ = existing;
        incoming
    }
}

#[derive(Clone)]
struct MetaEntry {
    value: Arc<dyn Any + Send + Sync>,
    name: &'static str,
}

/// Type-keyed heterogeneous map, at most one value per tag type.
///
/// Entries are reference counted, so cloning a `Metadata` is cheap and the
/// non-destructive `with` transforms never copy payloads.
#[derive(Clone, Default)]
pub struct Metadata {
    items: HashMap<TypeId, MetaEntry>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item` under its static type, merging with any existing value.
    pub fn insert<X: MetadataItem>(&mut self, item: X) {
        let merged = match self.get::<X>() {
            Some(existing) => X::merge(existing, item),
            None => item,
        };
        self.items.insert(
            TypeId::of::<X>(),
            MetaEntry {
                value: Arc::new(merged),
                name: std::any::type_name::<X>(),
            },
        );
    }

    /// Non-destructive insert: returns a new map, `self` is consumed.
    #[must_use]
    pub fn with<X: MetadataItem>(mut self, item: X) -> Self {
        self.insert(item);
        self
    }

    #[must_use]
    pub fn get<X: MetadataItem>(&self) -> Option<&X> {
        self.items
            .get(&TypeId::of::<X>())
            .and_then(|e| e.value.downcast_ref::<X>())
    }

    #[must_use]
    pub fn contains<X: MetadataItem>(&self) -> bool {
        self.items.contains_key(&TypeId::of::<X>())
    }

    /// Remove a tag, returning its value.
    pub fn remove<X: MetadataItem>(&mut self) -> Option<X> {
        self.items
            .remove(&TypeId::of::<X>())
            .and_then(|e| e.value.downcast_ref::<X>().cloned())
    }

    /// Copy every tag of `other` into `self`, `other` wins on conflicts.
    pub fn extend(&mut self, other: &Metadata) {
        for (k, v) in &other.items {
            self.items.insert(*k, v.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.items.values().map(|e| e.name))
            .finish()
    }
}

/// API version information.
///
/// On a request it is the range of versions the caller accepts; on a
/// response it is the version that served the call plus the versions the
/// resource supports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Versioning {
    pub current: Option<String>,
    pub supported: Vec<String>,
}

impl Versioning {
    pub fn new(current: impl Into<String>) -> Self {
        let current = current.into();
        Self {
            supported: vec![current.clone()],
            current: Some(current),
        }
    }

    #[must_use]
    pub fn with_supported<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for v in versions {
            let v = v.into();
            if !self.supported.contains(&v) {
                self.supported.push(v);
            }
        }
        self
    }

    /// Same supported range with no current version selected.
    #[must_use]
    pub fn without_current(&self) -> Self {
        Self {
            current: None,
            supported: self.supported.clone(),
        }
    }
}

impl MetadataItem for Versioning {
    /// Supported ranges are unioned; the incoming current version wins when set.
    fn merge(existing: &Self, incoming: Self) -> Self {
        let current = incoming.current.clone().or_else(|| existing.current.clone());
        let merged = existing.without_current().with_supported(incoming.supported);
        Self { current, ..merged }
    }
}

/// Opaque content token (an entity tag).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl MetadataItem for VersionToken {}

/// Tokens the caller already holds; a match means the content is unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfNoneMatch(pub Vec<VersionToken>);

impl IfNoneMatch {
    /// Parse a comma separated header value (`"a", W/"b"`).
    #[must_use]
    pub fn parse(header: &str) -> Self {
        Self(
            header
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_start_matches("W/").trim_matches('"'))
                .map(VersionToken::new)
                .collect(),
        )
    }

    #[must_use]
    pub fn matches(&self, token: &VersionToken) -> bool {
        self.0.iter().any(|t| t == token || t.as_str() == "*")
    }
}

impl MetadataItem for IfNoneMatch {
    fn merge(existing: &Self, incoming: Self) -> Self {
        let mut tokens = existing.0.clone();
        tokens.extend(incoming.0);
        Self(tokens)
    }
}

/// Whether, and for how long, a response may be stored by a cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub store: bool,
    pub max_age: Option<Duration>,
}

impl CachePolicy {
    #[must_use]
    pub fn no_store() -> Self {
        Self {
            store: false,
            max_age: None,
        }
    }

    #[must_use]
    pub fn max_age(age: Duration) -> Self {
        Self {
            store: true,
            max_age: Some(age),
        }
    }
}

impl MetadataItem for CachePolicy {}

/// The authenticated caller, attached by the transport layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Principal {
    pub name: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl MetadataItem for Principal {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_last_write_wins() {
        let params = Parameters::new().with("limit", "10").with("limit", "20");
        assert_eq!(params.get("limit"), Some("20"));
        assert_eq!(params.get_all("limit").collect::<Vec<_>>(), vec!["10", "20"]);
        assert_eq!(params.get("offset"), None);
    }

    #[test]
    fn test_metadata_with_is_non_destructive() {
        let original = Metadata::new().with(VersionToken::new("a"));
        let updated = original.clone().with(VersionToken::new("b"));
        assert_eq!(original.get::<VersionToken>(), Some(&VersionToken::new("a")));
        assert_eq!(updated.get::<VersionToken>(), Some(&VersionToken::new("b")));
    }

    #[test]
    fn test_versioning_merge_unions_ranges() {
        let merged = Metadata::new()
            .with(Versioning::new("v1"))
            .with(Versioning::new("v2"));
        let v = merged.get::<Versioning>().unwrap();
        assert_eq!(v.current.as_deref(), Some("v2"));
        assert_eq!(v.supported, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[test]
    fn test_if_none_match_parse() {
        let inm = IfNoneMatch::parse("\"abc\", W/\"def\"");
        assert!(inm.matches(&VersionToken::new("abc")));
        assert!(inm.matches(&VersionToken::new("def")));
        assert!(!inm.matches(&VersionToken::new("xyz")));
    }
}
