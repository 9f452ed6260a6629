//! Key Model - canonical identities for bindable values
//!
//! Textual forms:
//! - `TypeKey`: `[@Qualifier ]TypeName`, e.g. `com.example.Http` or
//!   `@Named("base url") kotlin.String`
//! - `ContextualTypeKey`: `Provider<K>`, `Lazy<K>`, `Provider<Lazy<K>>` or `K`,
//!   with a trailing `?` when the consumer tolerates absence

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical `(type, qualifier)` identity of a graph node.
///
/// Ordering is type name first, then qualifier, which keeps every
/// iteration over keys deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// Fully qualified type name
    pub type_name: String,
    /// Optional qualifier annotation, stored without the leading `@`
    pub qualifier: Option<String>,
}

impl TypeKey {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            qualifier: None,
        }
    }

    pub fn qualified(type_name: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            qualifier: Some(qualifier.into()),
        }
    }

    /// Synthetic key of one element contributed into a multibinding.
    ///
    /// Every element gets its own node so elements can be ordered, sharded
    /// and diagnosed individually.
    pub fn multibinding_element(element_type: impl Into<String>, collection: &TypeKey, origin: &Origin) -> Self {
        Self::qualified(element_type, format!("multibinding({})#{}", collection, origin))
    }

    pub fn is_multibinding_element(&self) -> bool {
        self.qualifier
            .as_deref()
            .is_some_and(|q| q.starts_with("multibinding("))
    }

    /// Parse the textual form `[@Qualifier ]TypeName`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidKey("empty type key".to_string()));
        }

        let Some(rest) = text.strip_prefix('@') else {
            return Self::checked(text, None);
        };

        // The qualifier ends at the first whitespace outside parentheses
        let mut depth = 0usize;
        let mut end = None;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let end = end.ok_or_else(|| Error::InvalidKey(format!("qualified key without type: {}", text)))?;
        let (qualifier, type_name) = rest.split_at(end);
        if qualifier.is_empty() {
            return Err(Error::InvalidKey(format!("empty qualifier: {}", text)));
        }
        Self::checked(type_name.trim(), Some(qualifier.to_string()))
    }

    fn checked(type_name: &str, qualifier: Option<String>) -> Result<Self> {
        // Whitespace is only allowed inside type arguments: `Map<String, Plugin>`
        let mut depth = 0usize;
        let stray_space = type_name.chars().any(|c| match c {
            '<' => {
                depth += 1;
                false
            }
            '>' => {
                depth = depth.saturating_sub(1);
                false
            }
            c => c.is_whitespace() && depth == 0,
        });
        if type_name.is_empty() || stray_space {
            return Err(Error::InvalidKey(format!("invalid type name: {:?}", type_name)));
        }
        Ok(Self {
            type_name: type_name.to_string(),
            qualifier,
        })
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "@{} {}", q, self.type_name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

impl FromStr for TypeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for TypeKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TypeKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// How a consumer receives a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Wrapping {
    /// The value itself, constructed before the consumer
    #[default]
    Direct,
    /// A factory invoked on demand (`Provider<T>`)
    Provider,
    /// A memoized factory (`Lazy<T>`)
    Lazy,
    /// A factory of memoized factories (`Provider<Lazy<T>>`)
    ProviderOfLazy,
}

impl Wrapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Wrapping::Direct => "direct",
            Wrapping::Provider => "provider",
            Wrapping::Lazy => "lazy",
            Wrapping::ProviderOfLazy => "provider-of-lazy",
        }
    }

    /// Whether the graph can break a cycle at an edge with this wrapping
    pub fn is_deferrable(&self) -> bool {
        !matches!(self, Wrapping::Direct)
    }
}

impl fmt::Display for Wrapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `TypeKey` as seen from one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextualTypeKey {
    pub key: TypeKey,
    pub wrapping: Wrapping,
    /// The consumer declares a default and tolerates an absent binding
    pub has_default: bool,
}

impl ContextualTypeKey {
    pub fn direct(key: TypeKey) -> Self {
        Self {
            key,
            wrapping: Wrapping::Direct,
            has_default: false,
        }
    }

    pub fn wrapped(key: TypeKey, wrapping: Wrapping) -> Self {
        Self {
            key,
            wrapping,
            has_default: false,
        }
    }

    /// Mark this dependency as optional
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn is_deferrable(&self) -> bool {
        self.wrapping.is_deferrable()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (text, has_default) = match text.strip_suffix('?') {
            Some(inner) => (inner.trim_end(), true),
            None => (text, false),
        };

        let (wrapping, inner) = if let Some(inner) = unwrap_generic(text, "Provider") {
            match unwrap_generic(inner, "Lazy") {
                Some(lazy_inner) => (Wrapping::ProviderOfLazy, lazy_inner),
                None => (Wrapping::Provider, inner),
            }
        } else if let Some(inner) = unwrap_generic(text, "Lazy") {
            (Wrapping::Lazy, inner)
        } else {
            (Wrapping::Direct, text)
        };

        Ok(Self {
            key: TypeKey::parse(inner)?,
            wrapping,
            has_default,
        })
    }
}

fn unwrap_generic<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}

impl fmt::Display for ContextualTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wrapping {
            Wrapping::Direct => write!(f, "{}", self.key)?,
            Wrapping::Provider => write!(f, "Provider<{}>", self.key)?,
            Wrapping::Lazy => write!(f, "Lazy<{}>", self.key)?,
            Wrapping::ProviderOfLazy => write!(f, "Provider<Lazy<{}>>", self.key)?,
        }
        if self.has_default {
            write!(f, "?")?;
        }
        Ok(())
    }
}

impl FromStr for ContextualTypeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<TypeKey> for ContextualTypeKey {
    fn from(key: TypeKey) -> Self {
        Self::direct(key)
    }
}

impl Serialize for ContextualTypeKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContextualTypeKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ContextualTypeKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque scope marker, e.g. `AppScope`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeMarker(pub String);

impl ScopeMarker {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the declaration (or declaring container) a record came from.
///
/// Callers map origins back to source locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(pub String);

impl Origin {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
