//! Resource key construction.
//!
//! A resource key is the canonical string identity of a remote resource:
//! the base address plus a deterministic serialization of its query
//! parameters. Two logically identical parameter maps in the same declared
//! order always serialize to the same key; the engine relies on this for
//! every registry and cache lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered query parameters.
///
/// Pairs are serialized in insertion order - there is no implicit sorting.
/// Callers that want two call sites to share a cache entry are responsible
/// for declaring their parameters in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Create an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key/value pair, preserving insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Whether any parameters are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as `key=value&key=value` with component-wise percent-encoding.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(&encode_component(key));
            out.push('=');
            out.push_str(&encode_component(value));
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Canonical identity of a remote resource.
///
/// Equality is structural string equality, which makes the key usable
/// directly as a map key across the registry, epoch ledgers, and cache
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Build a key from a bare address with no query parameters.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Build a key from an address and ordered query parameters.
    ///
    /// Produces the address unchanged when `params` is empty, otherwise
    /// `address?k=v&k=v` with each component percent-encoded.
    pub fn build(address: &str, params: &QueryParams) -> Self {
        if params.is_empty() {
            Self(address.to_string())
        } else {
            Self(format!("{}?{}", address, params.encode()))
        }
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for ResourceKey {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Percent-encode a single query component.
///
/// Unreserved characters (RFC 3986: ALPHA / DIGIT / `-` / `.` / `_` / `~`)
/// pass through; everything else is emitted as uppercase `%XX` per byte.
fn encode_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push(hex_digit(byte >> 4));
                out.push(hex_digit(byte & 0x0f));
            }
        }
    }
    out
}

fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'A' + nibble - 10) as char,
    }
}
