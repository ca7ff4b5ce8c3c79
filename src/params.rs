//! Route and query parameters.
//!
//! - [`RouteParams`] holds values captured by dynamic (`:id`), optional
//!   (`:id?`) and star (`*path`) segments. Keys are kept ordered so that
//!   parameter comparison, URL generation and debugging output are stable.
//! - [`QueryParams`] holds the parsed `?key=value&...` part of a URL. A key may
//!   appear several times (`?tag=a&tag=b`).
//!
//! Both types are plain values: instructions clone them freely, and the plan
//! builder compares them with `==` when deciding whether a viewport needs its
//! lifecycle re-run.
//!
//! # Example
//!
//! ```
//! use navigator_pipeline::{QueryParams, RouteParams};
//!
//! let params = RouteParams::new().with("id", "42");
//! assert_eq!(params.get_as::<u32>("id"), Some(42));
//!
//! let query = QueryParams::from_query_string("page=1&sort=name");
//! assert_eq!(query.get("sort"), Some("name"));
//! ```

use std::collections::BTreeMap;

/// Parameters captured from path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: BTreeMap<String, String>,
}

impl RouteParams {
    /// Create empty route parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when constructing params inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a parameter value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Get a parameter and parse it as `T`.
    ///
    /// Returns `None` if the parameter is missing or does not parse.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.params.get(key)?.parse().ok()
    }

    /// Insert or overwrite a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Remove a parameter, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    /// Return `true` if the given key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Copy every entry of `other` into `self`, overwriting on collision.
    pub fn extend_from(&mut self, other: &RouteParams) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Merge parent and child parameters; the child wins on collision.
    ///
    /// ```
    /// use navigator_pipeline::RouteParams;
    ///
    /// let parent = RouteParams::new().with("org", "acme").with("view", "list");
    /// let child = RouteParams::new().with("view", "grid");
    ///
    /// let merged = RouteParams::merge(&parent, &child);
    /// assert_eq!(merged.get("org"), Some("acme"));
    /// assert_eq!(merged.get("view"), Some("grid"));
    /// ```
    pub fn merge(parent: &RouteParams, child: &RouteParams) -> RouteParams {
        let mut merged = parent.clone();
        merged.extend_from(child);
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for RouteParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RouteParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters parsed from a URL query string.
///
/// Keys without a value (`?flag`) are stored with the value `"true"`.
///
/// ```
/// use navigator_pipeline::QueryParams;
///
/// let query = QueryParams::from_query_string("tag=rust&tag=async&flag");
/// assert_eq!(query.get_all("tag").map(<[String]>::len), Some(2));
/// assert_eq!(query.get("flag"), Some("true"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string. A leading `?` is ignored.
    pub fn from_query_string(query: &str) -> Self {
        let mut parsed = QueryParams::new();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (decode_uri_component(key), decode_uri_component(value)),
                None => (decode_uri_component(pair), "true".to_string()),
            };
            // `tags[]=a` is treated the same as `tags=a`.
            let key = key.strip_suffix("[]").map(str::to_string).unwrap_or(key);
            if key.is_empty() {
                continue;
            }
            parsed.insert(key, value);
        }

        parsed
    }

    /// Get the first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key)?.first().map(String::as_str)
    }

    /// Get every value for a key.
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.get(key)?.parse().ok()
    }

    /// Append a value for the given key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.entry(key.into()).or_default().push(value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Iterate over keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Serialize back into a query string, keys in order.
    pub fn to_query_string(&self) -> String {
        let pairs: Vec<String> = self
            .params
            .iter()
            .flat_map(|(key, values)| {
                values.iter().map(move |value| {
                    format!(
                        "{}={}",
                        encode_uri_component(key),
                        encode_uri_component(value)
                    )
                })
            })
            .collect();

        pairs.join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.params.len()
    }
}

/// Percent-encode a URI component.
///
/// Unreserved characters plus `!'()*` pass through; everything else is
/// encoded byte by byte from its UTF-8 form.
pub fn encode_uri_component(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'~'
            | b'!'
            | b'\''
            | b'('
            | b')'
            | b'*' => encoded.push(char::from(byte)),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Percent-encode a full URI, leaving reserved separators intact.
pub fn encode_uri(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            ';' | ',' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '#' => encoded.push(ch),
            _ => {
                let mut buf = [0u8; 4];
                encoded.push_str(&encode_uri_component(ch.encode_utf8(&mut buf)));
            }
        }
    }
    encoded
}

/// Decode a percent-encoded URI component.
///
/// `+` is read as a space. Malformed escapes are kept verbatim and invalid
/// UTF-8 is replaced rather than rejected.
pub fn decode_uri_component(s: &str) -> String {
    percent_decode(s, true)
}

/// Decode percent escapes in a full URI; `+` is left alone.
pub fn decode_uri(s: &str) -> String {
    percent_decode(s, false)
}

fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                    }
                    None => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                decoded.push(b' ');
                i += 1;
            }
            other => {
                decoded.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

// ============================================================================
// Tests
// ============================================================================
