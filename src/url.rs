//! URL shaping helpers.
//!
//! Routers speak in *fragments*: `users/42?tab=posts`, with no leading `#` or
//! `/`. Links and history entries speak in *rooted paths*, whose exact form
//! depends on whether the history uses push-state:
//!
//! | push-state | rooted form        |
//! |------------|--------------------|
//! | no         | `#/users/42`       |
//! | yes        | `/users/42`        |
//!
//! The helpers here convert between the two, prefix child-router paths with
//! their router's base URL, and leave absolute URLs (`https://...`, `//cdn`)
//! untouched.
//!
//! ```
//! use navigator_pipeline::url::{create_rooted_path, resolve_url};
//!
//! assert_eq!(create_rooted_path("detail", "users/", false, false), "#/users/detail");
//! assert_eq!(resolve_url("#/home", "users/", false), "#/home");
//! assert_eq!(resolve_url("detail", "users/", true), "/users/detail");
//! ```

use std::borrow::Cow;

/// `true` for `/path` and `#/path`.
pub fn is_rooted_path(path: &str) -> bool {
    path.starts_with('/') || path.starts_with("#/")
}

/// `true` for `scheme://...` and protocol-relative `//...` URLs.
pub fn is_absolute_url(url: &str) -> bool {
    let rest = match url.find(':') {
        Some(colon) => {
            let scheme = &url[..colon];
            let valid_scheme = scheme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid_scheme {
                return url.starts_with("//");
            }
            &url[colon + 1..]
        }
        None => url,
    };
    rest.starts_with("//")
}

/// Apply the hash prefix (without push-state) or strip the leading character
/// of an absolute push-state path.
pub fn normalize_absolute_path(path: &str, has_push_state: bool, absolute: bool) -> String {
    let mut path = Cow::Borrowed(path);
    if !has_push_state && !path.starts_with('#') {
        path = Cow::Owned(format!("#{path}"));
    }
    if has_push_state && absolute {
        path = Cow::Owned(path.chars().skip(1).collect());
    }
    path.into_owned()
}

/// Join `fragment` under `base_url` and normalize the result.
pub fn create_rooted_path(
    fragment: &str,
    base_url: &str,
    has_push_state: bool,
    absolute: bool,
) -> String {
    if is_absolute_url(fragment) {
        return fragment.to_string();
    }

    let mut path = String::new();
    if !base_url.is_empty() && !base_url.starts_with('/') {
        path.push('/');
    }
    path.push_str(base_url);

    if !path.ends_with('/') && !fragment.starts_with('/') {
        path.push('/');
    }
    if path.ends_with('/') && fragment.starts_with('/') {
        path.pop();
    }

    path.push_str(fragment);
    normalize_absolute_path(&path, has_push_state, absolute)
}

/// Resolve a navigation target relative to a router's base URL.
///
/// Rooted targets are only normalized; relative ones are placed under
/// `base_url`.
pub fn resolve_url(fragment: &str, base_url: &str, has_push_state: bool) -> String {
    if is_rooted_path(fragment) {
        normalize_absolute_path(fragment, has_push_state, false)
    } else {
        create_rooted_path(fragment, base_url, has_push_state, false)
    }
}

/// Reduce a rooted path or URL to the fragment routers recognize.
///
/// Strips a leading `#` and any leading slashes, plus trailing whitespace.
///
/// ```
/// use navigator_pipeline::url::fragment_of;
///
/// assert_eq!(fragment_of("#/users/1?x=2"), "users/1?x=2");
/// assert_eq!(fragment_of("///a"), "a");
/// ```
pub fn fragment_of(url: &str) -> String {
    let url = url.strip_prefix('#').unwrap_or(url);
    url.trim_start_matches('/').trim_end().to_string()
}

/// Split `fragment?query` at the first `?`.
pub fn split_query(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_and_absolute_detection() {
        assert!(is_rooted_path("/a"));
        assert!(is_rooted_path("#/a"));
        assert!(!is_rooted_path("a"));
        assert!(!is_rooted_path("#a"));

        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("//cdn.example.com/x"));
        assert!(!is_absolute_url("users/1"));
        assert!(!is_absolute_url("a:b"));
    }

    #[test]
    fn test_normalize_absolute_path() {
        assert_eq!(normalize_absolute_path("/a", false, false), "#/a");
        assert_eq!(normalize_absolute_path("#/a", false, false), "#/a");
        assert_eq!(normalize_absolute_path("/a", true, false), "/a");
        assert_eq!(normalize_absolute_path("/a", true, true), "a");
    }

    #[test]
    fn test_create_rooted_path() {
        assert_eq!(create_rooted_path("b", "", false, false), "#/b");
        assert_eq!(create_rooted_path("b", "a", false, false), "#/a/b");
        assert_eq!(create_rooted_path("b", "a/", true, false), "/a/b");
        assert_eq!(create_rooted_path("/b", "/a/", true, false), "/a/b");
        assert_eq!(create_rooted_path("", "", false, false), "#/");
        assert_eq!(
            create_rooted_path("https://x.io", "a", false, false),
            "https://x.io"
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("/top", "child/", false), "#/top");
        assert_eq!(resolve_url("#/second/10?q=1", "", false), "#/second/10?q=1");
        assert_eq!(resolve_url("inner", "child/", false), "#/child/inner");
    }

    #[test]
    fn test_fragment_of_and_split() {
        assert_eq!(fragment_of("#/second/10?q=1"), "second/10?q=1");
        assert_eq!(fragment_of("plain"), "plain");
        assert_eq!(split_query("a/b?x=1&y=2"), ("a/b", "x=1&y=2"));
        assert_eq!(split_query("a/b"), ("a/b", ""));
    }
}
