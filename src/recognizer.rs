//! Route recognition.
//!
//! Routers never match URLs themselves; they delegate to a [`RouteRecognizer`].
//! The crate ships [`SegmentRecognizer`], a segment-by-segment matcher that
//! understands:
//!
//! - static segments (`users`), case-insensitive unless the route asks
//!   otherwise;
//! - dynamic segments (`:id`) matching exactly one non-empty segment;
//! - optional dynamic segments (`:id?`) matching zero or one segment;
//! - star segments (`*path`) matching the non-empty remainder of the path.
//!
//! When several routes match, the most specific wins: fewer stars first, then
//! (among star routes) more statics and more dynamics, otherwise fewer
//! dynamics and more statics. Ties keep registration order.
//!
//! ```
//! use navigator_pipeline::recognizer::{RouteDescriptor, RouteRecognizer, SegmentRecognizer};
//! use navigator_pipeline::RouteConfig;
//! use std::rc::Rc;
//!
//! let mut recognizer = SegmentRecognizer::new();
//! let config = Rc::new(RouteConfig::new("users/:id").name("user").module_id("user"));
//! recognizer.add(RouteDescriptor::new("users/:id", config));
//!
//! let matches = recognizer.recognize("users/7?tab=posts");
//! assert_eq!(matches[0].params.get("id"), Some("7"));
//! assert_eq!(matches[0].query_params.get("tab"), Some("posts"));
//! ```

#[cfg(feature = "cache")]
use crate::cache::RecognitionCache;
use crate::error::RouterError;
use crate::params::{decode_uri, QueryParams, RouteParams};
use crate::route::RouteConfig;
use crate::trace_log;
use std::collections::HashMap;
use std::rc::Rc;

// ============================================================================
// Contract
// ============================================================================

/// A pattern registration.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub path: String,
    pub handler: Rc<RouteConfig>,
    pub case_sensitive: bool,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, handler: Rc<RouteConfig>) -> Self {
        let case_sensitive = handler.case_sensitive;
        Self {
            path: path.into(),
            handler,
            case_sensitive,
        }
    }
}

/// Segment-type counts of a registered pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentTypes {
    pub statics: usize,
    pub dynamics: usize,
    pub stars: usize,
}

/// One recognized route.
#[derive(Debug, Clone)]
pub struct RecognizedRoute {
    pub handler: Rc<RouteConfig>,
    pub params: RouteParams,
    pub query_params: QueryParams,
    pub is_dynamic: bool,
}

/// Route to generate a URL for.
#[derive(Debug, Clone, Copy)]
pub enum RouteRef<'a> {
    Name(&'a str),
    Config(&'a Rc<RouteConfig>),
}

impl<'a> From<&'a str> for RouteRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a Rc<RouteConfig>> for RouteRef<'a> {
    fn from(config: &'a Rc<RouteConfig>) -> Self {
        Self::Config(config)
    }
}

impl RouteRef<'_> {
    pub(crate) fn display_name(&self) -> String {
        match self {
            Self::Name(name) => (*name).to_string(),
            Self::Config(config) => config.name.clone().unwrap_or_else(|| config.route.clone()),
        }
    }
}

/// The matcher a router delegates URL recognition and generation to.
pub trait RouteRecognizer {
    /// Register a pattern and report its segment counts.
    fn add(&mut self, route: RouteDescriptor) -> SegmentTypes;

    /// Match a URL (fragment plus optional query string), best match first.
    fn recognize(&mut self, url: &str) -> Vec<RecognizedRoute>;

    fn has_route(&self, route: RouteRef<'_>) -> bool;

    /// Build a path for a route. Params not consumed by the pattern go into
    /// the query string.
    fn generate(&self, route: RouteRef<'_>, params: &RouteParams) -> Result<String, RouterError>;
}

/// Factory used by routers to create fresh recognizers on reset.
pub type RecognizerFactory = Rc<dyn Fn() -> Box<dyn RouteRecognizer>>;

/// The factory for [`SegmentRecognizer`].
pub fn segment_recognizer_factory() -> RecognizerFactory {
    Rc::new(|| Box::new(SegmentRecognizer::new()) as Box<dyn RouteRecognizer>)
}

// ============================================================================
// SegmentRecognizer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Dynamic { name: String, optional: bool },
    Star(String),
}

#[derive(Debug)]
struct CompiledRoute {
    segments: Vec<Segment>,
    handler: Rc<RouteConfig>,
    case_sensitive: bool,
    types: SegmentTypes,
}

/// Default [`RouteRecognizer`].
#[derive(Debug, Default)]
pub struct SegmentRecognizer {
    routes: Vec<CompiledRoute>,
    names: HashMap<String, usize>,
    #[cfg(feature = "cache")]
    cache: RecognitionCache,
}

impl SegmentRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognition cache statistics.
    #[cfg(feature = "cache")]
    pub fn cache(&self) -> &RecognitionCache {
        &self.cache
    }

    fn find(&self, route: RouteRef<'_>) -> Option<&CompiledRoute> {
        match route {
            RouteRef::Name(name) => self.names.get(name).map(|&i| &self.routes[i]),
            RouteRef::Config(config) => self
                .routes
                .iter()
                .find(|r| Rc::ptr_eq(&r.handler, config))
                .or_else(|| {
                    let name = config.name.as_deref()?;
                    self.names.get(name).map(|&i| &self.routes[i])
                }),
        }
    }

    fn recognize_uncached(&self, url: &str) -> Vec<RecognizedRoute> {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query_params = QueryParams::from_query_string(query);

        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut solutions: Vec<(&CompiledRoute, RouteParams)> = self
            .routes
            .iter()
            .filter_map(|route| {
                let mut params = RouteParams::new();
                match_segments(&route.segments, &segments, route.case_sensitive, &mut params)
                    .then_some((route, params))
            })
            .collect();

        solutions.sort_by(|(a, _), (b, _)| compare_specificity(&a.types, &b.types));

        solutions
            .into_iter()
            .take(1)
            .map(|(route, params)| RecognizedRoute {
                handler: Rc::clone(&route.handler),
                params,
                query_params: query_params.clone(),
                is_dynamic: route.types.dynamics > 0 || route.types.stars > 0,
            })
            .collect()
    }
}

impl RouteRecognizer for SegmentRecognizer {
    fn add(&mut self, route: RouteDescriptor) -> SegmentTypes {
        let segments = parse_pattern(&route.path);
        let mut types = SegmentTypes::default();
        for segment in &segments {
            match segment {
                Segment::Static(_) => types.statics += 1,
                Segment::Dynamic { .. } => types.dynamics += 1,
                Segment::Star(_) => types.stars += 1,
            }
        }

        if let Some(name) = route.handler.name.clone() {
            self.names.insert(name, self.routes.len());
        }

        trace_log!(
            "Recognizer added '{}' ({} static, {} dynamic, {} star)",
            route.path,
            types.statics,
            types.dynamics,
            types.stars
        );

        self.routes.push(CompiledRoute {
            segments,
            handler: route.handler,
            case_sensitive: route.case_sensitive,
            types,
        });

        #[cfg(feature = "cache")]
        self.cache.clear();

        types
    }

    fn recognize(&mut self, url: &str) -> Vec<RecognizedRoute> {
        #[cfg(feature = "cache")]
        if let Some(hit) = self.cache.get(url) {
            return hit;
        }

        let result = self.recognize_uncached(url);
        #[cfg(feature = "cache")]
        self.cache.insert(url.to_string(), result.clone());
        result
    }

    fn has_route(&self, route: RouteRef<'_>) -> bool {
        self.find(route).is_some()
    }

    fn generate(&self, route: RouteRef<'_>, params: &RouteParams) -> Result<String, RouterError> {
        let compiled = self.find(route).ok_or_else(|| RouterError::UnknownRouteName {
            name: route.display_name(),
        })?;

        let mut remaining = params.clone();
        let mut output = String::new();

        for segment in &compiled.segments {
            let value = match segment {
                Segment::Static(text) => Some(text.clone()),
                Segment::Dynamic { name, optional } => match remaining.remove(name) {
                    Some(value) if value.is_empty() && *optional => None,
                    Some(value) => Some(value),
                    None if *optional => None,
                    None => {
                        return Err(RouterError::MissingRouteParam {
                            route: route.display_name(),
                            param: name.clone(),
                        })
                    }
                },
                Segment::Star(name) => match remaining.remove(name) {
                    Some(value) => Some(value),
                    None => {
                        return Err(RouterError::MissingRouteParam {
                            route: route.display_name(),
                            param: name.clone(),
                        })
                    }
                },
            };

            if let Some(value) = value {
                output.push('/');
                output.push_str(&value);
            }
        }

        if output.is_empty() {
            output.push('/');
        }

        if !remaining.is_empty() {
            let query: QueryParams = remaining.iter().fold(QueryParams::new(), |mut q, (k, v)| {
                q.insert(k, v);
                q
            });
            output.push('?');
            output.push_str(&query.to_query_string());
        }

        Ok(output)
    }
}

// ============================================================================
// Matching
// ============================================================================

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                match name.strip_suffix('?') {
                    Some(name) => Segment::Dynamic {
                        name: name.to_string(),
                        optional: true,
                    },
                    None => Segment::Dynamic {
                        name: name.to_string(),
                        optional: false,
                    },
                }
            } else if let Some(name) = segment.strip_prefix('*') {
                Segment::Star(name.to_string())
            } else {
                Segment::Static(segment.to_string())
            }
        })
        .collect()
}

/// Backtracking match of pattern segments against path segments.
fn match_segments(
    pattern: &[Segment],
    path: &[&str],
    case_sensitive: bool,
    params: &mut RouteParams,
) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };

    match first {
        Segment::Static(text) => {
            let Some((segment, tail)) = path.split_first() else {
                return false;
            };
            let equal = if case_sensitive {
                segment == text
            } else {
                segment.eq_ignore_ascii_case(text)
            };
            equal && match_segments(rest, tail, case_sensitive, params)
        }
        Segment::Dynamic { name, optional } => {
            if let Some((segment, tail)) = path.split_first() {
                let mut attempt = params.clone();
                attempt.insert(name.clone(), decode_uri(segment));
                if match_segments(rest, tail, case_sensitive, &mut attempt) {
                    *params = attempt;
                    return true;
                }
            }
            if *optional {
                let mut attempt = params.clone();
                attempt.insert(name.clone(), "");
                if match_segments(rest, path, case_sensitive, &mut attempt) {
                    *params = attempt;
                    return true;
                }
            }
            false
        }
        Segment::Star(name) => {
            // Greedy: the star takes as much as the remaining pattern allows.
            for split in (1..=path.len()).rev() {
                let (taken, tail) = path.split_at(split);
                let mut attempt = params.clone();
                attempt.insert(name.clone(), decode_uri(&taken.join("/")));
                if match_segments(rest, tail, case_sensitive, &mut attempt) {
                    *params = attempt;
                    return true;
                }
            }
            false
        }
    }
}

fn compare_specificity(a: &SegmentTypes, b: &SegmentTypes) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let by_stars = a.stars.cmp(&b.stars);
    if by_stars != Ordering::Equal {
        return by_stars;
    }
    if a.stars > 0 {
        let by_statics = b.statics.cmp(&a.statics);
        if by_statics != Ordering::Equal {
            return by_statics;
        }
        let by_dynamics = b.dynamics.cmp(&a.dynamics);
        if by_dynamics != Ordering::Equal {
            return by_dynamics;
        }
    }
    a.dynamics
        .cmp(&b.dynamics)
        .then_with(|| b.statics.cmp(&a.statics))
}
