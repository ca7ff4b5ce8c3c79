//! Error handling for the navigation engine.
//!
//! Every fallible operation in the crate returns [`RouterError`]. The enum is
//! `Clone + PartialEq` because errors do not only travel through `?`: they are
//! also carried inside [`PipelineResult`](crate::PipelineResult) outputs and
//! navigation events, where several observers may look at the same value.
//!
//! The taxonomy mirrors how failures are handled:
//!
//! - **Configuration errors** ([`InvalidRouteConfig`](RouterError::InvalidRouteConfig),
//!   [`InvalidPipelineSlot`](RouterError::InvalidPipelineSlot),
//!   [`PipelineStepsOnChildRouter`](RouterError::PipelineStepsOnChildRouter))
//!   are returned synchronously by `configure`/`add_route` and are fatal to
//!   that call.
//! - **Resolution failures** ([`RouteNotFound`](RouterError::RouteNotFound))
//!   come back from instruction creation; the root queue recovers from them.
//! - **Runaway chains** ([`MaxNavigationAttemptsExceeded`](RouterError::MaxNavigationAttemptsExceeded))
//!   signal a configuration bug such as a redirect cycle.
//!
//! # Examples
//!
//! ```
//! use navigator_pipeline::RouterError;
//!
//! let err = RouterError::RouteNotFound { url: "missing/page".into() };
//! assert_eq!(err.to_string(), "Route not found: missing/page");
//! ```

use thiserror::Error;

/// Errors produced while configuring routers or driving navigations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// No route, catch-all handler or ancestor catch-all matched the URL.
    #[error("Route not found: {url}")]
    RouteNotFound { url: String },

    /// A route config failed validation.
    #[error("Invalid route config for \"{route}\": {message}")]
    InvalidRouteConfig { route: String, message: String },

    /// `generate` was asked for a route name no router in the chain knows.
    #[error(
        "A route with name '{name}' could not be found. Check that `name: '{name}'` was specified in the route's config."
    )]
    UnknownRouteName { name: String },

    /// URL generation was missing a value for a required segment.
    #[error("Missing parameter '{param}' while generating route '{route}'")]
    MissingRouteParam { route: String, param: String },

    /// Pipeline steps were exported from a router that is not the root.
    #[error("Pipeline steps can only be added to the root router")]
    PipelineStepsOnChildRouter,

    /// A step was registered against a slot name that does not exist.
    #[error("Invalid pipeline slot name: {name}.")]
    InvalidPipelineSlot { name: String },

    /// Commit found a viewport instruction with no registered viewport.
    #[error("There was no router-view found in the view for {module_id}.")]
    MissingViewPort { module_id: String },

    /// The unknown-route handler produced nothing usable.
    #[error("Invalid unknown route handler")]
    InvalidUnknownRouteHandler,

    /// Redirect or command chains went past the configured bound.
    #[error("Maximum navigation attempts exceeded. Giving up.")]
    MaxNavigationAttemptsExceeded,

    /// The router an instruction belongs to has been dropped.
    #[error("The router owning this navigation instruction has been released")]
    RouterReleased,

    /// Free-form failure raised by a hook, loader or viewport.
    #[error("{message}")]
    Custom { message: String },
}

impl RouterError {
    /// Build a [`RouterError::Custom`] from any message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Build a [`RouterError::InvalidRouteConfig`].
    pub fn invalid_config(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRouteConfig {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Return `true` for errors raised while resolving a URL to a route.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
