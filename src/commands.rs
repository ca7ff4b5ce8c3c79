//! Navigation commands.
//!
//! A command is a value a lifecycle hook (or the plan builder) returns to
//! hijack the running navigation and start another one. The root queue runs
//! the command after the current pipeline ends, then drains whatever the
//! command queued.
//!
//! Commands are bound to the router whose component produced them through
//! [`set_router`](NavigationCommand::set_router), so relative targets resolve
//! against that router's base URL. Setting `use_app_router` in the options
//! navigates through the root instead.
//!
//! ```
//! use navigator_pipeline::{NavigationCommand, Redirect};
//!
//! let redirect = Redirect::new("#/login");
//! assert_eq!(redirect.url(), "#/login");
//! assert!(redirect.options().replace);
//! assert!(!redirect.should_continue_processing());
//! ```

use crate::error::RouterError;
use crate::history::NavigationOptions;
use crate::params::RouteParams;
use crate::router::Router;
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::fmt;

/// A value that replaces the running navigation with another.
pub trait NavigationCommand: fmt::Debug {
    /// `true` lets the current pipeline keep going after the command is seen.
    fn should_continue_processing(&self) -> bool {
        false
    }

    /// Bind the router that produced the command.
    fn set_router(&self, _router: &Router) {}

    /// Perform the follow-up navigation.
    fn navigate(&self, app_router: &Router) -> LocalBoxFuture<'static, Result<(), RouterError>>;

    /// Redirect target, when the command is a plain URL redirect.
    fn redirect_url(&self) -> Option<&str> {
        None
    }
}

/// Navigate to a URL. Defaults to `trigger` and `replace`.
pub struct Redirect {
    url: String,
    options: NavigationOptions,
    router: RefCell<Option<Router>>,
}

impl Redirect {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_options(url, NavigationOptions::default().replace(true))
    }

    pub fn with_options(url: impl Into<String>, options: NavigationOptions) -> Self {
        Self {
            url: url.into(),
            options,
            router: RefCell::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &NavigationOptions {
        &self.options
    }

    fn navigating_router(&self, app_router: &Router) -> Router {
        if self.options.use_app_router {
            return app_router.clone();
        }
        self.router
            .borrow()
            .clone()
            .unwrap_or_else(|| app_router.clone())
    }
}

impl NavigationCommand for Redirect {
    fn set_router(&self, router: &Router) {
        *self.router.borrow_mut() = Some(router.clone());
    }

    fn navigate(&self, app_router: &Router) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let router = self.navigating_router(app_router);
        let navigation = router.navigate(&self.url, self.options);
        async move { navigation.await.map(|_| ()) }.boxed_local()
    }

    fn redirect_url(&self) -> Option<&str> {
        Some(&self.url)
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirect")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Navigate to a named route with params.
pub struct RedirectToRoute {
    route: String,
    params: RouteParams,
    options: NavigationOptions,
    router: RefCell<Option<Router>>,
}

impl RedirectToRoute {
    pub fn new(route: impl Into<String>, params: RouteParams) -> Self {
        Self::with_options(route, params, NavigationOptions::default().replace(true))
    }

    pub fn with_options(
        route: impl Into<String>,
        params: RouteParams,
        options: NavigationOptions,
    ) -> Self {
        Self {
            route: route.into(),
            params,
            options,
            router: RefCell::new(None),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn params(&self) -> &RouteParams {
        &self.params
    }
}

impl NavigationCommand for RedirectToRoute {
    fn set_router(&self, router: &Router) {
        *self.router.borrow_mut() = Some(router.clone());
    }

    fn navigate(&self, app_router: &Router) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let router = if self.options.use_app_router {
            app_router.clone()
        } else {
            self.router
                .borrow()
                .clone()
                .unwrap_or_else(|| app_router.clone())
        };
        let navigation = router.navigate_to_route(&self.route, &self.params, self.options);
        async move { navigation.await.map(|_| ()) }.boxed_local()
    }
}

impl fmt::Debug for RedirectToRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectToRoute")
            .field("route", &self.route)
            .field("params", &self.params)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_defaults() {
        let redirect = Redirect::new("#/a");
        assert!(redirect.options().trigger);
        assert!(redirect.options().replace);
        assert_eq!(redirect.redirect_url(), Some("#/a"));
    }

    #[test]
    fn test_redirect_custom_options() {
        let redirect = Redirect::with_options("b", NavigationOptions::default().use_app_router(true));
        assert!(!redirect.options().replace);
        assert!(redirect.options().use_app_router);
    }

    #[test]
    fn test_redirect_to_route_accessors() {
        let command = RedirectToRoute::new("user", RouteParams::new().with("id", "1"));
        assert_eq!(command.route(), "user");
        assert_eq!(command.params().get("id"), Some("1"));
        assert!(!command.should_continue_processing());
        assert_eq!(command.redirect_url(), None);
    }
}
