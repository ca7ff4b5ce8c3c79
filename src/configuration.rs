//! Router configuration.
//!
//! [`RouterConfiguration`] collects everything a router is set up with
//! (routes, the unknown-route handler, title, options and pipeline steps)
//! and exports it to a router in one go. It is what
//! [`Router::configure`](crate::Router::configure) hands to its callback and
//! what a view-model's `configure_router` fills in for a child router.
//!
//! ```
//! use navigator_pipeline::{RouteConfig, RouterConfiguration, RouterOptions};
//!
//! let mut config = RouterConfiguration::new();
//! config
//!     .title("Admin")
//!     .options(RouterOptions { compare_query_params: true })
//!     .map(RouteConfig::new("").name("home").module_id("home").nav(true))
//!     .map(RouteConfig::new("users/:id").name("user").module_id("user"))
//!     .map_unknown_routes("not-found")
//!     .fallback_route("");
//!
//! assert_eq!(config.route_count(), 2);
//! ```

use crate::error::RouterError;
use crate::instruction::NavigationInstruction;
use crate::pipeline::PipelineStep;
use crate::provider::{AUTHORIZE_SLOT, POST_RENDER_SLOT, PRE_ACTIVATE_SLOT, PRE_RENDER_SLOT};
use crate::route::{RouteConfig, ViewPortConfig};
use crate::router::Router;
use crate::{debug_log, info_log};
use futures::future::LocalBoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Router-wide behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Treat query-string changes as param changes when planning.
    pub compare_query_params: bool,
}

// ============================================================================
// UnknownRouteHandler
// ============================================================================

/// Builds a route for URLs no pattern matches.
///
/// The produced config's `route` is always replaced by the unmatched path.
#[derive(Clone)]
pub enum UnknownRouteHandler {
    /// Render this module.
    ModuleId(String),
    /// Use this config.
    Config(RouteConfig),
    /// Compute a config from the instruction, whose `path` param holds the
    /// unmatched fragment.
    Resolver(
        Rc<dyn Fn(Rc<NavigationInstruction>) -> LocalBoxFuture<'static, Result<RouteConfig, RouterError>>>,
    ),
}

impl UnknownRouteHandler {
    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn(Rc<NavigationInstruction>) -> LocalBoxFuture<'static, Result<RouteConfig, RouterError>>
            + 'static,
    {
        Self::Resolver(Rc::new(resolve))
    }

    pub(crate) fn validate(&self) -> Result<(), RouterError> {
        match self {
            Self::ModuleId(module_id) if module_id.is_empty() => {
                Err(RouterError::InvalidUnknownRouteHandler)
            }
            _ => Ok(()),
        }
    }

    /// Install the handler's config on `instruction`. `router` owns the
    /// handler and the resulting nav model.
    pub(crate) async fn apply(
        &self,
        router: &Router,
        instruction: &Rc<NavigationInstruction>,
    ) -> Result<(), RouterError> {
        let mut config = match self {
            Self::ModuleId(module_id) => RouteConfig::default().module_id(module_id.clone()),
            Self::Config(config) => config.clone(),
            Self::Resolver(resolve) => resolve(Rc::clone(instruction)).await?,
        };

        config.route = instruction.params().get("path").unwrap_or_default().to_string();
        config.validate()?;
        if config.nav_model.is_none() {
            config.nav_model = Some(router.create_nav_model(&config));
        }
        config.ensure_view_ports();

        debug_log!("Unknown route '{}' handled by {:?}", config.route, config.module_id);
        instruction.set_config(Rc::new(config));
        Ok(())
    }
}

impl From<&str> for UnknownRouteHandler {
    fn from(module_id: &str) -> Self {
        Self::ModuleId(module_id.to_string())
    }
}

impl From<String> for UnknownRouteHandler {
    fn from(module_id: String) -> Self {
        Self::ModuleId(module_id)
    }
}

impl From<RouteConfig> for UnknownRouteHandler {
    fn from(config: RouteConfig) -> Self {
        Self::Config(config)
    }
}

impl fmt::Debug for UnknownRouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleId(module_id) => f.debug_tuple("ModuleId").field(module_id).finish(),
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

// ============================================================================
// RouterConfiguration
// ============================================================================

/// Everything a router is configured with.
#[derive(Default)]
pub struct RouterConfiguration {
    title: Option<String>,
    title_separator: Option<String>,
    options: Option<RouterOptions>,
    routes: Vec<RouteConfig>,
    unknown_route_handler: Option<UnknownRouteHandler>,
    fallback_route: Option<String>,
    view_port_defaults: BTreeMap<String, ViewPortConfig>,
    pipeline_steps: Vec<(String, Rc<dyn PipelineStep>)>,
}

impl RouterConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn title_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.title_separator = Some(separator.into());
        self
    }

    pub fn options(&mut self, options: RouterOptions) -> &mut Self {
        self.options = Some(options);
        self
    }

    pub fn map(&mut self, route: RouteConfig) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn map_all(&mut self, routes: impl IntoIterator<Item = RouteConfig>) -> &mut Self {
        self.routes.extend(routes);
        self
    }

    pub fn map_unknown_routes(&mut self, handler: impl Into<UnknownRouteHandler>) -> &mut Self {
        self.unknown_route_handler = Some(handler.into());
        self
    }

    /// Where to go when a navigation fails and there is no previous location.
    pub fn fallback_route(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fallback_route = Some(fragment.into());
        self
    }

    pub fn use_view_port_defaults(
        &mut self,
        defaults: impl IntoIterator<Item = (String, ViewPortConfig)>,
    ) -> &mut Self {
        self.view_port_defaults.extend(defaults);
        self
    }

    /// Register a step in a named pipeline slot. Only honoured on the app router.
    pub fn add_pipeline_step(&mut self, slot: impl Into<String>, step: Rc<dyn PipelineStep>) -> &mut Self {
        self.pipeline_steps.push((slot.into(), step));
        self
    }

    pub fn add_authorize_step(&mut self, step: Rc<dyn PipelineStep>) -> &mut Self {
        self.add_pipeline_step(AUTHORIZE_SLOT, step)
    }

    pub fn add_pre_activate_step(&mut self, step: Rc<dyn PipelineStep>) -> &mut Self {
        self.add_pipeline_step(PRE_ACTIVATE_SLOT, step)
    }

    pub fn add_pre_render_step(&mut self, step: Rc<dyn PipelineStep>) -> &mut Self {
        self.add_pipeline_step(PRE_RENDER_SLOT, step)
    }

    pub fn add_post_render_step(&mut self, step: Rc<dyn PipelineStep>) -> &mut Self {
        self.add_pipeline_step(POST_RENDER_SLOT, step)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Apply the configuration to `router`.
    ///
    /// Pipeline steps are registered first, so a child router exporting
    /// steps fails before any of its routes are added.
    pub(crate) fn export_to_router(self, router: &Router) -> Result<(), RouterError> {
        if !self.pipeline_steps.is_empty() {
            let app = router
                .app_router()
                .filter(|_| router.is_root())
                .ok_or(RouterError::PipelineStepsOnChildRouter)?;
            for (slot, step) in self.pipeline_steps {
                app.pipeline_provider().add_step(&slot, step)?;
            }
        }

        if let Some(title) = self.title {
            router.set_title(Some(title));
        }
        if let Some(separator) = self.title_separator {
            router.set_title_separator(separator);
        }
        if let Some(options) = self.options {
            router.set_options(options);
        }
        if !self.view_port_defaults.is_empty() {
            router.use_view_port_defaults(self.view_port_defaults);
        }

        let count = self.routes.len();
        for route in self.routes {
            router.add_route(route)?;
        }

        if let Some(handler) = self.unknown_route_handler {
            router.handle_unknown_routes(handler)?;
        }
        if let Some(fallback) = self.fallback_route {
            router.set_fallback_route(Some(fallback));
        }

        info_log!("Router configured with {} route(s)", count);
        Ok(())
    }
}

impl fmt::Debug for RouterConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfiguration")
            .field("title", &self.title)
            .field("options", &self.options)
            .field("routes", &self.routes)
            .field("unknown_route_handler", &self.unknown_route_handler)
            .field("fallback_route", &self.fallback_route)
            .field("pipeline_steps", &self.pipeline_steps.len())
            .finish_non_exhaustive()
    }
}
