//! Route descriptors and navigation-menu models.
//!
//! A [`RouteConfig`] describes one entry of a router's route table: the URL
//! pattern(s) it answers to, what it renders (a module id, explicit
//! per-viewport modules, a redirect, or a navigation strategy computed at
//! resolution time), and how it appears in the navigation menu.
//!
//! Configs are built with a consuming builder and become immutable once
//! registered: the router wraps them in `Rc` and every instruction shares the
//! same value.
//!
//! ```
//! use navigator_pipeline::{ActivationStrategy, RouteConfig};
//!
//! let users = RouteConfig::new("users/:id")
//!     .name("user")
//!     .module_id("pages/user")
//!     .href("#/users/1")
//!     .nav(true)
//!     .title("User")
//!     .activation_strategy(ActivationStrategy::InvokeLifecycle);
//!
//! assert!(users.validate().is_ok());
//! ```

use crate::error::RouterError;
use crate::instruction::NavigationInstruction;
use crate::router::WeakRouter;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Name of the viewport used when a route does not declare any.
pub const DEFAULT_VIEW_PORT: &str = "default";

/// Callback deciding, at resolution time, what an instruction renders.
///
/// The strategy receives the freshly created instruction and usually calls
/// [`NavigationInstruction::update_config`] to fill in a module id or
/// viewports.
pub type NavigationStrategy =
    Rc<dyn Fn(Rc<NavigationInstruction>) -> LocalBoxFuture<'static, Result<(), RouterError>>>;

// ============================================================================
// ActivationStrategy
// ============================================================================

/// How a viewport is treated when a navigation touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationStrategy {
    /// Load a fresh component and run the full lifecycle.
    Replace,
    /// Keep the component, but run its activation hooks again.
    InvokeLifecycle,
    /// Leave the viewport untouched.
    NoChange,
}

impl ActivationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::InvokeLifecycle => "invoke-lifecycle",
            Self::NoChange => "no-change",
        }
    }

    /// Whether lifecycle hooks run for a viewport with this strategy.
    pub fn runs_lifecycle(self) -> bool {
        matches!(self, Self::Replace | Self::InvokeLifecycle)
    }
}

impl fmt::Display for ActivationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationStrategy {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "invoke-lifecycle" => Ok(Self::InvokeLifecycle),
            "no-change" => Ok(Self::NoChange),
            other => Err(RouterError::custom(format!(
                "Unknown activation strategy: {other}"
            ))),
        }
    }
}

// ============================================================================
// ViewPortConfig / NavSetting
// ============================================================================

/// What a single viewport renders.
///
/// A `module_id` of `None` asks the router to use its viewport default for
/// that name (see [`Router::use_view_port_defaults`](crate::Router::use_view_port_defaults)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewPortConfig {
    pub module_id: Option<String>,
}

impl ViewPortConfig {
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: Some(module_id.into()),
        }
    }

    /// A config that defers to the router's viewport default.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Whether and where a route shows up in the navigation menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavSetting {
    #[default]
    Hidden,
    /// Shown, ordered after every explicitly ordered entry.
    Shown,
    /// Shown at an explicit position.
    Order(i32),
}

impl NavSetting {
    pub fn is_shown(self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

// ============================================================================
// RouteConfig
// ============================================================================

/// One entry of a router's route table.
#[derive(Clone, Default)]
pub struct RouteConfig {
    /// Primary URL pattern, e.g. `users/:id` or `files/*path`.
    pub route: String,
    /// Additional patterns registered against the same nav model.
    pub aliases: Vec<String>,
    pub name: Option<String>,
    pub module_id: Option<String>,
    pub redirect: Option<String>,
    pub navigation_strategy: Option<NavigationStrategy>,
    pub view_ports: Option<BTreeMap<String, ViewPortConfig>>,
    pub nav: NavSetting,
    pub href: Option<String>,
    pub title: Option<String>,
    pub activation_strategy: Option<ActivationStrategy>,
    pub case_sensitive: bool,
    pub settings: BTreeMap<String, String>,
    pub(crate) has_child_router: bool,
    pub(crate) nav_model: Option<Rc<NavModel>>,
}

impl RouteConfig {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn module_id(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = Some(module_id.into());
        self
    }

    pub fn redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    /// Add an alternative pattern sharing this route's nav model.
    pub fn alias(mut self, route: impl Into<String>) -> Self {
        self.aliases.push(route.into());
        self
    }

    pub fn navigation_strategy<F>(mut self, strategy: F) -> Self
    where
        F: Fn(Rc<NavigationInstruction>) -> LocalBoxFuture<'static, Result<(), RouterError>>
            + 'static,
    {
        self.navigation_strategy = Some(Rc::new(strategy));
        self
    }

    /// Declare the module rendered in a named viewport.
    pub fn view_port(mut self, name: impl Into<String>, config: ViewPortConfig) -> Self {
        self.view_ports
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), config);
        self
    }

    pub fn nav(mut self, shown: bool) -> Self {
        self.nav = if shown {
            NavSetting::Shown
        } else {
            NavSetting::Hidden
        };
        self
    }

    pub fn nav_order(mut self, order: i32) -> Self {
        self.nav = NavSetting::Order(order);
        self
    }

    pub fn href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn activation_strategy(mut self, strategy: ActivationStrategy) -> Self {
        self.activation_strategy = Some(strategy);
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// `true` for the synthesized `route/*childRoute` variant that matches
    /// URLs continuing into a nested router.
    pub fn has_child_router(&self) -> bool {
        self.has_child_router
    }

    /// The nav model attached at registration time.
    pub fn nav_model(&self) -> Option<&Rc<NavModel>> {
        self.nav_model.as_ref()
    }

    /// Check that the config says what to load.
    pub fn validate(&self) -> Result<(), RouterError> {
        let loads_something = self.module_id.is_some()
            || self.redirect.is_some()
            || self.navigation_strategy.is_some()
            || self.view_ports.is_some();

        if loads_something {
            Ok(())
        } else {
            Err(RouterError::invalid_config(
                self.route.clone(),
                "You must specify a \"moduleId:\", \"redirect:\", \"navigationStrategy:\", or \"viewPorts:\".",
            ))
        }
    }

    /// Split a multi-pattern config into one config per pattern.
    pub(crate) fn expand_aliases(mut self) -> Vec<RouteConfig> {
        let aliases = std::mem::take(&mut self.aliases);
        let mut configs = Vec::with_capacity(aliases.len() + 1);
        for alias in aliases {
            let mut config = self.clone();
            config.route = alias;
            configs.push(config);
        }
        configs.insert(0, self);
        configs
    }

    /// Fill in a `default` viewport from `module_id` when none are declared.
    pub(crate) fn ensure_view_ports(&mut self) {
        if self.view_ports.is_none() {
            let mut view_ports = BTreeMap::new();
            view_ports.insert(
                DEFAULT_VIEW_PORT.to_string(),
                ViewPortConfig {
                    module_id: self.module_id.clone(),
                },
            );
            self.view_ports = Some(view_ports);
        }
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("route", &self.route)
            .field("name", &self.name)
            .field("module_id", &self.module_id)
            .field("redirect", &self.redirect)
            .field("has_navigation_strategy", &self.navigation_strategy.is_some())
            .field("view_ports", &self.view_ports)
            .field("nav", &self.nav)
            .field("has_child_router", &self.has_child_router)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// NavModel
// ============================================================================

/// Menu entry for a route, refreshed on every commit.
pub struct NavModel {
    router: WeakRouter,
    title: RefCell<Option<String>>,
    href: RefCell<String>,
    relative_href: String,
    config_href: Option<String>,
    is_active: Cell<bool>,
    order: Cell<Option<i32>>,
    settings: BTreeMap<String, String>,
}

impl NavModel {
    pub(crate) fn new(router: WeakRouter, config: &RouteConfig) -> Self {
        let relative_href = config.href.clone().unwrap_or_else(|| config.route.clone());
        let order = match config.nav {
            NavSetting::Order(order) => Some(order),
            _ => None,
        };
        Self {
            router,
            title: RefCell::new(config.title.clone()),
            href: RefCell::new(config.href.clone().unwrap_or_default()),
            relative_href,
            config_href: config.href.clone(),
            is_active: Cell::new(false),
            order: Cell::new(order),
            settings: config.settings.clone(),
        }
    }

    pub fn title(&self) -> Option<String> {
        self.title.borrow().clone()
    }

    /// Change the title; refreshes the document title when this entry is active.
    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.borrow_mut() = Some(title.into());
        if self.is_active() {
            if let Some(router) = self.router.upgrade() {
                router.update_title();
            }
        }
    }

    /// Absolute href, as computed by the last navigation refresh.
    pub fn href(&self) -> String {
        self.href.borrow().clone()
    }

    pub fn relative_href(&self) -> &str {
        &self.relative_href
    }

    pub(crate) fn config_href(&self) -> Option<&str> {
        self.config_href.as_deref()
    }

    pub(crate) fn set_href(&self, href: String) {
        *self.href.borrow_mut() = href;
    }

    pub fn is_active(&self) -> bool {
        self.is_active.get()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.is_active.set(active);
    }

    pub fn order(&self) -> Option<i32> {
        self.order.get()
    }

    pub(crate) fn set_order(&self, order: i32) {
        self.order.set(Some(order));
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }
}

impl fmt::Debug for NavModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavModel")
            .field("title", &self.title.borrow())
            .field("href", &self.href.borrow())
            .field("relative_href", &self.relative_href)
            .field("is_active", &self.is_active.get())
            .field("order", &self.order.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_target() {
        let err = RouteConfig::new("empty").validate().unwrap_err();
        assert!(matches!(err, RouterError::InvalidRouteConfig { .. }));

        assert!(RouteConfig::new("a").module_id("a").validate().is_ok());
        assert!(RouteConfig::new("a").redirect("").validate().is_ok());
        assert!(RouteConfig::new("a")
            .view_port("left", ViewPortConfig::new("l"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_expand_aliases() {
        let configs = RouteConfig::new("")
            .alias("home")
            .name("home")
            .module_id("home")
            .expand_aliases();
        let routes: Vec<&str> = configs.iter().map(|c| c.route.as_str()).collect();
        assert_eq!(routes, vec!["", "home"]);
        assert!(configs.iter().all(|c| c.aliases.is_empty()));
    }

    #[test]
    fn test_ensure_view_ports_defaults_to_module_id() {
        let mut config = RouteConfig::new("a").module_id("pages/a");
        config.ensure_view_ports();
        let view_ports = config.view_ports.unwrap();
        assert_eq!(
            view_ports.get(DEFAULT_VIEW_PORT),
            Some(&ViewPortConfig::new("pages/a"))
        );
    }

    #[test]
    fn test_activation_strategy_strings() {
        assert_eq!(ActivationStrategy::InvokeLifecycle.to_string(), "invoke-lifecycle");
        assert_eq!(
            "no-change".parse::<ActivationStrategy>().ok(),
            Some(ActivationStrategy::NoChange)
        );
        assert!("bogus".parse::<ActivationStrategy>().is_err());
        assert!(ActivationStrategy::Replace.runs_lifecycle());
        assert!(!ActivationStrategy::NoChange.runs_lifecycle());
    }

    #[test]
    fn test_nav_setting() {
        assert_eq!(RouteConfig::new("a").nav(true).nav, NavSetting::Shown);
        assert_eq!(RouteConfig::new("a").nav_order(3).nav, NavSetting::Order(3));
        assert!(!NavSetting::Hidden.is_shown());
    }
}
