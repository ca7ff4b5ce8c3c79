//! Routers.
//!
//! A [`Router`] owns a route table and the live instruction for one routing
//! region. Routers form a tree: the root (see [`AppRouter`]) owns the
//! navigation queue and pipeline, and every component that hosts nested
//! routing gets a child created with [`Router::create_child`]. Children keep
//! a weak link to their parent; a router is owned by whatever created it.
//!
//! Every route is registered twice. The pattern itself goes into the primary
//! recognizer, and a `pattern/*childRoute` variant goes into a secondary one.
//! URLs that only match the variant are routes whose component hosts a child
//! router, which resolves the `childRoute` remainder.
//!
//! ```
//! use navigator_pipeline::{MemoryHistory, RouteConfig, RouteParams, Router};
//! use std::rc::Rc;
//!
//! let router = Router::new(Rc::new(MemoryHistory::new()));
//! router
//!     .configure(|config| {
//!         config.map(RouteConfig::new("users/:id").name("user").module_id("user"));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let href = router.generate("user", &RouteParams::new().with("id", "7")).unwrap();
//! assert_eq!(href, "#/users/7");
//! ```
//!
//! [`AppRouter`]: crate::AppRouter

use crate::app_router::{AppRouter, AppState};
use crate::configuration::{RouterConfiguration, RouterOptions, UnknownRouteHandler};
use crate::error::RouterError;
use crate::history::{History, NavigationOptions};
use crate::instruction::{InstructionInit, InstructionOptions, NavigationInstruction, ViewPort};
use crate::params::{QueryParams, RouteParams};
use crate::recognizer::{
    segment_recognizer_factory, RecognizedRoute, RecognizerFactory, RouteDescriptor, RouteRecognizer,
    RouteRef,
};
use crate::route::{NavModel, RouteConfig, ViewPortConfig};
use crate::url::{
    create_rooted_path, fragment_of, is_absolute_url, normalize_absolute_path, resolve_url, split_query,
};
use crate::{debug_log, info_log, trace_log};
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

/// Name of the wildcard param carrying the part of a URL left for a child router.
pub const CHILD_ROUTE_PARAM: &str = "childRoute";

const INITIAL_FALLBACK_ORDER: i32 = 100;
const DEFAULT_TITLE_SEPARATOR: &str = " | ";

/// Options for [`Router::generate_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Prefix the history's absolute root.
    pub absolute: bool,
}

pub(crate) struct RouterInner {
    history: Rc<dyn History>,
    recognizer_factory: RecognizerFactory,
    recognizer: Box<dyn RouteRecognizer>,
    child_recognizer: Box<dyn RouteRecognizer>,
    routes: Vec<Rc<RouteConfig>>,
    base_url: String,
    current_instruction: Option<Rc<NavigationInstruction>>,
    view_ports: HashMap<String, Rc<dyn ViewPort>>,
    navigation: Vec<Rc<NavModel>>,
    parent: Option<WeakRouter>,
    view_port_defaults: BTreeMap<String, ViewPortConfig>,
    catch_all_handler: Option<UnknownRouteHandler>,
    fallback_route: Option<String>,
    title: Option<String>,
    title_separator: String,
    title_transformer: Option<Rc<dyn Fn(&str) -> String>>,
    options: RouterOptions,
    is_configured: bool,
    configured_waiters: Vec<oneshot::Sender<()>>,
    could_deactivate: bool,
    fallback_order: i32,
    is_explicit_navigation: bool,
    is_explicit_navigation_back: bool,
    app: Option<Rc<AppState>>,
}

/// Handle to a router. Cloning is cheap and yields the same router.
#[derive(Clone)]
pub struct Router {
    inner: Rc<RefCell<RouterInner>>,
}

/// Non-owning router handle.
#[derive(Clone, Default, Debug)]
pub struct WeakRouter(Weak<RefCell<RouterInner>>);

impl WeakRouter {
    pub fn upgrade(&self) -> Option<Router> {
        self.0.upgrade().map(|inner| Router { inner })
    }
}

impl PartialEq for Router {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Router {}

impl Router {
    /// A router using the built-in [`SegmentRecognizer`](crate::recognizer::SegmentRecognizer).
    pub fn new(history: Rc<dyn History>) -> Self {
        Self::with_recognizer(history, segment_recognizer_factory())
    }

    pub fn with_recognizer(history: Rc<dyn History>, recognizer_factory: RecognizerFactory) -> Self {
        Self::build(history, recognizer_factory, None)
    }

    fn build(
        history: Rc<dyn History>,
        recognizer_factory: RecognizerFactory,
        parent: Option<WeakRouter>,
    ) -> Self {
        let inner = RouterInner {
            history,
            recognizer: recognizer_factory(),
            child_recognizer: recognizer_factory(),
            recognizer_factory,
            routes: Vec::new(),
            base_url: String::new(),
            current_instruction: None,
            view_ports: HashMap::new(),
            navigation: Vec::new(),
            parent,
            view_port_defaults: BTreeMap::new(),
            catch_all_handler: None,
            fallback_route: None,
            title: None,
            title_separator: DEFAULT_TITLE_SEPARATOR.to_string(),
            title_transformer: None,
            options: RouterOptions::default(),
            is_configured: false,
            configured_waiters: Vec::new(),
            could_deactivate: false,
            fallback_order: INITIAL_FALLBACK_ORDER,
            is_explicit_navigation: false,
            is_explicit_navigation_back: false,
            app: None,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// A child sharing this router's history and recognizer factory.
    pub fn create_child(&self) -> Router {
        let (history, factory) = {
            let inner = self.inner.borrow();
            (Rc::clone(&inner.history), Rc::clone(&inner.recognizer_factory))
        };
        Self::build(history, factory, Some(self.downgrade()))
    }

    pub fn downgrade(&self) -> WeakRouter {
        WeakRouter(Rc::downgrade(&self.inner))
    }

    pub fn is_root(&self) -> bool {
        self.inner.borrow().parent.is_none()
    }

    pub fn parent(&self) -> Option<Router> {
        self.inner.borrow().parent.as_ref().and_then(WeakRouter::upgrade)
    }

    fn root(&self) -> Router {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The app router at the root of this router's tree, if there is one.
    pub fn app_router(&self) -> Option<AppRouter> {
        let root = self.root();
        let app = root.inner.borrow().app.clone()?;
        Some(AppRouter::from_parts(root, app))
    }

    pub(crate) fn set_app_state(&self, app: Rc<AppState>) {
        self.inner.borrow_mut().app = Some(app);
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Configure the router through a [`RouterConfiguration`].
    pub fn configure<F>(&self, configure: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut RouterConfiguration) -> Result<(), RouterError>,
    {
        let mut config = RouterConfiguration::new();
        configure(&mut config)?;
        self.apply_configuration(config)
    }

    /// Export a prepared configuration and mark the router configured.
    pub fn apply_configuration(&self, config: RouterConfiguration) -> Result<(), RouterError> {
        self.inner.borrow_mut().is_configured = true;
        config.export_to_router(self)?;

        let waiters = std::mem::take(&mut self.inner.borrow_mut().configured_waiters);
        for waiter in waiters {
            let _ = waiter.send(());
        }
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.inner.borrow().is_configured
    }

    /// Resolves once the router has been configured.
    pub fn ensure_configured(&self) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        if self.is_configured() {
            return future::ready(Ok(())).boxed_local();
        }
        let (sender, receiver) = oneshot::channel();
        self.inner.borrow_mut().configured_waiters.push(sender);
        async move { receiver.await.map_err(|_| RouterError::RouterReleased) }.boxed_local()
    }

    /// Clear all routing state and mark the router unconfigured.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        let factory = Rc::clone(&inner.recognizer_factory);
        inner.recognizer = factory();
        inner.child_recognizer = factory();
        inner.routes.clear();
        inner.base_url.clear();
        inner.current_instruction = None;
        inner.view_ports.clear();
        inner.navigation.clear();
        inner.view_port_defaults.clear();
        inner.catch_all_handler = None;
        inner.fallback_route = None;
        inner.is_configured = false;
        inner.could_deactivate = false;
        inner.fallback_order = INITIAL_FALLBACK_ORDER;
        inner.is_explicit_navigation = false;
        inner.is_explicit_navigation_back = false;
        debug_log!("Router reset");
    }

    /// Register a route. Aliases are registered as separate routes sharing
    /// one nav model.
    pub fn add_route(&self, config: RouteConfig) -> Result<(), RouterError> {
        let mut nav_model: Option<Rc<NavModel>> = None;
        for config in config.expand_aliases() {
            let nav_model = nav_model
                .get_or_insert_with(|| self.create_nav_model(&config))
                .clone();
            self.add_single_route(config, nav_model)?;
        }
        Ok(())
    }

    fn add_single_route(&self, mut config: RouteConfig, nav_model: Rc<NavModel>) -> Result<(), RouterError> {
        config.validate()?;
        if config.navigation_strategy.is_none() {
            config.ensure_view_ports();
        }

        let path = config
            .route
            .strip_prefix('/')
            .unwrap_or(&config.route)
            .to_string();

        let listed = config.nav.is_shown()
            && !self
                .inner
                .borrow()
                .navigation
                .iter()
                .any(|nav| Rc::ptr_eq(nav, &nav_model));
        if listed && nav_model.config_href().is_none() && is_dynamic_pattern(&path) {
            return Err(RouterError::invalid_config(
                config.route.clone(),
                "dynamic routes must specify an \"href:\" to be included in the navigation model.",
            ));
        }

        config.nav_model = Some(Rc::clone(&nav_model));
        let child_variant = (!path.is_empty()).then(|| {
            let mut with_child = config.clone();
            with_child.route = format!("{path}/*{CHILD_ROUTE_PARAM}");
            with_child.has_child_router = true;
            Rc::new(with_child)
        });
        let config = Rc::new(config);

        let mut inner = self.inner.borrow_mut();
        inner.routes.push(Rc::clone(&config));
        let types = inner
            .recognizer
            .add(RouteDescriptor::new(path.clone(), Rc::clone(&config)));
        if let Some(with_child) = child_variant {
            let child_path = with_child.route.clone();
            inner
                .child_recognizer
                .add(RouteDescriptor::new(child_path, with_child));
        }

        if listed {
            if nav_model.order().is_none() {
                inner.fallback_order += 1;
                nav_model.set_order(inner.fallback_order);
            }
            inner.navigation.push(nav_model);
            inner
                .navigation
                .sort_by_key(|nav| nav.order().unwrap_or(i32::MAX));
        }

        info_log!("Registered route '{}' ({:?})", config.route, types);
        Ok(())
    }

    pub(crate) fn create_nav_model(&self, config: &RouteConfig) -> Rc<NavModel> {
        Rc::new(NavModel::new(self.downgrade(), config))
    }

    /// Install the handler used when no route matches.
    pub fn handle_unknown_routes(&self, handler: UnknownRouteHandler) -> Result<(), RouterError> {
        handler.validate()?;
        self.inner.borrow_mut().catch_all_handler = Some(handler);
        Ok(())
    }

    fn catch_all_handler(&self) -> Option<UnknownRouteHandler> {
        self.inner.borrow().catch_all_handler.clone()
    }

    /// This router if it handles unknown routes, else the nearest ancestor that does.
    fn nearest_catch_all_router(&self) -> Option<Router> {
        if self.inner.borrow().catch_all_handler.is_some() {
            return Some(self.clone());
        }
        self.parent().and_then(|parent| parent.nearest_catch_all_router())
    }

    pub fn fallback_route(&self) -> Option<String> {
        self.inner.borrow().fallback_route.clone()
    }

    pub fn set_fallback_route(&self, fragment: Option<String>) {
        self.inner.borrow_mut().fallback_route = fragment;
    }

    pub fn options(&self) -> RouterOptions {
        self.inner.borrow().options
    }

    pub fn set_options(&self, options: RouterOptions) {
        self.inner.borrow_mut().options = options;
    }

    /// Modules used for viewports whose config leaves `module_id` empty.
    pub fn use_view_port_defaults(&self, defaults: impl IntoIterator<Item = (String, ViewPortConfig)>) {
        self.inner.borrow_mut().view_port_defaults.extend(defaults);
    }

    pub fn view_port_defaults(&self) -> BTreeMap<String, ViewPortConfig> {
        self.inner.borrow().view_port_defaults.clone()
    }

    // ------------------------------------------------------------------------
    // Routes and navigation models
    // ------------------------------------------------------------------------

    /// Whether this router or an ancestor knows the route.
    pub fn has_route<'a>(&self, route: impl Into<RouteRef<'a>>) -> bool {
        let route = route.into();
        self.has_own_route(route) || self.parent().is_some_and(|parent| parent.has_route(route))
    }

    pub fn has_own_route<'a>(&self, route: impl Into<RouteRef<'a>>) -> bool {
        self.inner.borrow().recognizer.has_route(route.into())
    }

    pub fn routes(&self) -> Vec<Rc<RouteConfig>> {
        self.inner.borrow().routes.clone()
    }

    /// Nav models of routes shown in navigation, by order.
    pub fn navigation(&self) -> Vec<Rc<NavModel>> {
        self.inner.borrow().navigation.clone()
    }

    pub fn clear_navigation(&self) {
        self.inner.borrow_mut().navigation.clear();
    }

    /// Recompute every nav model's href under the current base URL.
    pub fn refresh_navigation(&self) {
        let (navigation, base_url, history) = {
            let inner = self.inner.borrow();
            (
                inner.navigation.clone(),
                inner.base_url.clone(),
                Rc::clone(&inner.history),
            )
        };
        let push_state = history.has_push_state();

        for nav in navigation {
            let href = match nav.config_href().filter(|href| !href.is_empty()) {
                Some(href) => normalize_absolute_path(href, push_state, false),
                None => create_rooted_path(nav.relative_href(), &base_url, push_state, false),
            };
            nav.set_href(href);
        }
    }

    // ------------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------------

    pub fn title(&self) -> Option<String> {
        self.inner.borrow().title.clone()
    }

    pub fn set_title(&self, title: Option<String>) {
        self.inner.borrow_mut().title = title;
    }

    pub fn title_separator(&self) -> String {
        self.inner.borrow().title_separator.clone()
    }

    pub fn set_title_separator(&self, separator: impl Into<String>) {
        self.inner.borrow_mut().title_separator = separator.into();
    }

    pub fn set_title_transformer(&self, transform: impl Fn(&str) -> String + 'static) {
        self.inner.borrow_mut().title_transformer = Some(Rc::new(transform));
    }

    /// Apply the nearest title transformer, walking up from this router.
    pub fn transform_title(&self, title: &str) -> String {
        let transformer = self.inner.borrow().title_transformer.clone();
        match (transformer, self.parent()) {
            (Some(transform), _) => transform(title),
            (None, Some(parent)) => parent.transform_title(title),
            (None, None) => title.to_string(),
        }
    }

    /// Rebuild the document title from the root's live instruction.
    pub fn update_title(&self) {
        if let Some(parent) = self.parent() {
            return parent.update_title();
        }
        if let Some(current) = self.current_instruction() {
            current.update_title();
        }
    }

    // ------------------------------------------------------------------------
    // Live state
    // ------------------------------------------------------------------------

    pub fn history(&self) -> Rc<dyn History> {
        Rc::clone(&self.inner.borrow().history)
    }

    /// Prefix contributed by ancestor matches.
    pub fn base_url(&self) -> String {
        self.inner.borrow().base_url.clone()
    }

    fn set_base_url(&self, base_url: String) {
        self.inner.borrow_mut().base_url = base_url;
    }

    pub fn current_instruction(&self) -> Option<Rc<NavigationInstruction>> {
        self.inner.borrow().current_instruction.clone()
    }

    pub fn set_current_instruction(&self, instruction: Option<Rc<NavigationInstruction>>) {
        self.inner.borrow_mut().current_instruction = instruction;
    }

    pub fn register_view_port(&self, name: impl Into<String>, view_port: Rc<dyn ViewPort>) {
        let name = name.into();
        trace_log!("Viewport '{}' registered", name);
        self.inner.borrow_mut().view_ports.insert(name, view_port);
    }

    pub fn view_port(&self, name: &str) -> Option<Rc<dyn ViewPort>> {
        self.inner.borrow().view_ports.get(name).cloned()
    }

    /// Set once the can-deactivate hooks of the running request have passed.
    pub fn could_deactivate(&self) -> bool {
        self.inner.borrow().could_deactivate
    }

    pub fn set_could_deactivate(&self, could_deactivate: bool) {
        self.inner.borrow_mut().could_deactivate = could_deactivate;
    }

    pub(crate) fn explicit_navigation(&self) -> (bool, bool) {
        let inner = self.inner.borrow();
        (inner.is_explicit_navigation, inner.is_explicit_navigation_back)
    }

    pub(crate) fn clear_explicit_navigation(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.is_explicit_navigation = false;
        inner.is_explicit_navigation_back = false;
    }

    // ------------------------------------------------------------------------
    // URL generation
    // ------------------------------------------------------------------------

    /// Generate a rooted path for a route known to this router or an ancestor.
    pub fn generate<'a>(
        &self,
        route: impl Into<RouteRef<'a>>,
        params: &RouteParams,
    ) -> Result<String, RouterError> {
        self.generate_with(route.into(), params, GenerateOptions::default())
    }

    pub fn generate_with(
        &self,
        route: RouteRef<'_>,
        params: &RouteParams,
        options: GenerateOptions,
    ) -> Result<String, RouterError> {
        let path = {
            let inner = self.inner.borrow();
            let recognizer = if params.contains(CHILD_ROUTE_PARAM) {
                &inner.child_recognizer
            } else {
                &inner.recognizer
            };
            recognizer
                .has_route(route)
                .then(|| recognizer.generate(route, params))
        };

        let path = match path {
            Some(path) => path?,
            None => {
                return match self.parent() {
                    Some(parent) => parent.generate_with(route, params, options),
                    None => Err(RouterError::UnknownRouteName {
                        name: route.display_name(),
                    }),
                }
            }
        };

        let history = self.history();
        let rooted = create_rooted_path(&path, &self.base_url(), history.has_push_state(), options.absolute);
        if options.absolute {
            Ok(format!("{}{}", history.get_absolute_root(), rooted))
        } else {
            Ok(rooted)
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Update the location and, with `trigger`, run the navigation.
    ///
    /// Relative fragments resolve under this router's base URL. An
    /// unconfigured child router navigates through its parent. Resolves with
    /// whether the location changed, after the app router has drained the
    /// request unless it was already busy.
    pub fn navigate(
        &self,
        fragment: &str,
        options: NavigationOptions,
    ) -> LocalBoxFuture<'static, Result<bool, RouterError>> {
        let router = self.clone();
        let fragment = fragment.to_string();
        async move {
            if !router.is_configured() {
                if let Some(parent) = router.parent() {
                    return parent.navigate(&fragment, options).await;
                }
            }

            router.root().inner.borrow_mut().is_explicit_navigation = true;

            let history = router.history();
            let url = resolve_url(&fragment, &router.base_url(), history.has_push_state());
            let changed = history.navigate(&url, &options);
            trace_log!("History navigate '{}' (changed: {})", url, changed);

            if changed && options.trigger && !is_absolute_url(&url) {
                if let Some(app) = router.app_router() {
                    app.queue_url(fragment_of(&url)).await?;
                }
            }
            Ok(changed)
        }
        .boxed_local()
    }

    pub fn navigate_to_route(
        &self,
        route: &str,
        params: &RouteParams,
        options: NavigationOptions,
    ) -> LocalBoxFuture<'static, Result<bool, RouterError>> {
        match self.generate(route, params) {
            Ok(path) => self.navigate(&path, options),
            Err(err) => future::ready(Err(err)).boxed_local(),
        }
    }

    /// Step back in history and load the entry now current.
    pub fn navigate_back(&self) -> LocalBoxFuture<'static, Result<bool, RouterError>> {
        let router = self.clone();
        async move {
            let Some(fragment) = router.history().navigate_back() else {
                return Ok(false);
            };
            router.root().inner.borrow_mut().is_explicit_navigation_back = true;
            if let Some(app) = router.app_router() {
                app.queue_url(fragment).await?;
            }
            Ok(true)
        }
        .boxed_local()
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    fn recognize(&self, url: &str) -> Vec<RecognizedRoute> {
        let mut inner = self.inner.borrow_mut();
        let matches = inner.recognizer.recognize(url);
        if matches.is_empty() {
            inner.child_recognizer.recognize(url)
        } else {
            matches
        }
    }

    /// Resolve `url` into an instruction for this router.
    ///
    /// Falls back to this router's unknown-route handler, then to the nearest
    /// ancestor's. With a `parent_instruction`, the router's base URL becomes
    /// the parent's base URL plus the part of the URL the parent matched.
    pub fn create_navigation_instruction(
        &self,
        url: &str,
        parent_instruction: Option<&Rc<NavigationInstruction>>,
    ) -> LocalBoxFuture<'static, Result<Rc<NavigationInstruction>, RouterError>> {
        let router = self.clone();
        let url = url.to_string();
        let parent_instruction = parent_instruction.cloned();
        async move {
            let (fragment, query_string) = split_query(&url);
            let recognized = router.recognize(&url);
            let (previous_instruction, options) = {
                let inner = router.inner.borrow();
                (
                    inner.current_instruction.clone(),
                    InstructionOptions {
                        compare_query_params: inner.options.compare_query_params,
                        ..InstructionOptions::default()
                    },
                )
            };
            let init = || InstructionInit {
                fragment: fragment.to_string(),
                query_string: query_string.to_string(),
                router: router.downgrade(),
                parent_instruction: parent_instruction.clone(),
                previous_instruction: previous_instruction.clone(),
                options,
                ..InstructionInit::default()
            };
            let unmatched_params = || RouteParams::new().with("path", fragment);

            let instruction = if let Some(first) = recognized.into_iter().next() {
                let strategy = first.handler.navigation_strategy.clone();
                let instruction = NavigationInstruction::new(InstructionInit {
                    params: first.params,
                    query_params: first.query_params,
                    config: Some(first.handler),
                    ..init()
                });
                if let Some(strategy) = strategy {
                    strategy(Rc::clone(&instruction)).await?;
                    if instruction.config().view_ports.is_none() {
                        instruction.update_config(RouteConfig::ensure_view_ports);
                    }
                }
                Some(instruction)
            } else if let Some(handler) = router.catch_all_handler() {
                let instruction = NavigationInstruction::new(InstructionInit {
                    params: unmatched_params(),
                    query_params: QueryParams::from_query_string(query_string),
                    ..init()
                });
                handler.apply(&router, &instruction).await?;
                Some(instruction)
            } else if let Some(owner) = router.parent().and_then(|parent| parent.nearest_catch_all_router()) {
                let owner_parent = parent_instruction
                    .as_ref()
                    .and_then(|parent| find_parent_instruction_from_router(&owner, parent));
                let instruction = NavigationInstruction::new(InstructionInit {
                    params: unmatched_params(),
                    query_params: QueryParams::from_query_string(query_string),
                    router: owner.downgrade(),
                    parent_instruction: owner_parent,
                    parent_catch_handler: true,
                    ..init()
                });
                if let Some(handler) = owner.catch_all_handler() {
                    handler.apply(&owner, &instruction).await?;
                }
                Some(instruction)
            } else {
                None
            };

            let instruction = instruction.ok_or_else(|| RouterError::RouteNotFound { url: url.clone() })?;

            if let Some(parent_instruction) = &parent_instruction {
                let parent_base = router.parent().map(|parent| parent.base_url()).unwrap_or_default();
                router.set_base_url(format!("{parent_base}{}", parent_instruction.base_url()));
            }

            debug_log!(
                "Resolved '{}' to route '{}'",
                url,
                instruction.config().route
            );
            Ok(instruction)
        }
        .boxed_local()
    }
}

/// Walk up from `instruction` to the one belonging to `router`, pointing its
/// fragment at the router's base URL.
fn find_parent_instruction_from_router(
    router: &Router,
    instruction: &Rc<NavigationInstruction>,
) -> Option<Rc<NavigationInstruction>> {
    let mut current = Some(Rc::clone(instruction));
    while let Some(candidate) = current {
        if candidate.router().ok().as_ref() == Some(router) {
            candidate.set_fragment(router.base_url());
            return Some(candidate);
        }
        current = candidate.parent_instruction();
    }
    None
}

fn is_dynamic_pattern(path: &str) -> bool {
    path.split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Router")
            .field("base_url", &inner.base_url)
            .field("routes", &inner.routes.len())
            .field("is_root", &inner.parent.is_none())
            .field("is_configured", &inner.is_configured)
            .field("view_ports", &inner.view_ports.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;

    fn router() -> Router {
        Router::new(Rc::new(MemoryHistory::new()))
    }

    fn configured(routes: Vec<RouteConfig>) -> Router {
        let router = router();
        router
            .configure(|config| {
                config.map_all(routes);
                Ok(())
            })
            .unwrap();
        router
    }

    #[test]
    fn test_dynamic_nav_routes_need_an_href() {
        let router = router();
        let err = router
            .add_route(RouteConfig::new("users/:id").module_id("user").nav(true))
            .unwrap_err();
        assert!(err.to_string().contains("dynamic routes must specify an \"href:\""));

        router
            .add_route(RouteConfig::new("users/:id").module_id("user").nav(true).href("#/users/1"))
            .unwrap();
        router
            .add_route(RouteConfig::new("files/*path").module_id("files").nav(true).href(""))
            .unwrap();
        assert_eq!(router.navigation().len(), 2);
    }

    #[test]
    fn test_navigation_order() {
        let router = configured(vec![
            RouteConfig::new("a").module_id("a").nav(true),
            RouteConfig::new("b").module_id("b").nav_order(5),
            RouteConfig::new("c").module_id("c"),
            RouteConfig::new("d").module_id("d").nav(true),
        ]);
        let orders: Vec<_> = router.navigation().iter().map(|nav| nav.order()).collect();
        assert_eq!(orders, vec![Some(5), Some(101), Some(102)]);
    }

    #[test]
    fn test_aliases_share_one_nav_entry() {
        let router = configured(vec![RouteConfig::new("")
            .alias("home")
            .name("home")
            .module_id("home")
            .nav(true)]);
        assert_eq!(router.routes().len(), 2);
        assert_eq!(router.navigation().len(), 1);
    }

    #[test]
    fn test_refresh_navigation_hrefs() {
        let router = configured(vec![
            RouteConfig::new("a").module_id("a").nav(true),
            RouteConfig::new("b/:id").module_id("b").nav(true).href("#/b/1"),
        ]);
        router.refresh_navigation();
        let hrefs: Vec<_> = router.navigation().iter().map(|nav| nav.href()).collect();
        assert_eq!(hrefs, vec!["#/a".to_string(), "#/b/1".to_string()]);
    }

    #[test]
    fn test_generate() {
        let router = configured(vec![RouteConfig::new("users/:id").name("user").module_id("user")]);
        let params = RouteParams::new().with("id", "7").with("tab", "posts");
        assert_eq!(router.generate("user", &params).unwrap(), "#/users/7?tab=posts");

        let absolute = router
            .generate_with("user".into(), &RouteParams::new().with("id", "7"), GenerateOptions { absolute: true })
            .unwrap();
        assert_eq!(absolute, "http://localhost/#/users/7");

        assert!(matches!(
            router.generate("nope", &RouteParams::new()),
            Err(RouterError::UnknownRouteName { .. })
        ));
    }

    #[test]
    fn test_child_generates_through_parent() {
        let parent = configured(vec![RouteConfig::new("home").name("home").module_id("home")]);
        let child = parent.create_child();
        child
            .configure(|config| {
                config.map(RouteConfig::new("detail").name("detail").module_id("detail"));
                Ok(())
            })
            .unwrap();

        assert!(child.has_route("home"));
        assert!(!child.has_own_route("home"));
        assert_eq!(child.generate("home", &RouteParams::new()).unwrap(), "#/home");
    }

    #[test]
    fn test_resolves_the_empty_route() {
        let router = configured(vec![RouteConfig::new("").name("home").module_id("home")]);
        let instruction = pollster::block_on(router.create_navigation_instruction("", None)).unwrap();
        assert_eq!(instruction.config().name.as_deref(), Some("home"));
        assert!(instruction
            .config()
            .view_ports
            .as_ref()
            .is_some_and(|vp| vp.contains_key("default")));
    }

    #[test]
    fn test_child_route_variant_matches_longer_urls() {
        let router = configured(vec![RouteConfig::new("parent").name("parent").module_id("parent")]);
        let instruction =
            pollster::block_on(router.create_navigation_instruction("parent/child?x=1", None)).unwrap();
        let config = instruction.config();
        assert!(config.has_child_router());
        assert_eq!(instruction.params().get(CHILD_ROUTE_PARAM), Some("child"));
        assert_eq!(instruction.query_string(), "x=1");
        assert_eq!(instruction.wildcard_path(), "child?x=1");
    }

    #[test]
    fn test_route_not_found() {
        let router = configured(vec![RouteConfig::new("a").module_id("a")]);
        let err = pollster::block_on(router.create_navigation_instruction("b/c", None)).unwrap_err();
        assert_eq!(err.to_string(), "Route not found: b/c");
    }

    #[test]
    fn test_catch_all_uses_the_unmatched_path() {
        let router = configured(vec![RouteConfig::new("a").module_id("a")]);
        router.handle_unknown_routes("not-found".into()).unwrap();

        let instruction =
            pollster::block_on(router.create_navigation_instruction("missing/page?q=1", None)).unwrap();
        assert_eq!(instruction.params().get("path"), Some("missing/page"));
        assert_eq!(instruction.query_params().get("q"), Some("1"));
        assert_eq!(instruction.config().route, "missing/page");
        assert_eq!(instruction.config().module_id.as_deref(), Some("not-found"));
    }

    #[test]
    fn test_child_falls_back_to_ancestor_catch_all() {
        let parent = configured(vec![RouteConfig::new("parent").module_id("parent")]);
        parent.handle_unknown_routes("not-found".into()).unwrap();
        let parent_instruction =
            pollster::block_on(parent.create_navigation_instruction("parent/nowhere", None)).unwrap();

        let child = parent.create_child();
        child
            .configure(|config| {
                config.map(RouteConfig::new("known").module_id("known"));
                Ok(())
            })
            .unwrap();

        let instruction = pollster::block_on(
            child.create_navigation_instruction("nowhere", Some(&parent_instruction)),
        )
        .unwrap();
        assert!(instruction.parent_catch_handler());
        assert!(instruction.router().is_ok_and(|owner| owner == parent));
        assert!(instruction
            .parent_instruction()
            .is_some_and(|owner_instruction| Rc::ptr_eq(&owner_instruction, &parent_instruction)));
    }

    #[test]
    fn test_navigation_strategy_fills_in_the_config() {
        let router = configured(vec![RouteConfig::new("dynamic").name("dynamic").navigation_strategy(
            |instruction| {
                instruction.update_config(|config| config.module_id = Some("computed".into()));
                future::ready(Ok(())).boxed_local()
            },
        )]);

        let instruction = pollster::block_on(router.create_navigation_instruction("dynamic", None)).unwrap();
        let config = instruction.config();
        assert_eq!(config.module_id.as_deref(), Some("computed"));
        assert_eq!(
            config.view_ports.as_ref().and_then(|vp| vp.get("default")).cloned(),
            Some(ViewPortConfig::new("computed"))
        );
        assert_eq!(router.routes()[0].module_id, None);
    }

    #[test]
    fn test_ensure_configured_and_reset() {
        let router = router();
        let mut waiting = router.ensure_configured();
        assert!((&mut waiting).now_or_never().is_none());

        router
            .configure(|config| {
                config.map(RouteConfig::new("a").name("a").module_id("a"));
                Ok(())
            })
            .unwrap();
        assert_eq!(pollster::block_on(waiting), Ok(()));

        router.reset();
        assert!(!router.is_configured());
        assert!(!router.has_route("a"));
        assert!(router.routes().is_empty());
    }

    #[test]
    fn test_title_transformer_is_inherited() {
        let parent = router();
        parent.set_title_transformer(|title| title.to_uppercase());
        let child = parent.create_child();
        assert_eq!(child.transform_title("users"), "USERS");
        assert!(!child.is_root());
        assert_eq!(child.parent(), Some(parent));
    }
}
