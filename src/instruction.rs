//! Navigation instructions.
//!
//! A [`NavigationInstruction`] is one node of the resolved navigation tree:
//! what a single router renders for a URL. Children hang off the node's
//! [`ViewPortInstruction`]s; the parent link is weak.
//!
//! Instructions are created fresh for every navigation attempt and are only
//! installed as a router's current instruction by [`commit_changes`]. After
//! a commit the previous instruction and the plan are pruned so superseded
//! subtrees are released.
//!
//! [`commit_changes`]: NavigationInstruction::commit_changes

use crate::error::RouterError;
use crate::lifecycle::RouteLifecycle;
use crate::params::{decode_uri, encode_uri, QueryParams, RouteParams};
use crate::route::{ActivationStrategy, RouteConfig, ViewPortConfig};
use crate::router::{Router, WeakRouter};
use crate::trace_log;
use async_trait::async_trait;
use futures::future::{try_join_all, FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

// ============================================================================
// Viewports and components
// ============================================================================

/// A named rendering slot registered with a router.
#[async_trait(?Send)]
pub trait ViewPort {
    /// Render the component of a replaced viewport. With `wait_to_swap` the
    /// viewport prepares the component and waits for [`swap`](Self::swap).
    async fn process(
        &self,
        instruction: &ViewPortInstruction,
        wait_to_swap: bool,
    ) -> Result<(), RouterError>;

    /// Make the prepared component visible.
    fn swap(&self, _instruction: &ViewPortInstruction) {}
}

/// A loaded, routed component.
pub struct Component {
    pub view_model: Rc<dyn RouteLifecycle>,
    pub config: ViewPortConfig,
    /// Router hosted by the component, when its view-model configures one.
    pub child_router: Option<Router>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("config", &self.config)
            .field("has_child_router", &self.child_router.is_some())
            .finish_non_exhaustive()
    }
}

/// Arguments handed to activation hooks.
#[derive(Clone)]
pub struct LifecycleArgs {
    /// Query params, then route params of every ancestor level down to this
    /// one, without injected child-route wildcards.
    pub params: RouteParams,
    pub config: Rc<RouteConfig>,
    /// Viewport the hook runs for, when called per viewport.
    pub view_port: Option<String>,
    instruction: Weak<NavigationInstruction>,
}

impl LifecycleArgs {
    /// Args with no instruction behind them.
    pub fn detached(config: Rc<RouteConfig>) -> Self {
        Self {
            params: RouteParams::new(),
            config,
            view_port: None,
            instruction: Weak::new(),
        }
    }

    pub fn instruction(&self) -> Option<Rc<NavigationInstruction>> {
        self.instruction.upgrade()
    }
}

impl fmt::Debug for LifecycleArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleArgs")
            .field("params", &self.params)
            .field("route", &self.config.route)
            .field("view_port", &self.view_port)
            .finish_non_exhaustive()
    }
}

/// The resolved, loadable unit for one viewport.
pub struct ViewPortInstruction {
    pub name: String,
    pub strategy: ActivationStrategy,
    pub module_id: Option<String>,
    pub component: Rc<Component>,
    pub child_router: Option<Router>,
    pub lifecycle_args: LifecycleArgs,
    child_navigation_instruction: RefCell<Option<Rc<NavigationInstruction>>>,
}

impl ViewPortInstruction {
    pub fn child_navigation_instruction(&self) -> Option<Rc<NavigationInstruction>> {
        self.child_navigation_instruction.borrow().clone()
    }

    pub(crate) fn set_child_navigation_instruction(&self, child: Rc<NavigationInstruction>) {
        *self.child_navigation_instruction.borrow_mut() = Some(child);
    }
}

impl fmt::Debug for ViewPortInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPortInstruction")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("module_id", &self.module_id)
            .field("child", &self.child_navigation_instruction.borrow())
            .finish_non_exhaustive()
    }
}

/// Per-viewport result of diffing a navigation against the live tree.
#[derive(Clone)]
pub struct ViewPortPlan {
    pub name: String,
    pub config: ViewPortConfig,
    pub strategy: ActivationStrategy,
    pub prev_component: Option<Rc<Component>>,
    pub prev_module_id: Option<String>,
    pub child_navigation_instruction: Option<Rc<NavigationInstruction>>,
}

impl ViewPortPlan {
    pub(crate) fn replace(name: impl Into<String>, config: ViewPortConfig) -> Self {
        Self {
            name: name.into(),
            config,
            strategy: ActivationStrategy::Replace,
            prev_component: None,
            prev_module_id: None,
            child_navigation_instruction: None,
        }
    }
}

impl fmt::Debug for ViewPortPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPortPlan")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .field("prev_module_id", &self.prev_module_id)
            .field("has_child", &self.child_navigation_instruction.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-viewport plans keyed by viewport name.
pub type NavigationPlan = BTreeMap<String, ViewPortPlan>;

// ============================================================================
// NavigationInstruction
// ============================================================================

/// Options carried by every instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstructionOptions {
    /// Treat query-string changes as param changes when planning.
    pub compare_query_params: bool,
    /// Generate redirect targets as absolute URLs.
    pub absolute: bool,
}

/// Everything needed to construct an instruction.
#[derive(Default)]
pub struct InstructionInit {
    pub fragment: String,
    pub query_string: String,
    pub params: RouteParams,
    pub query_params: QueryParams,
    /// `None` installs an empty placeholder config.
    pub config: Option<Rc<RouteConfig>>,
    pub router: WeakRouter,
    pub parent_instruction: Option<Rc<NavigationInstruction>>,
    pub previous_instruction: Option<Rc<NavigationInstruction>>,
    pub options: InstructionOptions,
    pub parent_catch_handler: bool,
}

/// One router level of a resolved navigation.
pub struct NavigationInstruction {
    fragment: RefCell<String>,
    query_string: String,
    params: RouteParams,
    query_params: QueryParams,
    config: RefCell<Rc<RouteConfig>>,
    router: WeakRouter,
    parent_instruction: Weak<NavigationInstruction>,
    previous_instruction: RefCell<Option<Rc<NavigationInstruction>>>,
    view_port_instructions: RefCell<BTreeMap<String, Rc<ViewPortInstruction>>>,
    plan: RefCell<Option<NavigationPlan>>,
    options: InstructionOptions,
    parent_catch_handler: bool,
    merged_params: RouteParams,
}

impl NavigationInstruction {
    pub fn new(init: InstructionInit) -> Rc<Self> {
        let config = init.config.unwrap_or_default();

        // Root-most level first so deeper levels win on key collisions.
        let mut levels = vec![strip_wildcard(&init.params, &config)];
        let mut ancestor = init.parent_instruction.clone();
        while let Some(current) = ancestor {
            levels.push(strip_wildcard(&current.params, &current.config()));
            ancestor = current.parent_instruction();
        }

        let mut merged_params: RouteParams = init
            .query_params
            .iter()
            .filter_map(|(key, values)| values.first().map(|v| (key, v.as_str())))
            .collect();
        for level in levels.iter().rev() {
            merged_params.extend_from(level);
        }

        Rc::new(Self {
            fragment: RefCell::new(init.fragment),
            query_string: init.query_string,
            params: init.params,
            query_params: init.query_params,
            config: RefCell::new(config),
            router: init.router,
            parent_instruction: init
                .parent_instruction
                .as_ref()
                .map_or_else(Weak::new, Rc::downgrade),
            previous_instruction: RefCell::new(init.previous_instruction),
            view_port_instructions: RefCell::new(BTreeMap::new()),
            plan: RefCell::new(None),
            options: init.options,
            parent_catch_handler: init.parent_catch_handler,
            merged_params,
        })
    }

    pub fn fragment(&self) -> String {
        self.fragment.borrow().clone()
    }

    pub(crate) fn set_fragment(&self, fragment: String) {
        *self.fragment.borrow_mut() = fragment;
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Params of the matched route, including any child-route wildcard.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    pub fn config(&self) -> Rc<RouteConfig> {
        Rc::clone(&self.config.borrow())
    }

    pub fn set_config(&self, config: Rc<RouteConfig>) {
        *self.config.borrow_mut() = config;
    }

    /// Edit this instruction's config without touching the registered route.
    pub fn update_config(&self, edit: impl FnOnce(&mut RouteConfig)) {
        let mut config = self.config.borrow_mut();
        edit(Rc::make_mut(&mut config));
    }

    pub fn router(&self) -> Result<Router, RouterError> {
        self.router.upgrade().ok_or(RouterError::RouterReleased)
    }

    pub fn parent_instruction(&self) -> Option<Rc<NavigationInstruction>> {
        self.parent_instruction.upgrade()
    }

    pub fn previous_instruction(&self) -> Option<Rc<NavigationInstruction>> {
        self.previous_instruction.borrow().clone()
    }

    pub(crate) fn set_previous_instruction(&self, previous: Option<Rc<NavigationInstruction>>) {
        *self.previous_instruction.borrow_mut() = previous;
    }

    pub fn options(&self) -> InstructionOptions {
        self.options
    }

    /// `true` when the instruction was resolved through an ancestor router's
    /// unknown-route handler.
    pub fn parent_catch_handler(&self) -> bool {
        self.parent_catch_handler
    }

    pub fn merged_params(&self) -> &RouteParams {
        &self.merged_params
    }

    pub fn lifecycle_args(self: &Rc<Self>) -> LifecycleArgs {
        LifecycleArgs {
            params: self.merged_params.clone(),
            config: self.config(),
            view_port: None,
            instruction: Rc::downgrade(self),
        }
    }

    pub fn plan(&self) -> Option<NavigationPlan> {
        self.plan.borrow().clone()
    }

    pub(crate) fn set_plan(&self, plan: Option<NavigationPlan>) {
        *self.plan.borrow_mut() = plan;
    }

    pub(crate) fn set_plan_child(&self, name: &str, child: Rc<NavigationInstruction>) {
        if let Some(plan) = self.plan.borrow_mut().as_mut() {
            if let Some(view_port_plan) = plan.get_mut(name) {
                view_port_plan.child_navigation_instruction = Some(child);
            }
        }
    }

    pub fn view_port_instructions(&self) -> BTreeMap<String, Rc<ViewPortInstruction>> {
        self.view_port_instructions.borrow().clone()
    }

    pub fn view_port_instruction(&self, name: &str) -> Option<Rc<ViewPortInstruction>> {
        self.view_port_instructions.borrow().get(name).cloned()
    }

    /// Record the component chosen for a viewport.
    pub fn add_view_port_instruction(
        self: &Rc<Self>,
        name: impl Into<String>,
        strategy: ActivationStrategy,
        module_id: Option<String>,
        component: Rc<Component>,
    ) -> Rc<ViewPortInstruction> {
        let name = name.into();
        let mut lifecycle_args = self.lifecycle_args();
        lifecycle_args.view_port = Some(name.clone());

        let instruction = Rc::new(ViewPortInstruction {
            name: name.clone(),
            strategy,
            module_id,
            child_router: component.child_router.clone(),
            component,
            lifecycle_args,
            child_navigation_instruction: RefCell::new(None),
        });
        self.view_port_instructions
            .borrow_mut()
            .insert(name, Rc::clone(&instruction));
        instruction
    }

    /// This instruction and every descendant, parents first.
    pub fn get_all_instructions(self: &Rc<Self>) -> Vec<Rc<NavigationInstruction>> {
        let mut instructions = vec![Rc::clone(self)];
        for view_port in self.view_port_instructions.borrow().values() {
            if let Some(child) = view_port.child_navigation_instruction() {
                instructions.extend(child.get_all_instructions());
            }
        }
        instructions
    }

    /// The previous instruction of every level that still has one.
    pub fn get_all_previous_instructions(self: &Rc<Self>) -> Vec<Rc<NavigationInstruction>> {
        self.get_all_instructions()
            .iter()
            .filter_map(|i| i.previous_instruction())
            .collect()
    }

    /// Name of the route's trailing `*` segment.
    pub fn wildcard_name(&self) -> Option<String> {
        let config = self.config.borrow();
        config
            .route
            .rfind('*')
            .map(|index| config.route[index + 1..].to_string())
    }

    /// Remainder of the URL left for a child router, with the query string.
    pub fn wildcard_path(&self) -> String {
        let mut path = self
            .wildcard_name()
            .and_then(|name| self.params.get(&name).map(str::to_string))
            .unwrap_or_default();
        if !self.query_string.is_empty() {
            path.push('?');
            path.push_str(&self.query_string);
        }
        path
    }

    /// Part of the fragment matched by this level, i.e. everything before the
    /// wildcard value.
    pub fn base_url(&self) -> String {
        let mut fragment = decode_uri(&self.fragment.borrow());

        if fragment.is_empty() {
            let config = self.config();
            if let Ok(router) = self.router() {
                let non_empty = router
                    .routes()
                    .into_iter()
                    .find(|route| route.name == config.name && !route.route.is_empty());
                if let Some(route) = non_empty {
                    fragment = route.route.clone();
                }
            }
        }

        let path = self
            .wildcard_name()
            .and_then(|name| self.params.get(&name).map(str::to_string))
            .unwrap_or_default();
        if path.is_empty() {
            return encode_uri(&fragment);
        }

        match fragment.rfind(&path) {
            Some(index) => encode_uri(&fragment[..index]),
            None => String::new(),
        }
    }

    /// Title for this level and its children.
    ///
    /// Child titles come first, joined by `separator`, followed by this
    /// level's nav-model title and finally the router title.
    pub fn build_title(&self, separator: &str) -> String {
        let Ok(router) = self.router() else {
            return String::new();
        };

        let mut title = self
            .config()
            .nav_model()
            .and_then(|nav| nav.title())
            .filter(|t| !t.is_empty())
            .map(|t| router.transform_title(&t))
            .unwrap_or_default();

        let children: Vec<_> = self
            .view_port_instructions
            .borrow()
            .values()
            .filter_map(|vp| vp.child_navigation_instruction())
            .collect();
        let child_titles: Vec<String> = children
            .iter()
            .map(|child| child.build_title(separator))
            .filter(|t| !t.is_empty())
            .collect();

        if !child_titles.is_empty() {
            let own = std::mem::take(&mut title);
            title = child_titles.join(separator);
            if !own.is_empty() {
                title.push_str(separator);
                title.push_str(&own);
            }
        }

        if let Some(router_title) = router.title().filter(|t| !t.is_empty()) {
            if !title.is_empty() {
                title.push_str(separator);
            }
            title.push_str(&router.transform_title(&router_title));
        }

        title
    }

    /// Push the built title to the router's history.
    pub fn update_title(&self) {
        let Ok(router) = self.router() else {
            return;
        };
        let title = self.build_title(&router.title_separator());
        if !title.is_empty() {
            router.history().set_title(&title);
        }
    }

    /// Install this tree as the live one.
    ///
    /// Replaced viewports are processed concurrently; with `wait_to_swap`
    /// their swaps run together once every load has settled. Prunes the
    /// previous instruction and the plan afterwards.
    pub fn commit_changes(
        self: &Rc<Self>,
        wait_to_swap: bool,
    ) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let instruction = Rc::clone(self);
        async move {
            let router = instruction.router()?;
            router.set_current_instruction(Some(Rc::clone(&instruction)));

            if let Some(previous) = instruction.previous_instruction() {
                if let Some(nav) = previous.config().nav_model() {
                    nav.set_active(false);
                }
            }
            if let Some(nav) = instruction.config().nav_model() {
                nav.set_active(true);
            }
            router.refresh_navigation();

            let mut loads: Vec<LocalBoxFuture<'static, Result<(), RouterError>>> = Vec::new();
            let mut delayed_swaps = Vec::new();

            for view_port_instruction in instruction.view_port_instructions().into_values() {
                let view_port = router.view_port(&view_port_instruction.name).ok_or_else(|| {
                    RouterError::MissingViewPort {
                        module_id: view_port_instruction.module_id.clone().unwrap_or_default(),
                    }
                })?;
                let child = view_port_instruction.child_navigation_instruction();

                if view_port_instruction.strategy != ActivationStrategy::Replace {
                    if let Some(child) = child {
                        loads.push(child.commit_changes(wait_to_swap));
                    }
                    continue;
                }

                match child {
                    Some(child) if child.parent_catch_handler() => {
                        loads.push(child.commit_changes(wait_to_swap));
                    }
                    child => {
                        if wait_to_swap {
                            delayed_swaps
                                .push((Rc::clone(&view_port), Rc::clone(&view_port_instruction)));
                        }
                        loads.push(
                            async move {
                                view_port.process(&view_port_instruction, wait_to_swap).await?;
                                if let Some(child) = child {
                                    child.commit_changes(wait_to_swap).await?;
                                }
                                Ok(())
                            }
                            .boxed_local(),
                        );
                    }
                }
            }

            try_join_all(loads).await?;

            for (view_port, view_port_instruction) in delayed_swaps {
                view_port.swap(&view_port_instruction);
            }

            trace_log!("Committed '{}'", instruction.fragment());
            instruction.prune();
            Ok(())
        }
        .boxed_local()
    }

    fn prune(&self) {
        self.set_previous_instruction(None);
        self.set_plan(None);
    }
}

fn strip_wildcard(params: &RouteParams, config: &RouteConfig) -> RouteParams {
    let mut params = params.clone();
    if config.has_child_router() {
        if let Some(index) = config.route.rfind('*') {
            params.remove(&config.route[index + 1..]);
        }
    }
    params
}

impl fmt::Debug for NavigationInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationInstruction")
            .field("fragment", &self.fragment.borrow())
            .field("query_string", &self.query_string)
            .field("params", &self.params)
            .field("route", &self.config.borrow().route)
            .field("view_ports", &self.view_port_instructions.borrow().keys().collect::<Vec<_>>())
            .field("parent_catch_handler", &self.parent_catch_handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_config(route: &str) -> Rc<RouteConfig> {
        let mut config = RouteConfig::new(route).module_id("m");
        config.has_child_router = true;
        Rc::new(config)
    }

    #[test]
    fn test_merged_params_skip_wildcards_and_prefer_deeper_levels() {
        let parent = NavigationInstruction::new(InstructionInit {
            fragment: "users/1/posts".into(),
            params: RouteParams::new().with("id", "1").with("childRoute", "posts"),
            query_params: QueryParams::from_query_string("id=q&tab=a"),
            config: Some(child_config("users/:id/*childRoute")),
            ..InstructionInit::default()
        });
        let child = NavigationInstruction::new(InstructionInit {
            fragment: "posts".into(),
            params: RouteParams::new().with("page", "2"),
            query_params: QueryParams::from_query_string("tab=a"),
            config: Some(Rc::new(RouteConfig::new("posts").module_id("p"))),
            parent_instruction: Some(Rc::clone(&parent)),
            ..InstructionInit::default()
        });

        let merged = child.merged_params();
        assert_eq!(merged.get("id"), Some("1"));
        assert_eq!(merged.get("page"), Some("2"));
        assert_eq!(merged.get("tab"), Some("a"));
        assert!(!merged.contains("childRoute"));

        assert_eq!(parent.merged_params().get("id"), Some("1"));
        assert_eq!(child.parent_instruction().map(|p| p.fragment()), Some("users/1/posts".into()));
    }

    #[test]
    fn test_wildcard_name_and_path() {
        let instruction = NavigationInstruction::new(InstructionInit {
            fragment: "parent/child".into(),
            query_string: "x=1".into(),
            params: RouteParams::new().with("childRoute", "child"),
            config: Some(child_config("parent/*childRoute")),
            ..InstructionInit::default()
        });
        assert_eq!(instruction.wildcard_name().as_deref(), Some("childRoute"));
        assert_eq!(instruction.wildcard_path(), "child?x=1");
        assert_eq!(instruction.base_url(), "parent/");

        let leaf = NavigationInstruction::new(InstructionInit {
            config: Some(Rc::new(RouteConfig::new("a").module_id("a"))),
            ..InstructionInit::default()
        });
        assert_eq!(leaf.wildcard_name(), None);
        assert_eq!(leaf.wildcard_path(), "");
    }

    #[test]
    fn test_base_url_without_wildcard_is_the_fragment() {
        let instruction = NavigationInstruction::new(InstructionInit {
            fragment: "a b/c".into(),
            config: Some(Rc::new(RouteConfig::new("a b/c").module_id("a"))),
            ..InstructionInit::default()
        });
        assert_eq!(instruction.base_url(), "a%20b/c");
    }

    #[test]
    fn test_update_config_does_not_touch_the_shared_config() {
        let shared = Rc::new(RouteConfig::new("a").name("a"));
        let instruction = NavigationInstruction::new(InstructionInit {
            config: Some(Rc::clone(&shared)),
            ..InstructionInit::default()
        });
        instruction.update_config(|config| config.module_id = Some("late".into()));
        assert_eq!(instruction.config().module_id.as_deref(), Some("late"));
        assert_eq!(shared.module_id, None);
    }

    #[test]
    fn test_released_router() {
        let instruction = NavigationInstruction::new(InstructionInit::default());
        assert_eq!(instruction.router().unwrap_err(), RouterError::RouterReleased);
        assert_eq!(instruction.build_title(" | "), "");
    }

    #[test]
    fn test_lifecycle_args_point_back_to_the_instruction() {
        let instruction = NavigationInstruction::new(InstructionInit {
            params: RouteParams::new().with("id", "3"),
            ..InstructionInit::default()
        });
        let args = instruction.lifecycle_args();
        assert_eq!(args.params.get("id"), Some("3"));
        assert!(args.instruction().is_some_and(|i| Rc::ptr_eq(&i, &instruction)));
    }
}
