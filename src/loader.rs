//! Component loading.
//!
//! Loading walks a planned instruction tree. Viewports planned as `Replace`
//! get a fresh component from the [`RouteLoader`]; every other viewport keeps
//! the component it already shows. A freshly loaded view-model that
//! configures a child router gets one, and that child router resolves,
//! plans and loads the rest of the URL in turn.

use crate::commands::Redirect;
use crate::configuration::RouterConfiguration;
use crate::error::RouterError;
use crate::instruction::{Component, NavigationInstruction, ViewPortPlan};
use crate::lifecycle::RouteLifecycle;
use crate::pipeline::{Next, PipelineResult, PipelineStep, StepOutput};
use crate::plan::{build_navigation_plan, PlanOutcome};
use crate::route::{ActivationStrategy, ViewPortConfig};
use crate::router::Router;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use futures::future::{try_join_all, FutureExt, LocalBoxFuture};
use std::fmt;
use std::rc::Rc;

/// Turns a viewport config into a live view-model.
#[async_trait(?Send)]
pub trait RouteLoader {
    async fn load_route(
        &self,
        router: &Router,
        config: &ViewPortConfig,
        instruction: &Rc<NavigationInstruction>,
    ) -> Result<Rc<dyn RouteLifecycle>, RouterError>;
}

/// Why loading stopped early.
#[derive(Debug, Clone)]
pub enum LoadInterrupt {
    /// A child router's plan redirected.
    Redirect(Rc<Redirect>),
    Error(RouterError),
}

impl From<RouterError> for LoadInterrupt {
    fn from(err: RouterError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Display for LoadInterrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect(redirect) => write!(f, "redirect to {}", redirect.url()),
            Self::Error(err) => err.fmt(f),
        }
    }
}

impl From<LoadInterrupt> for StepOutput {
    fn from(interrupt: LoadInterrupt) -> Self {
        match interrupt {
            LoadInterrupt::Redirect(redirect) => StepOutput::Command(redirect),
            LoadInterrupt::Error(err) => StepOutput::Error(err),
        }
    }
}

struct LoadingPlan {
    instruction: Rc<NavigationInstruction>,
    plan: ViewPortPlan,
}

/// Collect the viewports that need a fresh component.
///
/// Retained viewports are recorded on their instruction right away, reusing
/// the previous component.
fn determine_loading_plans(instruction: &Rc<NavigationInstruction>) -> Vec<LoadingPlan> {
    let mut loading = Vec::new();

    for (name, plan) in instruction.plan().unwrap_or_default() {
        let child = plan.child_navigation_instruction.clone();

        if plan.strategy == ActivationStrategy::Replace {
            loading.push(LoadingPlan {
                instruction: Rc::clone(instruction),
                plan,
            });
        } else if let Some(component) = plan.prev_component.clone() {
            let view_port = instruction.add_view_port_instruction(
                name,
                plan.strategy,
                plan.prev_module_id.clone(),
                component,
            );
            if let Some(child) = &child {
                view_port.set_child_navigation_instruction(Rc::clone(child));
            }
        }

        if let Some(child) = child {
            loading.extend(determine_loading_plans(&child));
        }
    }

    loading
}

/// Load every replaced viewport of `instruction` and its descendants.
pub fn load_new_route(
    loader: Rc<dyn RouteLoader>,
    instruction: &Rc<NavigationInstruction>,
) -> LocalBoxFuture<'static, Result<(), LoadInterrupt>> {
    let loads: Vec<_> = determine_loading_plans(instruction)
        .into_iter()
        .map(|loading| load_route(Rc::clone(&loader), loading.instruction, loading.plan))
        .collect();

    async move {
        try_join_all(loads).await?;
        Ok(())
    }
    .boxed_local()
}

fn load_route(
    loader: Rc<dyn RouteLoader>,
    instruction: Rc<NavigationInstruction>,
    plan: ViewPortPlan,
) -> LocalBoxFuture<'static, Result<(), LoadInterrupt>> {
    async move {
        let component = load_component(loader.as_ref(), &instruction, &plan.config).await?;
        let view_port = instruction.add_view_port_instruction(
            plan.name.clone(),
            plan.strategy,
            plan.config.module_id.clone(),
            Rc::clone(&component),
        );

        let Some(child_router) = component.child_router.clone() else {
            return Ok(());
        };

        let path = instruction.wildcard_path();
        let child = child_router
            .create_navigation_instruction(&path, Some(&instruction))
            .await?;
        instruction.set_plan_child(&plan.name, Rc::clone(&child));

        match build_navigation_plan(&child, false).await? {
            PlanOutcome::Redirect(redirect) => Err(LoadInterrupt::Redirect(redirect)),
            PlanOutcome::Plan(child_plan) => {
                child.set_plan(Some(child_plan));
                view_port.set_child_navigation_instruction(Rc::clone(&child));
                load_new_route(loader, &child).await
            }
        }
    }
    .boxed_local()
}

async fn load_component(
    loader: &dyn RouteLoader,
    instruction: &Rc<NavigationInstruction>,
    config: &ViewPortConfig,
) -> Result<Rc<Component>, RouterError> {
    let router = instruction.router()?;
    let view_model = loader.load_route(&router, config, instruction).await?;
    trace_log!("Loaded {:?}", config.module_id);

    let child = router.create_child();
    let mut child_config = RouterConfiguration::new();
    let args = instruction.lifecycle_args();

    let child_router = match view_model.configure_router(&mut child_config, &child, &args) {
        Some(result) => {
            result?;
            child.apply_configuration(child_config)?;
            Some(child)
        }
        None => None,
    };

    Ok(Rc::new(Component {
        view_model,
        config: config.clone(),
        child_router,
    }))
}

/// Loads components for every replaced viewport.
pub struct LoadRouteStep {
    loader: Rc<dyn RouteLoader>,
}

impl LoadRouteStep {
    pub fn new(loader: Rc<dyn RouteLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait(?Send)]
impl PipelineStep for LoadRouteStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        match load_new_route(Rc::clone(&self.loader), &instruction).await {
            Ok(()) => Ok(next.proceed().await),
            Err(interrupt) => {
                debug_log!("Loading '{}' stopped: {}", instruction.fragment(), interrupt);
                Ok(next.cancel(interrupt))
            }
        }
    }

    fn name(&self) -> &str {
        "load-route"
    }
}
