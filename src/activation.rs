//! Lifecycle hook traversal.
//!
//! Deactivation hooks run on the components being navigated away from,
//! innermost first; activation hooks run on the components being navigated
//! to, outermost first. Only viewports planned as `Replace` or
//! `InvokeLifecycle` take part.
//!
//! A hook's settled [`StepOutput`] decides whether the traversal goes on:
//! `Error` and `Bool(false)` stop it, a command stops it unless it asks to
//! continue, anything else continues. A stopped traversal cancels the
//! pipeline with the offending output.

use crate::error::RouterError;
use crate::instruction::{Component, LifecycleArgs, NavigationInstruction, NavigationPlan};
use crate::lifecycle::{Potential, RouteLifecycle};
use crate::pipeline::{Next, PipelineResult, PipelineStep, StepOutput};
use crate::route::ActivationStrategy;
use crate::router::Router;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use std::rc::Rc;

/// Hooks run while leaving components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationHook {
    CanDeactivate,
    Deactivate,
}

/// Hooks run while entering components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationHook {
    CanActivate,
    Activate,
}

/// Whether a hook's output lets the navigation continue.
///
/// Commands are bound to `router` before asking them.
pub fn should_continue(output: &StepOutput, router: Option<&Router>) -> bool {
    match output {
        StepOutput::Error(_) | StepOutput::Superseded => false,
        StepOutput::Command(command) => {
            if let Some(router) = router {
                command.set_router(router);
            }
            command.should_continue_processing()
        }
        StepOutput::Empty => true,
        StepOutput::Bool(value) => *value,
    }
}

// ============================================================================
// Deactivation
// ============================================================================

/// View-models to deactivate, parents before children. Callers walk the
/// list from the end.
pub fn find_deactivatable(plan: &NavigationPlan) -> Vec<Rc<dyn RouteLifecycle>> {
    let mut list = Vec::new();
    collect_deactivatable(plan, &mut list);
    list
}

fn collect_deactivatable(plan: &NavigationPlan, list: &mut Vec<Rc<dyn RouteLifecycle>>) {
    for view_port_plan in plan.values() {
        let prev_component = view_port_plan.prev_component.as_ref();

        if let Some(component) = prev_component {
            if view_port_plan.strategy.runs_lifecycle() {
                list.push(Rc::clone(&component.view_model));
            }
        }

        match prev_component {
            Some(component) if view_port_plan.strategy == ActivationStrategy::Replace => {
                add_previous_deactivatable(component, list);
            }
            _ => {
                if let Some(child) = &view_port_plan.child_navigation_instruction {
                    collect_deactivatable(&child.plan().unwrap_or_default(), list);
                }
            }
        }
    }
}

/// Everything rendered under a replaced component's child router.
fn add_previous_deactivatable(component: &Component, list: &mut Vec<Rc<dyn RouteLifecycle>>) {
    let Some(current) = component
        .child_router
        .as_ref()
        .and_then(|router| router.current_instruction())
    else {
        return;
    };

    for view_port in current.view_port_instructions().values() {
        list.push(Rc::clone(&view_port.component.view_model));
        add_previous_deactivatable(&view_port.component, list);
    }
}

/// Run a deactivation hook on every outgoing component, innermost first.
///
/// With `ignore_result`, only failures stop the traversal. When every hook
/// has run, the instruction's router is flagged as able to deactivate.
pub async fn process_deactivatable(
    instruction: &Rc<NavigationInstruction>,
    hook: DeactivationHook,
    next: &Next,
    ignore_result: bool,
) -> PipelineResult {
    let plan = instruction.plan().unwrap_or_default();
    let view_models = find_deactivatable(&plan);

    for view_model in view_models.iter().rev() {
        let potential = match hook {
            DeactivationHook::CanDeactivate => view_model.can_deactivate(instruction),
            DeactivationHook::Deactivate => view_model.deactivate(instruction),
        };
        let Some(potential) = potential else {
            continue;
        };

        let output = potential.settle().await;
        if output.is_error() || !(ignore_result || should_continue(&output, None)) {
            debug_log!("{:?} refused navigation to '{}': {:?}", hook, instruction.fragment(), output);
            return next.cancel(output);
        }
    }

    if let Ok(router) = instruction.router() {
        router.set_could_deactivate(true);
    }
    next.proceed().await
}

// ============================================================================
// Activation
// ============================================================================

/// An incoming component and what its hooks are called with.
pub struct Activatable {
    pub view_model: Rc<dyn RouteLifecycle>,
    pub args: LifecycleArgs,
    /// Router that commands returned by the hooks are bound to.
    pub router: Option<Router>,
}

/// Incoming view-models, outermost first.
pub fn find_activatable(instruction: &Rc<NavigationInstruction>) -> Vec<Activatable> {
    let mut list = Vec::new();
    collect_activatable(instruction, None, &mut list);
    list
}

fn collect_activatable(
    instruction: &NavigationInstruction,
    router: Option<Router>,
    list: &mut Vec<Activatable>,
) {
    for (name, view_port_plan) in instruction.plan().unwrap_or_default() {
        let Some(view_port) = instruction.view_port_instruction(&name) else {
            continue;
        };

        if view_port_plan.strategy.runs_lifecycle() {
            list.push(Activatable {
                view_model: Rc::clone(&view_port.component.view_model),
                args: view_port.lifecycle_args.clone(),
                router: router.clone(),
            });
        }

        if let Some(child) = &view_port_plan.child_navigation_instruction {
            let child_router = view_port
                .component
                .child_router
                .clone()
                .or_else(|| router.clone());
            collect_activatable(child, child_router, list);
        }
    }
}

/// Run an activation hook on every incoming component, outermost first.
pub async fn process_activatable(
    instruction: &Rc<NavigationInstruction>,
    hook: ActivationHook,
    next: &Next,
    ignore_result: bool,
) -> PipelineResult {
    for activatable in find_activatable(instruction) {
        let potential: Option<Potential> = match hook {
            ActivationHook::CanActivate => activatable.view_model.can_activate(&activatable.args),
            ActivationHook::Activate => activatable.view_model.activate(&activatable.args),
        };
        let Some(potential) = potential else {
            continue;
        };

        let output = potential.settle().await;
        if output.is_error()
            || !(ignore_result || should_continue(&output, activatable.router.as_ref()))
        {
            debug_log!("{:?} refused navigation to '{}': {:?}", hook, instruction.fragment(), output);
            return next.cancel(output);
        }
    }

    trace_log!("{:?} finished for '{}'", hook, instruction.fragment());
    next.proceed().await
}

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Default)]
pub struct CanDeactivatePreviousStep;

#[async_trait(?Send)]
impl PipelineStep for CanDeactivatePreviousStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        Ok(process_deactivatable(&instruction, DeactivationHook::CanDeactivate, &next, false).await)
    }

    fn name(&self) -> &str {
        "can-deactivate"
    }
}

#[derive(Debug, Default)]
pub struct CanActivateNextStep;

#[async_trait(?Send)]
impl PipelineStep for CanActivateNextStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        Ok(process_activatable(&instruction, ActivationHook::CanActivate, &next, false).await)
    }

    fn name(&self) -> &str {
        "can-activate"
    }
}

#[derive(Debug, Default)]
pub struct DeactivatePreviousStep;

#[async_trait(?Send)]
impl PipelineStep for DeactivatePreviousStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        Ok(process_deactivatable(&instruction, DeactivationHook::Deactivate, &next, true).await)
    }

    fn name(&self) -> &str {
        "deactivate"
    }
}

#[derive(Debug, Default)]
pub struct ActivateNextStep;

#[async_trait(?Send)]
impl PipelineStep for ActivateNextStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        Ok(process_activatable(&instruction, ActivationHook::Activate, &next, true).await)
    }

    fn name(&self) -> &str {
        "activate"
    }
}
