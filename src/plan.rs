//! Navigation planning.
//!
//! Planning diffs a freshly resolved instruction against the router's live
//! one and decides, per viewport, whether to replace the component, re-run
//! its lifecycle or leave it alone. Viewports that keep their component and
//! host a child router are planned recursively against the wildcard part of
//! the URL.
//!
//! A route configured with `redirect` does not produce a plan at all: it
//! produces a [`Redirect`] to the generated target URL.
//!
//! Strategy selection for a viewport present in the live tree, first match
//! wins:
//!
//! 1. `Replace` when the module id changes;
//! 2. the previous view-model's `determine_activation_strategy`;
//! 3. the route's `activation_strategy`;
//! 4. `InvokeLifecycle` when params changed or the caller forces it;
//! 5. `NoChange`.

use crate::commands::Redirect;
use crate::error::RouterError;
use crate::instruction::{NavigationInstruction, NavigationPlan, ViewPortPlan};
use crate::params::RouteParams;
use crate::pipeline::{Next, PipelineResult, PipelineStep, StepOutput};
use crate::recognizer::RouteRef;
use crate::route::{ActivationStrategy, ViewPortConfig};
use crate::router::GenerateOptions;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use futures::future::{try_join_all, FutureExt, LocalBoxFuture};
use std::collections::BTreeMap;
use std::rc::Rc;

/// What planning produced.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Plan(NavigationPlan),
    Redirect(Rc<Redirect>),
}

impl PlanOutcome {
    pub fn plan(&self) -> Option<&NavigationPlan> {
        match self {
            Self::Plan(plan) => Some(plan),
            Self::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&Rc<Redirect>> {
        match self {
            Self::Plan(_) => None,
            Self::Redirect(redirect) => Some(redirect),
        }
    }
}

/// Build the plan for `instruction` against its previous instruction.
///
/// `force_lifecycle` raises `NoChange` viewports to `InvokeLifecycle`; it is
/// set when a parent viewport re-runs its lifecycle.
pub fn build_navigation_plan(
    instruction: &Rc<NavigationInstruction>,
    force_lifecycle: bool,
) -> LocalBoxFuture<'static, Result<PlanOutcome, RouterError>> {
    let instruction = Rc::clone(instruction);
    async move {
        let config = instruction.config();
        if config.redirect.is_some() {
            return build_redirect_plan(&instruction).await;
        }

        let router = instruction.router()?;
        let defaults = router.view_port_defaults();

        if let Some(previous) = instruction.previous_instruction() {
            return build_transition_plans(&instruction, &previous, &defaults, force_lifecycle).await;
        }

        let plan: NavigationPlan = config
            .view_ports
            .iter()
            .flatten()
            .map(|(name, view_port)| {
                let view_port = resolve_default(name, view_port, &defaults);
                (name.clone(), ViewPortPlan::replace(name.clone(), view_port))
            })
            .collect();

        trace_log!(
            "First navigation at this level for '{}': replacing {:?}",
            instruction.fragment(),
            plan.keys().collect::<Vec<_>>()
        );
        Ok(PlanOutcome::Plan(plan))
    }
    .boxed_local()
}

async fn build_redirect_plan(
    instruction: &Rc<NavigationInstruction>,
) -> Result<PlanOutcome, RouterError> {
    let config = instruction.config();
    let router = instruction.router()?;
    let target = config.redirect.clone().unwrap_or_default();

    let redirect_instruction = router.create_navigation_instruction(&target, None).await?;
    let original = instruction.params();

    // `:name` placeholders in the target take the original value and are
    // dropped when it has none; anything else keeps the target's own value.
    let mut params = RouteParams::new();
    for (key, value) in redirect_instruction.params().iter() {
        match value.strip_prefix(':') {
            Some(name) => {
                if let Some(original_value) = original.get(name) {
                    params.insert(key, original_value);
                }
            }
            None => params.insert(key, value),
        }
    }

    let redirect_config = redirect_instruction.config();
    let options = GenerateOptions {
        absolute: instruction.options().absolute,
    };
    let mut location =
        router.generate_with(RouteRef::Config(&redirect_config), &params, options)?;
    for (key, value) in original.iter() {
        location = location.replacen(&format!(":{key}"), value, 1);
    }

    let query_string = instruction.query_string();
    if !query_string.is_empty() {
        location.push('?');
        location.push_str(query_string);
    }

    debug_log!("Route '{}' redirects to '{}'", config.route, location);
    Ok(PlanOutcome::Redirect(Rc::new(Redirect::new(location))))
}

enum ChildPlan {
    Planned {
        view_port: String,
        child: Rc<NavigationInstruction>,
    },
    Redirect(Rc<Redirect>),
}

async fn build_transition_plans(
    instruction: &Rc<NavigationInstruction>,
    previous: &Rc<NavigationInstruction>,
    defaults: &BTreeMap<String, ViewPortConfig>,
    force_lifecycle: bool,
) -> Result<PlanOutcome, RouterError> {
    let config = instruction.config();
    let has_new_params = has_different_parameter_values(previous, instruction);
    let args = instruction.lifecycle_args();

    let mut plan = NavigationPlan::new();
    let mut pending = Vec::new();

    for (name, prev) in previous.view_port_instructions() {
        let next_config = config
            .view_ports
            .as_ref()
            .and_then(|view_ports| view_ports.get(&name).cloned())
            .unwrap_or_else(|| ViewPortConfig {
                module_id: prev.module_id.clone(),
            });
        let next_config = resolve_default(&name, &next_config, defaults);

        let strategy = if prev.module_id != next_config.module_id {
            ActivationStrategy::Replace
        } else if let Some(strategy) = prev.component.view_model.determine_activation_strategy(&args) {
            strategy
        } else if let Some(strategy) = config.activation_strategy {
            strategy
        } else if has_new_params || force_lifecycle {
            ActivationStrategy::InvokeLifecycle
        } else {
            ActivationStrategy::NoChange
        };

        trace_log!("Viewport '{}' planned as {}", name, strategy);

        if strategy != ActivationStrategy::Replace {
            if let Some(child_router) = prev.child_router.clone() {
                let path = instruction.wildcard_path();
                let parent = Rc::clone(instruction);
                let view_port = name.clone();
                pending.push(async move {
                    let child = child_router
                        .create_navigation_instruction(&path, Some(&parent))
                        .await?;
                    let force = strategy == ActivationStrategy::InvokeLifecycle;
                    match build_navigation_plan(&child, force).await? {
                        PlanOutcome::Redirect(redirect) => {
                            Ok::<_, RouterError>(ChildPlan::Redirect(redirect))
                        }
                        PlanOutcome::Plan(child_plan) => {
                            child.set_plan(Some(child_plan));
                            Ok(ChildPlan::Planned { view_port, child })
                        }
                    }
                });
            }
        }

        plan.insert(
            name.clone(),
            ViewPortPlan {
                name,
                config: next_config,
                strategy,
                prev_component: Some(Rc::clone(&prev.component)),
                prev_module_id: prev.module_id.clone(),
                child_navigation_instruction: None,
            },
        );
    }

    for child in try_join_all(pending).await? {
        match child {
            ChildPlan::Redirect(redirect) => return Ok(PlanOutcome::Redirect(redirect)),
            ChildPlan::Planned { view_port, child } => {
                if let Some(view_port_plan) = plan.get_mut(&view_port) {
                    view_port_plan.child_navigation_instruction = Some(child);
                }
            }
        }
    }

    Ok(PlanOutcome::Plan(plan))
}

/// A viewport config without a module id defers to the router default of the
/// same name, when there is one.
fn resolve_default(
    name: &str,
    config: &ViewPortConfig,
    defaults: &BTreeMap<String, ViewPortConfig>,
) -> ViewPortConfig {
    match (&config.module_id, defaults.get(name)) {
        (None, Some(default)) => default.clone(),
        _ => config.clone(),
    }
}

/// Whether a navigation changes route params (and, when the instruction asks
/// for it, query params). The wildcard feeding a child router is ignored.
pub fn has_different_parameter_values(
    previous: &NavigationInstruction,
    next: &NavigationInstruction,
) -> bool {
    let wildcard = if next.config().has_child_router() {
        next.wildcard_name()
    } else {
        None
    };
    let skip = |key: &str| wildcard.as_deref() == Some(key);

    let prev_params = previous.params();
    let next_params = next.params();
    let params_changed = next_params
        .keys()
        .chain(prev_params.keys())
        .filter(|key| !skip(*key))
        .any(|key| prev_params.get(key) != next_params.get(key));
    if params_changed {
        return true;
    }

    if !next.options().compare_query_params {
        return false;
    }

    let prev_query = previous.query_params();
    let next_query = next.query_params();
    next_query
        .iter()
        .map(|(key, _)| key)
        .chain(prev_query.iter().map(|(key, _)| key))
        .any(|key| prev_query.get_all(key) != next_query.get_all(key))
}

/// First pipeline step: plan the navigation or cancel with its redirect.
#[derive(Debug, Default)]
pub struct BuildNavigationPlanStep;

#[async_trait(?Send)]
impl PipelineStep for BuildNavigationPlanStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        match build_navigation_plan(&instruction, false).await {
            Ok(PlanOutcome::Plan(plan)) => {
                instruction.set_plan(Some(plan));
                Ok(next.proceed().await)
            }
            Ok(PlanOutcome::Redirect(redirect)) => Ok(next.cancel(StepOutput::Command(redirect))),
            Err(err) => {
                debug_log!("Planning '{}' failed: {}", instruction.fragment(), err);
                Ok(next.cancel(StepOutput::Error(err)))
            }
        }
    }

    fn name(&self) -> &str {
        "build-plan"
    }
}
