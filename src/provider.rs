//! The canonical navigation pipeline.
//!
//! ```text
//! build-plan -> can-deactivate -> load-route -> [authorize] -> can-activate
//!   -> [preActivate] -> deactivate -> activate -> [preRender] -> commit
//!   -> [postRender]
//! ```
//!
//! Bracketed entries are slots: named extension points that expand to the
//! steps registered against them when a pipeline is created. `preActivate`,
//! `preRender` and `postRender` also answer to `modelbind`, `precommit` and
//! `postcomplete`.

use crate::activation::{
    ActivateNextStep, CanActivateNextStep, CanDeactivatePreviousStep, DeactivatePreviousStep,
};
use crate::error::RouterError;
use crate::instruction::NavigationInstruction;
use crate::loader::{LoadRouteStep, RouteLoader};
use crate::pipeline::{Next, Pipeline, PipelineResult, PipelineStep};
use crate::plan::BuildNavigationPlanStep;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub const AUTHORIZE_SLOT: &str = "authorize";
pub const PRE_ACTIVATE_SLOT: &str = "preActivate";
pub const PRE_RENDER_SLOT: &str = "preRender";
pub const POST_RENDER_SLOT: &str = "postRender";

/// A named extension point in the pipeline.
pub struct PipelineSlot {
    name: &'static str,
    alias: Option<&'static str>,
    steps: RefCell<Vec<Rc<dyn PipelineStep>>>,
}

impl PipelineSlot {
    fn new(name: &'static str, alias: Option<&'static str>) -> Self {
        Self {
            name,
            alias,
            steps: RefCell::new(Vec::new()),
        }
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias == Some(name)
    }

    pub fn len(&self) -> usize {
        self.steps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.borrow().is_empty()
    }
}

#[async_trait(?Send)]
impl PipelineStep for PipelineSlot {
    // Slots are always expanded by `Pipeline::add_step`.
    async fn run(
        &self,
        _instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        Ok(next.proceed().await)
    }

    fn name(&self) -> &str {
        self.name
    }

    fn get_steps(&self) -> Option<Vec<Rc<dyn PipelineStep>>> {
        Some(self.steps.borrow().clone())
    }
}

impl fmt::Debug for PipelineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSlot")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("steps", &self.len())
            .finish()
    }
}

/// Commits the instruction tree and refreshes the title.
#[derive(Debug, Default)]
pub struct CommitChangesStep;

#[async_trait(?Send)]
impl PipelineStep for CommitChangesStep {
    async fn run(
        &self,
        instruction: Rc<NavigationInstruction>,
        next: Next,
    ) -> Result<PipelineResult, RouterError> {
        instruction.commit_changes(true).await?;
        instruction.update_title();
        Ok(next.proceed().await)
    }

    fn name(&self) -> &str {
        "commit"
    }
}

/// Builds pipelines in canonical order.
pub struct PipelineProvider {
    steps: Vec<Rc<dyn PipelineStep>>,
    can_deactivate: Rc<dyn PipelineStep>,
    slots: Vec<Rc<PipelineSlot>>,
}

impl PipelineProvider {
    pub fn new(loader: Rc<dyn RouteLoader>) -> Self {
        let authorize = Rc::new(PipelineSlot::new(AUTHORIZE_SLOT, None));
        let pre_activate = Rc::new(PipelineSlot::new(PRE_ACTIVATE_SLOT, Some("modelbind")));
        let pre_render = Rc::new(PipelineSlot::new(PRE_RENDER_SLOT, Some("precommit")));
        let post_render = Rc::new(PipelineSlot::new(POST_RENDER_SLOT, Some("postcomplete")));
        let can_deactivate: Rc<dyn PipelineStep> = Rc::new(CanDeactivatePreviousStep);

        let steps: Vec<Rc<dyn PipelineStep>> = vec![
            Rc::new(BuildNavigationPlanStep),
            Rc::clone(&can_deactivate),
            Rc::new(LoadRouteStep::new(loader)),
            authorize.clone(),
            Rc::new(CanActivateNextStep),
            pre_activate.clone(),
            Rc::new(DeactivatePreviousStep),
            Rc::new(ActivateNextStep),
            pre_render.clone(),
            Rc::new(CommitChangesStep),
            post_render.clone(),
        ];

        Self {
            steps,
            can_deactivate,
            slots: vec![authorize, pre_activate, pre_render, post_render],
        }
    }

    /// A pipeline over the current steps. The can-deactivate check is left
    /// out when `use_can_deactivate_step` is `false`.
    pub fn create_pipeline(&self, use_can_deactivate_step: bool) -> Pipeline {
        let mut pipeline = Pipeline::new();
        for step in &self.steps {
            if use_can_deactivate_step || !Rc::ptr_eq(step, &self.can_deactivate) {
                pipeline.add_step(Rc::clone(step));
            }
        }
        trace_log!("Created pipeline {:?}", pipeline.step_names());
        pipeline
    }

    fn find_slot(&self, name: &str) -> Option<&Rc<PipelineSlot>> {
        self.slots.iter().find(|slot| slot.answers_to(name))
    }

    /// Register a step in a slot. Registering the same step twice is a no-op.
    pub fn add_step(&self, slot: &str, step: Rc<dyn PipelineStep>) -> Result<(), RouterError> {
        let found = self
            .find_slot(slot)
            .ok_or_else(|| RouterError::InvalidPipelineSlot {
                name: slot.to_string(),
            })?;

        let mut steps = found.steps.borrow_mut();
        if !steps.iter().any(|existing| Rc::ptr_eq(existing, &step)) {
            debug_log!("Pipeline step '{}' added to slot '{}'", step.name(), found.name);
            steps.push(step);
        }
        Ok(())
    }

    pub fn remove_step(&self, slot: &str, step: &Rc<dyn PipelineStep>) {
        if let Some(found) = self.find_slot(slot) {
            found
                .steps
                .borrow_mut()
                .retain(|existing| !Rc::ptr_eq(existing, step));
        }
    }

    pub fn clear_steps(&self, slot: &str) {
        if let Some(found) = self.find_slot(slot) {
            found.steps.borrow_mut().clear();
        }
    }

    /// Empty every slot.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.steps.borrow_mut().clear();
        }
    }

    pub fn slot(&self, name: &str) -> Option<Rc<PipelineSlot>> {
        self.find_slot(name).cloned()
    }
}

impl fmt::Debug for PipelineProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineProvider")
            .field("steps", &self.steps.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .field("slots", &self.slots)
            .finish()
    }
}
