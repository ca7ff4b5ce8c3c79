//! Test utilities for navigation pipeline tests
//!
//! Provides a recording view-model, loader, viewport and event sink, plus a
//! `TestApp` fixture wiring them to an `AppRouter` over a `MemoryHistory`.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use navigator_pipeline::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared, ordered record of hook and viewport calls.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Entries of `log` starting with `prefix`.
pub fn calls_with_prefix(log: &CallLog, prefix: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .cloned()
        .collect()
}

// ============================================================================
// View-models
// ============================================================================

/// How a loaded page behaves.
#[derive(Clone, Default)]
pub struct PageBehaviour {
    pub refuse_deactivate: bool,
    pub refuse_activate: bool,
    /// `can_activate` answers with a redirect to this URL.
    pub redirect_on_activate: Option<String>,
    /// Routes of the child router the page hosts.
    pub child_routes: Vec<RouteConfig>,
    pub strategy: Option<ActivationStrategy>,
    /// `can_activate` waits for this before allowing activation.
    pub activation_gate: Option<Shared<oneshot::Receiver<()>>>,
}

impl PageBehaviour {
    pub fn refusing_deactivate() -> Self {
        Self {
            refuse_deactivate: true,
            ..Self::default()
        }
    }

    pub fn refusing_activate() -> Self {
        Self {
            refuse_activate: true,
            ..Self::default()
        }
    }

    pub fn redirecting_to(url: &str) -> Self {
        Self {
            redirect_on_activate: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// Hold `can_activate` until the returned sender fires or is dropped.
    pub fn gated() -> (Self, oneshot::Sender<()>) {
        let (sender, receiver) = oneshot::channel();
        let behaviour = Self {
            activation_gate: Some(receiver.shared()),
            ..Self::default()
        };
        (behaviour, sender)
    }

    pub fn hosting(child_routes: Vec<RouteConfig>) -> Self {
        Self {
            child_routes,
            ..Self::default()
        }
    }
}

/// View-model recording every hook it receives as `hook:module`.
pub struct RecordingPage {
    pub module_id: String,
    pub log: CallLog,
    pub behaviour: PageBehaviour,
}

impl RecordingPage {
    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{hook}:{}", self.module_id));
    }
}

impl RouteLifecycle for RecordingPage {
    fn can_deactivate(&self, _instruction: &Rc<NavigationInstruction>) -> Option<Potential> {
        self.record("can_deactivate");
        Some(Potential::from(!self.behaviour.refuse_deactivate))
    }

    fn deactivate(&self, _instruction: &Rc<NavigationInstruction>) -> Option<Potential> {
        self.record("deactivate");
        None
    }

    fn can_activate(&self, args: &LifecycleArgs) -> Option<Potential> {
        self.record("can_activate");
        if let Some(url) = &self.behaviour.redirect_on_activate {
            return Some(Potential::ready(StepOutput::command(Redirect::new(url.clone()))));
        }
        let _ = args;
        let allowed = !self.behaviour.refuse_activate;
        if let Some(gate) = self.behaviour.activation_gate.clone() {
            return Some(Potential::future(async move {
                let _ = gate.await;
                Ok(StepOutput::Bool(allowed))
            }));
        }
        Some(Potential::from(allowed))
    }

    fn activate(&self, args: &LifecycleArgs) -> Option<Potential> {
        let id = args.params.get("id").unwrap_or_default().to_string();
        self.record("activate");
        if !id.is_empty() {
            self.log
                .borrow_mut()
                .push(format!("activate_id:{}:{id}", self.module_id));
        }
        None
    }

    fn determine_activation_strategy(&self, _args: &LifecycleArgs) -> Option<ActivationStrategy> {
        self.behaviour.strategy
    }

    fn configure_router(
        &self,
        config: &mut RouterConfiguration,
        router: &Router,
        _args: &LifecycleArgs,
    ) -> Option<Result<(), RouterError>> {
        if self.behaviour.child_routes.is_empty() {
            return None;
        }
        config.map_all(self.behaviour.child_routes.clone());
        router.register_view_port(
            "default",
            Rc::new(TestViewPort::new(&format!("{}.default", self.module_id), &self.log)),
        );
        Some(Ok(()))
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Creates a `RecordingPage` per load, configured by module id.
pub struct TestLoader {
    pub log: CallLog,
    behaviours: RefCell<HashMap<String, PageBehaviour>>,
    loaded: RefCell<Vec<String>>,
}

impl TestLoader {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Rc::clone(log),
            behaviours: RefCell::new(HashMap::new()),
            loaded: RefCell::new(Vec::new()),
        }
    }

    pub fn set_behaviour(&self, module_id: &str, behaviour: PageBehaviour) {
        self.behaviours
            .borrow_mut()
            .insert(module_id.to_string(), behaviour);
    }

    /// Module ids loaded so far, in order.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }
}

#[async_trait(?Send)]
impl RouteLoader for TestLoader {
    async fn load_route(
        &self,
        _router: &Router,
        config: &ViewPortConfig,
        _instruction: &Rc<NavigationInstruction>,
    ) -> Result<Rc<dyn RouteLifecycle>, RouterError> {
        let module_id = config
            .module_id
            .clone()
            .ok_or_else(|| RouterError::custom("viewport without a module"))?;
        let behaviour = self
            .behaviours
            .borrow()
            .get(&module_id)
            .cloned()
            .unwrap_or_default();
        self.loaded.borrow_mut().push(module_id.clone());

        Ok(Rc::new(RecordingPage {
            module_id,
            log: Rc::clone(&self.log),
            behaviour,
        }))
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Viewport recording `process:` and `swap:` calls with the module id.
pub struct TestViewPort {
    pub name: String,
    pub log: CallLog,
}

impl TestViewPort {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Rc::clone(log),
        }
    }
}

#[async_trait(?Send)]
impl ViewPort for TestViewPort {
    async fn process(
        &self,
        instruction: &ViewPortInstruction,
        _wait_to_swap: bool,
    ) -> Result<(), RouterError> {
        self.log.borrow_mut().push(format!(
            "process:{}:{}",
            self.name,
            instruction.module_id.as_deref().unwrap_or_default()
        ));
        Ok(())
    }

    fn swap(&self, instruction: &ViewPortInstruction) {
        self.log.borrow_mut().push(format!(
            "swap:{}:{}",
            self.name,
            instruction.module_id.as_deref().unwrap_or_default()
        ));
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event sink recording `(event, fragment)` pairs.
#[derive(Default)]
pub struct RecordingEvents {
    events: RefCell<Vec<(RouterEvent, String)>>,
    classifications: RefCell<Vec<NavigationClassification>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RouterEvent> {
        self.events.borrow().iter().map(|(event, _)| *event).collect()
    }

    pub fn fragments(&self, event: RouterEvent) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|(recorded, _)| *recorded == event)
            .map(|(_, fragment)| fragment.clone())
            .collect()
    }

    /// Classifications seen by `Processing` events.
    pub fn classifications(&self) -> Vec<NavigationClassification> {
        self.classifications.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
        self.classifications.borrow_mut().clear();
    }
}

impl EventSink for RecordingEvents {
    fn publish(&self, event: RouterEvent, payload: &NavigationEvent) {
        if event == RouterEvent::Processing {
            self.classifications
                .borrow_mut()
                .push(payload.classification);
        }
        self.events
            .borrow_mut()
            .push((event, payload.instruction.fragment()));
    }
}

// ============================================================================
// App fixture
// ============================================================================

/// An active app router with a `default` viewport and recording fixtures.
pub struct TestApp {
    pub app: AppRouter,
    pub history: Rc<MemoryHistory>,
    pub loader: Rc<TestLoader>,
    pub events: Rc<RecordingEvents>,
    pub log: CallLog,
}

impl TestApp {
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self::configured(|config| {
            config.map_all(routes);
        })
    }

    pub fn configured(configure: impl FnOnce(&mut RouterConfiguration)) -> Self {
        init_logging();
        let log = call_log();
        let history = Rc::new(MemoryHistory::new());
        history.activate();
        let loader = Rc::new(TestLoader::new(&log));
        let events = Rc::new(RecordingEvents::default());

        let app = AppRouter::with_event_sink(history.clone(), loader.clone(), events.clone());
        app.configure(|config| {
            configure(config);
            Ok(())
        })
        .expect("test routes are valid");
        app.router()
            .register_view_port("default", Rc::new(TestViewPort::new("default", &log)));

        Self {
            app,
            history,
            loader,
            events,
            log,
        }
    }

    /// Module rendered in the root `default` viewport.
    pub fn current_module(&self) -> Option<String> {
        self.app
            .current_instruction()
            .and_then(|instruction| instruction.view_port_instruction("default"))
            .and_then(|view_port| view_port.module_id.clone())
    }

    /// Child router hosted by the root `default` viewport's component.
    pub fn child_router(&self) -> Option<Router> {
        self.app
            .current_instruction()
            .and_then(|instruction| instruction.view_port_instruction("default"))
            .and_then(|view_port| view_port.component.child_router.clone())
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
        self.events.clear();
    }
}
