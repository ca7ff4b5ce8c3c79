//! The root router and its navigation queue.
//!
//! Every navigation, wherever it starts, ends up here. The app router keeps
//! a queue of pending instructions and runs at most one pipeline at a time:
//!
//! 1. A request is resolved into an instruction and queued. Only the newest
//!    queued request survives; older ones resolve as superseded.
//! 2. When idle, the newest request is taken and classified (first, new,
//!    forward, back, refresh) from a tracker stored in history state.
//! 3. Its pipeline runs. A navigation command in the result performs its
//!    follow-up navigation, which queues another request; a failed result
//!    restores the last good location.
//! 4. The queue is drained again with an increased instruction count until
//!    it is empty. Chains longer than the maximum instruction count give up.
//!
//! ```no_run
//! use navigator_pipeline::{AppRouter, MemoryHistory, RouteConfig};
//! # use navigator_pipeline::RouteLoader;
//! # use std::rc::Rc;
//! # fn loader() -> Rc<dyn RouteLoader> { unimplemented!() }
//!
//! let app = AppRouter::new(Rc::new(MemoryHistory::new()), loader());
//! app.configure(|config| {
//!     config.map(RouteConfig::new("").name("home").module_id("home"));
//!     Ok(())
//! })
//! .unwrap();
//!
//! let result = pollster::block_on(app.load_url("")).completed;
//! ```

use crate::error::RouterError;
use crate::events::{EventSink, LogEventSink, NavigationEvent, RouterEvent};
use crate::history::{History, NavigationOptions};
use crate::instruction::{NavigationInstruction, ViewPort};
use crate::loader::RouteLoader;
use crate::pipeline::{PipelineResult, PipelineStatus, StepOutput};
use crate::provider::PipelineProvider;
use crate::recognizer::{segment_recognizer_factory, RecognizerFactory};
use crate::router::Router;
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// History state key holding the navigation tracker.
pub const NAVIGATION_TRACKER_KEY: &str = "NavigationTracker";

const DEFAULT_MAX_INSTRUCTION_COUNT: usize = 10;

// ============================================================================
// NavigationClassification
// ============================================================================

/// How a navigation relates to the history stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationClassification {
    /// The very first navigation of the app.
    pub first: bool,
    /// A history entry that has not been navigated to before.
    pub new: bool,
    pub forward: bool,
    pub back: bool,
    /// The entry was restored without an in-memory tracker, e.g. on reload.
    pub refresh: bool,
    /// Started by `navigate` rather than the location changing on its own.
    pub explicit: bool,
    pub explicit_back: bool,
}

/// Classify from the tracker stored with the history entry and the tracker
/// of the last navigation.
pub fn classify(
    stored: Option<u64>,
    current: Option<u64>,
    explicit: bool,
    explicit_back: bool,
) -> NavigationClassification {
    let mut classification = NavigationClassification {
        explicit,
        explicit_back,
        ..NavigationClassification::default()
    };

    match (stored, current) {
        (None, None) => {
            classification.first = true;
            classification.new = true;
        }
        (None, Some(_)) => classification.new = true,
        (Some(_), None) => classification.refresh = true,
        (Some(stored), Some(current)) if current < stored => classification.forward = true,
        (Some(stored), Some(current)) if current > stored => classification.back = true,
        _ => {}
    }
    classification
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// AppState
// ============================================================================

struct QueuedNavigation {
    instruction: Rc<NavigationInstruction>,
    responder: Option<oneshot::Sender<PipelineResult>>,
}

/// State owned by the root router.
pub(crate) struct AppState {
    provider: PipelineProvider,
    events: Rc<dyn EventSink>,
    queue: RefCell<Vec<QueuedNavigation>>,
    navigating: Cell<bool>,
    max_instruction_count: Cell<usize>,
    current_tracker: Cell<Option<u64>>,
    last_tracker: Cell<u64>,
    classification: Cell<NavigationClassification>,
    active: Cell<bool>,
}

impl AppState {
    fn new(loader: Rc<dyn RouteLoader>, events: Rc<dyn EventSink>) -> Self {
        Self {
            provider: PipelineProvider::new(loader),
            events,
            queue: RefCell::new(Vec::new()),
            navigating: Cell::new(false),
            max_instruction_count: Cell::new(DEFAULT_MAX_INSTRUCTION_COUNT),
            current_tracker: Cell::new(None),
            last_tracker: Cell::new(0),
            classification: Cell::new(NavigationClassification::default()),
            active: Cell::new(false),
        }
    }
}

// ============================================================================
// AppRouter
// ============================================================================

/// The root [`Router`], owning the navigation queue and pipeline.
///
/// Dereferences to its [`Router`].
#[derive(Clone)]
pub struct AppRouter {
    router: Router,
    app: Rc<AppState>,
}

impl AppRouter {
    /// An app router publishing events to the log.
    pub fn new(history: Rc<dyn History>, loader: Rc<dyn RouteLoader>) -> Self {
        Self::with_event_sink(history, loader, Rc::new(LogEventSink))
    }

    pub fn with_event_sink(
        history: Rc<dyn History>,
        loader: Rc<dyn RouteLoader>,
        events: Rc<dyn EventSink>,
    ) -> Self {
        Self::with_recognizer(history, loader, events, segment_recognizer_factory())
    }

    pub fn with_recognizer(
        history: Rc<dyn History>,
        loader: Rc<dyn RouteLoader>,
        events: Rc<dyn EventSink>,
        recognizer_factory: RecognizerFactory,
    ) -> Self {
        let router = Router::with_recognizer(history, recognizer_factory);
        let app = Rc::new(AppState::new(loader, events));
        router.set_app_state(Rc::clone(&app));
        Self { router, app }
    }

    pub(crate) fn from_parts(router: Router, app: Rc<AppState>) -> Self {
        Self { router, app }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn pipeline_provider(&self) -> &PipelineProvider {
        &self.app.provider
    }

    /// Classification of the navigation in flight; default when idle.
    pub fn classification(&self) -> NavigationClassification {
        self.app.classification.get()
    }

    pub fn is_navigating(&self) -> bool {
        self.app.navigating.get()
    }

    pub fn is_active(&self) -> bool {
        self.app.active.get()
    }

    pub fn max_instruction_count(&self) -> usize {
        self.app.max_instruction_count.get()
    }

    pub fn set_max_instruction_count(&self, count: usize) {
        self.app.max_instruction_count.set(count);
    }

    /// Start the history and load its current fragment.
    ///
    /// Waits for the router to be configured. Returns `None` when already
    /// active.
    pub async fn activate(&self) -> Option<PipelineResult> {
        if self.app.active.get() {
            return None;
        }
        if let Err(err) = self.router.ensure_configured().await {
            warn_log!("App router not activated: {}", err);
            return None;
        }

        self.app.active.set(true);
        let history = self.router.history();
        history.activate();
        info_log!("App router activated at '{}'", history.fragment());
        Some(self.load_url(&history.fragment()).await)
    }

    pub fn deactivate(&self) {
        self.app.active.set(false);
        self.router.history().deactivate();
    }

    /// Register a viewport, then activate or drain pending navigations.
    pub async fn register_view_port(&self, name: impl Into<String>, view_port: Rc<dyn ViewPort>) {
        self.router.register_view_port(name, view_port);
        if self.app.active.get() {
            self.drain().await;
        } else {
            self.activate().await;
        }
    }

    /// Clear routing state, pipeline slots and the queue.
    pub fn reset(&self) {
        self.router.reset();
        self.app.max_instruction_count.set(DEFAULT_MAX_INSTRUCTION_COUNT);
        self.app.provider.reset();
        let dropped = std::mem::take(&mut *self.app.queue.borrow_mut());
        for entry in dropped {
            if let Some(responder) = entry.responder {
                let _ = responder.send(PipelineResult::superseded());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queueing
    // ------------------------------------------------------------------------

    /// Navigate to `url` and wait for its pipeline result.
    ///
    /// Resolution failures are reported as a rejected result after the
    /// previous location has been restored. A request replaced in the queue
    /// by a newer one resolves as superseded.
    ///
    /// Do not await this from inside a lifecycle hook or pipeline step: the
    /// request would wait for the pipeline awaiting it. Return a
    /// [`Redirect`](crate::Redirect) instead.
    pub async fn load_url(&self, url: &str) -> PipelineResult {
        let (sender, receiver) = oneshot::channel();
        if let Err(err) = self.enqueue(url.to_string(), Some(sender)).await {
            return PipelineResult::new(PipelineStatus::Rejected, StepOutput::Error(err));
        }
        self.drain().await;
        receiver.await.unwrap_or_else(|_| PipelineResult::superseded())
    }

    pub(crate) fn queue_url(&self, url: String) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let app = self.clone();
        async move {
            app.enqueue(url, None).await?;
            app.drain().await;
            Ok(())
        }
        .boxed_local()
    }

    fn enqueue(
        &self,
        url: String,
        responder: Option<oneshot::Sender<PipelineResult>>,
    ) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let app = self.clone();
        async move {
            match app.router.create_navigation_instruction(&url, None).await {
                Ok(instruction) => {
                    trace_log!("Queued navigation to '{}'", url);
                    app.app.queue.borrow_mut().push(QueuedNavigation {
                        instruction,
                        responder,
                    });
                    Ok(())
                }
                Err(err) => {
                    error_log!("Navigation to '{}' failed: {}", url, err);
                    if app.router.fallback_route().as_deref() != Some(url.as_str()) {
                        app.restore_previous_location().await;
                    }
                    Err(err)
                }
            }
        }
        .boxed_local()
    }

    fn drain(&self) -> LocalBoxFuture<'static, Option<PipelineResult>> {
        let app = self.clone();
        async move {
            match app.dequeue_instruction(0).await {
                Ok(result) => result,
                Err(err) => {
                    error_log!("Navigation queue failed: {}", err);
                    Some(PipelineResult::new(PipelineStatus::Rejected, StepOutput::Error(err)))
                }
            }
        }
        .boxed_local()
    }

    /// Take the newest queued request and run it.
    ///
    /// `instruction_count` is 0 for a top-level request and grows with each
    /// follow-up navigation of the same chain. Resolves with `None` when the
    /// queue is empty or another top-level request is running.
    pub fn dequeue_instruction(
        &self,
        instruction_count: usize,
    ) -> LocalBoxFuture<'static, Result<Option<PipelineResult>, RouterError>> {
        let app = self.clone();
        async move {
            if app.app.navigating.get() && instruction_count == 0 {
                return Ok(None);
            }

            let Some(entry) = app.take_newest() else {
                return Ok(None);
            };
            let QueuedNavigation {
                instruction,
                responder,
            } = entry;

            let max = app.app.max_instruction_count.get();
            if instruction_count > max {
                let err = RouterError::MaxNavigationAttemptsExceeded;
                if let Some(responder) = responder {
                    let _ = responder.send(PipelineResult::new(
                        PipelineStatus::Rejected,
                        StepOutput::Error(err.clone()),
                    ));
                }
                return Err(err);
            }

            app.app.navigating.set(true);
            let classification = app.next_classification();
            app.app.classification.set(classification);
            instruction.set_previous_instruction(app.router.current_instruction());

            if instruction_count == 0 {
                app.publish(RouterEvent::Processing, &instruction, None);
            } else if instruction_count + 1 == max {
                error_log!(
                    "{} navigation instructions have been attempted without success. Restoring last known good location.",
                    instruction_count + 1
                );
                app.restore_previous_location().await;
                let result = match app.dequeue_instruction(instruction_count + 1).await {
                    Ok(Some(result)) => result,
                    Ok(None) => PipelineResult::new(
                        PipelineStatus::Canceled,
                        StepOutput::Error(RouterError::MaxNavigationAttemptsExceeded),
                    ),
                    Err(err) => PipelineResult::new(PipelineStatus::Rejected, StepOutput::Error(err)),
                };
                app.resolve_instruction(&instruction, result.clone(), instruction_count, responder);
                return Ok(Some(result));
            }

            let pipeline = app
                .app
                .provider
                .create_pipeline(!app.router.could_deactivate());
            let result = pipeline.run(Rc::clone(&instruction)).await;
            debug_log!(
                "Pipeline for '{}' finished as {}",
                instruction.fragment(),
                result.status.as_str()
            );

            let result = match app.process_result(result, instruction_count).await {
                Ok(result) => result,
                Err(err) => PipelineResult::new(PipelineStatus::Rejected, StepOutput::Error(err)),
            };
            app.resolve_instruction(&instruction, result.clone(), instruction_count, responder);
            Ok(Some(result))
        }
        .boxed_local()
    }

    fn take_newest(&self) -> Option<QueuedNavigation> {
        let mut queue = self.app.queue.borrow_mut();
        let newest = queue.pop()?;
        for superseded in queue.drain(..) {
            debug_log!(
                "Navigation to '{}' superseded",
                superseded.instruction.fragment()
            );
            if let Some(responder) = superseded.responder {
                let _ = responder.send(PipelineResult::superseded());
            }
        }
        Some(newest)
    }

    /// Read and advance the navigation tracker.
    fn next_classification(&self) -> NavigationClassification {
        let history = self.router.history();
        let stored = history
            .get_state(NAVIGATION_TRACKER_KEY)
            .and_then(|value| value.parse::<u64>().ok());
        let current = self.app.current_tracker.get();
        let (explicit, explicit_back) = self.router.explicit_navigation();
        let classification = classify(stored, current, explicit, explicit_back);

        let tracker = stored.unwrap_or_else(|| {
            let tracker = now_millis().max(self.app.last_tracker.get() + 1);
            history.set_state(NAVIGATION_TRACKER_KEY, tracker.to_string());
            tracker
        });
        self.app.last_tracker.set(self.app.last_tracker.get().max(tracker));
        self.app.current_tracker.set(Some(tracker));

        trace_log!("Navigation classified as {:?}", classification);
        classification
    }

    /// Follow a command or recover from a failure, then drain the rest of the
    /// chain.
    async fn process_result(
        &self,
        result: PipelineResult,
        instruction_count: usize,
    ) -> Result<PipelineResult, RouterError> {
        let mut final_result = None;
        let mut command_error = None;

        if let Some(command) = result.output.as_command().cloned() {
            trace_log!("Following navigation command {:?}", command);
            if let Err(err) = command.navigate(&self.router).await {
                command_error = Some(err);
            }
        } else {
            if !result.completed {
                if let Some(err) = result.output.as_error() {
                    error_log!("{}", err);
                }
                self.restore_previous_location().await;
            }
            final_result = Some(result.clone());
        }

        let inner = self.dequeue_instruction(instruction_count + 1).await?;
        if let Some(err) = command_error {
            return Err(err);
        }
        Ok(final_result.or(inner).unwrap_or(result))
    }

    fn resolve_instruction(
        &self,
        instruction: &Rc<NavigationInstruction>,
        result: PipelineResult,
        instruction_count: usize,
        responder: Option<oneshot::Sender<PipelineResult>>,
    ) {
        if instruction_count == 0 {
            let event = if result.output.is_error() {
                RouterEvent::Error
            } else if !result.completed {
                RouterEvent::Canceled
            } else {
                let mut location = instruction.fragment();
                if !instruction.query_string().is_empty() {
                    location.push('?');
                    location.push_str(instruction.query_string());
                }
                self.router.history().set_previous_location(Some(location));
                RouterEvent::Success
            };

            self.publish(event, instruction, Some(result.clone()));
            self.publish(RouterEvent::Complete, instruction, Some(result.clone()));

            self.app.navigating.set(false);
            self.app.classification.set(NavigationClassification::default());
            self.router.clear_explicit_navigation();
            self.router.set_could_deactivate(false);
        } else {
            self.publish(RouterEvent::ChildComplete, instruction, Some(result.clone()));
        }

        if let Some(responder) = responder {
            let _ = responder.send(result);
        }
    }

    fn publish(
        &self,
        event: RouterEvent,
        instruction: &Rc<NavigationInstruction>,
        result: Option<PipelineResult>,
    ) {
        let payload = NavigationEvent {
            instruction: Rc::clone(instruction),
            result,
            classification: self.app.classification.get(),
        };
        self.app.events.publish(event, &payload);
    }

    /// Go back to the last location a navigation succeeded at, or to the
    /// fallback route.
    async fn restore_previous_location(&self) {
        let history = self.router.history();
        let restore = if let Some(previous) = history.previous_location() {
            self.router
                .navigate(&previous, NavigationOptions::default().trigger(false).replace(true))
                .await
        } else if let Some(fallback) = self.router.fallback_route() {
            self.router
                .navigate(&fallback, NavigationOptions::default().replace(true))
                .await
        } else {
            error_log!("Router navigation failed, and no previous location or fallbackRoute could be restored.");
            return;
        };

        if let Err(err) = restore {
            warn_log!("Restoring the previous location failed: {}", err);
        }
    }
}

impl Deref for AppRouter {
    type Target = Router;

    fn deref(&self) -> &Self::Target {
        &self.router
    }
}

impl fmt::Debug for AppRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRouter")
            .field("router", &self.router)
            .field("provider", &self.app.provider)
            .field("queued", &self.app.queue.borrow().len())
            .field("navigating", &self.app.navigating.get())
            .field("max_instruction_count", &self.app.max_instruction_count.get())
            .finish_non_exhaustive()
    }
}
