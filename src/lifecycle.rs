//! Routed component capabilities.
//!
//! A component placed in a viewport by the router is a [`RouteLifecycle`]
//! implementation. Every hook is optional: the default returns `None`, which
//! the router reads as "this component does not have that capability" and
//! skips it.
//!
//! Hooks that take part in the pipeline return a [`Potential`]: a value that
//! is either already known, a future, or a stream whose first item decides.
//! The outcome is a [`StepOutput`]:
//!
//! | Output                 | Meaning for `can_*` hooks           |
//! |------------------------|-------------------------------------|
//! | `Empty`                | continue                            |
//! | `Bool(true)`           | continue                            |
//! | `Bool(false)`          | cancel the navigation               |
//! | `Error(_)`             | cancel the navigation               |
//! | `Command(_)`           | cancel unless the command continues, then run it |
//!
//! # Navigation pipeline
//!
//! For one navigation, hooks run in this order:
//!
//! 1. `can_deactivate` on outgoing components, innermost first
//! 2. components for replaced viewports are loaded (and `configure_router`
//!    runs for those hosting a child router)
//! 3. `can_activate` on incoming components, outermost first
//! 4. `deactivate` on outgoing components, innermost first
//! 5. `activate` on incoming components, outermost first
//!
//! # Example
//!
//! ```
//! use navigator_pipeline::{LifecycleArgs, Potential, RouteLifecycle};
//!
//! struct Editor {
//!     dirty: bool,
//! }
//!
//! impl RouteLifecycle for Editor {
//!     fn can_deactivate(
//!         &self,
//!         _instruction: &std::rc::Rc<navigator_pipeline::NavigationInstruction>,
//!     ) -> Option<Potential> {
//!         Some(Potential::from(!self.dirty))
//!     }
//!
//!     fn activate(&self, args: &LifecycleArgs) -> Option<Potential> {
//!         let _id = args.params.get("id");
//!         None
//!     }
//! }
//! ```

use crate::commands::NavigationCommand;
use crate::configuration::RouterConfiguration;
use crate::error::RouterError;
use crate::instruction::{LifecycleArgs, NavigationInstruction};
use crate::pipeline::StepOutput;
use crate::route::ActivationStrategy;
use crate::router::Router;
use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use futures::{FutureExt, StreamExt};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

// ============================================================================
// Potential
// ============================================================================

/// A hook result that may not be known yet.
pub enum Potential {
    Ready(StepOutput),
    Future(LocalBoxFuture<'static, Result<StepOutput, RouterError>>),
    /// Settles on the first item, or as `Empty` if the stream ends first.
    Stream(LocalBoxStream<'static, Result<StepOutput, RouterError>>),
}

impl Potential {
    pub fn ready(output: impl Into<StepOutput>) -> Self {
        Self::Ready(output.into())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<StepOutput, RouterError>> + 'static,
    {
        Self::Future(future.boxed_local())
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<StepOutput, RouterError>> + 'static,
    {
        Self::Stream(stream.boxed_local())
    }

    /// Wait for the hook's verdict.
    ///
    /// A failed future or stream comes back as `StepOutput::Error`; the
    /// caller decides whether that cancels anything.
    pub async fn settle(self) -> StepOutput {
        let settled = match self {
            Self::Ready(output) => Ok(output),
            Self::Future(future) => future.await,
            Self::Stream(mut stream) => stream.next().await.unwrap_or(Ok(StepOutput::Empty)),
        };
        settled.unwrap_or_else(StepOutput::Error)
    }
}

impl From<bool> for Potential {
    fn from(value: bool) -> Self {
        Self::Ready(StepOutput::Bool(value))
    }
}

impl From<StepOutput> for Potential {
    fn from(output: StepOutput) -> Self {
        Self::Ready(output)
    }
}

impl From<Rc<dyn NavigationCommand>> for Potential {
    fn from(command: Rc<dyn NavigationCommand>) -> Self {
        Self::Ready(StepOutput::Command(command))
    }
}

impl fmt::Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(output) => f.debug_tuple("Ready").field(output).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ============================================================================
// RouteLifecycle
// ============================================================================

/// The view-model contract of a routed component.
pub trait RouteLifecycle {
    /// May the component be navigated away from?
    fn can_deactivate(&self, _instruction: &Rc<NavigationInstruction>) -> Option<Potential> {
        None
    }

    /// The component is being navigated away from. The result is awaited;
    /// only an error cancels.
    fn deactivate(&self, _instruction: &Rc<NavigationInstruction>) -> Option<Potential> {
        None
    }

    /// May the component be navigated to with these params?
    fn can_activate(&self, _args: &LifecycleArgs) -> Option<Potential> {
        None
    }

    /// The component is being navigated to. Awaited; only an error cancels.
    fn activate(&self, _args: &LifecycleArgs) -> Option<Potential> {
        None
    }

    /// Override the activation strategy picked for this component's viewport
    /// when the navigation keeps the same module.
    fn determine_activation_strategy(&self, _args: &LifecycleArgs) -> Option<ActivationStrategy> {
        None
    }

    /// Configure the child router this component hosts.
    ///
    /// Returning `None` means the component hosts no child router.
    fn configure_router(
        &self,
        _config: &mut RouterConfiguration,
        _router: &Router,
        _args: &LifecycleArgs,
    ) -> Option<Result<(), RouterError>> {
        None
    }
}
