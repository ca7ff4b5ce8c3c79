//! # navigator-pipeline
//!
//! Navigation resolution and an async lifecycle pipeline for nested routers.
//!
//! A URL fragment is resolved into a tree of [`NavigationInstruction`]s, one
//! per router level. Each level is compared with what is currently rendered
//! to plan, per viewport, whether the component is replaced, re-lifecycled or
//! left alone. The tree then runs through an ordered, cancellable pipeline:
//!
//! ```text
//! build-plan -> can-deactivate -> load-route -> [authorize] -> can-activate
//!   -> [preActivate] -> deactivate -> activate -> [preRender] -> commit
//!   -> [postRender]
//! ```
//!
//! The [`AppRouter`] at the root serializes navigation requests, follows
//! redirects and navigation commands, bounds redirect chains and restores the
//! previous location when a navigation fails.
//!
//! # Quick start
//!
//! ```no_run
//! use navigator_pipeline::{
//!     AppRouter, MemoryHistory, NavigationInstruction, RouteConfig, RouteLifecycle, RouteLoader,
//!     Router, RouterError, ViewPortConfig,
//! };
//! use std::rc::Rc;
//!
//! struct Page;
//! impl RouteLifecycle for Page {}
//!
//! struct Loader;
//!
//! #[async_trait::async_trait(?Send)]
//! impl RouteLoader for Loader {
//!     async fn load_route(
//!         &self,
//!         _router: &Router,
//!         _config: &ViewPortConfig,
//!         _instruction: &Rc<NavigationInstruction>,
//!     ) -> Result<Rc<dyn RouteLifecycle>, RouterError> {
//!         Ok(Rc::new(Page))
//!     }
//! }
//!
//! let app = AppRouter::new(Rc::new(MemoryHistory::new()), Rc::new(Loader));
//! app.configure(|config| {
//!     config
//!         .title("Shop")
//!         .map(RouteConfig::new("").name("home").module_id("home").nav(true))
//!         .map(RouteConfig::new("products/:id").name("product").module_id("product"))
//!         .map_unknown_routes("not-found");
//!     Ok(())
//! })
//! .unwrap();
//! ```
//!
//! Everything is single-threaded: handles are `Rc`-based and futures are
//! `LocalBoxFuture`s, so drive them with a local executor.
//!
//! # Features
//!
//! - `log` (default): diagnostics through the `log` crate.
//! - `tracing`: diagnostics through `tracing` instead.
//! - `cache` (default): LRU cache in front of route recognition.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod logging;

pub mod activation;
pub mod app_router;
#[cfg(feature = "cache")]
pub mod cache;
pub mod commands;
pub mod configuration;
pub mod error;
pub mod events;
pub mod history;
pub mod instruction;
pub mod lifecycle;
pub mod loader;
pub mod params;
pub mod pipeline;
pub mod plan;
pub mod provider;
pub mod recognizer;
pub mod route;
pub mod router;
pub mod url;

pub use app_router::{AppRouter, NavigationClassification};
pub use commands::{NavigationCommand, Redirect, RedirectToRoute};
pub use configuration::{RouterConfiguration, RouterOptions, UnknownRouteHandler};
pub use error::RouterError;
pub use events::{EventSink, LogEventSink, NavigationEvent, RouterEvent};
pub use history::{History, MemoryHistory, NavigationOptions};
pub use instruction::{
    Component, InstructionInit, InstructionOptions, LifecycleArgs, NavigationInstruction,
    NavigationPlan, ViewPort, ViewPortInstruction, ViewPortPlan,
};
pub use lifecycle::{Potential, RouteLifecycle};
pub use loader::RouteLoader;
pub use params::{QueryParams, RouteParams};
pub use pipeline::{Next, Pipeline, PipelineResult, PipelineStatus, PipelineStep, StepOutput};
pub use plan::PlanOutcome;
pub use provider::{
    PipelineProvider, AUTHORIZE_SLOT, POST_RENDER_SLOT, PRE_ACTIVATE_SLOT, PRE_RENDER_SLOT,
};
pub use recognizer::{RouteRecognizer, RouteRef, SegmentRecognizer};
pub use route::{ActivationStrategy, NavModel, NavSetting, RouteConfig, ViewPortConfig};
pub use router::{GenerateOptions, Router, WeakRouter};
