//! Navigation lifecycle notifications.
//!
//! The app router publishes one [`RouterEvent`] when it starts processing a
//! top-level request, then one of `Success`, `Canceled` or `Error` followed
//! by `Complete` when it finishes. Requests drained as part of another
//! request's chain (redirects, navigation commands) publish `ChildComplete`
//! instead. Publishing is fire-and-forget.

use crate::app_router::NavigationClassification;
use crate::instruction::NavigationInstruction;
use crate::pipeline::PipelineResult;
use crate::{debug_log, info_log, trace_log, warn_log};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterEvent {
    Processing,
    Error,
    Canceled,
    Complete,
    Success,
    ChildComplete,
}

impl RouterEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "router:navigation:processing",
            Self::Error => "router:navigation:error",
            Self::Canceled => "router:navigation:canceled",
            Self::Complete => "router:navigation:complete",
            Self::Success => "router:navigation:success",
            Self::ChildComplete => "router:navigation:child:complete",
        }
    }
}

impl fmt::Display for RouterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of every event.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub instruction: Rc<NavigationInstruction>,
    /// `None` while the request is still processing.
    pub result: Option<PipelineResult>,
    pub classification: NavigationClassification,
}

/// Receives navigation events.
pub trait EventSink {
    fn publish(&self, event: RouterEvent, payload: &NavigationEvent);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: RouterEvent, payload: &NavigationEvent) {
        let fragment = payload.instruction.fragment();
        match event {
            RouterEvent::Error => warn_log!("{} '{}': {:?}", event, fragment, payload.result),
            RouterEvent::Success => info_log!("{} '{}'", event, fragment),
            RouterEvent::Canceled => debug_log!("{} '{}'", event, fragment),
            _ => trace_log!("{} '{}'", event, fragment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(RouterEvent::Processing.as_str(), "router:navigation:processing");
        assert_eq!(RouterEvent::ChildComplete.to_string(), "router:navigation:child:complete");
        assert_eq!(RouterEvent::Canceled.as_str(), "router:navigation:canceled");
    }
}
