use crate::guard::ScopeId;
use crate::timeline::TimelineId;
use crate::trigger::{TriggerEventKind, TriggerHandle};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    TriggerFired { trigger: TriggerHandle, label: String, kind: TriggerEventKind },
    TimelineCompleted { timeline: TimelineId },
    TimelineReversed { timeline: TimelineId },
    SceneStopped { reason: SceneStopReason },
    ScopeDisposed { scope: ScopeId, triggers: usize, timelines: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneStopReason {
    Unmounted,
    SurfaceLost(String),
}

impl StageEvent {
    pub fn trigger_fired(trigger: TriggerHandle, label: &str, kind: TriggerEventKind) -> Self {
        StageEvent::TriggerFired { trigger, label: label.to_string(), kind }
    }

    pub fn is_trigger(&self, label: &str, kind: TriggerEventKind) -> bool {
        matches!(self, StageEvent::TriggerFired { label: fired, kind: k, .. } if fired == label && *k == kind)
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageEvent::TriggerFired { trigger, label, kind } => {
                write!(f, "TriggerFired {trigger} label={label} event={}", kind.label())
            }
            StageEvent::TimelineCompleted { timeline } => write!(f, "TimelineCompleted {timeline}"),
            StageEvent::TimelineReversed { timeline } => write!(f, "TimelineReversed {timeline}"),
            StageEvent::SceneStopped { reason: SceneStopReason::Unmounted } => {
                write!(f, "SceneStopped reason=unmounted")
            }
            StageEvent::SceneStopped { reason: SceneStopReason::SurfaceLost(detail) } => {
                write!(f, "SceneStopped reason=surface-lost ({detail})")
            }
            StageEvent::ScopeDisposed { scope, triggers, timelines } => {
                write!(f, "ScopeDisposed {scope} triggers={triggers} timelines={timelines}")
            }
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<StageEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<StageEvent> {
        self.events.drain(..).collect()
    }
}
