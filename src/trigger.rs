//! Viewport triggers.
//!
//! Each trigger watches one node's document rectangle against the scroll
//! position. Its state is a pure function of the scroll offset, so transitions
//! are derived by comparing the previous and current state rather than by
//! spotting threshold crossings between samples: a jump that skips the whole
//! range still reports both edges, in order.

use crate::nodes::{NodeId, NodeStore, PropValue, Property, Rect};
use crate::timeline::{TimelineId, ToggleAction, ToggleActions, TweenSpec};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::str::FromStr;

/// Scroll position and viewport size, both in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    pub offset: f32,
    pub viewport_height: f32,
}

impl ScrollState {
    pub fn new(offset: f32, viewport_height: f32) -> Self {
        Self { offset, viewport_height: viewport_height.max(0.0) }
    }
}

impl Default for ScrollState {
    fn default() -> Self {
        Self { offset: 0.0, viewport_height: 800.0 }
    }
}

/// Range of scroll offsets over which a trigger is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRange {
    pub start: f32,
    pub end: f32,
}

impl ScrollRange {
    /// An end before the start collapses onto the start.
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn resolve(rect: Rect, start: Threshold, end: Threshold, viewport_height: f32) -> Self {
        Self::new(start.offset_for(rect, viewport_height), end.offset_for(rect, viewport_height))
    }

    pub fn state_at(&self, offset: f32) -> TriggerState {
        if offset < self.start {
            TriggerState::Before
        } else if offset > self.end {
            TriggerState::After
        } else {
            TriggerState::Active
        }
    }

    /// Clamped linear progress through the range.
    pub fn progress(&self, offset: f32) -> f32 {
        let span = self.end - self.start;
        if span <= 0.0 {
            return if offset >= self.end { 1.0 } else { 0.0 };
        }
        let progress = (offset - self.start) / span;
        if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        }
    }
}

/// `"<element-anchor> <viewport-anchor>"`, e.g. `"top 80%"`: the trigger
/// edge is reached when the element's anchor line meets the viewport's.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Threshold {
    /// Fraction of the element's height, 0 = top, 1 = bottom.
    pub element: f32,
    /// Fraction of the viewport's height, 0 = top, 1 = bottom.
    pub viewport: f32,
}

impl Threshold {
    pub const TOP_BOTTOM: Threshold = Threshold { element: 0.0, viewport: 1.0 };
    pub const BOTTOM_TOP: Threshold = Threshold { element: 1.0, viewport: 0.0 };
    pub const TOP_TOP: Threshold = Threshold { element: 0.0, viewport: 0.0 };

    pub fn new(element: f32, viewport: f32) -> Self {
        Self { element, viewport }
    }

    pub fn offset_for(&self, rect: Rect, viewport_height: f32) -> f32 {
        rect.top + self.element * rect.height - self.viewport * viewport_height
    }
}

fn parse_anchor(word: &str) -> Result<f32> {
    match word {
        "top" => Ok(0.0),
        "center" => Ok(0.5),
        "bottom" => Ok(1.0),
        _ => {
            let Some(percent) = word.strip_suffix('%') else {
                bail!("Anchor '{word}' must be top, center, bottom or a percentage");
            };
            let value: f32 = percent.parse().with_context(|| format!("Parsing anchor percentage '{word}'"))?;
            if !value.is_finite() {
                bail!("Anchor percentage '{word}' must be finite");
            }
            Ok(value / 100.0)
        }
    }
}

impl FromStr for Threshold {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut words = value.split_whitespace();
        let (Some(element), Some(viewport), None) = (words.next(), words.next(), words.next()) else {
            bail!("Threshold '{value}' must be '<element-anchor> <viewport-anchor>'");
        };
        Ok(Self { element: parse_anchor(element)?, viewport: parse_anchor(viewport)? })
    }
}

impl TryFrom<String> for Threshold {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerState {
    Before,
    Active,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEventKind {
    Enter,
    Leave,
    EnterBack,
    LeaveBack,
}

impl TriggerEventKind {
    pub fn label(self) -> &'static str {
        match self {
            TriggerEventKind::Enter => "onEnter",
            TriggerEventKind::Leave => "onLeave",
            TriggerEventKind::EnterBack => "onEnterBack",
            TriggerEventKind::LeaveBack => "onLeaveBack",
        }
    }
}

pub type TransitionBatch = SmallVec<[TriggerEventKind; 2]>;

/// Events produced by moving from one state to another, in firing order.
pub fn transition(from: TriggerState, to: TriggerState) -> TransitionBatch {
    use TriggerEventKind::*;
    use TriggerState::*;
    match (from, to) {
        (Before, Active) => smallvec![Enter],
        (Before, After) => smallvec![Enter, Leave],
        (Active, After) => smallvec![Leave],
        (Active, Before) => smallvec![LeaveBack],
        (After, Active) => smallvec![EnterBack],
        (After, Before) => smallvec![EnterBack, LeaveBack],
        _ => SmallVec::new(),
    }
}

/// Reaction run when a trigger edge fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Timeline(TimelineId, ToggleAction),
    /// Fire-and-forget tween from the current values. A newer tween from the
    /// same trigger replaces any still-running one on the same properties.
    Tween(TweenSpec),
    Set(NodeId, Property, PropValue),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerCallbacks {
    pub on_enter: Vec<Reaction>,
    pub on_leave: Vec<Reaction>,
    pub on_enter_back: Vec<Reaction>,
    pub on_leave_back: Vec<Reaction>,
}

impl TriggerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a play-mode timeline with one toggle action per edge.
    pub fn toggle(timeline: TimelineId, actions: ToggleActions) -> Self {
        let mut callbacks = Self::default();
        callbacks.add_toggle(timeline, actions);
        callbacks
    }

    pub fn add_toggle(&mut self, timeline: TimelineId, actions: ToggleActions) {
        let pairs = [
            (TriggerEventKind::Enter, actions.on_enter),
            (TriggerEventKind::Leave, actions.on_leave),
            (TriggerEventKind::EnterBack, actions.on_enter_back),
            (TriggerEventKind::LeaveBack, actions.on_leave_back),
        ];
        for (kind, action) in pairs {
            if action != ToggleAction::None {
                self.slot_mut(kind).push(Reaction::Timeline(timeline, action));
            }
        }
    }

    pub fn on(mut self, kind: TriggerEventKind, reaction: Reaction) -> Self {
        self.slot_mut(kind).push(reaction);
        self
    }

    pub fn slot(&self, kind: TriggerEventKind) -> &[Reaction] {
        match kind {
            TriggerEventKind::Enter => &self.on_enter,
            TriggerEventKind::Leave => &self.on_leave,
            TriggerEventKind::EnterBack => &self.on_enter_back,
            TriggerEventKind::LeaveBack => &self.on_leave_back,
        }
    }

    fn slot_mut(&mut self, kind: TriggerEventKind) -> &mut Vec<Reaction> {
        match kind {
            TriggerEventKind::Enter => &mut self.on_enter,
            TriggerEventKind::Leave => &mut self.on_leave,
            TriggerEventKind::EnterBack => &mut self.on_enter_back,
            TriggerEventKind::LeaveBack => &mut self.on_leave_back,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_enter.is_empty()
            && self.on_leave.is_empty()
            && self.on_enter_back.is_empty()
            && self.on_leave_back.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerHandle(u64);

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSpec {
    pub label: String,
    pub node: NodeId,
    pub start: Threshold,
    pub end: Threshold,
}

impl TriggerSpec {
    pub fn new(label: impl Into<String>, node: NodeId) -> Self {
        Self { label: label.into(), node, start: Threshold::TOP_BOTTOM, end: Threshold::BOTTOM_TOP }
    }

    pub fn start(mut self, threshold: Threshold) -> Self {
        self.start = threshold;
        self
    }

    pub fn end(mut self, threshold: Threshold) -> Self {
        self.end = threshold;
        self
    }

    fn same_watch(&self, other: &TriggerSpec) -> bool {
        self.label == other.label && self.node == other.node && self.start == other.start && self.end == other.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredEvent {
    pub trigger: TriggerHandle,
    pub kind: TriggerEventKind,
}

pub type FiredBatch = SmallVec<[FiredEvent; 4]>;

#[derive(Debug)]
struct TriggerEntry {
    handle: TriggerHandle,
    spec: TriggerSpec,
    range: ScrollRange,
    state: TriggerState,
    callbacks: TriggerCallbacks,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub handle: TriggerHandle,
    /// Handle of an earlier identical registration this one replaced.
    pub superseded: Option<TriggerHandle>,
    /// Events owed for the scroll position at registration time.
    pub initial: FiredBatch,
}

/// Live triggers in registration order.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    entries: Vec<TriggerEntry>,
    next_handle: u64,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trigger against the node's current layout.
    ///
    /// A trigger whose range is already active (or already passed) owes its
    /// entry events immediately; they are returned in `initial` for the
    /// caller to dispatch. Registering the same label, node and thresholds again
    /// replaces the earlier registration and inherits its state silently.
    /// Returns `None` when the node is missing or not laid out yet.
    pub fn register(
        &mut self,
        nodes: &NodeStore,
        scroll: ScrollState,
        spec: TriggerSpec,
        callbacks: TriggerCallbacks,
    ) -> Option<Registration> {
        let Some(rect) = nodes.layout(spec.node) else {
            log::debug!("trigger '{}' not registered: node {} is not ready", spec.label, spec.node);
            return None;
        };
        let range = ScrollRange::resolve(rect, spec.start, spec.end, scroll.viewport_height);
        let handle = TriggerHandle(self.next_handle);
        self.next_handle += 1;

        let previous = self.entries.iter().position(|entry| entry.spec.same_watch(&spec));
        let (state, superseded, initial) = match previous {
            Some(index) => {
                let old = self.entries.remove(index);
                log::debug!("trigger '{}' supersedes {}", spec.label, old.handle);
                let state = range.state_at(scroll.offset);
                let owed = transition(old.state, state);
                let initial = owed.into_iter().map(|kind| FiredEvent { trigger: handle, kind }).collect();
                (state, Some(old.handle), initial)
            }
            None => {
                let state = range.state_at(scroll.offset);
                let initial = transition(TriggerState::Before, state)
                    .into_iter()
                    .map(|kind| FiredEvent { trigger: handle, kind })
                    .collect();
                (state, None, initial)
            }
        };
        self.entries.push(TriggerEntry { handle, spec, range, state, callbacks });
        Some(Registration { handle, superseded, initial })
    }

    /// Removes a trigger. Unknown or already removed handles return false.
    pub fn unregister(&mut self, handle: TriggerHandle) -> bool {
        match self.entries.iter().position(|entry| entry.handle == handle) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, handle: TriggerHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, handle: TriggerHandle) -> Option<TriggerState> {
        self.find(handle).map(|entry| entry.state)
    }

    pub fn range(&self, handle: TriggerHandle) -> Option<ScrollRange> {
        self.find(handle).map(|entry| entry.range)
    }

    pub fn spec(&self, handle: TriggerHandle) -> Option<&TriggerSpec> {
        self.find(handle).map(|entry| &entry.spec)
    }

    pub fn callbacks(&self, handle: TriggerHandle) -> Option<&TriggerCallbacks> {
        self.find(handle).map(|entry| &entry.callbacks)
    }

    pub fn callbacks_mut(&mut self, handle: TriggerHandle) -> Option<&mut TriggerCallbacks> {
        self.entries.iter_mut().find(|entry| entry.handle == handle).map(|entry| &mut entry.callbacks)
    }

    fn find(&self, handle: TriggerHandle) -> Option<&TriggerEntry> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    /// Samples every trigger against the scroll position. Events come out
    /// grouped per trigger in registration order.
    pub fn sample(&mut self, scroll: ScrollState) -> FiredBatch {
        let mut fired = FiredBatch::new();
        for entry in &mut self.entries {
            let next = entry.range.state_at(scroll.offset);
            if next == entry.state {
                continue;
            }
            for kind in transition(entry.state, next) {
                fired.push(FiredEvent { trigger: entry.handle, kind });
            }
            entry.state = next;
        }
        fired
    }

    /// Re-resolves ranges after layout or viewport changes and fires whatever
    /// the new ranges imply for the current scroll position. Triggers whose
    /// node has gone away keep their last range.
    pub fn refresh(&mut self, nodes: &NodeStore, scroll: ScrollState) -> FiredBatch {
        for entry in &mut self.entries {
            match nodes.layout(entry.spec.node) {
                Some(rect) => {
                    entry.range = ScrollRange::resolve(rect, entry.spec.start, entry.spec.end, scroll.viewport_height);
                }
                None => log::debug!("trigger '{}' kept its range: node {} is gone", entry.spec.label, entry.spec.node),
            }
        }
        self.sample(scroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laid_out(nodes: &mut NodeStore, top: f32, height: f32) -> NodeId {
        let node = nodes.spawn("section");
        nodes.set_layout(node, Rect::new(top, height));
        node
    }

    fn kinds(batch: &FiredBatch) -> Vec<TriggerEventKind> {
        batch.iter().map(|event| event.kind).collect()
    }

    #[test]
    fn parses_thresholds() {
        assert_eq!("top 80%".parse::<Threshold>().unwrap(), Threshold::new(0.0, 0.8));
        assert_eq!("bottom top".parse::<Threshold>().unwrap(), Threshold::BOTTOM_TOP);
        assert_eq!("40% top".parse::<Threshold>().unwrap(), Threshold::new(0.4, 0.0));
        assert_eq!("center center".parse::<Threshold>().unwrap(), Threshold::new(0.5, 0.5));
        assert!("top".parse::<Threshold>().is_err());
        assert!("top 80% extra".parse::<Threshold>().is_err());
        assert!("middle 80%".parse::<Threshold>().is_err());
        assert!("top abc%".parse::<Threshold>().is_err());
    }

    #[test]
    fn resolves_offsets_against_the_viewport() {
        let rect = Rect::new(2000.0, 600.0);
        let range = ScrollRange::resolve(rect, "top 80%".parse().unwrap(), Threshold::BOTTOM_TOP, 1000.0);
        assert_eq!(range, ScrollRange::new(1200.0, 2600.0));
        assert_eq!(range.progress(1900.0), 0.5);
        assert_eq!(range.progress(-10.0), 0.0);
        assert_eq!(range.progress(1e9), 1.0);
    }

    #[test]
    fn already_active_registration_fires_enter_once() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 1500.0, 400.0);
        let mut registry = TriggerRegistry::new();
        // Element top sits at 50% of a 1000px viewport, past the 80% line.
        let scroll = ScrollState::new(1000.0, 1000.0);
        let spec = TriggerSpec::new("card", node).start("top 80%".parse().unwrap());
        let registration = registry.register(&nodes, scroll, spec, TriggerCallbacks::new()).unwrap();
        assert_eq!(kinds(&registration.initial), vec![TriggerEventKind::Enter]);
        assert!(registry.sample(scroll).is_empty());
    }

    #[test]
    fn passed_registration_fires_enter_then_leave() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 100.0, 100.0);
        let mut registry = TriggerRegistry::new();
        let registration = registry
            .register(&nodes, ScrollState::new(5000.0, 800.0), TriggerSpec::new("hero", node), TriggerCallbacks::new())
            .unwrap();
        assert_eq!(kinds(&registration.initial), vec![TriggerEventKind::Enter, TriggerEventKind::Leave]);
    }

    #[test]
    fn jumps_report_both_edges_in_order() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 2000.0, 200.0);
        let mut registry = TriggerRegistry::new();
        let handle = registry
            .register(&nodes, ScrollState::new(0.0, 800.0), TriggerSpec::new("card", node), TriggerCallbacks::new())
            .unwrap()
            .handle;

        let forward = registry.sample(ScrollState::new(10_000.0, 800.0));
        assert_eq!(kinds(&forward), vec![TriggerEventKind::Enter, TriggerEventKind::Leave]);
        assert_eq!(registry.state(handle), Some(TriggerState::After));

        let back = registry.sample(ScrollState::new(0.0, 800.0));
        assert_eq!(kinds(&back), vec![TriggerEventKind::EnterBack, TriggerEventKind::LeaveBack]);
    }

    #[test]
    fn gradual_scroll_walks_every_edge() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 1000.0, 300.0);
        let mut registry = TriggerRegistry::new();
        registry
            .register(&nodes, ScrollState::new(0.0, 800.0), TriggerSpec::new("card", node), TriggerCallbacks::new())
            .unwrap();
        let mut seen = Vec::new();
        for step in (0..=1600).chain((0..=1600).rev()) {
            seen.extend(kinds(&registry.sample(ScrollState::new(step as f32, 800.0))));
        }
        assert_eq!(
            seen,
            vec![
                TriggerEventKind::Enter,
                TriggerEventKind::Leave,
                TriggerEventKind::EnterBack,
                TriggerEventKind::LeaveBack
            ]
        );
    }

    #[test]
    fn unready_nodes_are_rejected() {
        let mut nodes = NodeStore::new();
        let node = nodes.spawn("not laid out");
        let mut registry = TriggerRegistry::new();
        let spec = TriggerSpec::new("card", node);
        assert!(registry.register(&nodes, ScrollState::default(), spec, TriggerCallbacks::new()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregistered_triggers_never_fire() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 1000.0, 300.0);
        let mut registry = TriggerRegistry::new();
        let handle = registry
            .register(&nodes, ScrollState::new(0.0, 800.0), TriggerSpec::new("card", node), TriggerCallbacks::new())
            .unwrap()
            .handle;
        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        assert!(registry.sample(ScrollState::new(1100.0, 800.0)).is_empty());
    }

    #[test]
    fn identical_registration_supersedes_without_refiring() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 500.0, 300.0);
        let mut registry = TriggerRegistry::new();
        let scroll = ScrollState::new(400.0, 800.0);
        let first = registry.register(&nodes, scroll, TriggerSpec::new("a", node), TriggerCallbacks::new()).unwrap();
        assert_eq!(kinds(&first.initial), vec![TriggerEventKind::Enter]);
        let second = registry.register(&nodes, scroll, TriggerSpec::new("a", node), TriggerCallbacks::new()).unwrap();
        assert_eq!(second.superseded, Some(first.handle));
        assert!(second.initial.is_empty());
        assert!(!registry.contains(first.handle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn differently_labelled_watchers_share_a_node() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 500.0, 300.0);
        let mut registry = TriggerRegistry::new();
        let scroll = ScrollState::new(0.0, 800.0);
        let header = registry.register(&nodes, scroll, TriggerSpec::new("header", node), TriggerCallbacks::new()).unwrap();
        let heading = registry.register(&nodes, scroll, TriggerSpec::new("heading", node), TriggerCallbacks::new()).unwrap();
        assert_eq!(heading.superseded, None);
        assert_eq!(kinds(&heading.initial), vec![TriggerEventKind::Enter]);
        assert!(registry.contains(header.handle));
        assert_eq!(registry.len(), 2);
        let fired = registry.sample(ScrollState::new(2500.0, 800.0));
        assert!(fired.iter().any(|event| event.trigger == header.handle && event.kind == TriggerEventKind::Leave));
        assert!(fired.iter().any(|event| event.trigger == heading.handle && event.kind == TriggerEventKind::Leave));
    }

    #[test]
    fn refresh_follows_layout_changes() {
        let mut nodes = NodeStore::new();
        let node = laid_out(&mut nodes, 3000.0, 300.0);
        let mut registry = TriggerRegistry::new();
        let scroll = ScrollState::new(500.0, 800.0);
        registry.register(&nodes, scroll, TriggerSpec::new("card", node), TriggerCallbacks::new()).unwrap();
        nodes.set_layout(node, Rect::new(900.0, 300.0));
        assert_eq!(kinds(&registry.refresh(&nodes, scroll)), vec![TriggerEventKind::Enter]);
    }

    #[test]
    fn toggle_callbacks_skip_none_slots() {
        let mut choreo = crate::timeline::Choreographer::new();
        let mut nodes = NodeStore::new();
        let id = choreo.build_play(&[], &crate::timeline::PlayOptions::paused(), &mut nodes);
        let callbacks = TriggerCallbacks::toggle(id, ToggleActions::REVEAL);
        assert_eq!(callbacks.slot(TriggerEventKind::Enter), &[Reaction::Timeline(id, ToggleAction::Play)]);
        assert!(callbacks.slot(TriggerEventKind::Leave).is_empty());
        assert_eq!(callbacks.slot(TriggerEventKind::LeaveBack), &[Reaction::Timeline(id, ToggleAction::Reverse)]);
    }
}
