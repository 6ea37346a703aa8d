//! The stage owns every registry and is the single entry point for the two
//! clocks: [`Stage::scroll_to`] for scroll samples and [`Stage::frame`] for
//! display refreshes.

use crate::config::StageConfig;
use crate::events::{EventBus, SceneStopReason, StageEvent};
use crate::guard::{Disposer, ScopeId, ScopeTable};
use crate::nodes::{NodeId, NodeStore, Property, Rect};
use crate::populate;
use crate::scene::{FrameScheduler, RenderSurface, SceneDriver};
use crate::timeline::{Choreographer, PlayOptions, Timeline, TimelineEvent, TimelineId, ToggleActions, TweenSpec};
use crate::trigger::{
    FiredBatch, Reaction, ScrollRange, ScrollState, Threshold, TriggerCallbacks, TriggerHandle, TriggerRegistry,
    TriggerSpec,
};
use anyhow::Result;
use glam::{UVec2, Vec2};

#[derive(Debug, Clone, Copy)]
struct ScrubBinding {
    timeline: TimelineId,
    node: NodeId,
    start: Threshold,
    end: Threshold,
}

#[derive(Debug, Clone, Copy)]
struct TransientTween {
    trigger: TriggerHandle,
    timeline: TimelineId,
}

pub struct Stage {
    config: StageConfig,
    nodes: NodeStore,
    triggers: TriggerRegistry,
    timelines: Choreographer,
    scopes: ScopeTable,
    events: EventBus,
    scroll: ScrollState,
    pointer: Vec2,
    scene: Option<SceneDriver>,
    scrub_bindings: Vec<ScrubBinding>,
    transient: Vec<TransientTween>,
}

impl Stage {
    pub fn new(config: StageConfig) -> Self {
        let scroll = ScrollState::new(0.0, config.viewport_height());
        Self {
            config,
            nodes: NodeStore::new(),
            triggers: TriggerRegistry::new(),
            timelines: Choreographer::new(),
            scopes: ScopeTable::new(),
            events: EventBus::default(),
            scroll,
            pointer: Vec2::ZERO,
            scene: None,
            scrub_bindings: Vec::new(),
            transient: Vec::new(),
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeStore {
        &mut self.nodes
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn timelines(&self) -> &Choreographer {
        &self.timelines
    }

    pub fn timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(id)
    }

    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    pub fn scroll(&self) -> ScrollState {
        self.scroll
    }

    pub fn scene(&self) -> Option<&SceneDriver> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut SceneDriver> {
        self.scene.as_mut()
    }

    /// Spawns a node that is laid out right away.
    pub fn add_node(&mut self, label: impl Into<String>, rect: Rect) -> NodeId {
        let node = self.nodes.spawn(label);
        self.nodes.set_layout(node, rect);
        node
    }

    pub fn add_child(&mut self, parent: NodeId, label: impl Into<String>, rect: Rect) -> NodeId {
        let node = self.nodes.spawn_child(parent, label);
        self.nodes.set_layout(node, rect);
        node
    }

    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        self.events.drain()
    }

    // ---------- clocks ----------

    /// Scroll clock. Fires trigger transitions, then re-renders scrub timelines.
    pub fn scroll_to(&mut self, offset: f32) {
        if !offset.is_finite() {
            log::debug!("ignoring non-finite scroll offset {offset}");
            return;
        }
        self.scroll.offset = offset;
        let fired = self.triggers.sample(self.scroll);
        self.dispatch(fired);
        self.timelines.scrub(offset, &mut self.nodes);
    }

    /// Display clock. Advances play timelines and ticks the scene.
    pub fn frame(&mut self, dt: f32) {
        for (timeline, event) in self.timelines.advance(dt, &mut self.nodes) {
            self.push_timeline_event(timeline, event);
        }
        if let Some(driver) = self.scene.as_mut() {
            let opacity = driver
                .layer_binding()
                .and_then(|node| self.nodes.number(node, Property::Opacity))
                .unwrap_or(1.0);
            if let Some(reason) = driver.tick(dt, opacity) {
                self.events.push(StageEvent::SceneStopped { reason });
            }
        }
    }

    pub fn set_pointer(&mut self, pointer: Vec2) {
        self.pointer = pointer;
        if let Some(driver) = self.scene.as_mut() {
            driver.set_pointer(pointer);
        }
    }

    pub fn set_viewport(&mut self, height: f32) {
        if !height.is_finite() {
            log::debug!("ignoring non-finite viewport height {height}");
            return;
        }
        self.scroll = ScrollState::new(self.scroll.offset, height);
        self.refresh();
    }

    /// Re-resolves every trigger and scrub range against current layouts.
    pub fn refresh(&mut self) {
        let timelines = &self.timelines;
        self.scrub_bindings.retain(|binding| timelines.contains(binding.timeline));
        for binding in &self.scrub_bindings {
            let Some(rect) = self.nodes.layout(binding.node) else {
                continue;
            };
            let range = ScrollRange::resolve(rect, binding.start, binding.end, self.scroll.viewport_height);
            if let Some(timeline) = self.timelines.get_mut(binding.timeline) {
                timeline.set_scroll_range(range);
            }
        }
        let fired = self.triggers.refresh(&self.nodes, self.scroll);
        self.dispatch(fired);
        self.timelines.scrub(self.scroll.offset, &mut self.nodes);
    }

    // ---------- triggers ----------

    /// Registers a trigger and runs whatever it owes for the current scroll
    /// position before returning. `None` when the node is not ready.
    pub fn register_trigger(&mut self, spec: TriggerSpec, callbacks: TriggerCallbacks) -> Option<TriggerHandle> {
        let registration = self.triggers.register(&self.nodes, self.scroll, spec, callbacks)?;
        if let Some(old) = registration.superseded {
            self.scopes.forget_trigger(old);
            for transient in &mut self.transient {
                if transient.trigger == old {
                    transient.trigger = registration.handle;
                }
            }
        }
        self.scopes.record_trigger(registration.handle);
        self.dispatch(registration.initial);
        Some(registration.handle)
    }

    /// Removes a trigger along with the tweens its reactions spawned. Those
    /// tweens stop where they are; nothing is reverted.
    pub fn unregister_trigger(&mut self, handle: TriggerHandle) -> bool {
        self.scopes.forget_trigger(handle);
        let spawned: Vec<TimelineId> = self
            .transient
            .iter()
            .filter(|transient| transient.trigger == handle)
            .map(|transient| transient.timeline)
            .collect();
        self.transient.retain(|transient| transient.trigger != handle);
        for id in spawned {
            self.scopes.forget_timeline(id);
            self.timelines.kill(id);
        }
        self.triggers.unregister(handle)
    }

    fn dispatch(&mut self, fired: FiredBatch) {
        for event in fired {
            // An earlier reaction in this batch may have unregistered it.
            let Some(spec) = self.triggers.spec(event.trigger) else {
                continue;
            };
            let label = spec.label.clone();
            let reactions =
                self.triggers.callbacks(event.trigger).map(|callbacks| callbacks.slot(event.kind).to_vec());
            self.events.push(StageEvent::trigger_fired(event.trigger, &label, event.kind));
            for reaction in reactions.unwrap_or_default() {
                self.react(event.trigger, reaction);
            }
        }
    }

    fn react(&mut self, trigger: TriggerHandle, reaction: Reaction) {
        match reaction {
            Reaction::Timeline(timeline, action) => {
                if !self.timelines.contains(timeline) {
                    log::debug!("{trigger} targets {timeline}, which is gone");
                    return;
                }
                if let Some(event) = self.timelines.apply_toggle(timeline, action, &mut self.nodes) {
                    self.push_timeline_event(timeline, event);
                }
            }
            Reaction::Set(node, property, value) => {
                self.nodes.set(node, property, value);
            }
            Reaction::Tween(spec) => self.spawn_transient(trigger, spec),
        }
    }

    fn spawn_transient(&mut self, trigger: TriggerHandle, spec: TweenSpec) {
        let timelines = &self.timelines;
        let replaced: Vec<TimelineId> = self
            .transient
            .iter()
            .filter(|transient| transient.trigger == trigger)
            .map(|transient| transient.timeline)
            .filter(|id| {
                timelines.get(*id).is_some_and(|timeline| {
                    spec.targets.iter().any(|node| spec.to.iter().any(|(prop, _)| timeline.touches(*node, *prop)))
                })
            })
            .collect();
        let mut retired = Vec::with_capacity(replaced.len());
        for id in replaced {
            if let Some(timeline) = self.timelines.take(id) {
                retired.push(timeline);
            }
            self.scopes.forget_timeline(id);
        }
        let timelines = &self.timelines;
        self.transient.retain(|transient| timelines.contains(transient.timeline));

        let options = PlayOptions { easing: self.config.timeline.easing, ..PlayOptions::default() };
        let id = self.timelines.build_play(&[spec], &options, &mut self.nodes);
        if let Some(timeline) = self.timelines.get_mut(id) {
            for old in &retired {
                timeline.inherit_originals(old);
            }
        }
        if let Some(scope) = self.scopes.owner_of_trigger(trigger) {
            self.scopes.adopt_timeline(scope, id);
        }
        self.transient.push(TransientTween { trigger, timeline: id });
    }

    // ---------- timelines ----------

    pub fn build_play(&mut self, specs: &[TweenSpec], options: PlayOptions) -> TimelineId {
        let id = self.timelines.build_play(specs, &options, &mut self.nodes);
        self.scopes.record_timeline(id);
        id
    }

    pub fn build_scrub(&mut self, specs: &[TweenSpec], range: ScrollRange) -> TimelineId {
        let id = self.timelines.build_scrub(specs, range, self.scroll.offset, &mut self.nodes);
        self.scopes.record_timeline(id);
        id
    }

    /// Scrub timeline whose range follows `node`'s layout between `start`
    /// and `end`. `None` when the node is not ready.
    pub fn build_scrub_on(
        &mut self,
        node: NodeId,
        start: Threshold,
        end: Threshold,
        specs: &[TweenSpec],
    ) -> Option<TimelineId> {
        let Some(rect) = self.nodes.layout(node) else {
            log::debug!("scrub timeline not built: node {node} is not ready");
            return None;
        };
        let range = ScrollRange::resolve(rect, start, end, self.scroll.viewport_height);
        let timeline = self.build_scrub(specs, range);
        self.scrub_bindings.push(ScrubBinding { timeline, node, start, end });
        Some(timeline)
    }

    /// Paused play timeline driven by a trigger on `spec.node` through
    /// `actions`. The timeline is built even when the node is not ready yet;
    /// the trigger handle is `None` then.
    pub fn build_toggled(
        &mut self,
        specs: &[TweenSpec],
        options: PlayOptions,
        trigger: TriggerSpec,
        actions: ToggleActions,
    ) -> (TimelineId, Option<TriggerHandle>) {
        let timeline = self.build_play(specs, PlayOptions { paused: true, ..options });
        let handle = self.register_trigger(trigger, TriggerCallbacks::toggle(timeline, actions));
        (timeline, handle)
    }

    pub fn play(&mut self, timeline: TimelineId) -> bool {
        self.timelines.play(timeline)
    }

    pub fn reverse(&mut self, timeline: TimelineId) -> bool {
        self.timelines.reverse(timeline)
    }

    fn push_timeline_event(&mut self, timeline: TimelineId, event: TimelineEvent) {
        self.events.push(match event {
            TimelineEvent::Completed => StageEvent::TimelineCompleted { timeline },
            TimelineEvent::ReverseCompleted => StageEvent::TimelineReversed { timeline },
        });
    }

    // ---------- scene ----------

    /// Mounts a fresh scene, replacing any previous one. Returns the seed the
    /// population was drawn from.
    pub fn mount_scene(&mut self, scheduler: Box<dyn FrameScheduler>, surface: Box<dyn RenderSurface>) -> u64 {
        self.unmount_scene();
        let seed = self.config.scene.seed.unwrap_or_else(populate::fresh_seed);
        let canvas = UVec2::new(self.config.scene.canvas[0], self.config.scene.canvas[1]);
        let mut driver =
            SceneDriver::mount(seed, &self.config.population, &self.config.camera, canvas, scheduler, surface);
        driver.set_pointer(self.pointer);
        self.scene = Some(driver);
        self.scopes.record_scene();
        seed
    }

    /// Stops and drops the scene. Returns false when none was running.
    pub fn unmount_scene(&mut self) -> bool {
        let Some(mut driver) = self.scene.take() else {
            return false;
        };
        self.scopes.forget_scene();
        let was_running = driver.stop();
        if was_running {
            self.events.push(StageEvent::SceneStopped { reason: SceneStopReason::Unmounted });
        }
        was_running
    }

    pub fn bind_scene_opacity(&mut self, node: NodeId) -> bool {
        match self.scene.as_mut() {
            Some(driver) => {
                driver.bind_layer_opacity(node);
                true
            }
            None => false,
        }
    }

    // ---------- scopes ----------

    /// Runs `setup` inside a new scope. Whatever it registers before
    /// returning, including before an early error, is owned by the scope.
    pub fn scope<F>(&mut self, label: &str, setup: F) -> Disposer
    where
        F: FnOnce(&mut Stage) -> Result<()>,
    {
        let scope = self.scopes.open(label);
        if let Err(err) = setup(self) {
            log::warn!("setup of {scope} '{label}' failed: {err:#}; keeping its partial registrations");
        }
        self.scopes.close(scope);
        Disposer::new(scope)
    }

    /// Tears a scope down: child scopes first, then triggers, then timelines
    /// (reverted newest first so the oldest recorded values win), then the
    /// scene if the scope owns it. A second call returns false.
    pub fn dispose(&mut self, scope: ScopeId) -> bool {
        let Some(record) = self.scopes.take(scope) else {
            log::debug!("{scope} already disposed");
            return false;
        };
        for child in &record.children {
            self.dispose(*child);
        }
        let mut triggers = 0;
        for handle in &record.triggers {
            if self.triggers.unregister(*handle) {
                triggers += 1;
            }
        }
        self.transient.retain(|transient| !record.triggers.contains(&transient.trigger));
        let mut timelines = 0;
        for id in record.timelines.iter().rev() {
            if self.timelines.revert(*id, &mut self.nodes) {
                timelines += 1;
            }
        }
        if record.owns_scene {
            self.unmount_scene();
        }
        self.events.push(StageEvent::ScopeDisposed { scope, triggers, timelines });
        true
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::PropValue;
    use crate::timeline::num;
    use crate::trigger::TriggerEventKind;

    fn stage() -> Stage {
        let mut stage = Stage::default();
        stage.set_viewport(1000.0);
        stage
    }

    #[test]
    fn trigger_reactions_run_in_registration_order() {
        let mut stage = stage();
        let card = stage.add_node("card", Rect::new(1500.0, 300.0));
        let callbacks = TriggerCallbacks::new()
            .on(TriggerEventKind::Enter, Reaction::Set(card, Property::Active, PropValue::Flag(true)))
            .on(TriggerEventKind::LeaveBack, Reaction::Set(card, Property::Active, PropValue::Flag(false)));
        stage.register_trigger(TriggerSpec::new("card", card), callbacks).unwrap();
        stage.scroll_to(600.0);
        assert_eq!(stage.nodes().flag(card, Property::Active), Some(true));
        stage.scroll_to(0.0);
        assert_eq!(stage.nodes().flag(card, Property::Active), Some(false));
        let fired: Vec<String> = stage.drain_events().iter().map(ToString::to_string).collect();
        assert_eq!(fired.len(), 2);
        assert!(fired[0].contains("onEnter"));
        assert!(fired[1].contains("onLeaveBack"));
    }

    #[test]
    fn unregistering_drops_the_tweens_its_reactions_spawned() {
        let mut stage = stage();
        let card = stage.add_node("card", Rect::new(1500.0, 300.0));
        let callbacks = TriggerCallbacks::new()
            .on(TriggerEventKind::Enter, Reaction::Tween(TweenSpec::to([card], &[num(Property::Scale, 1.5)])));
        let handle = stage.register_trigger(TriggerSpec::new("card", card), callbacks).unwrap();
        stage.scroll_to(600.0);
        for _ in 0..120 {
            stage.frame(1.0 / 60.0);
        }
        assert_eq!(stage.timelines().len(), 1);

        assert!(stage.unregister_trigger(handle));
        assert!(stage.timelines().is_empty());
        assert!(stage.transient.is_empty());
        assert_eq!(stage.nodes().number(card, Property::Scale), Some(1.5));
        assert!(!stage.unregister_trigger(handle));
    }

    #[test]
    fn transient_tweens_replace_each_other_and_revert_to_pristine() {
        let mut stage = stage();
        let card = stage.add_node("card", Rect::new(1500.0, 300.0));
        let disposer = stage.scope("card", |stage| {
            let callbacks = TriggerCallbacks::new()
                .on(TriggerEventKind::Enter, Reaction::Tween(TweenSpec::to([card], &[num(Property::Scale, 1.02)])))
                .on(TriggerEventKind::LeaveBack, Reaction::Tween(TweenSpec::to([card], &[num(Property::Scale, 1.0)])));
            stage.register_trigger(TriggerSpec::new("card", card), callbacks);
            Ok(())
        });
        stage.scroll_to(600.0);
        stage.frame(0.1);
        stage.scroll_to(0.0);
        stage.frame(0.1);
        assert_eq!(stage.timelines().len(), 1);
        stage.scroll_to(600.0);
        stage.frame(2.0);
        assert_eq!(stage.nodes().number(card, Property::Scale), Some(1.02));
        assert!(disposer.dispose(&mut stage));
        assert_eq!(stage.nodes().number(card, Property::Scale), Some(1.0));
        assert!(stage.timelines().is_empty());
    }

    #[test]
    fn failing_setup_keeps_partial_registrations_owned() {
        let mut stage = stage();
        let card = stage.add_node("card", Rect::new(200.0, 300.0));
        let disposer = stage.scope("broken", |stage| {
            stage.register_trigger(TriggerSpec::new("card", card), TriggerCallbacks::new());
            anyhow::bail!("markup missing");
        });
        assert_eq!(stage.triggers().len(), 1);
        assert!(disposer.dispose(&mut stage));
        assert!(stage.triggers().is_empty());
    }

    #[test]
    fn nested_scopes_are_disposed_with_their_parent() {
        let mut stage = stage();
        let card = stage.add_node("card", Rect::new(200.0, 300.0));
        let outer = stage.scope("page", |stage| {
            stage.scope("card", |stage| {
                stage.register_trigger(TriggerSpec::new("card", card), TriggerCallbacks::new());
                Ok(())
            });
            Ok(())
        });
        assert!(stage.dispose(outer.scope()));
        assert!(stage.triggers().is_empty());
        assert!(stage.scopes().is_empty());
    }

    #[test]
    fn viewport_changes_rebind_scrub_ranges() {
        let mut stage = stage();
        let hero = stage.add_node("hero", Rect::new(0.0, 1000.0));
        let id = stage
            .build_scrub_on(
                hero,
                Threshold::TOP_TOP,
                Threshold::BOTTOM_TOP,
                &[TweenSpec::to([hero], &[num(Property::Y, 200.0)]).ease(crate::easing::Easing::Linear)],
            )
            .unwrap();
        stage.scroll_to(500.0);
        assert!((stage.nodes().number(hero, Property::Y).unwrap() - 100.0).abs() < 1e-3);
        stage.nodes_mut().set_layout(hero, Rect::new(0.0, 2000.0));
        stage.refresh();
        assert_eq!(stage.timeline(id).unwrap().scroll_range(), Some(ScrollRange::new(0.0, 2000.0)));
        assert!((stage.nodes().number(hero, Property::Y).unwrap() - 50.0).abs() < 1e-3);
    }
}
