//! Property timelines.
//!
//! A timeline is compiled from tween specs into lanes, one per
//! `(node, property)` pair, each holding its steps in start order. Rendering a
//! lane at time `t` is a pure function of `t` once the lazily captured start
//! values are known, which is what makes reverse playback exact and scrubbing
//! idempotent.

use crate::easing::Easing;
use crate::nodes::{NodeId, NodeStore, PropValue, Property};
use crate::trigger::ScrollRange;
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EASING: Easing = Easing::POWER3_OUT;
pub const DEFAULT_STAGGER: f32 = 0.15;
pub const DEFAULT_DURATION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineId(u64);

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tl#{}", self.0)
    }
}

pub fn num(property: Property, value: f32) -> (Property, PropValue) {
    (property, PropValue::Number(value))
}

pub fn flag(property: Property, value: bool) -> (Property, PropValue) {
    (property, PropValue::Flag(value))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    /// Starts when the previously added tween ends.
    Sequence,
    /// Absolute offset from the start of the timeline, seconds.
    At(f32),
}

/// One `gsap.to` / `gsap.fromTo` / `gsap.set` style entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TweenSpec {
    pub targets: Vec<NodeId>,
    /// Explicit start values. Properties missing here start from whatever the
    /// node shows when the step first renders.
    pub from: Vec<(Property, PropValue)>,
    pub to: Vec<(Property, PropValue)>,
    pub duration: f32,
    pub easing: Option<Easing>,
    pub stagger: Option<f32>,
    pub position: Position,
}

impl TweenSpec {
    pub fn to<I: IntoIterator<Item = NodeId>>(targets: I, to: &[(Property, PropValue)]) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            from: Vec::new(),
            to: to.to_vec(),
            duration: DEFAULT_DURATION,
            easing: None,
            stagger: None,
            position: Position::Sequence,
        }
    }

    pub fn from_to<I: IntoIterator<Item = NodeId>>(
        targets: I,
        from: &[(Property, PropValue)],
        to: &[(Property, PropValue)],
    ) -> Self {
        Self { from: from.to_vec(), ..Self::to(targets, to) }
    }

    /// Zero-duration write.
    pub fn set<I: IntoIterator<Item = NodeId>>(targets: I, values: &[(Property, PropValue)]) -> Self {
        Self { duration: 0.0, ..Self::to(targets, values) }
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn ease(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn stagger(mut self, each: f32) -> Self {
        self.stagger = Some(each);
        self
    }

    pub fn at(mut self, seconds: f32) -> Self {
        self.position = Position::At(seconds);
        self
    }

    pub fn touches(&self, node: NodeId, property: Property) -> bool {
        self.targets.contains(&node) && self.to.iter().any(|(prop, _)| *prop == property)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Count(u32),
    Infinite,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Count(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub delay: f32,
    /// Stagger for tweens that do not set their own.
    pub stagger: f32,
    /// Easing for tweens that do not set their own.
    pub easing: Easing,
    pub repeat: Repeat,
    pub yoyo: bool,
    /// Paused timelines wait for an explicit play (usually from a trigger).
    pub paused: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            delay: 0.0,
            stagger: 0.0,
            easing: DEFAULT_EASING,
            repeat: Repeat::default(),
            yoyo: false,
            paused: false,
        }
    }
}

impl PlayOptions {
    pub fn paused() -> Self {
        Self { paused: true, ..Self::default() }
    }

    pub fn delayed(delay: f32) -> Self {
        Self { delay, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    None,
    Play,
    Pause,
    Resume,
    Reverse,
    Restart,
    Reset,
    Complete,
}

impl FromStr for ToggleAction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Ok(match value {
            "none" => ToggleAction::None,
            "play" => ToggleAction::Play,
            "pause" => ToggleAction::Pause,
            "resume" => ToggleAction::Resume,
            "reverse" => ToggleAction::Reverse,
            "restart" => ToggleAction::Restart,
            "reset" => ToggleAction::Reset,
            "complete" => ToggleAction::Complete,
            other => bail!("Unknown toggle action '{other}'"),
        })
    }
}

/// Actions for enter / leave / enter-back / leave-back, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ToggleActions {
    pub on_enter: ToggleAction,
    pub on_leave: ToggleAction,
    pub on_enter_back: ToggleAction,
    pub on_leave_back: ToggleAction,
}

impl ToggleActions {
    /// `play none none none`: the first entry plays it, nothing undoes it.
    pub const PLAY_ONCE: ToggleActions = ToggleActions {
        on_enter: ToggleAction::Play,
        on_leave: ToggleAction::None,
        on_enter_back: ToggleAction::None,
        on_leave_back: ToggleAction::None,
    };
    /// `play reverse play reverse`: visible only while active.
    pub const PLAY_REVERSE: ToggleActions = ToggleActions {
        on_enter: ToggleAction::Play,
        on_leave: ToggleAction::Reverse,
        on_enter_back: ToggleAction::Play,
        on_leave_back: ToggleAction::Reverse,
    };
    /// `play none none reverse`: plays on the way down, rewinds when scrolled
    /// back above the start.
    pub const REVEAL: ToggleActions = ToggleActions {
        on_enter: ToggleAction::Play,
        on_leave: ToggleAction::None,
        on_enter_back: ToggleAction::None,
        on_leave_back: ToggleAction::Reverse,
    };
}

impl Default for ToggleActions {
    fn default() -> Self {
        Self::REVEAL
    }
}

impl FromStr for ToggleActions {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let words: Vec<&str> = value.split_whitespace().collect();
        let [enter, leave, enter_back, leave_back] = words.as_slice() else {
            return Err(anyhow!("Toggle actions '{value}' must list exactly four actions"));
        };
        Ok(Self {
            on_enter: enter.parse()?,
            on_leave: leave.parse()?,
            on_enter_back: enter_back.parse()?,
            on_leave_back: leave_back.parse()?,
        })
    }
}

impl TryFrom<String> for ToggleActions {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEvent {
    Completed,
    ReverseCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
struct Track {
    start: f32,
    duration: f32,
    easing: Easing,
    from: Option<PropValue>,
    to: PropValue,
}

impl Track {
    fn begun(&self, time: f32, forward: bool) -> bool {
        time > self.start || (time == self.start && (self.duration > 0.0 || forward))
    }

    fn value_at(&self, time: f32, from: PropValue) -> PropValue {
        let progress = if self.duration <= 0.0 { 1.0 } else { (time - self.start) / self.duration };
        if progress >= 1.0 {
            return self.to;
        }
        match (from, self.to) {
            (PropValue::Number(a), PropValue::Number(b)) => {
                if progress <= 0.0 {
                    return from;
                }
                PropValue::Number(a + (b - a) * self.easing.apply(progress))
            }
            _ => from,
        }
    }
}

#[derive(Debug, Clone)]
struct Lane {
    target: NodeId,
    property: Property,
    tracks: Vec<Track>,
}

impl Lane {
    fn render(&mut self, time: f32, forward: bool, nodes: &NodeStore) -> Option<PropValue> {
        let active = self.tracks.iter().rposition(|track| track.begun(time, forward));
        match active {
            Some(index) => {
                let from = match self.tracks[index].from {
                    Some(value) => value,
                    None => {
                        let captured = match index {
                            0 => nodes.value(self.target, self.property)?,
                            _ => self.tracks[index - 1].to,
                        };
                        self.tracks[index].from = Some(captured);
                        captured
                    }
                };
                Some(self.tracks[index].value_at(time, from))
            }
            None => self.tracks.first().and_then(|track| track.from),
        }
    }
}

#[derive(Debug, Clone)]
struct PlayState {
    total_time: f32,
    direction: Direction,
    playing: bool,
    delay_remaining: f32,
    repeat: Repeat,
    yoyo: bool,
    at_start: bool,
    at_end: bool,
}

#[derive(Debug, Clone)]
enum TimelineMode {
    Play(PlayState),
    Scrub { range: ScrollRange, progress: Option<f32> },
}

#[derive(Debug, Clone)]
pub struct Timeline {
    mode: TimelineMode,
    lanes: Vec<Lane>,
    cycle: f32,
    originals: Vec<(NodeId, Property, PropValue)>,
}

impl Timeline {
    pub fn play_mode(specs: &[TweenSpec], options: &PlayOptions, nodes: &NodeStore) -> Self {
        let (lanes, cycle) = compile(specs, options.stagger, options.easing, nodes);
        let delay = if options.delay.is_finite() { options.delay.max(0.0) } else { 0.0 };
        let state = PlayState {
            total_time: 0.0,
            direction: Direction::Forward,
            playing: !options.paused,
            delay_remaining: delay,
            repeat: options.repeat,
            yoyo: options.yoyo,
            at_start: true,
            at_end: false,
        };
        Self { mode: TimelineMode::Play(state), lanes, cycle, originals: Vec::new() }
    }

    pub fn scrub_mode(specs: &[TweenSpec], range: ScrollRange, nodes: &NodeStore) -> Self {
        let (lanes, cycle) = compile(specs, 0.0, Easing::Linear, nodes);
        Self { mode: TimelineMode::Scrub { range, progress: None }, lanes, cycle, originals: Vec::new() }
    }

    pub fn is_scrub(&self) -> bool {
        matches!(self.mode, TimelineMode::Scrub { .. })
    }

    /// Length of one cycle, seconds (or abstract units for scrub timelines).
    pub fn cycle_duration(&self) -> f32 {
        self.cycle
    }

    pub fn total_duration(&self) -> f32 {
        match &self.mode {
            TimelineMode::Play(state) => total_for(self.cycle, state.repeat),
            TimelineMode::Scrub { .. } => self.cycle,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(&self.mode, TimelineMode::Play(state) if state.playing)
    }

    pub fn direction(&self) -> Option<Direction> {
        match &self.mode {
            TimelineMode::Play(state) => Some(state.direction),
            TimelineMode::Scrub { .. } => None,
        }
    }

    /// Normalized position: playhead over total duration, or scrub progress.
    pub fn progress(&self) -> f32 {
        match &self.mode {
            TimelineMode::Play(state) => {
                let total = total_for(self.cycle, state.repeat);
                if !total.is_finite() {
                    return self.cycle_position(state).0 / self.cycle.max(f32::EPSILON);
                }
                if total <= 0.0 {
                    return if state.at_end { 1.0 } else { 0.0 };
                }
                (state.total_time / total).clamp(0.0, 1.0)
            }
            TimelineMode::Scrub { progress, .. } => progress.unwrap_or(0.0),
        }
    }

    pub fn scroll_range(&self) -> Option<ScrollRange> {
        match &self.mode {
            TimelineMode::Scrub { range, .. } => Some(*range),
            TimelineMode::Play(_) => None,
        }
    }

    /// Rebinds a scrub timeline after layout changes. Play timelines ignore it.
    pub fn set_scroll_range(&mut self, new_range: ScrollRange) {
        if let TimelineMode::Scrub { range, .. } = &mut self.mode {
            *range = new_range;
        }
    }

    /// Takes over pre-animation values recorded by a timeline this one
    /// replaces, so a later revert goes all the way back.
    pub fn inherit_originals(&mut self, replaced: &Timeline) {
        for (target, property, value) in &replaced.originals {
            if !self.originals.iter().any(|(node, prop, _)| node == target && prop == property) {
                self.originals.push((*target, *property, *value));
            }
        }
    }

    pub fn touches(&self, node: NodeId, property: Property) -> bool {
        self.lanes.iter().any(|lane| lane.target == node && lane.property == property)
    }

    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.lanes.iter().map(|lane| lane.target)
    }

    /// Writes every lane's explicit start value without moving the playhead.
    pub fn render_initial(&mut self, nodes: &mut NodeStore) {
        for index in 0..self.lanes.len() {
            if let Some(value) = self.lanes[index].tracks.first().and_then(|track| track.from) {
                let (target, property) = (self.lanes[index].target, self.lanes[index].property);
                self.write(nodes, target, property, value);
            }
        }
    }

    pub fn play(&mut self) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.direction = Direction::Forward;
            state.playing = !state.at_end;
        }
    }

    pub fn reverse(&mut self) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.direction = Direction::Backward;
            state.playing = !state.at_start;
        }
    }

    pub fn pause(&mut self) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.playing = false;
        }
    }

    pub fn resume(&mut self) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.playing = match state.direction {
                Direction::Forward => !state.at_end,
                Direction::Backward => !state.at_start,
            };
        }
    }

    pub fn restart(&mut self, nodes: &mut NodeStore) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.total_time = 0.0;
            state.direction = Direction::Forward;
            state.playing = true;
            state.at_start = true;
            state.at_end = false;
        }
        self.render_playhead(nodes);
    }

    /// Pauses at the very start and shows the start state.
    pub fn reset(&mut self, nodes: &mut NodeStore) {
        if let TimelineMode::Play(state) = &mut self.mode {
            state.total_time = 0.0;
            state.direction = Direction::Backward;
            state.playing = false;
            state.at_start = true;
            state.at_end = false;
        }
        self.render_playhead(nodes);
    }

    /// Jumps to the end state. Infinite timelines jump to the end of the
    /// current cycle.
    pub fn complete(&mut self, nodes: &mut NodeStore) -> Option<TimelineEvent> {
        let cycle = self.cycle;
        let TimelineMode::Play(state) = &mut self.mode else {
            return None;
        };
        let total = total_for(cycle, state.repeat);
        state.total_time = if total.is_finite() { total } else { cycle };
        state.direction = Direction::Forward;
        state.playing = false;
        state.delay_remaining = 0.0;
        state.at_start = false;
        let was_at_end = std::mem::replace(&mut state.at_end, total.is_finite());
        self.render_playhead(nodes);
        (!was_at_end && total.is_finite()).then_some(TimelineEvent::Completed)
    }

    pub fn apply_toggle(&mut self, action: ToggleAction, nodes: &mut NodeStore) -> Option<TimelineEvent> {
        match action {
            ToggleAction::None => None,
            ToggleAction::Play => {
                self.play();
                None
            }
            ToggleAction::Pause => {
                self.pause();
                None
            }
            ToggleAction::Resume => {
                self.resume();
                None
            }
            ToggleAction::Reverse => {
                self.reverse();
                None
            }
            ToggleAction::Restart => {
                self.restart(nodes);
                None
            }
            ToggleAction::Reset => {
                self.reset(nodes);
                None
            }
            ToggleAction::Complete => self.complete(nodes),
        }
    }

    /// Advances the virtual clock of a play-mode timeline by `dt` seconds.
    pub fn advance(&mut self, dt: f32, nodes: &mut NodeStore) -> Option<TimelineEvent> {
        let cycle = self.cycle;
        let TimelineMode::Play(state) = &mut self.mode else {
            return None;
        };
        if !state.playing || !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        let mut dt = dt;
        if state.direction == Direction::Forward && state.delay_remaining > 0.0 {
            let consumed = dt.min(state.delay_remaining);
            state.delay_remaining -= consumed;
            dt -= consumed;
            if state.delay_remaining > 0.0 {
                return None;
            }
        }

        let total = total_for(cycle, state.repeat);
        let mut event = None;
        match state.direction {
            Direction::Forward => {
                state.at_start = false;
                state.total_time += dt;
                if state.total_time >= total {
                    state.total_time = total;
                    state.playing = false;
                    state.at_end = true;
                    event = Some(TimelineEvent::Completed);
                } else if !total.is_finite() {
                    let period = if state.yoyo { cycle * 2.0 } else { cycle };
                    if period > 0.0 && state.total_time >= period {
                        state.total_time = state.total_time.rem_euclid(period);
                    }
                }
            }
            Direction::Backward => {
                state.at_end = false;
                state.total_time -= dt;
                if state.total_time <= 0.0 {
                    state.total_time = 0.0;
                    state.playing = false;
                    state.at_start = true;
                    event = Some(TimelineEvent::ReverseCompleted);
                }
            }
        }
        self.render_playhead(nodes);
        event
    }

    /// Renders a scrub-mode timeline for the given scroll offset. Progress is
    /// clamped to the bound range so overscroll never extrapolates.
    pub fn scrub(&mut self, offset: f32, nodes: &mut NodeStore) {
        let TimelineMode::Scrub { range, progress } = &mut self.mode else {
            return;
        };
        let value = range.progress(offset);
        *progress = Some(value);
        let time = if value >= 1.0 { self.cycle } else { value * self.cycle };
        self.render_at(time, true, nodes);
    }

    /// Restores every property this timeline ever wrote to the value it had
    /// before the first write, and stops playback.
    pub fn revert(&mut self, nodes: &mut NodeStore) {
        for (target, property, value) in self.originals.drain(..) {
            nodes.set(target, property, value);
        }
        if let TimelineMode::Play(state) = &mut self.mode {
            state.playing = false;
            state.total_time = 0.0;
            state.at_start = true;
            state.at_end = false;
        }
    }

    fn cycle_position(&self, state: &PlayState) -> (f32, bool) {
        let cycle = self.cycle;
        let forward = state.direction == Direction::Forward;
        if cycle <= 0.0 {
            return (0.0, forward && !state.at_start);
        }
        let total = total_for(cycle, state.repeat);
        let (iteration, local) = if state.total_time >= total {
            let iterations = match state.repeat {
                Repeat::Count(count) => count,
                Repeat::Infinite => 0,
            };
            (iterations, cycle)
        } else {
            let iteration = (state.total_time / cycle).floor();
            (iteration as u32, state.total_time - iteration * cycle)
        };
        if state.yoyo && iteration % 2 == 1 {
            (cycle - local, !forward)
        } else {
            (local, forward)
        }
    }

    fn render_playhead(&mut self, nodes: &mut NodeStore) {
        let TimelineMode::Play(state) = &self.mode else {
            return;
        };
        let (time, forward) = self.cycle_position(state);
        self.render_at(time, forward, nodes);
    }

    fn render_at(&mut self, time: f32, forward: bool, nodes: &mut NodeStore) {
        for index in 0..self.lanes.len() {
            let lane = &mut self.lanes[index];
            let (target, property) = (lane.target, lane.property);
            if let Some(value) = lane.render(time, forward, nodes) {
                self.write(nodes, target, property, value);
            }
        }
    }

    fn write(&mut self, nodes: &mut NodeStore, target: NodeId, property: Property, value: PropValue) {
        if !self.originals.iter().any(|(node, prop, _)| *node == target && *prop == property) {
            match nodes.value(target, property) {
                Some(current) => self.originals.push((target, property, current)),
                None => return,
            }
        }
        nodes.set(target, property, value);
    }
}

fn total_for(cycle: f32, repeat: Repeat) -> f32 {
    match repeat {
        Repeat::Count(count) => cycle * (count as f32 + 1.0),
        Repeat::Infinite if cycle > 0.0 => f32::INFINITY,
        Repeat::Infinite => 0.0,
    }
}

fn sanitize_seconds(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn compile(specs: &[TweenSpec], default_stagger: f32, default_easing: Easing, nodes: &NodeStore) -> (Vec<Lane>, f32) {
    let mut lanes: Vec<Lane> = Vec::new();
    let mut cursor = 0.0_f32;
    let mut cycle = 0.0_f32;
    for spec in specs {
        let start = match spec.position {
            Position::Sequence => cursor,
            Position::At(offset) => sanitize_seconds(offset),
        };
        let duration = sanitize_seconds(spec.duration);
        let stagger = sanitize_seconds(spec.stagger.unwrap_or(default_stagger));
        let easing = spec.easing.unwrap_or(default_easing);

        let mut end = start + duration;
        let live_targets = spec.targets.iter().filter(|target| {
            let alive = nodes.contains(**target);
            if !alive {
                log::debug!("tween target {target} is not mounted; skipping it");
            }
            alive
        });
        for (index, target) in live_targets.enumerate() {
            let step_start = start + stagger * index as f32;
            end = end.max(step_start + duration);
            for (property, to) in &spec.to {
                let from = spec.from.iter().find(|(prop, _)| prop == property).map(|(_, value)| *value);
                let track = Track { start: step_start, duration, easing, from, to: *to };
                match lanes.iter_mut().find(|lane| lane.target == *target && lane.property == *property) {
                    Some(lane) => lane.tracks.push(track),
                    None => lanes.push(Lane { target: *target, property: *property, tracks: vec![track] }),
                }
            }
        }
        cursor = end;
        cycle = cycle.max(end);
    }
    for lane in &mut lanes {
        lane.tracks.sort_by(|a, b| a.start.total_cmp(&b.start));
    }
    (lanes, cycle)
}

/// Owns every live timeline and drives both clocks into them.
#[derive(Default)]
pub struct Choreographer {
    timelines: BTreeMap<TimelineId, Timeline>,
    next_id: u64,
}

impl Choreographer {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, timeline: Timeline) -> TimelineId {
        let id = TimelineId(self.next_id);
        self.next_id += 1;
        self.timelines.insert(id, timeline);
        id
    }

    /// Builds a clock-driven timeline. Tweens with explicit start values show
    /// them immediately so elements wait in their pre-animation state.
    pub fn build_play(&mut self, specs: &[TweenSpec], options: &PlayOptions, nodes: &mut NodeStore) -> TimelineId {
        let mut timeline = Timeline::play_mode(specs, options, nodes);
        timeline.render_initial(nodes);
        self.insert(timeline)
    }

    /// Builds a scroll-driven timeline and renders it for `offset` right away.
    pub fn build_scrub(
        &mut self,
        specs: &[TweenSpec],
        range: ScrollRange,
        offset: f32,
        nodes: &mut NodeStore,
    ) -> TimelineId {
        let mut timeline = Timeline::scrub_mode(specs, range, nodes);
        timeline.scrub(offset, nodes);
        self.insert(timeline)
    }

    pub fn get(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    pub fn get_mut(&mut self, id: TimelineId) -> Option<&mut Timeline> {
        self.timelines.get_mut(&id)
    }

    pub fn contains(&self, id: TimelineId) -> bool {
        self.timelines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn play(&mut self, id: TimelineId) -> bool {
        self.timelines.get_mut(&id).map(Timeline::play).is_some()
    }

    pub fn reverse(&mut self, id: TimelineId) -> bool {
        self.timelines.get_mut(&id).map(Timeline::reverse).is_some()
    }

    pub fn apply_toggle(
        &mut self,
        id: TimelineId,
        action: ToggleAction,
        nodes: &mut NodeStore,
    ) -> Option<TimelineEvent> {
        self.timelines.get_mut(&id)?.apply_toggle(action, nodes)
    }

    /// Display-refresh clock: advances every playing timeline.
    pub fn advance(&mut self, dt: f32, nodes: &mut NodeStore) -> Vec<(TimelineId, TimelineEvent)> {
        let mut events = Vec::new();
        for (id, timeline) in &mut self.timelines {
            if let Some(event) = timeline.advance(dt, nodes) {
                events.push((*id, event));
            }
        }
        events
    }

    /// Scroll clock: re-renders every scrub timeline for `offset`.
    pub fn scrub(&mut self, offset: f32, nodes: &mut NodeStore) {
        for timeline in self.timelines.values_mut() {
            if timeline.is_scrub() {
                timeline.scrub(offset, nodes);
            }
        }
    }

    /// Restores the timeline's pre-animation values and drops it.
    pub fn revert(&mut self, id: TimelineId, nodes: &mut NodeStore) -> bool {
        match self.timelines.remove(&id) {
            Some(mut timeline) => {
                timeline.revert(nodes);
                true
            }
            None => false,
        }
    }

    /// Drops the timeline, leaving nodes exactly as it last rendered them.
    pub fn kill(&mut self, id: TimelineId) -> bool {
        self.take(id).is_some()
    }

    pub fn take(&mut self, id: TimelineId) -> Option<Timeline> {
        self.timelines.remove(&id)
    }
}
