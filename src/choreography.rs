//! Presets that wire the event page: the hero entrance and scroll fades,
//! fade-up reveals, the agenda timeline with its highlighted card, the sticky
//! header, and the floating asteroids between sections.
//!
//! Every preset goes through the [`Stage`] API, so whatever it registers is
//! owned by the scope that is open when it runs.

use crate::easing::Easing;
use crate::nodes::{NodeId, PropValue, Property, Rect};
use crate::stage::Stage;
use crate::timeline::{flag, num, PlayOptions, Repeat, TimelineId, ToggleActions, TweenSpec};
use crate::trigger::{Reaction, Threshold, TriggerCallbacks, TriggerEventKind, TriggerHandle, TriggerSpec};
use anyhow::Result;
use serde::Deserialize;

/// What a highlighted agenda card falls back to once the reader scrolls past.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStyle {
    /// Cards already read stay visible but faded.
    Dim { opacity: f32 },
    /// Cards drop straight back to their resting look.
    Reset,
}

impl Default for LeaveStyle {
    fn default() -> Self {
        LeaveStyle::Dim { opacity: 0.6 }
    }
}

const HERO_DELAY: f32 = 0.5;
const LETTER_STAGGER: f32 = 0.06;
const BUTTON_STAGGER: f32 = 0.15;
const PARALLAX_DEPTH: f32 = 200.0;
const HEADER_OFFSET: f32 = -100.0;
const HEADER_DURATION: f32 = 0.5;
const NODE_ENTER_DURATION: f32 = 0.4;
const NODE_LEAVE_DURATION: f32 = 0.3;
const CARD_DURATION: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct HeroNodes {
    pub section: NodeId,
    pub content: NodeId,
    pub badge: NodeId,
    pub pre_title: NodeId,
    pub letters: Vec<NodeId>,
    pub subtitle: NodeId,
    pub buttons: Vec<NodeId>,
}

/// Entrance timeline for the hero copy. Starts half a second after mount.
pub fn hero_entrance(stage: &mut Stage, hero: &HeroNodes) -> TimelineId {
    let specs = [
        TweenSpec::from_to(
            [hero.badge],
            &[num(Property::Opacity, 0.0), num(Property::Y, 30.0), num(Property::Scale, 0.8)],
            &[num(Property::Opacity, 1.0), num(Property::Y, 0.0), num(Property::Scale, 1.0)],
        )
        .duration(1.0)
        .at(0.0),
        TweenSpec::from_to(
            [hero.pre_title],
            &[num(Property::Opacity, 0.0), num(Property::Y, 20.0), num(Property::LetterSpacing, 0.5)],
            &[num(Property::Opacity, 1.0), num(Property::Y, 0.0), num(Property::LetterSpacing, 0.35)],
        )
        .duration(1.0)
        .at(0.2),
        TweenSpec::from_to(
            hero.letters.iter().copied(),
            &[num(Property::Opacity, 0.0), num(Property::Y, 48.0), num(Property::Blur, 4.0)],
            &[num(Property::Opacity, 1.0), num(Property::Y, 0.0), num(Property::Blur, 0.0)],
        )
        .duration(0.8)
        .stagger(LETTER_STAGGER)
        .at(0.4),
        TweenSpec::from_to(
            [hero.subtitle],
            &[num(Property::Opacity, 0.0), num(Property::Y, 40.0), num(Property::Blur, 20.0)],
            &[num(Property::Opacity, 1.0), num(Property::Y, 0.0), num(Property::Blur, 0.0)],
        )
        .duration(1.2)
        .at(1.2),
        TweenSpec::from_to(
            hero.buttons.iter().copied(),
            &[num(Property::Opacity, 0.0), num(Property::Y, 30.0), num(Property::Scale, 0.9)],
            &[num(Property::Opacity, 1.0), num(Property::Y, 0.0), num(Property::Scale, 1.0)],
        )
        .duration(0.8)
        .stagger(BUTTON_STAGGER)
        .at(1.5),
    ];
    let options = PlayOptions { delay: HERO_DELAY, easing: Easing::POWER3_OUT, ..PlayOptions::default() };
    stage.build_play(&specs, options)
}

/// Parallax on the hero copy and a fade of the whole section, both scrubbed by
/// scroll. The scene layer follows the fade when a scene is mounted.
pub fn hero_scroll(stage: &mut Stage, hero: &HeroNodes) -> (Option<TimelineId>, Option<TimelineId>) {
    let parallax = stage.build_scrub_on(
        hero.section,
        Threshold::TOP_TOP,
        Threshold::BOTTOM_TOP,
        &[TweenSpec::to([hero.content], &[num(Property::Y, PARALLAX_DEPTH)]).ease(Easing::Linear)],
    );
    let fade = stage.build_scrub_on(
        hero.section,
        Threshold::new(0.4, 0.0),
        Threshold::BOTTOM_TOP,
        &[TweenSpec::to([hero.section], &[num(Property::Opacity, 0.0)]).ease(Easing::Linear)],
    );
    if fade.is_some() && !stage.bind_scene_opacity(hero.section) {
        log::debug!("hero fade built without a mounted scene");
    }
    (parallax, fade)
}

/// Fade-up reveal for a group of nodes, played when `trigger` crosses the
/// entry line and reversed when the reader scrolls back above it.
#[derive(Debug, Clone)]
pub struct Reveal {
    pub label: String,
    pub trigger: NodeId,
    pub targets: Vec<NodeId>,
    /// Hidden pose. Each property animates back to its resting value.
    pub from: Vec<(Property, PropValue)>,
    pub start: Option<Threshold>,
    pub duration: Option<f32>,
    pub stagger: Option<f32>,
}

impl Reveal {
    pub fn fade_up(label: impl Into<String>, trigger: NodeId, targets: &[NodeId], rise: f32) -> Self {
        Self {
            label: label.into(),
            trigger,
            targets: targets.to_vec(),
            from: vec![num(Property::Opacity, 0.0), num(Property::Y, rise)],
            start: None,
            duration: None,
            stagger: None,
        }
    }

    pub fn from(mut self, property: Property, value: f32) -> Self {
        match self.from.iter_mut().find(|(prop, _)| *prop == property) {
            Some(entry) => entry.1 = PropValue::Number(value),
            None => self.from.push(num(property, value)),
        }
        self
    }

    pub fn start(mut self, threshold: Threshold) -> Self {
        self.start = Some(threshold);
        self
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn stagger(mut self, each: f32) -> Self {
        self.stagger = Some(each);
        self
    }

    /// Builds the paused timeline and its trigger. The hidden pose is written
    /// immediately; the handle is `None` while the trigger node is not laid out.
    pub fn build(self, stage: &mut Stage) -> (TimelineId, Option<TriggerHandle>) {
        let defaults = stage.config().timeline.clone();
        let start = self.start.unwrap_or(stage.config().triggers.entry);
        let to: Vec<(Property, PropValue)> =
            self.from.iter().map(|(property, _)| (*property, property.initial())).collect();
        let spec = TweenSpec::from_to(self.targets, &self.from, &to)
            .duration(self.duration.unwrap_or(defaults.duration))
            .stagger(self.stagger.unwrap_or(defaults.stagger))
            .ease(defaults.easing);
        let trigger = TriggerSpec::new(self.label, self.trigger).start(start);
        stage.build_toggled(&[spec], PlayOptions::default(), trigger, ToggleActions::REVEAL)
    }
}

/// Draws the agenda's vertical line as the reader scrolls through the track.
pub fn agenda_line(stage: &mut Stage, track: NodeId, line: NodeId) -> Option<TimelineId> {
    stage.build_scrub_on(
        track,
        Threshold::new(0.0, 0.7),
        Threshold::new(1.0, 0.3),
        &[TweenSpec::from_to([line], &[num(Property::ScaleY, 0.0)], &[num(Property::ScaleY, 1.0)]).ease(Easing::Linear)],
    )
}

/// Highlights the card in the middle band of the viewport and marks its
/// timeline node active. Cards that scroll past fall back to the configured
/// [`LeaveStyle`].
pub fn agenda_highlight(stage: &mut Stage, index: usize, card: NodeId, node: NodeId) -> Option<TriggerHandle> {
    let highlight = stage.config().highlight.clone();
    let node_tween = |scale: f32, duration: f32| {
        Reaction::Tween(
            TweenSpec::to([node], &[num(Property::Scale, scale)]).duration(duration).ease(Easing::POWER2_OUT),
        )
    };
    let active = |on: bool| Reaction::Tween(TweenSpec::set([node], &[flag(Property::Active, on)]));
    let card_tween = |values: &[(Property, PropValue)]| {
        Reaction::Tween(TweenSpec::to([card], values).duration(CARD_DURATION))
    };

    let lit = [
        num(Property::Opacity, 1.0),
        num(Property::Scale, highlight.card_scale),
        num(Property::Glow, 1.0),
    ];
    let rest = [num(Property::Scale, 1.0), num(Property::Glow, 0.0)];
    let left = match highlight.leave_style {
        LeaveStyle::Dim { opacity } => {
            card_tween(&[num(Property::Opacity, opacity), num(Property::Scale, 1.0), num(Property::Glow, 0.0)])
        }
        LeaveStyle::Reset => card_tween(&rest),
    };

    let callbacks = TriggerCallbacks::new()
        .on(TriggerEventKind::Enter, node_tween(highlight.node_scale, NODE_ENTER_DURATION))
        .on(TriggerEventKind::Enter, active(true))
        .on(TriggerEventKind::Enter, card_tween(&lit[1..]))
        .on(TriggerEventKind::Leave, node_tween(1.0, NODE_LEAVE_DURATION))
        .on(TriggerEventKind::Leave, active(false))
        .on(TriggerEventKind::Leave, left)
        .on(TriggerEventKind::EnterBack, node_tween(highlight.node_scale, NODE_ENTER_DURATION))
        .on(TriggerEventKind::EnterBack, active(true))
        .on(TriggerEventKind::EnterBack, card_tween(&lit))
        .on(TriggerEventKind::LeaveBack, node_tween(1.0, NODE_LEAVE_DURATION))
        .on(TriggerEventKind::LeaveBack, active(false))
        .on(TriggerEventKind::LeaveBack, card_tween(&rest));

    let spec = TriggerSpec::new(format!("agenda-card-{index}"), card)
        .start(Threshold::new(0.0, 0.6))
        .end(Threshold::new(1.0, 0.4));
    stage.register_trigger(spec, callbacks)
}

/// Slides the fixed header in once the agenda reaches the entry line and out
/// again when the reader scrolls back to the hero.
pub fn header_visibility(stage: &mut Stage, header: NodeId, agenda: NodeId) -> Option<TriggerHandle> {
    let hidden = [num(Property::Y, HEADER_OFFSET), num(Property::Opacity, 0.0)];
    let shown = [num(Property::Y, 0.0), num(Property::Opacity, 1.0)];
    stage.build_play(&[TweenSpec::set([header], &hidden)], PlayOptions::default());
    let slide = |values: &[(Property, PropValue)]| {
        Reaction::Tween(TweenSpec::to([header], values).duration(HEADER_DURATION).ease(Easing::POWER3_OUT))
    };
    let callbacks = TriggerCallbacks::new()
        .on(TriggerEventKind::Enter, slide(&shown))
        .on(TriggerEventKind::LeaveBack, slide(&hidden));
    let entry = stage.config().triggers.entry;
    stage.register_trigger(TriggerSpec::new("header", agenda).start(entry), callbacks)
}

/// Idle float for a decorative element. Larger bodies move less.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSpec {
    /// Rendered size in pixels.
    pub size: f32,
    pub delay: f32,
    pub duration: f32,
    /// Resting rotation, degrees.
    pub rotation: f32,
}

impl DriftSpec {
    pub const fn new(size: f32, delay: f32, duration: f32, rotation: f32) -> Self {
        Self { size, delay, duration, rotation }
    }

    pub fn amplitude(&self) -> f32 {
        (1.0 - self.size / 150.0).max(0.5)
    }

    /// Peak vertical lift in pixels (applied upwards).
    pub fn lift(&self) -> f32 {
        10.0 + self.amplitude() * 15.0
    }

    pub fn sway(&self) -> f32 {
        5.0 + self.amplitude() * 10.0
    }
}

/// The asteroid field strewn across the section divider.
pub const DIVIDER_ASTEROIDS: [DriftSpec; 8] = [
    DriftSpec::new(90.0, 0.2, 6.0, 15.0),
    DriftSpec::new(80.0, 0.8, 5.5, -25.0),
    DriftSpec::new(55.0, 0.0, 4.5, -15.0),
    DriftSpec::new(50.0, 1.0, 4.0, 30.0),
    DriftSpec::new(35.0, 1.2, 3.5, 45.0),
    DriftSpec::new(30.0, 0.3, 3.2, -35.0),
    DriftSpec::new(18.0, 0.4, 2.8, 60.0),
    DriftSpec::new(12.0, 0.7, 2.2, 75.0),
];

/// Two endless yoyo tweens: a lift with a slight turn, and a slower sideways
/// sway starting at half the delay.
pub fn floating_drift(stage: &mut Stage, node: NodeId, drift: &DriftSpec) -> [TimelineId; 2] {
    let endless = PlayOptions { repeat: Repeat::Infinite, yoyo: true, ..PlayOptions::default() };
    let lift = TweenSpec::to(
        [node],
        &[num(Property::Y, -drift.lift()), num(Property::Rotation, drift.rotation + 8.0 * drift.amplitude())],
    )
    .duration(drift.duration)
    .ease(Easing::POWER1_IN_OUT);
    let sway = TweenSpec::to([node], &[num(Property::X, drift.sway())])
        .duration(drift.duration * 1.5)
        .ease(Easing::SINE_IN_OUT);
    [
        stage.build_play(&[lift], PlayOptions { delay: drift.delay, ..endless }),
        stage.build_play(&[sway], PlayOptions { delay: drift.delay * 0.5, ..endless }),
    ]
}

/// Background orbs behind the quiz card.
pub fn orb_drift(stage: &mut Stage, orbs: &[NodeId]) -> Vec<TimelineId> {
    orbs.iter()
        .enumerate()
        .map(|(i, orb)| {
            let i = i as f32;
            let spec = TweenSpec::to([*orb], &[num(Property::Y, -30.0 + i * 10.0), num(Property::X, 20.0 - i * 15.0)])
                .duration(3.0 + i)
                .ease(Easing::POWER1_IN_OUT);
            let options = PlayOptions { repeat: Repeat::Infinite, yoyo: true, ..PlayOptions::default() };
            stage.build_play(&[spec], options)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AgendaNodes {
    pub section: NodeId,
    /// Container around the heading lines; their reveal watches it.
    pub heading_block: NodeId,
    pub heading: Vec<NodeId>,
    pub track: NodeId,
    pub line: NodeId,
    pub cards: Vec<NodeId>,
    /// One timeline node per card, same order.
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SectionNodes {
    pub section: NodeId,
    pub heading: Vec<NodeId>,
    pub card: NodeId,
}

/// A laid-out copy of the event page, used by the replay tool and the tests.
#[derive(Debug, Clone)]
pub struct DemoPage {
    pub header: NodeId,
    pub hero: HeroNodes,
    pub divider: NodeId,
    pub asteroids: Vec<(NodeId, DriftSpec)>,
    pub agenda: AgendaNodes,
    pub quiz: SectionNodes,
    pub orbs: Vec<NodeId>,
    pub feedback: SectionNodes,
    pub footer: NodeId,
    pub footer_columns: Vec<NodeId>,
    pub height: f32,
}

const TITLE: &str = "CoMeT2025";
const AGENDA_CARDS: usize = 6;
const CARD_PITCH: f32 = 380.0;
const CARD_HEIGHT: f32 = 320.0;

impl DemoPage {
    /// Spawns and lays out every node. Heights are fixed; the hero fills one
    /// viewport.
    pub fn layout(stage: &mut Stage) -> Self {
        let viewport = stage.scroll().viewport_height;
        let header = stage.add_node("header", Rect::new(0.0, 72.0));

        let section = stage.add_node("hero", Rect::new(0.0, viewport));
        let content = stage.add_child(section, "hero-content", Rect::new(viewport * 0.25, viewport * 0.5));
        let copy_top = viewport * 0.25;
        let badge = stage.add_child(content, "hero-badge", Rect::new(copy_top, 40.0));
        let pre_title = stage.add_child(content, "hero-pre-title", Rect::new(copy_top + 64.0, 24.0));
        let letters = TITLE
            .chars()
            .enumerate()
            .map(|(i, ch)| stage.add_child(content, format!("hero-letter-{i}-{ch}"), Rect::new(copy_top + 112.0, 120.0)))
            .collect();
        let subtitle = stage.add_child(content, "hero-subtitle", Rect::new(copy_top + 256.0, 48.0));
        let buttons = (0..2)
            .map(|i| stage.add_child(content, format!("hero-button-{i}"), Rect::new(copy_top + 336.0, 52.0)))
            .collect();
        let hero = HeroNodes { section, content, badge, pre_title, letters, subtitle, buttons };

        let divider_top = viewport;
        let divider = stage.add_node("divider", Rect::new(divider_top, 240.0));
        let asteroids = DIVIDER_ASTEROIDS
            .iter()
            .enumerate()
            .map(|(i, drift)| {
                let node = stage.add_child(divider, format!("asteroid-{i}"), Rect::new(divider_top + 40.0, drift.size));
                stage.nodes_mut().set(node, Property::Rotation, PropValue::Number(drift.rotation));
                (node, *drift)
            })
            .collect();

        let agenda_top = divider_top + 240.0;
        let track_top = agenda_top + 240.0;
        let track_height = CARD_PITCH * AGENDA_CARDS as f32;
        let agenda_section = stage.add_node("agenda", Rect::new(agenda_top, 240.0 + track_height + 120.0));
        let heading_block = stage.add_child(agenda_section, "agenda-heading", Rect::new(agenda_top + 60.0, 140.0));
        let heading = (0..2)
            .map(|i| {
                let top = agenda_top + 80.0 + 60.0 * i as f32;
                stage.add_child(heading_block, format!("agenda-heading-{i}"), Rect::new(top, 60.0))
            })
            .collect();
        let track = stage.add_child(agenda_section, "agenda-track", Rect::new(track_top, track_height));
        let line = stage.add_child(track, "agenda-line", Rect::new(track_top, track_height));
        let mut cards = Vec::with_capacity(AGENDA_CARDS);
        let mut nodes = Vec::with_capacity(AGENDA_CARDS);
        for i in 0..AGENDA_CARDS {
            let top = track_top + CARD_PITCH * i as f32;
            cards.push(stage.add_child(track, format!("agenda-card-{i}"), Rect::new(top, CARD_HEIGHT)));
            nodes.push(stage.add_child(track, format!("agenda-node-{i}"), Rect::new(top + 24.0, 20.0)));
        }
        let agenda = AgendaNodes { section: agenda_section, heading_block, heading, track, line, cards, nodes };

        let quiz_top = agenda_top + 240.0 + track_height + 120.0;
        let quiz = Self::section(stage, "quiz", quiz_top, 900.0);
        let orbs = (0..3)
            .map(|i| stage.add_child(quiz.section, format!("quiz-orb-{i}"), Rect::new(quiz_top + 100.0, 300.0)))
            .collect();

        let feedback_top = quiz_top + 900.0;
        let feedback = Self::section(stage, "feedback", feedback_top, 800.0);

        let footer_top = feedback_top + 800.0;
        let footer = stage.add_node("footer", Rect::new(footer_top, 400.0));
        let footer_columns = (0..3)
            .map(|i| stage.add_child(footer, format!("footer-column-{i}"), Rect::new(footer_top + 60.0, 240.0)))
            .collect();

        Self {
            header,
            hero,
            divider,
            asteroids,
            agenda,
            quiz,
            orbs,
            feedback,
            footer,
            footer_columns,
            height: footer_top + 400.0,
        }
    }

    fn section(stage: &mut Stage, name: &str, top: f32, height: f32) -> SectionNodes {
        let section = stage.add_node(name, Rect::new(top, height));
        let heading = (0..2)
            .map(|i| stage.add_child(section, format!("{name}-heading-{i}"), Rect::new(top + 80.0, 60.0)))
            .collect();
        let card = stage.add_child(section, format!("{name}-card"), Rect::new(top + 260.0, 480.0));
        SectionNodes { section, heading, card }
    }

    /// Deepest offset the page can scroll to.
    pub fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.height - viewport_height).max(0.0)
    }

    /// Wires every preset, one child scope per section.
    pub fn wire(&self, stage: &mut Stage) -> Result<()> {
        stage.scope("hero", |stage| {
            hero_entrance(stage, &self.hero);
            hero_scroll(stage, &self.hero);
            Ok(())
        });
        stage.scope("header", |stage| {
            header_visibility(stage, self.header, self.agenda.section);
            Ok(())
        });
        stage.scope("divider", |stage| {
            for (node, drift) in &self.asteroids {
                floating_drift(stage, *node, drift);
            }
            Reveal::fade_up("divider", self.divider, &[self.divider], 0.0)
                .start(Threshold::new(0.0, 0.9))
                .duration(1.0)
                .build(stage);
            Ok(())
        });
        stage.scope("agenda", |stage| {
            Reveal::fade_up("agenda-heading", self.agenda.heading_block, &self.agenda.heading, 50.0).build(stage);
            agenda_line(stage, self.agenda.track, self.agenda.line);
            for (i, (card, node)) in self.agenda.cards.iter().zip(&self.agenda.nodes).enumerate() {
                let side = if i % 2 == 0 { -60.0 } else { 60.0 };
                Reveal::fade_up(format!("agenda-reveal-{i}"), *card, &[*card], 40.0)
                    .from(Property::X, side)
                    .from(Property::Scale, 0.95)
                    .start(Threshold::new(0.0, 0.85))
                    .build(stage);
                agenda_highlight(stage, i, *card, *node);
            }
            Ok(())
        });
        stage.scope("quiz", |stage| {
            orb_drift(stage, &self.orbs);
            Reveal::fade_up("quiz-content", self.quiz.section, &self.quiz.heading, 60.0)
                .start(Threshold::new(0.0, 0.7))
                .build(stage);
            Reveal::fade_up("quiz-card", self.quiz.card, &[self.quiz.card], 40.0)
                .from(Property::Scale, 0.9)
                .duration(1.0)
                .build(stage);
            Ok(())
        });
        stage.scope("feedback", |stage| {
            Reveal::fade_up("feedback-heading", self.feedback.section, &self.feedback.heading, 40.0).build(stage);
            Reveal::fade_up("feedback-card", self.feedback.card, &[self.feedback.card], 60.0)
                .from(Property::Scale, 0.95)
                .start(Threshold::new(0.0, 0.75))
                .duration(1.0)
                .build(stage);
            Ok(())
        });
        stage.scope("footer", |stage| {
            Reveal::fade_up("footer", self.footer, &self.footer_columns, 30.0)
                .start(Threshold::new(0.0, 0.9))
                .stagger(0.1)
                .build(stage);
            Ok(())
        });
        Ok(())
    }
}
