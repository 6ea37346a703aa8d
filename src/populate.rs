use crate::motion::{DriftParams, FloatParams, MotionClass, MotionObject, MotionPath, OrbitParams, ShapeKind};
use anyhow::{anyhow, bail, Result};
use glam::{EulerRot, Quat, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f32) -> Self {
        Self { min: value, max: value }
    }

    /// Symmetric range `[-half, half]`.
    pub const fn centered(half: f32) -> Self {
        Self { min: -half, max: half }
    }

    pub fn sanitized(self) -> Self {
        let min = if self.min.is_finite() { self.min } else { 0.0 };
        let max = if self.max.is_finite() { self.max } else { min };
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// sRGB colour parsed from `#rrggbb` / `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color(pub Vec4);

impl Color {
    pub const fn rgb(hex: u32) -> Self {
        Self(Vec4::new(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
            1.0,
        ))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let digits = value.trim().strip_prefix('#').ok_or_else(|| anyhow!("Colour '{value}' must start with '#'"))?;
        let raw = u32::from_str_radix(digits, 16).map_err(|err| anyhow!("Invalid colour '{value}': {err}"))?;
        match digits.len() {
            6 => Ok(Self::rgb(raw)),
            8 => {
                let mut color = Self::rgb(raw >> 8);
                color.0.w = (raw & 0xff) as f32 / 255.0;
                Ok(color)
            }
            _ => bail!("Colour '{value}' must have 6 or 8 hex digits"),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let [r, g, b, a] = (self.0.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round().to_array().map(|c| c as u32);
        serializer.serialize_str(&format!("#{r:02x}{g:02x}{b:02x}{a:02x}"))
    }
}

pub const VIOLET: Color = Color::rgb(0x7c3aed);
pub const CYAN: Color = Color::rgb(0x06b6d4);
pub const PINK: Color = Color::rgb(0xec4899);
pub const LAVENDER: Color = Color::rgb(0xa78bfa);
pub const ICE: Color = Color::rgb(0x67e8f9);
pub const BLUSH: Color = Color::rgb(0xf9a8d4);
pub const DEEP_VIOLET: Color = Color::rgb(0x4c1d95);
pub const WARM_TRAIL: Color = Color::rgb(0xfef3c7);

/// Ranges every attribute of one class is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRanges {
    pub x: ParamRange,
    pub y: ParamRange,
    pub z: ParamRange,
    pub scale: ParamRange,
    pub opacity: ParamRange,
    pub speed: ParamRange,
    pub float_intensity: ParamRange,
    pub rotation_intensity: f32,
    pub radius: ParamRange,
    pub phase: ParamRange,
    pub tilt: ParamRange,
    pub orbit_tilt: ParamRange,
    pub depth_offset: f32,
    pub depth_clamp: f32,
    pub anchor: [f32; 3],
    pub group_spin: [f32; 3],
    pub pointer_tilt: f32,
    /// Tumble rate multipliers applied to the drawn speed, per axis (x, y).
    pub tumble: [f32; 2],
    pub random_rotation: bool,
    /// Uniform pick; repeat an entry to weight it.
    pub palette: Vec<Color>,
    #[serde(default)]
    pub shapes: Vec<ShapeKind>,
}

impl ClassRanges {
    fn base(palette: Vec<Color>) -> Self {
        Self {
            x: ParamRange::fixed(0.0),
            y: ParamRange::fixed(0.0),
            z: ParamRange::fixed(0.0),
            scale: ParamRange::fixed(1.0),
            opacity: ParamRange::fixed(1.0),
            speed: ParamRange::fixed(0.0),
            float_intensity: ParamRange::fixed(0.0),
            rotation_intensity: 0.0,
            radius: ParamRange::fixed(1.0),
            phase: ParamRange::fixed(0.0),
            tilt: ParamRange::fixed(0.0),
            orbit_tilt: ParamRange::fixed(0.0),
            depth_offset: 0.0,
            depth_clamp: 0.0,
            anchor: [0.0; 3],
            group_spin: [0.0; 3],
            pointer_tilt: 0.0,
            tumble: [0.0; 2],
            random_rotation: false,
            palette,
            shapes: Vec::new(),
        }
    }

    pub fn particle_field() -> Self {
        Self {
            x: ParamRange::centered(20.0),
            y: ParamRange::centered(20.0),
            z: ParamRange::new(-30.0, 10.0),
            scale: ParamRange::fixed(0.02),
            group_spin: [0.0, 0.01, 0.0],
            pointer_tilt: 0.05,
            ..Self::base(vec![LAVENDER])
        }
    }

    pub fn floating_shapes() -> Self {
        Self {
            x: ParamRange::centered(20.0),
            y: ParamRange::centered(15.0),
            z: ParamRange::new(-35.0, -10.0),
            scale: ParamRange::new(0.15, 0.65),
            opacity: ParamRange::fixed(0.3),
            speed: ParamRange::new(0.2, 0.8),
            float_intensity: ParamRange::new(0.2, 0.6),
            rotation_intensity: 0.6,
            phase: ParamRange::new(0.0, 10_000.0),
            group_spin: [0.0, 0.015, 0.0],
            random_rotation: true,
            shapes: ShapeKind::ALL.to_vec(),
            ..Self::base(vec![VIOLET, VIOLET, CYAN, PINK])
        }
    }

    pub fn debris() -> Self {
        Self {
            x: ParamRange::centered(17.5),
            y: ParamRange::centered(12.5),
            z: ParamRange::new(-28.0, -8.0),
            scale: ParamRange::new(0.05, 0.17),
            opacity: ParamRange::fixed(0.5),
            speed: ParamRange::new(0.25, 0.65),
            float_intensity: ParamRange::fixed(0.4),
            rotation_intensity: 1.0,
            phase: ParamRange::new(0.0, 10_000.0),
            tumble: [1.0, 0.6],
            shapes: vec![ShapeKind::Octahedron],
            ..Self::base(vec![LAVENDER, ICE, BLUSH])
        }
    }

    pub fn nebula() -> Self {
        Self {
            x: ParamRange::centered(8.0),
            y: ParamRange::new(-5.0, 6.0),
            z: ParamRange::new(-8.0, 0.0),
            scale: ParamRange::new(20.0, 35.0),
            opacity: ParamRange::new(0.04, 0.08),
            anchor: [0.0, 0.0, -35.0],
            group_spin: [0.0, 0.0, 0.005],
            ..Self::base(vec![VIOLET, CYAN, PINK, DEEP_VIOLET])
        }
    }

    pub fn warm_comet() -> Self {
        Self {
            scale: ParamRange::fixed(0.15),
            speed: ParamRange::new(0.12, 0.28),
            radius: ParamRange::new(12.0, 20.0),
            phase: ParamRange::new(0.0, TAU),
            tilt: ParamRange::new(0.0, 2.0),
            orbit_tilt: ParamRange::new(-0.5, 0.8),
            depth_offset: -20.0,
            depth_clamp: -15.0,
            ..Self::base(vec![WARM_TRAIL])
        }
    }

    pub fn ice_comet() -> Self {
        Self {
            scale: ParamRange::fixed(0.1),
            speed: ParamRange::new(0.18, 0.32),
            radius: ParamRange::new(10.0, 17.0),
            phase: ParamRange::new(0.0, TAU),
            orbit_tilt: ParamRange::new(-0.8, 1.2),
            depth_offset: -18.0,
            depth_clamp: -12.0,
            ..Self::base(vec![ICE])
        }
    }

    pub fn for_class(class: MotionClass) -> Self {
        match class {
            MotionClass::Particle => Self::particle_field(),
            MotionClass::DebrisShape => Self::floating_shapes(),
            MotionClass::WarmComet => Self::warm_comet(),
            MotionClass::IceComet => Self::ice_comet(),
            MotionClass::NebulaPanel => Self::nebula(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub class: MotionClass,
    pub count: usize,
    #[serde(default)]
    pub ranges: Option<ClassRanges>,
}

impl ClassSpec {
    pub fn new(class: MotionClass, count: usize) -> Self {
        Self { class, count, ranges: None }
    }

    pub fn with_ranges(class: MotionClass, count: usize, ranges: ClassRanges) -> Self {
        Self { class, count, ranges: Some(ranges) }
    }

    pub fn ranges(&self) -> ClassRanges {
        self.ranges.clone().unwrap_or_else(|| ClassRanges::for_class(self.class))
    }

    /// Draws `count` objects of this class, numbering them from `next_id`.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R, next_id: &mut u32) -> Vec<MotionObject> {
        let ranges = self.ranges();
        let mut objects = Vec::with_capacity(self.count);
        for _ in 0..self.count {
            objects.push(draw_object(self.class, &ranges, rng, *next_id));
            *next_id = next_id.wrapping_add(1);
        }
        objects
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub classes: Vec<ClassSpec>,
}

impl Default for PopulationSpec {
    fn default() -> Self {
        Self::hero()
    }
}

impl PopulationSpec {
    /// The hero backdrop: dust field, floating shapes, debris, nebula glow and
    /// two comet families.
    pub fn hero() -> Self {
        Self {
            classes: vec![
                ClassSpec::new(MotionClass::Particle, 3_500),
                ClassSpec::new(MotionClass::DebrisShape, 60),
                ClassSpec::with_ranges(MotionClass::DebrisShape, 40, ClassRanges::debris()),
                ClassSpec::new(MotionClass::NebulaPanel, 4),
                ClassSpec::new(MotionClass::WarmComet, 5),
                ClassSpec::new(MotionClass::IceComet, 4),
            ],
        }
    }

    pub fn total(&self) -> usize {
        self.classes.iter().map(|class| class.count).sum()
    }
}

/// Builds a population from an explicit seed. The same seed and spec always
/// produce the same objects; ids restart at zero on every call.
pub fn generate(seed: u64, spec: &PopulationSpec) -> Vec<MotionObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut next_id = 0u32;
    let mut objects = Vec::with_capacity(spec.total());
    for class in &spec.classes {
        objects.extend(class.build(&mut rng, &mut next_id));
    }
    objects
}

/// Seed for a mount that was not given one.
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen()
}

pub fn class_histogram(objects: &[MotionObject]) -> HashMap<MotionClass, usize> {
    let mut histogram = HashMap::new();
    for object in objects {
        *histogram.entry(object.class).or_insert(0) += 1;
    }
    histogram
}

fn draw_object<R: Rng + ?Sized>(class: MotionClass, ranges: &ClassRanges, rng: &mut R, id: u32) -> MotionObject {
    let speed = ranges.speed.sanitized().sample(rng);
    let scale = ranges.scale.sanitized().sample(rng).max(1e-3);
    let opacity = ranges.opacity.sanitized().sample(rng).clamp(0.0, 1.0);
    let color = pick(&ranges.palette, rng).map(|color| color.0).unwrap_or(Vec4::ONE);

    let path = match class {
        MotionClass::WarmComet | MotionClass::IceComet => {
            let params = OrbitParams {
                radius: ranges.radius.sanitized().sample(rng),
                speed,
                phase: ranges.phase.sanitized().sample(rng),
                tilt: ranges.tilt.sanitized().sample(rng),
                orbit_tilt: ranges.orbit_tilt.sanitized().sample(rng),
                direction: if rng.gen_bool(0.5) { 1.0 } else { -1.0 },
                depth_offset: ranges.depth_offset,
                depth_clamp: ranges.depth_clamp,
            };
            if class == MotionClass::WarmComet {
                MotionPath::WarmOrbit(params)
            } else {
                MotionPath::IceOrbit(params)
            }
        }
        MotionClass::Particle | MotionClass::DebrisShape | MotionClass::NebulaPanel => {
            let base = Vec3::new(
                ranges.x.sanitized().sample(rng),
                ranges.y.sanitized().sample(rng),
                ranges.z.sanitized().sample(rng),
            );
            let base_rotation = if ranges.random_rotation {
                Quat::from_euler(EulerRot::XYZ, rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU))
            } else {
                Quat::IDENTITY
            };
            MotionPath::Drift(DriftParams {
                anchor: Vec3::from_array(ranges.anchor),
                base,
                base_rotation,
                group_spin: Vec3::from_array(ranges.group_spin),
                pointer_tilt: ranges.pointer_tilt,
                float: FloatParams {
                    speed,
                    float_intensity: ranges.float_intensity.sanitized().sample(rng),
                    rotation_intensity: ranges.rotation_intensity,
                    phase: ranges.phase.sanitized().sample(rng),
                },
                tumble: Vec2::from_array(ranges.tumble) * speed,
            })
        }
    };

    MotionObject {
        id,
        class,
        path: path.sanitized(),
        color,
        scale,
        opacity,
        shape: pick(&ranges.shapes, rng).copied(),
    }
}

fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.gen_range(0..items.len()))
    }
}
