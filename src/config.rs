use crate::choreography::LeaveStyle;
use crate::easing::Easing;
use crate::populate::PopulationSpec;
use crate::timeline::{DEFAULT_DURATION, DEFAULT_EASING, DEFAULT_STAGGER};
use crate::trigger::Threshold;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "TimelineConfig::default_easing")]
    pub easing: Easing,
    #[serde(default = "TimelineConfig::default_stagger")]
    pub stagger: f32,
    #[serde(default = "TimelineConfig::default_duration")]
    pub duration: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "TriggerConfig::default_entry")]
    pub entry: Threshold,
    #[serde(default = "TriggerConfig::default_exit")]
    pub exit: Threshold,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    #[serde(default)]
    pub leave_style: LeaveStyle,
    #[serde(default = "HighlightConfig::default_card_scale")]
    pub card_scale: f32,
    #[serde(default = "HighlightConfig::default_node_scale")]
    pub node_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_pointer_gain")]
    pub pointer_gain: [f32; 2],
    #[serde(default = "CameraConfig::default_lerp")]
    pub lerp: f32,
    #[serde(default = "CameraConfig::default_look_at")]
    pub look_at: [f32; 3],
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default = "CameraConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    /// Fixed population seed. Each mount draws a fresh one when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "SceneConfig::default_canvas")]
    pub canvas: [u32; 2],
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageConfig {
    #[serde(default)]
    pub population: PopulationSpec,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, Default)]
pub struct StageConfigOverrides {
    pub seed: Option<u64>,
    pub viewport_height: Option<u32>,
}

impl TimelineConfig {
    fn default_easing() -> Easing {
        DEFAULT_EASING
    }

    const fn default_stagger() -> f32 {
        DEFAULT_STAGGER
    }

    const fn default_duration() -> f32 {
        DEFAULT_DURATION
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            easing: Self::default_easing(),
            stagger: Self::default_stagger(),
            duration: Self::default_duration(),
        }
    }
}

impl TriggerConfig {
    const fn default_entry() -> Threshold {
        Threshold { element: 0.0, viewport: 0.8 }
    }

    const fn default_exit() -> Threshold {
        Threshold::BOTTOM_TOP
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { entry: Self::default_entry(), exit: Self::default_exit() }
    }
}

impl HighlightConfig {
    const fn default_card_scale() -> f32 {
        1.02
    }

    const fn default_node_scale() -> f32 {
        1.5
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            leave_style: LeaveStyle::default(),
            card_scale: Self::default_card_scale(),
            node_scale: Self::default_node_scale(),
        }
    }
}

impl CameraConfig {
    const fn default_pointer_gain() -> [f32; 2] {
        [0.3, 0.2]
    }

    const fn default_lerp() -> f32 {
        0.02
    }

    const fn default_look_at() -> [f32; 3] {
        [0.0, 0.0, -15.0]
    }

    const fn default_position() -> [f32; 3] {
        [0.0, 0.0, 5.0]
    }

    const fn default_fov_degrees() -> f32 {
        60.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        1000.0
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            pointer_gain: Self::default_pointer_gain(),
            lerp: Self::default_lerp(),
            look_at: Self::default_look_at(),
            position: Self::default_position(),
            fov_degrees: Self::default_fov_degrees(),
            near: Self::default_near(),
            far: Self::default_far(),
        }
    }
}

impl SceneConfig {
    const fn default_canvas() -> [u32; 2] {
        [1280, 800]
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self { seed: None, canvas: Self::default_canvas() }
    }
}

impl StageConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &StageConfigOverrides) {
        if let Some(seed) = overrides.seed {
            self.scene.seed = Some(seed);
        }
        if let Some(height) = overrides.viewport_height {
            self.scene.canvas[1] = height;
        }
    }

    pub fn viewport_height(&self) -> f32 {
        self.scene.canvas[1] as f32
    }
}

impl StageConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.seed.is_none() && self.viewport_height.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.seed.is_some() {
            fields.push("seed");
        }
        if self.viewport_height.is_some() {
            fields.push("viewport");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionClass;
    use std::io::Write;

    #[test]
    fn defaults_match_the_hero_page() {
        let cfg = StageConfig::default();
        assert_eq!(cfg.population.total(), 3_500 + 60 + 40 + 4 + 5 + 4);
        assert_eq!(cfg.timeline.easing, Easing::POWER3_OUT);
        assert_eq!(cfg.triggers.entry, "top 80%".parse::<Threshold>().unwrap());
        assert_eq!(cfg.highlight.leave_style, LeaveStyle::Dim { opacity: 0.6 });
        assert_eq!(cfg.camera.look_at, [0.0, 0.0, -15.0]);
        assert!(cfg.scene.seed.is_none());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "population": {{ "classes": [ {{ "class": "ice_comet", "count": 2 }} ] }},
                "timeline": {{ "easing": "sine.inOut" }},
                "triggers": {{ "entry": "top 70%" }},
                "highlight": {{ "leave_style": "reset" }},
                "scene": {{ "seed": 42 }}
            }}"#
        )
        .expect("write config");
        let cfg = StageConfig::load(file.path()).expect("load config");
        assert_eq!(cfg.population.classes.len(), 1);
        assert_eq!(cfg.population.classes[0].class, MotionClass::IceComet);
        assert_eq!(cfg.timeline.easing, Easing::SINE_IN_OUT);
        assert_eq!(cfg.timeline.stagger, DEFAULT_STAGGER);
        assert_eq!(cfg.triggers.entry, Threshold::new(0.0, 0.7));
        assert_eq!(cfg.triggers.exit, Threshold::BOTTOM_TOP);
        assert_eq!(cfg.highlight.leave_style, LeaveStyle::Reset);
        assert_eq!(cfg.scene.seed, Some(42));
        assert_eq!(cfg.camera.pointer_gain, [0.3, 0.2]);
    }

    #[test]
    fn bad_threshold_is_a_load_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "triggers": {{ "entry": "sideways" }} }}"#).expect("write config");
        let err = StageConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:?}").contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = StageConfig::load_or_default(dir.path().join("absent.json"));
        assert_eq!(cfg.timeline.duration, DEFAULT_DURATION);
    }

    #[test]
    fn overrides_apply_seed_and_viewport() {
        let mut cfg = StageConfig::default();
        let overrides = StageConfigOverrides { seed: Some(7), viewport_height: Some(900) };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.scene.seed, Some(7));
        assert_eq!(cfg.viewport_height(), 900.0);
        assert_eq!(overrides.applied_fields(), vec!["seed", "viewport"]);
    }
}
