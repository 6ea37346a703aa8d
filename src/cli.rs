use crate::config::StageConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/stage.json";
pub const DEFAULT_STEP: f32 = 120.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayArgs {
    config: Option<PathBuf>,
    seed: Option<u64>,
    viewport: Option<u32>,
    step: Option<f32>,
}

impl ReplayArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ReplayArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // program name
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Use --config/--seed/--viewport/--step with values.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => parsed.config = Some(PathBuf::from(value)),
                "seed" => {
                    parsed.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "viewport" => {
                    let height = value.parse::<u32>().with_context(|| format!("Invalid viewport '{value}'"))?;
                    if height == 0 {
                        bail!("Viewport height must be positive");
                    }
                    parsed.viewport = Some(height);
                }
                "step" => {
                    let step = value.parse::<f32>().with_context(|| format!("Invalid step '{value}'"))?;
                    if !(step.is_finite() && step > 0.0) {
                        bail!("Scroll step must be a positive number of pixels, got '{value}'");
                    }
                    parsed.step = Some(step);
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --seed, --viewport, --step."),
            }
        }
        Ok(parsed)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn step(&self) -> f32 {
        self.step.unwrap_or(DEFAULT_STEP)
    }

    pub fn config_overrides(&self) -> StageConfigOverrides {
        StageConfigOverrides { seed: self.seed, viewport_height: self.viewport }
    }
}
