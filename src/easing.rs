use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Shape of an easing family. `Power(n)` raises progress to `n + 1`, so
/// `power1` is quadratic and `power3` quartic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Power(u8),
    Sine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum Easing {
    #[default]
    Linear,
    In(Curve),
    Out(Curve),
    InOut(Curve),
}

impl Easing {
    pub const POWER3_OUT: Easing = Easing::Out(Curve::Power(3));
    pub const POWER2_OUT: Easing = Easing::Out(Curve::Power(2));
    pub const POWER1_IN_OUT: Easing = Easing::InOut(Curve::Power(1));
    pub const SINE_IN_OUT: Easing = Easing::InOut(Curve::Sine);

    /// Maps linear progress to eased progress. Input is clamped to [0, 1] and the
    /// endpoints are returned exactly so tweens land on their declared values.
    pub fn apply(self, t: f32) -> f32 {
        if !(t > 0.0) {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        let eased = match self {
            Easing::Linear => t,
            Easing::In(curve) => ease_in(curve, t),
            Easing::Out(curve) => 1.0 - ease_in(curve, 1.0 - t),
            Easing::InOut(curve) => {
                if t < 0.5 {
                    ease_in(curve, t * 2.0) * 0.5
                } else {
                    1.0 - ease_in(curve, (1.0 - t) * 2.0) * 0.5
                }
            }
        };
        eased.clamp(0.0, 1.0)
    }
}

fn ease_in(curve: Curve, t: f32) -> f32 {
    match curve {
        Curve::Power(power) => t.powi(i32::from(power) + 1),
        Curve::Sine => 1.0 - (t * PI * 0.5).cos(),
    }
}

impl FromStr for Easing {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        if matches!(lowered.as_str(), "none" | "linear") {
            return Ok(Easing::Linear);
        }
        let (family, variant) = lowered.split_once('.').unwrap_or((lowered.as_str(), "out"));
        let curve = match family {
            "sine" => Curve::Sine,
            "power0" => return Ok(Easing::Linear),
            "power1" | "quad" => Curve::Power(1),
            "power2" | "cubic" => Curve::Power(2),
            "power3" | "quart" => Curve::Power(3),
            "power4" | "quint" | "strong" => Curve::Power(4),
            other => bail!("Unknown easing family '{other}'"),
        };
        match variant {
            "in" => Ok(Easing::In(curve)),
            "out" => Ok(Easing::Out(curve)),
            "inout" => Ok(Easing::InOut(curve)),
            other => Err(anyhow!("Unknown easing variant '{other}' in '{value}'")),
        }
    }
}

impl TryFrom<String> for Easing {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (curve, variant) = match self {
            Easing::Linear => return f.write_str("none"),
            Easing::In(curve) => (curve, "in"),
            Easing::Out(curve) => (curve, "out"),
            Easing::InOut(curve) => (curve, "inOut"),
        };
        match curve {
            Curve::Power(power) => write!(f, "power{power}.{variant}"),
            Curve::Sine => write!(f, "sine.{variant}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 7] = [
        Easing::Linear,
        Easing::POWER3_OUT,
        Easing::POWER2_OUT,
        Easing::POWER1_IN_OUT,
        Easing::SINE_IN_OUT,
        Easing::In(Curve::Power(4)),
        Easing::Out(Curve::Sine),
    ];

    #[test]
    fn endpoints_are_exact() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{easing} at 0");
            assert_eq!(easing.apply(1.0), 1.0, "{easing} at 1");
            assert_eq!(easing.apply(-3.0), 0.0, "{easing} below range");
            assert_eq!(easing.apply(7.5), 1.0, "{easing} above range");
            assert_eq!(easing.apply(f32::NAN), 0.0, "{easing} NaN");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for easing in ALL {
            let mut previous = 0.0;
            for step in 0..=1000 {
                let value = easing.apply(step as f32 / 1000.0);
                assert!(value >= previous, "{easing} decreased at step {step}");
                previous = value;
            }
        }
    }

    #[test]
    fn parses_page_easing_names() {
        assert_eq!("power3.out".parse::<Easing>().unwrap(), Easing::POWER3_OUT);
        assert_eq!("power1.inOut".parse::<Easing>().unwrap(), Easing::POWER1_IN_OUT);
        assert_eq!("sine.inOut".parse::<Easing>().unwrap(), Easing::SINE_IN_OUT);
        assert_eq!("none".parse::<Easing>().unwrap(), Easing::Linear);
        assert_eq!("power2".parse::<Easing>().unwrap(), Easing::POWER2_OUT);
        assert!("bounce.out".parse::<Easing>().is_err());
        assert_eq!(Easing::POWER1_IN_OUT.to_string(), "power1.inOut");
    }

    #[test]
    fn power_out_matches_closed_form() {
        let t = 0.3_f32;
        let expected = 1.0 - (1.0 - t).powi(4);
        assert!((Easing::POWER3_OUT.apply(t) - expected).abs() < 1e-6);
    }
}
