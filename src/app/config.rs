use super::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STAR_COUNT: usize = 200;
pub const DEFAULT_CONSTELLATION_COUNT: usize = 3;
pub const DEFAULT_ACCENT: &str = "#00A3FF";
pub const DEFAULT_TRAIL_ALPHA: f32 = 0.05;
pub const DEFAULT_LINE_WIDTH: f32 = 2.5;

/// Tuning knobs for a starfield instance. Every field has a default, so a
/// partial JSON document is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub star_count: usize,
    pub constellation_count: usize,
    /// Applied to drift speeds every time stars are generated.
    pub speed_multiplier: f32,
    /// Stroke width of a constellation at full opacity.
    pub constellation_line_width: f32,
    pub accent_color: String,
    pub trail_alpha: f32,
    pub seed: Option<u64>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            star_count: DEFAULT_STAR_COUNT,
            constellation_count: DEFAULT_CONSTELLATION_COUNT,
            speed_multiplier: 1.,
            constellation_line_width: DEFAULT_LINE_WIDTH,
            accent_color: DEFAULT_ACCENT.into(),
            trail_alpha: DEFAULT_TRAIL_ALPHA,
            seed: None,
        }
    }
}

impl StarfieldConfig {
    pub fn from_json(text: &str) -> Result<Self, StarfieldError> {
        let config: StarfieldConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StarfieldError> {
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.) {
            return Err(StarfieldError::InvalidConfig(format!(
                "speed_multiplier must be positive, got {}",
                self.speed_multiplier
            )));
        }
        if !(self.constellation_line_width.is_finite() && self.constellation_line_width >= 0.) {
            return Err(StarfieldError::InvalidConfig(format!(
                "constellation_line_width must be non-negative, got {}",
                self.constellation_line_width
            )));
        }
        if !(0. ..=1.).contains(&self.trail_alpha) {
            return Err(StarfieldError::InvalidConfig(format!(
                "trail_alpha must be within [0, 1], got {}",
                self.trail_alpha
            )));
        }
        self.accent()?;
        Ok(())
    }

    pub fn accent(&self) -> Result<Color, StarfieldError> {
        Color::from_css_hex(&self.accent_color).ok_or_else(|| {
            StarfieldError::InvalidConfig(format!("accent_color {:?} is not #RRGGBB", self.accent_color))
        })
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
