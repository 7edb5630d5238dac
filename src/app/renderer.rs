use super::*;

/// Resolved drawing parameters shared by every particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStyle {
    pub accent: Color,
    pub line_width: f32,
    pub trail_alpha: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            accent: Color::from_hex(0x00A3FF),
            line_width: config::DEFAULT_LINE_WIDTH,
            trail_alpha: config::DEFAULT_TRAIL_ALPHA,
        }
    }
}

impl RenderStyle {
    pub fn from_config(config: &StarfieldConfig) -> Result<Self, StarfieldError> {
        Ok(Self {
            accent: config.accent()?,
            line_width: config.constellation_line_width,
            trail_alpha: config.trail_alpha,
        })
    }
}

/// Paints one frame: the translucent trail wash, then constellations, then
/// stars on top.
pub fn render(surface: &mut dyn Surface, field: &ParticleField, style: &RenderStyle) {
    // Overdraw instead of clearing so previous frames fade into trails.
    surface.fill_rect(
        Vec2::ZERO,
        field.viewport().size,
        Color::BLACK.with_alpha(style.trail_alpha),
    );

    for constellation in field.constellations() {
        constellation.draw(surface, style);
    }
    for star in field.stars() {
        star.draw(surface, style);
    }
}
