use super::*;

use strum::{EnumCount, IntoEnumIterator};

pub const Z_MAX: f32 = 1000.;

const RADIUS_MIN: f32 = 0.5;
const RADIUS_MAX: f32 = 2.5;
const DRIFT_SPEED_MIN: f32 = 0.1;
const DRIFT_SPEED_MAX: f32 = 0.5;
const OPACITY_MIN: f32 = 0.2;

const TWINKLE_RATE: f64 = 0.02;
const SPATIAL_PHASE: f64 = 0.01;

const MIN_VISIBLE_SIZE: f32 = 0.1;
const MIN_VISIBLE_ALPHA: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIter, strum::EnumCount)]
pub enum StarColor {
    White,
    Azure,
    Amber,
    Silver,
    Mint,
}

impl StarColor {
    pub fn color(self) -> Color {
        Color::from_hex(match self {
            StarColor::White => 0xFFFFFF,
            StarColor::Azure => 0x00A3FF,
            StarColor::Amber => 0xFFA500,
            StarColor::Silver => 0xCCCCCC,
            StarColor::Mint => 0x00FF88,
        })
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StarColor::iter()
            .nth(rng.gen_range(0..StarColor::COUNT))
            .unwrap_or(StarColor::White)
    }
}

/// Fraction of full size a star at `depth` is drawn with: 0 at the far plane,
/// 1 at the viewer.
pub fn depth_scale(depth: f32) -> f32 {
    ((Z_MAX - depth) / Z_MAX).clamp(0., 1.)
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundStar {
    pub pos: Vec2,
    pub depth: f32,
    pub radius: f32,
    pub drift_speed: f32,
    pub opacity: f32,
    pub color: StarColor,
}

impl BackgroundStar {
    pub fn random<R: Rng + ?Sized>(viewport: &Viewport, rng: &mut R) -> Self {
        let pos = viewport.random_point(rng);
        // gen() is in [0, 1), so depth lands in (0, Z_MAX]
        let depth = Z_MAX - rng.gen::<f32>() * Z_MAX;
        let radius = rng.gen::<f32>() * (RADIUS_MAX - RADIUS_MIN) + RADIUS_MIN;
        let drift_speed = rng.gen::<f32>() * (DRIFT_SPEED_MAX - DRIFT_SPEED_MIN) + DRIFT_SPEED_MIN;
        let opacity = rng.gen::<f32>() * (1. - OPACITY_MIN) + OPACITY_MIN;

        BackgroundStar {
            pos,
            depth,
            radius,
            drift_speed,
            opacity,
            color: StarColor::random(rng),
        }
    }

    pub fn scale(&self) -> f32 {
        depth_scale(self.depth)
    }

    pub fn respawn<R: Rng + ?Sized>(&mut self, viewport: &Viewport, rng: &mut R) {
        self.depth = Z_MAX;
        self.pos = viewport.random_point(rng);
    }

    fn twinkle(&self, clock: f64) -> f32 {
        (0.5 + 0.5 * (clock * TWINKLE_RATE + self.pos.x as f64 * SPATIAL_PHASE).sin()) as f32
    }
}

impl Particle for BackgroundStar {
    fn update(&mut self, frame: &FrameTime, viewport: &Viewport, rng: &mut StdRng) {
        self.depth -= self.drift_speed;
        if self.depth <= 0. {
            self.respawn(viewport, rng);
        }
        self.opacity = self.twinkle(frame.clock);
    }

    fn draw(&self, surface: &mut dyn Surface, _style: &RenderStyle) {
        let scale = self.scale();
        let size = self.radius * scale;
        let alpha = self.opacity * scale;

        if size < MIN_VISIBLE_SIZE || alpha < MIN_VISIBLE_ALPHA {
            return;
        }

        let color = self.color.color();
        let glow = (size > 1.).then(|| Glow {
            color,
            blur: size * 2.,
        });
        surface.fill_circle(self.pos, size, color.with_alpha(alpha), glow);
    }
}

pub fn generate<R: Rng + ?Sized>(count: usize, viewport: &Viewport, rng: &mut R) -> Vec<BackgroundStar> {
    (0..count)
        .map(|_| BackgroundStar::random(viewport, rng))
        .collect()
}
