use super::*;

use super::background_star::{self, BackgroundStar};
use super::constellation::{self, Constellation};

/// Timing for a single animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous frame, 0 for the first frame after (re)starting.
    pub elapsed: f32,
    /// Monotonic clock in seconds; drives twinkle and pulse phases.
    pub clock: f64,
}

impl FrameTime {
    pub fn new(elapsed: f32, clock: f64) -> Self {
        Self { elapsed, clock }
    }
}

pub trait Particle {
    fn update(&mut self, frame: &FrameTime, viewport: &Viewport, rng: &mut StdRng);
    fn draw(&self, surface: &mut dyn Surface, style: &RenderStyle);
}

/// Stars and constellation groups for one viewport geometry.
pub struct ParticleField {
    stars: Vec<BackgroundStar>,
    constellations: Vec<Constellation>,
    viewport: Viewport,
    rng: StdRng,
}

impl ParticleField {
    pub fn generate(
        viewport: Viewport,
        star_count: usize,
        constellation_count: usize,
        mut rng: StdRng,
    ) -> Self {
        let stars = background_star::generate(star_count, &viewport, &mut rng);
        let constellations = constellation::generate(constellation_count, &viewport, &mut rng);
        Self {
            stars,
            constellations,
            viewport,
            rng,
        }
    }

    /// Replaces both collections for a new geometry.
    pub fn regenerate(&mut self, viewport: Viewport, star_count: usize, constellation_count: usize) {
        self.viewport = viewport;
        self.stars = background_star::generate(star_count, &viewport, &mut self.rng);
        self.constellations = constellation::generate(constellation_count, &viewport, &mut self.rng);
    }

    /// Replaces the stars only; constellations are kept.
    pub fn regenerate_stars(&mut self, star_count: usize) {
        self.stars = background_star::generate(star_count, &self.viewport, &mut self.rng);
    }

    pub fn update(&mut self, frame: FrameTime) {
        for star in &mut self.stars {
            star.update(&frame, &self.viewport, &mut self.rng);
        }
        for constellation in &mut self.constellations {
            constellation.update(&frame, &self.viewport, &mut self.rng);
        }
    }

    /// Multiplies every drift speed in place without respawning.
    pub fn scale_drift_speeds(&mut self, multiplier: f32) {
        for star in &mut self.stars {
            star.drift_speed *= multiplier;
        }
    }

    pub fn stars(&self) -> &[BackgroundStar] {
        &self.stars
    }
    pub fn stars_mut(&mut self) -> &mut [BackgroundStar] {
        &mut self.stars
    }
    pub fn constellations(&self) -> &[Constellation] {
        &self.constellations
    }
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}
