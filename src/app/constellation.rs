use super::*;

use std::f32::consts::TAU;

pub const MIN_POINTS: usize = 3;
pub const MAX_POINTS: usize = 7;

const RADIUS_MIN: f32 = 50.;
const RADIUS_MAX: f32 = 150.;
const ANGLE_JITTER: f32 = 0.5;
const OPACITY_MIN: f32 = 0.1;
const OPACITY_MAX: f32 = 0.4;

const PULSE_BASE: f64 = 0.2;
const PULSE_AMPLITUDE: f64 = 0.1;
const PULSE_RATE: f64 = 0.5;

/// A faint poly-line loosely arranged around a random center.
#[derive(Clone, Debug, PartialEq)]
pub struct Constellation {
    points: Vec<Vec2>,
    pub opacity: f32,
}

impl Constellation {
    pub fn new(points: Vec<Vec2>, opacity: f32) -> Self {
        Self { points, opacity }
    }

    pub fn random<R: Rng + ?Sized>(viewport: &Viewport, rng: &mut R) -> Self {
        let count = rng.gen_range(MIN_POINTS..=MAX_POINTS);
        let center = viewport.random_point(rng);
        let radius = rng.gen::<f32>() * (RADIUS_MAX - RADIUS_MIN) + RADIUS_MIN;

        let points = (0..count)
            .map(|j| {
                let angle = j as f32 / count as f32 * TAU + rng.gen::<f32>() * ANGLE_JITTER;
                let distance = rng.gen::<f32>() * radius;
                center + Vec2::from_angle(angle) * distance
            })
            .collect();

        Self {
            points,
            opacity: rng.gen::<f32>() * (OPACITY_MAX - OPACITY_MIN) + OPACITY_MIN,
        }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }
}

impl Particle for Constellation {
    fn update(&mut self, frame: &FrameTime, _viewport: &Viewport, _rng: &mut StdRng) {
        // every group shares the same phase
        self.opacity = (PULSE_BASE + PULSE_AMPLITUDE * (frame.clock * PULSE_RATE).sin()) as f32;
    }

    fn draw(&self, surface: &mut dyn Surface, style: &RenderStyle) {
        if self.points.len() < 2 {
            return;
        }
        surface.stroke_polyline(
            &self.points,
            style.accent.with_alpha(self.opacity),
            style.line_width * self.opacity,
        );
    }
}

pub fn generate<R: Rng + ?Sized>(count: usize, viewport: &Viewport, rng: &mut R) -> Vec<Constellation> {
    (0..count)
        .map(|_| Constellation::random(viewport, rng))
        .collect()
}
