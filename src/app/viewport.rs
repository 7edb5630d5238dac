use super::*;

/// Logical drawing area plus the device pixel ratio used to reach physical
/// pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub size: Vec2,
    pub dpr: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            size: Vec2::ZERO,
            dpr: 1.,
        }
    }
}

impl Viewport {
    /// Non-finite or negative sizes collapse to zero; a bad ratio falls back to 1.
    pub fn new(size: Vec2, dpr: f32) -> Self {
        let sanitize = |v: f32| if v.is_finite() && v > 0. { v } else { 0. };
        Viewport {
            size: vec2(sanitize(size.x), sanitize(size.y)),
            dpr: if dpr.is_finite() && dpr > 0. { dpr } else { 1. },
        }
    }
    pub fn from_surface<S: Surface + ?Sized>(surface: &S) -> Self {
        Self::new(surface.logical_size(), surface.device_pixel_ratio())
    }
    pub fn width(&self) -> f32 {
        self.size.x
    }
    pub fn height(&self) -> f32 {
        self.size.y
    }
    pub fn is_degenerate(&self) -> bool {
        self.size.x <= 0. || self.size.y <= 0.
    }
    pub fn physical_size(&self) -> (u32, u32) {
        let physical = self.size * self.dpr;
        (physical.x.round() as u32, physical.y.round() as u32)
    }
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0. && pos.y >= 0. && pos.x < self.size.x && pos.y < self.size.y
    }
    /// Uniform over `[0, width) x [0, height)`; the origin for a degenerate viewport.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        vec2(
            rng.gen::<f32>() * self.size.x,
            rng.gen::<f32>() * self.size.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_follows_ratio() {
        let viewport = Viewport::new(vec2(800., 600.), 2.);
        assert_eq!(viewport.physical_size(), (1600, 1200));
    }

    #[test]
    fn bad_geometry_is_sanitized() {
        let viewport = Viewport::new(vec2(-5., f32::NAN), 0.);
        assert_eq!(viewport.size, Vec2::ZERO);
        assert_eq!(viewport.dpr, 1.);
        assert!(viewport.is_degenerate());
    }

    #[test]
    fn random_points_collapse_on_empty_viewport() {
        let mut rng = StdRng::seed_from_u64(7);
        let viewport = Viewport::new(vec2(0., 0.), 1.);
        for _ in 0..10 {
            assert_eq!(viewport.random_point(&mut rng), Vec2::ZERO);
        }
    }
}
