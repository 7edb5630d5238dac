use std::io::Write;
use std::path::Path;

use super::*;

/// Software raster surface for headless runs: an RGB float buffer in
/// physical pixels with source-over alpha blending.
pub struct PixelSurface {
    size: Vec2,
    dpr: f32,
    scale: f32,
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl PixelSurface {
    pub fn new(width: f32, height: f32, dpr: f32) -> Self {
        Self {
            size: vec2(width, height),
            dpr,
            scale: 1.,
            width: 0,
            height: 0,
            pixels: vec![],
        }
    }

    pub fn set_logical_size(&mut self, width: f32, height: f32) {
        self.size = vec2(width, height);
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let [r, g, b] = self.pixels[(y * self.width + x) as usize];
        Some([to_byte(r), to_byte(g), to_byte(b)])
    }

    /// Binary PPM (P6) encoding of the current buffer.
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.reserve(self.pixels.len() * 3);
        for [r, g, b] in &self.pixels {
            out.extend_from_slice(&[to_byte(*r), to_byte(*g), to_byte(*b)]);
        }
        out
    }

    pub fn write_ppm(&self, path: &Path) -> Result<(), StarfieldError> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.to_ppm())?;
        info!("Wrote {}x{} snapshot to {}", self.width, self.height, path.display());
        Ok(())
    }

    fn blend(&mut self, x: i64, y: i64, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 || alpha <= 0. {
            return;
        }
        let alpha = alpha.min(1.);
        let pixel = &mut self.pixels[(y as u32 * self.width + x as u32) as usize];
        for (channel, source) in pixel.iter_mut().zip([color.r, color.g, color.b]) {
            *channel += (source - *channel) * alpha;
        }
    }

    fn add(&mut self, x: i64, y: i64, color: Color, amount: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 || amount <= 0. {
            return;
        }
        let pixel = &mut self.pixels[(y as u32 * self.width + x as u32) as usize];
        for (channel, source) in pixel.iter_mut().zip([color.r, color.g, color.b]) {
            *channel = (*channel + source * amount).min(1.);
        }
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0., 1.) * 255.).round() as u8
}

impl Surface for PixelSurface {
    fn logical_size(&self) -> Vec2 {
        self.size
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    fn bind(&mut self, physical_width: u32, physical_height: u32, scale: f32) {
        // a resized canvas starts transparent black as well
        self.width = physical_width;
        self.height = physical_height;
        self.scale = scale;
        self.pixels = vec![[0.; 3]; physical_width as usize * physical_height as usize];
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        let min = origin * self.scale;
        let max = (origin + size) * self.scale;
        for y in min.y.floor() as i64..max.y.ceil() as i64 {
            for x in min.x.floor() as i64..max.x.ceil() as i64 {
                self.blend(x, y, color, color.a);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Vec2], color: Color, line_width: f32) {
        // hairlines below one physical pixel are drawn as coverage
        let coverage = (line_width * self.scale).min(1.);
        let half_width = (line_width * self.scale / 2.).max(0.5);
        for segment in points.windows(2) {
            let from = segment[0] * self.scale;
            let to = segment[1] * self.scale;
            let steps = from.distance(to).ceil().max(1.) as usize;
            let mut last = None;
            for step in 0..=steps {
                let p = from.lerp(to, step as f32 / steps as f32);
                let cell = (p.x.floor() as i64, p.y.floor() as i64);
                if last == Some(cell) {
                    continue;
                }
                last = Some(cell);
                let reach = half_width.floor() as i64;
                for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        self.blend(cell.0 + dx, cell.1 + dy, color, color.a * coverage);
                    }
                }
            }
        }
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color, glow: Option<Glow>) {
        let center = center * self.scale;
        let radius = radius * self.scale;
        let blur = glow.map_or(0., |glow| glow.blur * self.scale);
        let reach = (radius + blur).ceil() as i64;
        let (cx, cy) = (center.x.floor() as i64, center.y.floor() as i64);

        for y in cy - reach..=cy + reach {
            for x in cx - reach..=cx + reach {
                let d = vec2(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                if d <= radius {
                    self.blend(x, y, color, color.a);
                } else if let Some(glow) = glow {
                    if d <= radius + blur {
                        let falloff = 1. - (d - radius) / blur;
                        self.add(x, y, glow.color, color.a * falloff * falloff * 0.5);
                    }
                }
            }
        }
    }

    fn release(&mut self) {
        debug!("Pixel surface released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(width: f32, height: f32, dpr: f32) -> PixelSurface {
        let mut surface = PixelSurface::new(width, height, dpr);
        let viewport = Viewport::from_surface(&surface);
        let (w, h) = viewport.physical_size();
        surface.bind(w, h, viewport.dpr);
        surface
    }

    #[test]
    fn bind_allocates_physical_pixels() {
        let surface = bound(40., 30., 2.);
        assert_eq!(surface.physical_size(), (80, 60));
        assert_eq!(surface.pixel(79, 59), Some([0, 0, 0]));
        assert_eq!(surface.pixel(80, 0), None);
    }

    #[test]
    fn circle_paints_its_center() {
        let mut surface = bound(20., 20., 1.);
        surface.fill_circle(vec2(10., 10.), 3., Color::WHITE, None);
        assert_eq!(surface.pixel(10, 10), Some([255, 255, 255]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn trail_wash_fades_previous_frame() {
        let mut surface = bound(10., 10., 1.);
        surface.fill_rect(Vec2::ZERO, vec2(10., 10.), Color::WHITE);
        for _ in 0..20 {
            surface.fill_rect(Vec2::ZERO, vec2(10., 10.), Color::BLACK.with_alpha(0.05));
        }
        let [r, _, _] = surface.pixel(5, 5).unwrap();
        // 0.95^20 of full white
        assert!(r > 80 && r < 100, "got {r}");
    }

    #[test]
    fn ppm_header_matches_buffer() {
        let surface = bound(4., 3., 1.);
        let ppm = surface.to_ppm();
        let header = b"P6\n4 3\n255\n";
        assert!(ppm.starts_with(header));
        assert_eq!(ppm.len(), header.len() + 4 * 3 * 3);
    }

    #[test]
    fn polyline_touches_its_endpoints() {
        let mut surface = bound(20., 20., 1.);
        surface.stroke_polyline(&[vec2(2.5, 2.5), vec2(15.5, 2.5)], Color::WHITE, 1.);
        assert_eq!(surface.pixel(2, 2), Some([255, 255, 255]));
        assert_eq!(surface.pixel(15, 2), Some([255, 255, 255]));
        assert_eq!(surface.pixel(8, 10), Some([0, 0, 0]));
    }
}
