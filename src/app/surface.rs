use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::from_rgb(0., 0., 0.);
    pub const WHITE: Color = Color::from_rgb(1., 1., 1.);

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1. }
    }

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::from_rgb(
            ((hex >> 16) & 0xff) as f32 / 255.,
            ((hex >> 8) & 0xff) as f32 / 255.,
            (hex & 0xff) as f32 / 255.,
        )
    }

    /// Parses `#RRGGBB` (the leading `#` is optional).
    pub fn from_css_hex(text: &str) -> Option<Self> {
        let text = text.trim();
        let digits = text.strip_prefix('#').unwrap_or(text);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_hex)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0., 1.),
            ..self
        }
    }

    /// Opaque `#rrggbb` form; alpha is carried separately as a global alpha.
    pub fn to_css_hex(&self) -> String {
        let channel = |c: f32| (c.clamp(0., 1.) * 255.).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glow {
    pub color: Color,
    pub blur: f32,
}

/// A 2D raster target. All coordinates are logical pixels; implementations
/// map them to physical pixels through the scale installed by [`Surface::bind`].
pub trait Surface {
    fn logical_size(&self) -> Vec2;
    fn device_pixel_ratio(&self) -> f32;
    /// Resize the backing store and install a uniform `scale` transform.
    fn bind(&mut self, physical_width: u32, physical_height: u32, scale: f32);
    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color);
    fn stroke_polyline(&mut self, points: &[Vec2], color: Color, line_width: f32);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color, glow: Option<Glow>);
    fn release(&mut self) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Bind {
        physical_width: u32,
        physical_height: u32,
        scale: f32,
    },
    FillRect {
        origin: Vec2,
        size: Vec2,
        color: Color,
    },
    StrokePolyline {
        points: Vec<Vec2>,
        color: Color,
        line_width: f32,
    },
    FillCircle {
        center: Vec2,
        radius: f32,
        color: Color,
        glow: Option<Glow>,
    },
    Release,
}

/// Surface that keeps every draw call instead of rasterizing it.
#[derive(Clone, Debug)]
pub struct RecordingSurface {
    size: Vec2,
    dpr: f32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32, dpr: f32) -> Self {
        Self {
            size: vec2(width, height),
            dpr,
            commands: vec![],
        }
    }

    /// Simulates the host element being resized.
    pub fn set_logical_size(&mut self, width: f32, height: f32) {
        self.size = vec2(width, height);
    }

    pub fn set_device_pixel_ratio(&mut self, dpr: f32) {
        self.dpr = dpr;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Surface for RecordingSurface {
    fn logical_size(&self) -> Vec2 {
        self.size
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    fn bind(&mut self, physical_width: u32, physical_height: u32, scale: f32) {
        self.commands.push(DrawCommand::Bind {
            physical_width,
            physical_height,
            scale,
        });
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.commands
            .push(DrawCommand::FillRect { origin, size, color });
    }

    fn stroke_polyline(&mut self, points: &[Vec2], color: Color, line_width: f32) {
        self.commands.push(DrawCommand::StrokePolyline {
            points: points.to_vec(),
            color,
            line_width,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color, glow: Option<Glow>) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
            glow,
        });
    }

    fn release(&mut self) {
        self.commands.push(DrawCommand::Release);
    }
}
