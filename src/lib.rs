use glam::{vec2, Vec2};
use log::{debug, error, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

mod app;
pub use app::*;

pub mod host;
