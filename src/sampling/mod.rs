//! Samplers drawing candidate points for sampling-based planners

pub mod uniform_circular;
pub mod uniform_rect;

pub use uniform_circular::*;
pub use uniform_rect::*;

use rand::Rng;

use crate::common::Point;

/// Goal bias shared by the samplers: with probability `rate` percent the goal
/// itself is returned instead of a fresh draw.
pub(crate) fn pick_goal<R: Rng + ?Sized>(rng: &mut R, goal: &Option<Point>, rate: f64) -> Option<Point> {
    match goal {
        Some(g) if rate > 0.0 && rng.gen_range(0.0..100.0) < rate => Some(*g),
        _ => None,
    }
}
