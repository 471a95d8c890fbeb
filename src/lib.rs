//! Kinematic Platformer - 2D movement and collision response for game entities
//!
//! Core modules:
//! - `sim`: Deterministic simulation (shapes, world, character and platform controllers)
//! - `settings`: Tunable solver parameters
//! - `error`: Error types for configuration and world bookkeeping

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{SettingsError, WorldError};
pub use settings::SolverSettings;

use glam::Vec2;

/// Solver configuration constants (defaults for [`SolverSettings`])
pub mod consts {
    /// Fixed simulation timestep (50 Hz physics tick)
    pub const SIM_DT: f32 = 1.0 / 50.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Gravity acceleration (units/s²), applied along -Y
    pub const GRAVITY: f32 = 30.0;
    /// Terminal fall speed (units/s)
    pub const FALL_LIMIT: f32 = 20.0;
    /// Gravity multiplier while rising
    pub const DEFAULT_GRAVITY_SCALE: f32 = 1.0;
    /// Gravity multiplier once past the jump apex
    pub const FALL_GRAVITY_SCALE: f32 = 1.6;

    /// Steepest walkable slope (degrees from up)
    pub const SLOPE_LIMIT_DEG: f32 = 50.0;

    /// Gap the solver keeps between a shape and what it touches
    pub const MIN_CONTACT_OFFSET: f32 = 0.01;
    /// Farthest gap still treated as touching (ground probe, contacts)
    pub const MAX_CONTACT_OFFSET: f32 = 0.05;
    /// Extra clearance added when pushing a shape out of an overlap
    pub const CAST_BUFFER: f32 = 0.005;

    /// Sweep budget of one slide resolution
    pub const MAX_SLIDE_ITERATIONS: u32 = 4;
    /// Displacements shorter than this are applied without a sweep
    pub const MIN_DISTANCE: f32 = 1.0e-4;
}

/// World up vector; gravity pulls along its negation
pub const UP: Vec2 = Vec2::Y;

/// Angle between two unit vectors in degrees
#[inline]
pub fn angle_between_deg(a: Vec2, b: Vec2) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Surface tangent for a ground normal, pointing toward +X on flat ground
#[inline]
pub fn ground_tangent(normal: Vec2) -> Vec2 {
    Vec2::new(normal.y, -normal.x)
}

/// Rotate a vector by `angle` radians (counter-clockwise)
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    if angle == 0.0 {
        return v;
    }
    Vec2::from_angle(angle).rotate(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_tangent_flat() {
        assert_eq!(ground_tangent(Vec2::Y), Vec2::X);
    }

    #[test]
    fn test_ground_tangent_follows_slope() {
        // 45° slope rising to the right has normal (-√½, √½)
        let n = Vec2::new(-1.0, 1.0).normalize();
        let t = ground_tangent(n);
        assert!(t.x > 0.0 && t.y > 0.0);
        assert!(t.dot(n).abs() < 1e-6);
    }

    #[test]
    fn test_angle_between() {
        assert!((angle_between_deg(Vec2::Y, Vec2::X) - 90.0).abs() < 1e-4);
        assert!(angle_between_deg(Vec2::Y, Vec2::Y).abs() < 1e-2);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!((v - Vec2::Y).length() < 1e-6);
    }
}
