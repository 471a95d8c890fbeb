//! Solver settings
//!
//! Tunable numeric parameters threaded through every controller. Defaults
//! come from [`crate::consts`]; a level can ship overrides as JSON.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;

/// Gravity and solver parameters shared by characters and platforms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    // === Gravity ===
    /// Gravity acceleration (units/s²), pulls along -Y
    pub gravity: f32,
    /// Terminal fall speed (positive, units/s)
    pub fall_limit: f32,
    /// Gravity multiplier while rising or standing
    pub default_gravity_scale: f32,
    /// Gravity multiplier once a jump has passed its apex
    pub fall_gravity_scale: f32,

    // === Slopes ===
    /// Steepest walkable slope in degrees
    pub slope_limit: f32,

    // === Contact tolerance ===
    /// Gap kept between a resolved shape and the surface it stopped on
    pub min_contact_offset: f32,
    /// Farthest gap still counted as contact
    pub max_contact_offset: f32,
    /// Extra clearance for overlap recovery
    pub cast_buffer: f32,

    // === Iteration caps ===
    /// Sweeps per slide resolution
    pub max_slide_iterations: u32,
    /// Shortest displacement worth sweeping
    pub min_distance: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            fall_limit: FALL_LIMIT,
            default_gravity_scale: DEFAULT_GRAVITY_SCALE,
            fall_gravity_scale: FALL_GRAVITY_SCALE,

            slope_limit: SLOPE_LIMIT_DEG,

            min_contact_offset: MIN_CONTACT_OFFSET,
            max_contact_offset: MAX_CONTACT_OFFSET,
            cast_buffer: CAST_BUFFER,

            max_slide_iterations: MAX_SLIDE_ITERATIONS,
            min_distance: MIN_DISTANCE,
        }
    }
}

impl SolverSettings {
    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        log::info!(
            "Loaded solver settings (gravity {}, slope limit {}°)",
            settings.gravity,
            settings.slope_limit
        );
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject combinations the solver cannot honor
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("gravity", self.gravity),
            ("fall_limit", self.fall_limit),
            ("default_gravity_scale", self.default_gravity_scale),
            ("fall_gravity_scale", self.fall_gravity_scale),
            ("min_distance", self.min_distance),
        ] {
            if !(value > 0.0) {
                return Err(SettingsError::NotPositive { name, value });
            }
        }

        if !(self.min_contact_offset > 0.0 && self.min_contact_offset < self.max_contact_offset) {
            return Err(SettingsError::ContactOffsets {
                min: self.min_contact_offset,
                max: self.max_contact_offset,
            });
        }

        // Recovery leaves the shape `cast_buffer` beyond the contact skin; it
        // must stay inside the skin so the next ground probe still touches.
        if !(self.cast_buffer >= 0.0 && self.cast_buffer < self.min_contact_offset) {
            return Err(SettingsError::CastBuffer {
                buffer: self.cast_buffer,
                min: self.min_contact_offset,
            });
        }

        if !(self.slope_limit > 0.0 && self.slope_limit < 90.0) {
            return Err(SettingsError::SlopeLimit(self.slope_limit));
        }

        if self.max_slide_iterations == 0 {
            return Err(SettingsError::NoSlideIterations);
        }

        Ok(())
    }

    /// Whether a surface normal is walkable (angle to up within the slope limit)
    #[inline]
    pub fn is_walkable(&self, normal: glam::Vec2) -> bool {
        crate::angle_between_deg(crate::UP, normal) <= self.slope_limit
    }

    /// Gravity scale actually in effect for the given scale factor
    #[inline]
    pub fn gravity_with_scale(&self, scale: f32) -> f32 {
        self.gravity * scale
    }
}
