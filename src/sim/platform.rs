//! Moving platform controller
//!
//! A platform drives its own body kinematically: external logic (patrols,
//! lifts) sets a target velocity and the controller applies it each tick.

use glam::Vec2;

use super::world::{BodyId, ColliderId, PhysicsWorld};
use crate::error::WorldError;

/// Kinematic driver for one platform body
#[derive(Debug, Clone)]
pub struct PlatformController {
    body: BodyId,
    target_velocity: Vec2,
    /// Cached once at creation
    colliders: Vec<ColliderId>,
}

impl PlatformController {
    /// Wrap an existing body; its colliders are cached now
    pub fn new(world: &PhysicsWorld, body: BodyId) -> Result<Self, WorldError> {
        let colliders = world
            .body(body)
            .ok_or(WorldError::UnknownBody(body))?
            .colliders
            .clone();
        if colliders.is_empty() {
            return Err(WorldError::NoColliders(body));
        }
        Ok(Self {
            body,
            target_velocity: Vec2::ZERO,
            colliders,
        })
    }

    #[inline]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Velocity riders and pushed characters should follow
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.target_velocity
    }

    pub fn set_target_velocity(&mut self, velocity: Vec2) {
        self.target_velocity = velocity;
    }

    #[inline]
    pub fn colliders(&self) -> &[ColliderId] {
        &self.colliders
    }

    #[inline]
    pub fn owns(&self, collider: ColliderId) -> bool {
        self.colliders.contains(&collider)
    }

    /// Write the target velocity through and advance the body by it
    pub fn step(&self, world: &mut PhysicsWorld, dt: f32) -> Result<(), WorldError> {
        let current = world
            .body(self.body)
            .ok_or(WorldError::UnknownBody(self.body))?
            .velocity;
        if current != self.target_velocity {
            world.set_body_velocity(self.body, self.target_velocity)?;
        }
        if self.target_velocity != Vec2::ZERO {
            world.translate_body(self.body, self.target_velocity * dt)?;
        }
        Ok(())
    }
}
