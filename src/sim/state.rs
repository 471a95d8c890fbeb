//! Simulation state
//!
//! Owns the physics world, the platform registry and every character
//! controller. Characters are kept sorted by body id so [`super::tick`]
//! iterates them deterministically.

use glam::Vec2;

use super::character::CharacterController;
use super::layers::{Layer, LayerMask};
use super::platform::PlatformController;
use super::registry::Registry;
use super::shape::{Pose, Primitive};
use super::world::{BodyId, PhysicsWorld};
use crate::error::WorldError;
use crate::settings::SolverSettings;

/// Complete simulation state
#[derive(Debug)]
pub struct SimState {
    /// Solver parameters handed to every new character
    pub settings: SolverSettings,
    pub world: PhysicsWorld,
    /// Moving platforms keyed by their body
    pub platforms: Registry<PlatformController>,
    /// Characters (sorted by body id for determinism)
    pub characters: Vec<CharacterController>,
    /// Simulation tick counter
    pub time_ticks: u64,
}

impl SimState {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            world: PhysicsWorld::new(),
            platforms: Registry::new(),
            characters: Vec::new(),
            time_ticks: 0,
        }
    }

    /// Add immovable level geometry
    pub fn spawn_static(&mut self, pose: Pose, primitive: Primitive, layer: Layer) -> Result<BodyId, WorldError> {
        debug_assert!(
            !layer.mask().intersects(LayerMask::DYNAMIC),
            "static geometry on dynamic layer {layer:?}"
        );
        let body = self.world.add_body(pose);
        self.world.add_collider(body, primitive, Vec2::ZERO, layer)?;
        Ok(body)
    }

    /// Add a moving platform and register its controller
    pub fn spawn_platform(
        &mut self,
        pose: Pose,
        primitive: Primitive,
        layer: Layer,
        velocity: Vec2,
    ) -> Result<BodyId, WorldError> {
        let body = self.world.add_body(pose);
        self.world.add_collider(body, primitive, Vec2::ZERO, layer)?;
        let mut platform = PlatformController::new(&self.world, body)?;
        platform.set_target_velocity(velocity);
        self.platforms.add(body, platform)?;
        log::debug!("spawned platform {:?} on {:?}", body, layer);
        Ok(body)
    }

    /// Remove a platform body and its controller
    pub fn despawn_platform(&mut self, body: BodyId) -> Result<PlatformController, WorldError> {
        let platform = self.platforms.remove(body).ok_or(WorldError::UnknownBody(body))?;
        self.world.remove_body(body)?;
        Ok(platform)
    }

    /// Add a character using the shared settings
    pub fn spawn_character(&mut self, pose: Pose, primitive: Primitive) -> Result<BodyId, WorldError> {
        let character = CharacterController::spawn(&mut self.world, pose, primitive, self.settings)?;
        let body = character.body();
        self.characters.push(character);
        self.normalize_order();
        log::debug!("spawned character {:?} at {:?}", body, pose.position);
        Ok(body)
    }

    /// Remove a character and its body
    pub fn despawn_character(&mut self, body: BodyId) -> Result<CharacterController, WorldError> {
        let index = self
            .characters
            .iter()
            .position(|c| c.body() == body)
            .ok_or(WorldError::UnknownBody(body))?;
        self.world.remove_body(body)?;
        Ok(self.characters.remove(index))
    }

    pub fn character(&self, body: BodyId) -> Option<&CharacterController> {
        self.characters.iter().find(|c| c.body() == body)
    }

    pub fn character_mut(&mut self, body: BodyId) -> Option<&mut CharacterController> {
        self.characters.iter_mut().find(|c| c.body() == body)
    }

    pub fn platform_mut(&mut self, body: BodyId) -> Option<&mut PlatformController> {
        self.platforms.find_mut(body)
    }

    /// Ensure characters are sorted by body id
    pub fn normalize_order(&mut self) {
        self.characters.sort_by_key(|c| c.body());
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}
