//! Character controller: the per-step movement state machine
//!
//! Each awake step runs, in order:
//! 1. pose sync from the body
//! 2. overlap recovery
//! 3. ground context + walker velocity integration
//! 4. safety movement of the velocity
//! 5. ground re-snap while walking
//! 6. riding resolution
//! 7. queued impact motion
//! 8. riding application
//! 9. push response from dynamic platforms
//! 10. commit to the body
//!
//! A motionless, settled controller falls asleep and only re-checks its wake
//! conditions until something disturbs it.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::layers::{Layer, LayerMask, PlatformCategory};
use super::platform::PlatformController;
use super::registry::Registry;
use super::shape::{Pose, Primitive, Shape};
use super::solver::{MoveMode, Movement, TangentRule, apply_safety_movement, combine_push};
use super::world::{BodyId, ColliderId, PhysicsWorld, QueryFilter};
use crate::error::WorldError;
use crate::settings::SolverSettings;
use crate::{UP, ground_tangent};

/// Two penetration directions this far apart press from opposite sides
const OPPOSED_DOT: f32 = -0.7;

/// Movement model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerMode {
    /// Gravity, ground following, run and jump
    #[default]
    Walker,
    /// Raw motion consumed verbatim each step
    Free,
}

impl ControllerMode {
    fn tangent_rule(self) -> TangentRule {
        match self {
            ControllerMode::Walker => TangentRule::Walker,
            ControllerMode::Free => TangentRule::Free,
        }
    }
}

/// Notifications for the ability layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CharacterEvent {
    /// Touched down on ground after being airborne
    Landed { collider: ColliderId },
    /// Ground contact lost
    LeftGround,
    /// Pressed from opposite sides along `axis`; overlap left unresolved
    Frozen { axis: Vec2 },
    Slept,
    Woke,
}

/// What is under the character this step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContext {
    pub grounded: bool,
    pub normal: Vec2,
    /// Slope within the walkable limit
    pub climbable: bool,
    pub collider: Option<ColliderId>,
    pub body: Option<BodyId>,
    pub category: Option<PlatformCategory>,
}

impl Default for GroundContext {
    fn default() -> Self {
        Self {
            grounded: false,
            normal: UP,
            climbable: false,
            collider: None,
            body: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rider {
    platform: BodyId,
    /// Set through [`CharacterController::ride`]; survives leaving the ground
    manual: bool,
}

/// Kinematic controller for one character body
#[derive(Debug, Clone)]
pub struct CharacterController {
    shape: Shape,
    settings: SolverSettings,

    pose: Pose,
    recover_overlap: bool,

    velocity: Vec2,

    mode: ControllerMode,
    run_speed: f32,
    jumping: bool,
    gravity_scale: f32,
    motion: Vec2,
    impact: Vec2,

    ground: GroundContext,

    dynamic_contacts: usize,
    touching: Vec<ColliderId>,
    separation_queue: VecDeque<ColliderId>,
    ignored: Vec<ColliderId>,

    riding: Option<Rider>,

    asleep: bool,
    enabled: bool,
    events: Vec<CharacterEvent>,
}

impl CharacterController {
    /// Create a body with one character-layer collider and attach a controller
    pub fn spawn(
        world: &mut PhysicsWorld,
        pose: Pose,
        primitive: Primitive,
        settings: SolverSettings,
    ) -> Result<Self, WorldError> {
        let body = world.add_body(pose);
        Self::attach(world, body, primitive, Vec2::ZERO, settings)
    }

    /// Attach to an existing body, adding the controller's collider to it
    pub fn attach(
        world: &mut PhysicsWorld,
        body: BodyId,
        primitive: Primitive,
        offset: Vec2,
        settings: SolverSettings,
    ) -> Result<Self, WorldError> {
        let collider = world.add_collider(body, primitive, offset, Layer::CHARACTER)?;
        let pose = world.body(body).ok_or(WorldError::UnknownBody(body))?.pose;
        Ok(Self {
            shape: Shape::new(body, collider, primitive, offset),
            gravity_scale: settings.default_gravity_scale,
            settings,
            pose,
            recover_overlap: true,
            velocity: Vec2::ZERO,
            mode: ControllerMode::Walker,
            run_speed: 0.0,
            jumping: false,
            motion: Vec2::ZERO,
            impact: Vec2::ZERO,
            ground: GroundContext::default(),
            dynamic_contacts: 0,
            touching: Vec::new(),
            separation_queue: VecDeque::new(),
            ignored: Vec::new(),
            riding: None,
            asleep: false,
            enabled: true,
            events: Vec::new(),
        })
    }

    // === Commands ===

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// Teleport; `safe` pushes the shape out of overlaps on the next step.
    ///
    /// Any external pose or size write wakes the controller and drops the
    /// ground context until the next probe.
    pub fn set_position(&mut self, world: &mut PhysicsWorld, position: Vec2, safe: bool) -> Result<(), WorldError> {
        self.pose.position = position;
        self.write_pose(world, safe)
    }

    pub fn set_rotation(&mut self, world: &mut PhysicsWorld, rotation: f32, safe: bool) -> Result<(), WorldError> {
        self.pose.rotation = rotation;
        self.write_pose(world, safe)
    }

    /// Resize the primitive (its kind never changes)
    pub fn set_size(&mut self, world: &mut PhysicsWorld, size: Vec2, safe: bool) -> Result<(), WorldError> {
        self.shape.set_size(size);
        world.set_collider_primitive(self.shape.collider(), self.shape.primitive())?;
        self.disturb(safe);
        Ok(())
    }

    fn write_pose(&mut self, world: &mut PhysicsWorld, safe: bool) -> Result<(), WorldError> {
        world.set_body_pose(self.shape.body(), self.pose)?;
        self.disturb(safe);
        Ok(())
    }

    fn disturb(&mut self, safe: bool) {
        self.recover_overlap |= safe;
        self.ground = GroundContext::default();
        self.wake();
    }

    /// Horizontal walk speed (walker mode)
    pub fn run(&mut self, speed: f32) {
        self.run_speed = speed;
    }

    /// Start a jump with an upward speed
    pub fn jump(&mut self, speed: f32) {
        self.jump_with_velocity(Vec2::new(self.velocity.x, speed));
    }

    /// Start a jump with a full launch velocity
    pub fn jump_with_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
        self.jumping = true;
        self.gravity_scale = self.settings.default_gravity_scale;
    }

    /// Cut a rising jump short by switching to a heavier gravity scale
    pub fn break_jump(&mut self, gravity_scale: f32) {
        if self.jumping && self.velocity.y > 0.0 {
            self.gravity_scale = gravity_scale;
        }
    }

    /// Queue raw motion for the next step (free mode)
    pub fn move_by(&mut self, motion: Vec2) {
        self.motion += motion;
    }

    /// Queue a one-shot displacement such as knockback
    pub fn add_motion(&mut self, impulse: Vec2) {
        self.impact += impulse;
    }

    /// Follow a platform regardless of ground contact, or stop following
    pub fn ride(&mut self, world: &PhysicsWorld, platform: Option<BodyId>) {
        self.release_riding(world);
        if let Some(platform) = platform {
            self.adopt_riding(platform, true);
        }
    }

    /// Switch movement model, clearing the other model's sub-state
    pub fn set_mode(&mut self, mode: ControllerMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.run_speed = 0.0;
        self.jumping = false;
        self.gravity_scale = self.settings.default_gravity_scale;
        self.motion = Vec2::ZERO;
        self.ground = GroundContext::default();
    }

    /// Stop participating in steps; contact state is dropped
    pub fn disable(&mut self) {
        self.enabled = false;
        self.touching.clear();
        self.dynamic_contacts = 0;
        self.separation_queue.clear();
        self.ignored.clear();
        self.riding = None;
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.recover_overlap = true;
            self.asleep = false;
        }
    }

    /// Force the next step to run in full
    pub fn wake(&mut self) {
        if self.asleep {
            self.asleep = false;
            self.events.push(CharacterEvent::Woke);
        }
    }

    /// Take pending notifications
    pub fn drain_events(&mut self) -> Vec<CharacterEvent> {
        std::mem::take(&mut self.events)
    }

    // === Queries ===

    #[inline]
    pub fn body(&self) -> BodyId {
        self.shape.body()
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pose.position
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.pose.rotation
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[inline]
    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    #[inline]
    pub fn is_ground(&self) -> bool {
        self.ground.grounded
    }

    #[inline]
    pub fn ground_normal(&self) -> Vec2 {
        self.ground.normal
    }

    #[inline]
    pub fn is_climbable(&self) -> bool {
        self.ground.climbable
    }

    #[inline]
    pub fn ground_collider(&self) -> Option<ColliderId> {
        self.ground.collider
    }

    #[inline]
    pub fn ground(&self) -> &GroundContext {
        &self.ground
    }

    #[inline]
    pub fn is_jumping(&self) -> bool {
        self.jumping
    }

    #[inline]
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    #[inline]
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Platform currently followed
    #[inline]
    pub fn riding(&self) -> Option<BodyId> {
        self.riding.map(|r| r.platform)
    }

    /// Dynamic platform colliders currently touching
    #[inline]
    pub fn dynamic_contacts(&self) -> usize {
        self.dynamic_contacts
    }

    /// One-way colliders being passed through
    #[inline]
    pub fn ignored_colliders(&self) -> &[ColliderId] {
        &self.ignored
    }

    // === Step ===

    /// Advance one fixed step
    pub fn step(
        &mut self,
        world: &mut PhysicsWorld,
        platforms: &Registry<PlatformController>,
        dt: f32,
    ) -> Result<(), WorldError> {
        if !self.enabled {
            return Ok(());
        }

        let body = world
            .body(self.shape.body())
            .ok_or(WorldError::UnknownBody(self.shape.body()))?;
        self.pose = body.pose;
        let committed_velocity = body.velocity;
        let start = self.pose;

        self.track_contacts(world);

        if self.asleep {
            if !self.wants_awake(world) {
                return Ok(());
            }
            self.asleep = false;
            self.events.push(CharacterEvent::Woke);
            log::trace!("character {:?} woke", self.shape.body());
        }

        self.recover_overlaps(world);

        let walker = self.mode == ControllerMode::Walker;
        let mut snap_allowed = false;
        if walker {
            self.update_ground(world);
            self.integrate_velocity(dt);
            snap_allowed = self.ground.grounded && self.ground.climbable && !self.jumping;
        }

        let mut displacement = self.velocity * dt;
        if !walker {
            displacement += std::mem::take(&mut self.motion);
        }
        let moved = self.slide(world, displacement);
        self.pose = self.pose.translated(moved.displacement);
        if walker {
            self.bump_ceiling(&moved);
        }

        if snap_allowed && moved.displacement.x.abs() > self.settings.min_distance {
            self.snap_to_ground(world, moved.displacement.x.abs());
        }

        self.resolve_riding(world, platforms);

        if self.impact != Vec2::ZERO {
            let impact = std::mem::take(&mut self.impact);
            let moved = self.slide(world, impact);
            self.pose = self.pose.translated(moved.displacement);
        }

        self.apply_riding(world, platforms, dt);
        self.apply_push(world, platforms, dt);

        if self.pose != start {
            world.set_body_pose(self.shape.body(), self.pose)?;
        }
        if self.velocity != committed_velocity {
            world.set_body_velocity(self.shape.body(), self.velocity)?;
        }

        if !self.wants_awake(world) {
            self.asleep = true;
            self.events.push(CharacterEvent::Slept);
            log::trace!("character {:?} asleep at {:?}", self.shape.body(), self.pose.position);
        }
        Ok(())
    }

    /// Whether anything requires a full step
    fn wants_awake(&self, world: &PhysicsWorld) -> bool {
        if self.velocity != Vec2::ZERO
            || self.dynamic_contacts > 0
            || self.impact != Vec2::ZERO
            || self.motion != Vec2::ZERO
            || self.riding.is_some()
            || self.recover_overlap
            || !self.separation_queue.is_empty()
        {
            return true;
        }
        if self.mode == ControllerMode::Walker {
            let ground_gone = self
                .ground
                .collider
                .is_none_or(|c| world.collider(c).is_none());
            return self.run_speed != 0.0
                || self.jumping
                || !self.ground.grounded
                || !self.ground.climbable
                || ground_gone;
        }
        false
    }

    fn platform_filter(&self, mask: LayerMask) -> QueryFilter<'_> {
        QueryFilter::new(mask).ignoring(&self.ignored)
    }

    fn slide(&self, world: &PhysicsWorld, displacement: Vec2) -> Movement {
        let filter = self.platform_filter(LayerMask::PLATFORM);
        apply_safety_movement(
            world,
            &self.shape,
            self.pose,
            displacement,
            MoveMode::Slide,
            self.mode.tangent_rule(),
            &filter,
            &self.settings,
        )
    }

    fn collide(&self, world: &PhysicsWorld, displacement: Vec2, filter: &QueryFilter) -> Movement {
        apply_safety_movement(
            world,
            &self.shape,
            self.pose,
            displacement,
            MoveMode::Collide,
            self.mode.tangent_rule(),
            filter,
            &self.settings,
        )
    }

    /// Contact enter/exit bookkeeping, one-way pass-through list, separation queue
    fn track_contacts(&mut self, world: &PhysicsWorld) {
        let reach = self.settings.max_contact_offset;

        // One-way colliders stay ignored while overlapped or touched from the
        // non-passable side; leaving that contact drops them.
        let oneway = self
            .shape
            .contacts(world, self.pose, reach, &QueryFilter::new(LayerMask::ONEWAY));
        self.ignored = oneway
            .iter()
            .filter(|c| c.separation < 0.0 || c.normal.dot(world.surface_up(c.collider)) <= 0.0)
            .map(|c| c.collider)
            .collect();

        let contacts = self
            .shape
            .contacts(world, self.pose, reach, &self.platform_filter(LayerMask::DYNAMIC));

        let touching: Vec<ColliderId> = contacts.iter().map(|c| c.collider).collect();
        for entered in touching.iter().filter(|c| !self.touching.contains(c)) {
            log::trace!("character {:?} touched {:?}", self.shape.body(), entered);
        }
        for exited in self.touching.iter().filter(|c| !touching.contains(c)) {
            log::trace!("character {:?} left {:?}", self.shape.body(), exited);
        }
        self.touching = touching;
        self.dynamic_contacts = self.touching.len();

        for contact in &contacts {
            let pressing = contact.separation < 0.0
                && contact.category.is_some_and(PlatformCategory::is_block);
            if pressing && !self.separation_queue.contains(&contact.collider) {
                self.separation_queue.push_back(contact.collider);
            }
        }
    }

    /// Push the shape clear of queued overlapping blocks
    fn recover_overlaps(&mut self, world: &PhysicsWorld) {
        if std::mem::take(&mut self.recover_overlap) {
            let overlapping = self
                .shape
                .overlap(world, self.pose, &self.platform_filter(LayerMask::BLOCK));
            for collider in overlapping {
                if !self.separation_queue.contains(&collider) {
                    self.separation_queue.push_back(collider);
                }
            }
        }
        if self.separation_queue.is_empty() {
            return;
        }

        let queued: Vec<ColliderId> = self.separation_queue.drain(..).collect();
        let penetrations: Vec<(ColliderId, Vec2)> = queued
            .iter()
            .filter_map(|&c| {
                self.shape
                    .compute_penetration(world, self.pose, c)
                    .map(|p| (c, p.direction))
            })
            .collect();

        // Opposite pushes on one axis cannot be solved by translation
        let mut frozen: Vec<ColliderId> = Vec::new();
        for (i, (a, dir_a)) in penetrations.iter().enumerate() {
            for (b, dir_b) in penetrations.iter().skip(i + 1) {
                if dir_a.dot(*dir_b) < OPPOSED_DOT {
                    log::warn!(
                        "character {:?} squeezed between {:?} and {:?}",
                        self.shape.body(),
                        a,
                        b
                    );
                    self.events.push(CharacterEvent::Frozen { axis: *dir_a });
                    frozen.push(*a);
                    frozen.push(*b);
                }
            }
        }

        let filter_ignored = self.ignored.clone();
        let filter = QueryFilter::new(LayerMask::BLOCK).ignoring(&filter_ignored);
        for (collider, _) in penetrations {
            if frozen.contains(&collider) {
                continue;
            }
            // Earlier corrections may already have cleared this one
            let Some(pen) = self.shape.compute_penetration(world, self.pose, collider) else {
                continue;
            };
            let distance = pen.depth + self.settings.min_contact_offset + self.settings.cast_buffer;
            let moved = self.collide(world, pen.direction * distance, &filter);
            self.pose = self.pose.translated(moved.displacement);
            log::trace!(
                "character {:?} recovered {:.4} out of {:?}",
                self.shape.body(),
                moved.displacement.length(),
                collider
            );
        }
    }

    /// Probe below the shape and classify what it stands on
    fn update_ground(&mut self, world: &PhysicsWorld) {
        let was_grounded = self.ground.grounded;
        let hit = self
            .shape
            .sweep(
                world,
                self.pose,
                -UP,
                self.settings.max_contact_offset,
                &self.platform_filter(LayerMask::PLATFORM),
            )
            .into_iter()
            .find(|h| h.normal.dot(UP) > 0.0);

        self.ground = match hit {
            Some(hit) => GroundContext {
                grounded: true,
                normal: hit.normal,
                climbable: self.settings.is_walkable(hit.normal),
                collider: Some(hit.collider),
                body: Some(hit.body),
                category: hit.category,
            },
            None => GroundContext::default(),
        };

        match (was_grounded, self.ground.grounded) {
            (false, true) => {
                self.jumping = false;
                self.gravity_scale = self.settings.default_gravity_scale;
                if self.ground.climbable {
                    self.velocity.y = 0.0;
                }
                if let Some(collider) = self.ground.collider {
                    log::debug!("character {:?} landed on {:?}", self.shape.body(), collider);
                    self.events.push(CharacterEvent::Landed { collider });
                }
            }
            (true, false) => self.events.push(CharacterEvent::LeftGround),
            _ => {}
        }
    }

    /// Walker velocity for this step
    fn integrate_velocity(&mut self, dt: f32) {
        let gravity = self.settings.gravity_with_scale(self.gravity_scale);

        if !self.ground.grounded || self.jumping {
            let rising = self.velocity.y > 0.0;
            self.velocity.y = (self.velocity.y - gravity * dt).max(-self.settings.fall_limit);
            self.velocity.x = self.run_speed;
            if rising && self.velocity.y <= 0.0 {
                self.gravity_scale = self.settings.fall_gravity_scale;
                self.jumping = false;
            }
        } else if self.ground.climbable {
            self.velocity = ground_tangent(self.ground.normal) * self.run_speed;
            self.gravity_scale = self.settings.default_gravity_scale;
        } else {
            // Too steep to climb: slide down the tangent. A run command only
            // counts when it points downhill (further into the slope) and is
            // faster than the current slide.
            let tangent = ground_tangent(self.ground.normal);
            let downhill = if tangent.y > 0.0 { -tangent } else { tangent };
            let mut speed = self.velocity.dot(downhill).max(0.0);
            speed = (speed + gravity * -downhill.y * dt).min(self.settings.fall_limit);
            let runs_downhill = self.run_speed != 0.0 && self.run_speed.signum() == downhill.x.signum();
            if runs_downhill && self.run_speed.abs() > speed {
                speed = self.run_speed.abs();
            }
            self.velocity = downhill * speed;
        }
    }

    /// Hitting a ceiling ends upward travel
    fn bump_ceiling(&mut self, moved: &Movement) {
        if let Some(hit) = moved.hit {
            if hit.normal.dot(UP) < -0.5 && self.velocity.y > 0.0 {
                self.velocity.y = 0.0;
                self.jumping = false;
                self.gravity_scale = self.settings.fall_gravity_scale;
            }
        }
    }

    /// Keep contact with walkable ground across slope changes and small steps down
    fn snap_to_ground(&mut self, world: &PhysicsWorld, horizontal: f32) {
        let reach =
            horizontal * self.settings.slope_limit.to_radians().tan() + self.settings.max_contact_offset;
        let hit = self
            .shape
            .sweep(world, self.pose, -UP, reach, &self.platform_filter(LayerMask::PLATFORM))
            .into_iter()
            .find(|h| h.normal.dot(UP) > 0.0);

        let Some(hit) = hit else {
            return;
        };
        if !self.settings.is_walkable(hit.normal) {
            return;
        }
        let drop = hit.distance - self.settings.min_contact_offset / hit.normal.dot(UP);
        if drop > 0.0 {
            let moved = apply_safety_movement(
                world,
                &self.shape,
                self.pose,
                -UP * drop,
                MoveMode::None,
                self.mode.tangent_rule(),
                &self.platform_filter(LayerMask::PLATFORM),
                &self.settings,
            );
            self.pose = self.pose.translated(moved.displacement);
        }
    }

    /// Adopt the dynamic platform underfoot, or let go of it
    fn resolve_riding(&mut self, world: &PhysicsWorld, platforms: &Registry<PlatformController>) {
        if self.riding.is_some_and(|r| r.manual) {
            return;
        }

        let underfoot = if self.mode == ControllerMode::Walker
            && self.ground.grounded
            && self.ground.climbable
            && self.ground.category.is_some_and(PlatformCategory::is_dynamic)
        {
            self.ground.body.filter(|&b| platforms.contains(b))
        } else {
            None
        };

        match underfoot {
            Some(platform) if self.riding() != Some(platform) => {
                self.release_riding(world);
                self.adopt_riding(platform, false);
            }
            Some(_) => {}
            None => self.release_riding(world),
        }
    }

    fn adopt_riding(&mut self, platform: BodyId, manual: bool) {
        log::debug!("character {:?} riding {:?}", self.shape.body(), platform);
        self.riding = Some(Rider { platform, manual });
    }

    fn release_riding(&mut self, world: &PhysicsWorld) {
        if let Some(rider) = self.riding.take() {
            if let Some(body) = world.body(rider.platform) {
                self.ignored.retain(|c| !body.colliders.contains(c));
            }
            log::debug!("character {:?} released {:?}", self.shape.body(), rider.platform);
        }
    }

    /// Carry the character along with the ridden platform
    fn apply_riding(&mut self, world: &PhysicsWorld, platforms: &Registry<PlatformController>, dt: f32) {
        let Some(rider) = self.riding else {
            return;
        };
        let Some(platform) = platforms.find(rider.platform) else {
            self.release_riding(world);
            return;
        };
        let carry = platform.velocity() * dt;
        if carry == Vec2::ZERO {
            return;
        }

        let mut ignored = self.ignored.clone();
        ignored.extend_from_slice(platform.colliders());
        let filter = QueryFilter::new(LayerMask::PLATFORM).ignoring(&ignored);
        let moved = self.collide(world, carry, &filter);
        self.pose = self.pose.translated(moved.displacement);
    }

    /// Get shoved by dynamic platforms moving into the character
    fn apply_push(&mut self, world: &PhysicsWorld, platforms: &Registry<PlatformController>, dt: f32) {
        let contacts = self.shape.contacts(
            world,
            self.pose,
            self.settings.max_contact_offset,
            &self.platform_filter(LayerMask::DYNAMIC),
        );

        let mut seen: Vec<BodyId> = Vec::new();
        let mut push = Vec2::ZERO;
        for contact in contacts {
            if self.riding() == Some(contact.body) || seen.contains(&contact.body) {
                continue;
            }
            seen.push(contact.body);

            debug_assert!(
                contact.category.is_some(),
                "collider {:?} on a platform mask has no platform category",
                contact.collider
            );
            let Some(category) = contact.category else {
                continue;
            };
            if category.is_oneway() && contact.normal.dot(world.surface_up(contact.collider)) <= 0.0 {
                continue;
            }

            let platform_velocity = platforms
                .find(contact.body)
                .map(PlatformController::velocity)
                .or_else(|| world.body(contact.body).map(|b| b.velocity))
                .unwrap_or(Vec2::ZERO);
            let relative = (platform_velocity - self.velocity).dot(contact.normal);
            if relative > 0.0 {
                push = combine_push(push, contact.normal * relative * dt);
            }
        }

        if push != Vec2::ZERO {
            let filter = self.platform_filter(LayerMask::PLATFORM);
            let moved = self.collide(world, push, &filter);
            self.pose = self.pose.translated(moved.displacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use approx::assert_relative_eq;

    fn floor_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        let floor = world.add_body(Pose::at(Vec2::new(0.0, -0.5)));
        world
            .add_collider(floor, Primitive::Box { size: Vec2::new(40.0, 1.0) }, Vec2::ZERO, Layer::STATIC_BLOCK)
            .unwrap();
        world
    }

    fn character_at(world: &mut PhysicsWorld, position: Vec2) -> CharacterController {
        CharacterController::spawn(
            world,
            Pose::at(position),
            Primitive::Box { size: Vec2::ONE },
            SolverSettings::default(),
        )
        .unwrap()
    }

    fn resting_height() -> f32 {
        0.5 + SolverSettings::default().min_contact_offset
    }

    #[test]
    fn test_free_mode_moves_by_velocity() {
        let mut world = PhysicsWorld::new();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::ZERO);
        c.set_mode(ControllerMode::Free);
        c.set_velocity(Vec2::new(5.0, 0.0));
        c.step(&mut world, &platforms, 0.02).unwrap();
        assert_relative_eq!(c.position().x, 0.1, epsilon = 1e-5);
        assert_relative_eq!(c.position().y, 0.0, epsilon = 1e-5);
        assert_eq!(world.body(c.body()).unwrap().pose.position, c.position());
    }

    #[test]
    fn test_free_mode_consumes_motion_once() {
        let mut world = PhysicsWorld::new();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::ZERO);
        c.set_mode(ControllerMode::Free);
        c.move_by(Vec2::new(0.0, 0.3));
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert_relative_eq!(c.position().y, 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_falls_and_lands() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, 3.0));

        let mut landed = false;
        for _ in 0..200 {
            c.step(&mut world, &platforms, SIM_DT).unwrap();
            landed |= c
                .drain_events()
                .iter()
                .any(|e| matches!(e, CharacterEvent::Landed { .. }));
        }
        assert!(landed);
        assert!(c.is_ground());
        assert!(c.is_climbable());
        assert_relative_eq!(c.position().y, resting_height(), epsilon = 1e-3);
        assert_eq!(c.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_sleeps_when_settled_and_wakes_on_run() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, resting_height()));

        c.step(&mut world, &platforms, SIM_DT).unwrap();
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert!(c.is_asleep());

        let writes = world.body(c.body()).unwrap().pose_writes;
        for _ in 0..10 {
            c.step(&mut world, &platforms, SIM_DT).unwrap();
        }
        assert_eq!(world.body(c.body()).unwrap().pose_writes, writes);

        c.run(3.0);
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert!(!c.is_asleep());
        assert!(c.position().x > 0.0);
        assert!(c.drain_events().contains(&CharacterEvent::Woke));
    }

    #[test]
    fn test_impact_wakes_and_applies_once() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, resting_height()));
        for _ in 0..3 {
            c.step(&mut world, &platforms, SIM_DT).unwrap();
        }
        assert!(c.is_asleep());

        c.add_motion(Vec2::new(0.5, 0.0));
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert_relative_eq!(c.position().x, 0.5, epsilon = 1e-4);
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert_relative_eq!(c.position().x, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_run_on_flat_ground() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, resting_height()));
        c.run(5.0);
        for _ in 0..10 {
            c.step(&mut world, &platforms, SIM_DT).unwrap();
        }
        assert_relative_eq!(c.position().x, 1.0, epsilon = 1e-3);
        assert_relative_eq!(c.position().y, resting_height(), epsilon = 1e-3);
        assert!(c.is_ground());
    }

    #[test]
    fn test_break_jump_lowers_apex() {
        fn apex(break_scale: Option<f32>) -> f32 {
            let mut world = floor_world();
            let platforms = Registry::new();
            let mut c = character_at(&mut world, Vec2::new(0.0, resting_height()));
            c.step(&mut world, &platforms, SIM_DT).unwrap();
            c.jump(10.0);
            let mut peak: f32 = c.position().y;
            for i in 0..120 {
                if i == 5 {
                    if let Some(scale) = break_scale {
                        c.break_jump(scale);
                    }
                }
                c.step(&mut world, &platforms, SIM_DT).unwrap();
                peak = peak.max(c.position().y);
            }
            peak
        }

        let full = apex(None);
        let cut = apex(Some(3.0));
        let harder = apex(Some(6.0));
        assert!(full > resting_height() + 1.0);
        assert!(cut < full);
        assert!(harder < cut);
    }

    #[test]
    fn test_jump_switches_to_fall_scale_after_apex() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, resting_height()));
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        c.jump(5.0);
        assert!(c.is_jumping());
        for _ in 0..11 {
            c.step(&mut world, &platforms, SIM_DT).unwrap();
        }
        assert!(!c.is_jumping());
        assert_eq!(c.gravity_scale(), SolverSettings::default().fall_gravity_scale);
    }

    #[test]
    fn test_recovery_on_safe_teleport() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, 5.0));
        c.set_position(&mut world, Vec2::new(0.0, 0.3), true).unwrap();
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        // Bottom edge must be clear of the floor top
        assert!(c.position().y - 0.5 >= 0.0);
        assert!(c.is_ground() || c.position().y - 0.5 < SolverSettings::default().max_contact_offset);
    }

    #[test]
    fn test_frozen_between_opposite_walls() {
        let mut world = PhysicsWorld::new();
        for x in [-0.9_f32, 0.9] {
            let body = world.add_body(Pose::at(Vec2::new(x, 0.0)));
            world
                .add_collider(body, Primitive::Box { size: Vec2::new(1.0, 4.0) }, Vec2::ZERO, Layer::STATIC_BLOCK)
                .unwrap();
        }
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::ZERO);
        c.set_mode(ControllerMode::Free);
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert!(c
            .drain_events()
            .iter()
            .any(|e| matches!(e, CharacterEvent::Frozen { .. })));
        assert_relative_eq!(c.position().x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_set_size_keeps_kind() {
        let mut world = floor_world();
        let mut c = character_at(&mut world, Vec2::new(0.0, 2.0));
        c.set_size(&mut world, Vec2::new(2.0, 0.5), false).unwrap();
        assert_eq!(c.shape().primitive(), Primitive::Box { size: Vec2::new(2.0, 0.5) });
        let collider = world.collider(c.shape().collider()).unwrap();
        assert_eq!(collider.primitive, c.shape().primitive());
    }

    #[test]
    fn test_mode_switch_resets_walker_state() {
        let mut world = floor_world();
        let mut c = character_at(&mut world, Vec2::new(0.0, 2.0));
        c.run(4.0);
        c.jump(3.0);
        c.set_mode(ControllerMode::Free);
        assert!(!c.is_jumping());
        assert_eq!(c.gravity_scale(), SolverSettings::default().default_gravity_scale);
        assert!(!c.is_ground());
    }

    #[test]
    fn test_disable_skips_steps() {
        let mut world = floor_world();
        let platforms = Registry::new();
        let mut c = character_at(&mut world, Vec2::new(0.0, 3.0));
        c.disable();
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert_eq!(c.position().y, 3.0);
        c.enable();
        c.step(&mut world, &platforms, SIM_DT).unwrap();
        assert!(c.position().y < 3.0);
    }
}
