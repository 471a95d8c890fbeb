//! Shapes and the geometric queries the movement solver runs through them
//!
//! A [`Shape`] binds exactly one [`Primitive`] to one body. Every query takes
//! an explicit [`Pose`] so the solver can ask "what if I were here" without
//! touching the body; the body's own colliders are always excluded.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::Hull;
use super::layers::PlatformCategory;
use super::world::{BodyId, ColliderId, PhysicsWorld, QueryFilter};
use crate::rotate;

/// Position and rotation (radians) of a body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    pub rotation: f32,
}

impl Pose {
    pub fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
        }
    }

    /// Same rotation, moved by `delta`
    #[inline]
    pub fn translated(self, delta: Vec2) -> Self {
        Self {
            position: self.position + delta,
            rotation: self.rotation,
        }
    }

    /// Map a body-local point into world space
    #[inline]
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position + rotate(local, self.rotation)
    }
}

/// Axis a capsule's straight section runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapsuleDirection {
    #[default]
    Vertical,
    Horizontal,
}

/// Geometric primitive of a collider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// Rectangle of full `size`
    Box { size: Vec2 },
    /// Stadium of full `size`; the short side sets the cap radius
    Capsule {
        size: Vec2,
        direction: CapsuleDirection,
    },
    Circle { radius: f32 },
}

impl Primitive {
    /// Rounded hull in body space around `offset`
    pub fn local_hull(&self, offset: Vec2) -> Hull {
        match *self {
            Primitive::Box { size } => {
                let h = size.abs() * 0.5;
                Hull::new(
                    &[
                        offset + Vec2::new(-h.x, -h.y),
                        offset + Vec2::new(h.x, -h.y),
                        offset + Vec2::new(h.x, h.y),
                        offset + Vec2::new(-h.x, h.y),
                    ],
                    0.0,
                )
            }
            Primitive::Capsule { size, direction } => {
                let size = size.abs();
                let (radius, half_len, axis) = match direction {
                    CapsuleDirection::Vertical => {
                        let r = size.x * 0.5;
                        (r, (size.y * 0.5 - r).max(0.0), Vec2::Y)
                    }
                    CapsuleDirection::Horizontal => {
                        let r = size.y * 0.5;
                        (r, (size.x * 0.5 - r).max(0.0), Vec2::X)
                    }
                };
                Hull::new(&[offset - axis * half_len, offset + axis * half_len], radius)
            }
            Primitive::Circle { radius } => Hull::new(&[offset], radius.abs()),
        }
    }

    /// World-space hull at `pose`
    pub fn hull_at(&self, pose: Pose, offset: Vec2) -> Hull {
        let local = self.local_hull(offset);
        if pose.rotation == 0.0 {
            return local.translated(pose.position);
        }
        let points: Vec<Vec2> = local
            .points()
            .iter()
            .map(|&p| pose.transform_point(p))
            .collect();
        Hull::new(&points, local.radius())
    }

    /// Full axis-aligned size before rotation
    pub fn size(&self) -> Vec2 {
        match *self {
            Primitive::Box { size } | Primitive::Capsule { size, .. } => size.abs(),
            Primitive::Circle { radius } => Vec2::splat(radius.abs() * 2.0),
        }
    }

    /// Same variant with a new full size (a circle takes the larger axis)
    pub fn resized(&self, size: Vec2) -> Self {
        match *self {
            Primitive::Box { .. } => Primitive::Box { size },
            Primitive::Capsule { direction, .. } => Primitive::Capsule { size, direction },
            Primitive::Circle { .. } => Primitive::Circle {
                radius: size.abs().max_element() * 0.5,
            },
        }
    }
}

/// A swept hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    pub collider: ColliderId,
    pub body: BodyId,
    pub category: Option<PlatformCategory>,
    /// Travel before contact (0 when the shape started inside and moves deeper)
    pub distance: f32,
    /// Obstacle surface normal, facing the shape
    pub normal: Vec2,
    /// Where the swept shape touches the obstacle
    pub point: Vec2,
}

/// Minimum translation out of an overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Direction to move the shape
    pub direction: Vec2,
    /// Overlap depth (positive when overlapping)
    pub depth: f32,
    /// Deepest point of the shape
    pub point_a: Vec2,
    /// Deepest point of the other collider
    pub point_b: Vec2,
}

/// A touching or overlapping collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub collider: ColliderId,
    pub body: BodyId,
    pub category: Option<PlatformCategory>,
    /// Normal from the collider toward the shape
    pub normal: Vec2,
    /// Gap between the two (negative when overlapping)
    pub separation: f32,
    pub point: Vec2,
}

/// Query surface over one primitive attached to a body
#[derive(Debug, Clone)]
pub struct Shape {
    body: BodyId,
    collider: ColliderId,
    primitive: Primitive,
    offset: Vec2,
}

impl Shape {
    pub(crate) fn new(body: BodyId, collider: ColliderId, primitive: Primitive, offset: Vec2) -> Self {
        Self {
            body,
            collider,
            primitive,
            offset,
        }
    }

    #[inline]
    pub fn body(&self) -> BodyId {
        self.body
    }

    #[inline]
    pub fn collider(&self) -> ColliderId {
        self.collider
    }

    #[inline]
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Change the size; the primitive kind stays fixed
    pub(crate) fn set_size(&mut self, size: Vec2) {
        self.primitive = self.primitive.resized(size);
    }

    /// World hull at `pose`
    pub fn hull(&self, pose: Pose) -> Hull {
        self.primitive.hull_at(pose, self.offset)
    }

    fn own_filter<'a>(&self, filter: &QueryFilter<'a>) -> QueryFilter<'a> {
        QueryFilter {
            exclude_body: Some(self.body),
            ..*filter
        }
    }

    /// All hits along `direction` within `max_distance`, nearest first
    pub fn sweep(
        &self,
        world: &PhysicsWorld,
        pose: Pose,
        direction: Vec2,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Vec<SweepHit> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };
        world.cast_hull(&self.hull(pose), dir, max_distance, &self.own_filter(filter))
    }

    /// Nearest hit along `direction`
    pub fn sweep_nearest(
        &self,
        world: &PhysicsWorld,
        pose: Pose,
        direction: Vec2,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<SweepHit> {
        self.sweep(world, pose, direction, max_distance, filter)
            .into_iter()
            .next()
    }

    /// Colliders intersecting the shape at `pose`
    pub fn overlap(&self, world: &PhysicsWorld, pose: Pose, filter: &QueryFilter) -> Vec<ColliderId> {
        world.overlap_hull(&self.hull(pose), &self.own_filter(filter))
    }

    /// Minimum translation separating the shape at `pose` from `other`
    pub fn compute_penetration(
        &self,
        world: &PhysicsWorld,
        pose: Pose,
        other: ColliderId,
    ) -> Option<Penetration> {
        world.penetration(&self.hull(pose), other)
    }

    /// Colliders within `max_gap` of the shape at `pose`
    pub fn contacts(
        &self,
        world: &PhysicsWorld,
        pose: Pose,
        max_gap: f32,
        filter: &QueryFilter,
    ) -> Vec<Contact> {
        world.contacts(&self.hull(pose), max_gap, &self.own_filter(filter))
    }
}
