//! Physics world holding every body and collider.
//!
//! Bodies carry a pose and a velocity; colliders attach a primitive to a body
//! on a layer. The world answers the hull queries [`super::Shape`] builds on
//! and never integrates motion itself: controllers move their own bodies.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::Hull;
use super::layers::{Layer, LayerMask, PlatformCategory};
use super::shape::{Contact, Penetration, Pose, Primitive, SweepHit};
use crate::error::WorldError;
use crate::{UP, rotate};

/// Stable identity of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Stable identity of a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

/// A body: a pose plus the colliders attached to it.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub pose: Pose,
    pub velocity: Vec2,
    pub colliders: Vec<ColliderId>,
    /// Number of pose writes since creation.
    pub pose_writes: u64,
}

/// A primitive attached to a body on a layer.
#[derive(Debug, Clone)]
pub struct Collider {
    pub id: ColliderId,
    pub body: BodyId,
    pub primitive: Primitive,
    /// Body-space offset of the primitive center.
    pub offset: Vec2,
    pub layer: Layer,
    /// Resolved once from `layer` when the collider is added.
    pub category: Option<PlatformCategory>,
}

/// Which colliders a query may report.
#[derive(Debug, Clone, Copy)]
pub struct QueryFilter<'a> {
    pub mask: LayerMask,
    pub exclude_body: Option<BodyId>,
    pub ignored: &'a [ColliderId],
}

impl<'a> QueryFilter<'a> {
    pub fn new(mask: LayerMask) -> Self {
        Self {
            mask,
            exclude_body: None,
            ignored: &[],
        }
    }

    pub fn ignoring(mut self, ignored: &'a [ColliderId]) -> Self {
        self.ignored = ignored;
        self
    }

    #[inline]
    pub fn passes(&self, collider: &Collider) -> bool {
        self.mask.contains(collider.layer)
            && self.exclude_body != Some(collider.body)
            && !self.ignored.contains(&collider.id)
    }
}

/// The collision environment.
///
/// Storage is ordered by id so every query iterates deterministically.
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    bodies: BTreeMap<BodyId, Body>,
    colliders: BTreeMap<ColliderId, Collider>,
    next_body: u32,
    next_collider: u32,
}

impl PhysicsWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body with no colliders.
    pub fn add_body(&mut self, pose: Pose) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            id,
            Body {
                id,
                pose,
                velocity: Vec2::ZERO,
                colliders: Vec::new(),
                pose_writes: 0,
            },
        );
        id
    }

    /// Remove a body together with its colliders.
    pub fn remove_body(&mut self, id: BodyId) -> Result<Body, WorldError> {
        let body = self.bodies.remove(&id).ok_or(WorldError::UnknownBody(id))?;
        for collider in &body.colliders {
            self.colliders.remove(collider);
        }
        Ok(body)
    }

    /// Attach a primitive to a body.
    pub fn add_collider(
        &mut self,
        body: BodyId,
        primitive: Primitive,
        offset: Vec2,
        layer: Layer,
    ) -> Result<ColliderId, WorldError> {
        let owner = self
            .bodies
            .get_mut(&body)
            .ok_or(WorldError::UnknownBody(body))?;

        let id = ColliderId(self.next_collider);
        self.next_collider += 1;
        owner.colliders.push(id);

        self.colliders.insert(
            id,
            Collider {
                id,
                body,
                primitive,
                offset,
                layer,
                category: PlatformCategory::from_layer(layer),
            },
        );
        Ok(id)
    }

    /// Swap a collider's primitive (used when a shape is resized).
    pub fn set_collider_primitive(&mut self, id: ColliderId, primitive: Primitive) -> Result<(), WorldError> {
        let collider = self
            .colliders
            .get_mut(&id)
            .ok_or(WorldError::UnknownCollider(id))?;
        collider.primitive = primitive;
        Ok(())
    }

    #[inline]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    #[inline]
    pub fn collider(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(&id)
    }

    /// Bodies in id order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Colliders in id order.
    pub fn colliders(&self) -> impl Iterator<Item = &Collider> {
        self.colliders.values()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Overwrite a body pose.
    pub fn set_body_pose(&mut self, id: BodyId, pose: Pose) -> Result<(), WorldError> {
        let body = self.bodies.get_mut(&id).ok_or(WorldError::UnknownBody(id))?;
        body.pose = pose;
        body.pose_writes += 1;
        Ok(())
    }

    /// Move a body by `delta`.
    pub fn translate_body(&mut self, id: BodyId, delta: Vec2) -> Result<(), WorldError> {
        let body = self.bodies.get_mut(&id).ok_or(WorldError::UnknownBody(id))?;
        body.pose.position += delta;
        body.pose_writes += 1;
        Ok(())
    }

    pub fn set_body_velocity(&mut self, id: BodyId, velocity: Vec2) -> Result<(), WorldError> {
        let body = self.bodies.get_mut(&id).ok_or(WorldError::UnknownBody(id))?;
        body.velocity = velocity;
        Ok(())
    }

    /// World hull of a collider at its body's current pose.
    pub fn collider_hull(&self, collider: &Collider) -> Option<Hull> {
        let body = self.bodies.get(&collider.body)?;
        Some(collider.primitive.hull_at(body.pose, collider.offset))
    }

    /// Passable-from-below direction of a one-way collider; follows body rotation.
    pub fn surface_up(&self, collider: ColliderId) -> Vec2 {
        self.colliders
            .get(&collider)
            .and_then(|c| self.bodies.get(&c.body))
            .map(|b| rotate(UP, b.pose.rotation))
            .unwrap_or(UP)
    }

    /// Colliders passing `filter` whose bounds come within `reach` of `hull`.
    fn candidates<'w>(
        &'w self,
        hull: &'w Hull,
        reach: f32,
        filter: &'w QueryFilter<'w>,
    ) -> impl Iterator<Item = (&'w Collider, Hull)> + 'w {
        let center = hull.centroid();
        let radius = hull.bounding_radius();
        self.colliders
            .values()
            .filter(move |c| filter.passes(c))
            .filter_map(move |c| {
                let other = self.collider_hull(c)?;
                let limit = radius + other.bounding_radius() + reach;
                (other.centroid().distance_squared(center) <= limit * limit).then_some((c, other))
            })
    }

    /// Sweep `hull` along unit `dir` up to `max_distance`.
    ///
    /// An obstacle the hull already overlaps is reported at distance 0 only
    /// when `dir` drives deeper into it. One-way colliders block only on
    /// their top face and never from inside.
    pub fn cast_hull(
        &self,
        hull: &Hull,
        dir: Vec2,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Vec<SweepHit> {
        let mut hits = Vec::new();
        for (collider, other) in self.candidates(hull, max_distance.max(0.0), filter) {
            let oneway = collider.category.is_some_and(|c| c.is_oneway());
            let minkowski = other.minkowski_difference(hull);
            let proximity = minkowski.proximity(Vec2::ZERO);

            let (distance, normal) = if proximity.distance < 0.0 {
                if oneway || dir.dot(proximity.normal) >= 0.0 {
                    continue;
                }
                (0.0, proximity.normal)
            } else {
                let Some(ray) = minkowski.cast_ray(Vec2::ZERO, dir, max_distance) else {
                    continue;
                };
                (ray.distance, ray.normal)
            };

            if oneway && normal.dot(self.surface_up(collider.id)) <= 0.0 {
                continue;
            }

            hits.push(SweepHit {
                collider: collider.id,
                body: collider.body,
                category: collider.category,
                distance,
                normal,
                point: hull.support(-normal) + dir * distance,
            });
        }
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.collider.cmp(&b.collider))
        });
        hits
    }

    /// Colliders intersecting `hull`.
    pub fn overlap_hull(&self, hull: &Hull, filter: &QueryFilter) -> Vec<ColliderId> {
        self.candidates(hull, 0.0, filter)
            .filter(|(_, other)| other.minkowski_difference(hull).proximity(Vec2::ZERO).distance < 0.0)
            .map(|(c, _)| c.id)
            .collect()
    }

    /// Minimum translation moving `hull` out of collider `other`.
    pub fn penetration(&self, hull: &Hull, other: ColliderId) -> Option<Penetration> {
        let collider = self.colliders.get(&other)?;
        let other_hull = self.collider_hull(collider)?;
        let proximity = other_hull.minkowski_difference(hull).proximity(Vec2::ZERO);
        if proximity.distance >= 0.0 {
            return None;
        }
        Some(Penetration {
            direction: proximity.normal,
            depth: -proximity.distance,
            point_a: hull.support(-proximity.normal),
            point_b: other_hull.support(proximity.normal),
        })
    }

    /// Colliders within `max_gap` of `hull`, overlapping ones included.
    pub fn contacts(&self, hull: &Hull, max_gap: f32, filter: &QueryFilter) -> Vec<Contact> {
        self.candidates(hull, max_gap, filter)
            .filter_map(|(c, other)| {
                let proximity = other.minkowski_difference(hull).proximity(Vec2::ZERO);
                (proximity.distance <= max_gap).then(|| Contact {
                    collider: c.id,
                    body: c.body,
                    category: c.category,
                    normal: proximity.normal,
                    separation: proximity.distance,
                    point: hull.support(-proximity.normal),
                })
            })
            .collect()
    }
}
