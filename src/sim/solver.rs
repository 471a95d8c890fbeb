//! Safety movement: turning a requested displacement into a collision-free one
//!
//! Three resolution modes:
//! - `None`: trust the caller, apply verbatim
//! - `Collide`: one sweep, stop just short of the first obstacle
//! - `Slide`: repeated sweeps, continuing along each surface hit

use glam::Vec2;

use super::shape::{Pose, Shape, SweepHit};
use super::world::{PhysicsWorld, QueryFilter};
use crate::settings::SolverSettings;
use crate::{UP, angle_between_deg};

/// Floor for the approach cosine so grazing hits cannot divide by zero
const MIN_APPROACH_COS: f32 = 1.0e-3;

/// How a displacement is resolved against the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    None,
    Collide,
    Slide,
}

/// Which part of the leftover motion survives a slide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangentRule {
    /// Shallow surfaces keep horizontal motion, steep ones keep vertical motion
    Walker,
    /// Full tangential motion
    Free,
}

/// Outcome of one safety movement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// Displacement actually applied
    pub displacement: Vec2,
    /// Last obstacle that shortened the move
    pub hit: Option<SweepHit>,
    /// Sweeps performed
    pub iterations: u32,
    /// Slide budget ran out with motion left over
    pub exhausted: bool,
}

impl Movement {
    fn unobstructed(displacement: Vec2) -> Self {
        Self {
            displacement,
            hit: None,
            iterations: 0,
            exhausted: false,
        }
    }
}

/// Resolve `displacement` for `shape` starting at `pose`.
///
/// The returned displacement is what the caller should add to the pose. A
/// sweep that finds nothing is not an error: the full distance is applied.
pub fn apply_safety_movement(
    world: &PhysicsWorld,
    shape: &Shape,
    pose: Pose,
    displacement: Vec2,
    mode: MoveMode,
    rule: TangentRule,
    filter: &QueryFilter,
    settings: &SolverSettings,
) -> Movement {
    match mode {
        MoveMode::None => Movement::unobstructed(displacement),
        MoveMode::Collide => {
            // Too short to sweep reliably, but still applied
            if displacement.length() < settings.min_distance {
                return Movement::unobstructed(displacement);
            }
            let (advance, hit) = collide_step(world, shape, pose, displacement, filter, settings);
            Movement {
                displacement: advance,
                hit,
                iterations: 1,
                exhausted: false,
            }
        }
        MoveMode::Slide => slide(world, shape, pose, displacement, rule, filter, settings),
    }
}

/// One sweep along `displacement`; returns the safe advance and the hit, if any
fn collide_step(
    world: &PhysicsWorld,
    shape: &Shape,
    pose: Pose,
    displacement: Vec2,
    filter: &QueryFilter,
    settings: &SolverSettings,
) -> (Vec2, Option<SweepHit>) {
    let magnitude = displacement.length();
    let dir = displacement / magnitude;
    let offset = settings.min_contact_offset;

    match shape.sweep_nearest(world, pose, dir, magnitude + offset, filter) {
        None => (displacement, None),
        Some(hit) => {
            let cos = (-dir.dot(hit.normal)).max(MIN_APPROACH_COS);
            let allowed = (hit.distance - offset / cos).clamp(0.0, magnitude);
            (dir * allowed, Some(hit))
        }
    }
}

fn slide(
    world: &PhysicsWorld,
    shape: &Shape,
    mut pose: Pose,
    displacement: Vec2,
    rule: TangentRule,
    filter: &QueryFilter,
    settings: &SolverSettings,
) -> Movement {
    let mut remaining = displacement;
    let mut applied = Vec2::ZERO;
    let mut last_hit = None;
    let mut iterations = 0;

    while iterations < settings.max_slide_iterations {
        if remaining.length() < settings.min_distance {
            remaining = Vec2::ZERO;
            break;
        }
        iterations += 1;

        let (advance, hit) = collide_step(world, shape, pose, remaining, filter, settings);
        applied += advance;
        pose = pose.translated(advance);

        let Some(hit) = hit else {
            remaining = Vec2::ZERO;
            break;
        };
        last_hit = Some(hit);

        remaining = project_on_surface(remaining - advance, hit.normal, rule, settings);
    }

    let exhausted = remaining.length() >= settings.min_distance;
    if exhausted {
        log::trace!(
            "slide budget exhausted after {} sweeps, dropping {:?}",
            iterations,
            remaining
        );
    }

    Movement {
        displacement: applied,
        hit: last_hit,
        iterations,
        exhausted,
    }
}

/// Leftover motion after hitting a surface with `normal`
pub fn project_on_surface(rest: Vec2, normal: Vec2, rule: TangentRule, settings: &SolverSettings) -> Vec2 {
    match rule {
        TangentRule::Free => rest - normal * rest.dot(normal),
        TangentRule::Walker => {
            let tangent = Vec2::new(normal.y, -normal.x);
            // Floors and ceilings alike count as shallow
            let slope = angle_between_deg(UP, Vec2::new(normal.x, normal.y.abs()));
            let kept = if slope <= settings.slope_limit {
                Vec2::new(rest.x, 0.0)
            } else {
                Vec2::new(0.0, rest.y)
            };
            tangent * kept.dot(tangent)
        }
    }
}

/// Fold a push into the running total, keeping the larger magnitude per axis
pub fn combine_push(total: Vec2, push: Vec2) -> Vec2 {
    Vec2::new(
        if push.x.abs() > total.x.abs() { push.x } else { total.x },
        if push.y.abs() > total.y.abs() { push.y } else { total.y },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::layers::{Layer, LayerMask};
    use crate::sim::shape::Primitive;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn character(world: &mut PhysicsWorld, at: Vec2) -> (Shape, Pose) {
        let prim = Primitive::Box { size: Vec2::ONE };
        let pose = Pose::at(at);
        let body = world.add_body(pose);
        let collider = world
            .add_collider(body, prim, Vec2::ZERO, Layer::CHARACTER)
            .unwrap();
        (Shape::new(body, collider, prim, Vec2::ZERO), pose)
    }

    fn wall(world: &mut PhysicsWorld, center: Vec2, size: Vec2) {
        let body = world.add_body(Pose::at(center));
        world
            .add_collider(body, Primitive::Box { size }, Vec2::ZERO, Layer::STATIC_BLOCK)
            .unwrap();
    }

    fn run(world: &PhysicsWorld, shape: &Shape, pose: Pose, d: Vec2, mode: MoveMode, rule: TangentRule) -> Movement {
        let settings = SolverSettings::default();
        let filter = QueryFilter::new(LayerMask::PLATFORM);
        apply_safety_movement(world, shape, pose, d, mode, rule, &filter, &settings)
    }

    #[test]
    fn test_stop_at_wall() {
        let mut world = PhysicsWorld::new();
        let (shape, pose) = character(&mut world, Vec2::ZERO);
        // Near face at x = 1.0
        wall(&mut world, Vec2::new(1.5, 0.0), Vec2::new(1.0, 10.0));

        let settings = SolverSettings::default();
        let velocity = Vec2::new(10.0, 0.0);
        let moved = run(&world, &shape, pose, velocity * 0.1, MoveMode::Collide, TangentRule::Walker);

        let leading_edge = pose.position.x + moved.displacement.x + 0.5;
        assert_relative_eq!(leading_edge, 1.0 - settings.min_contact_offset, epsilon = 1e-5);
        assert!(moved.hit.is_some());
    }

    #[test]
    fn test_slide_along_wall_both_sides() {
        for side in [1.0_f32, -1.0] {
            let mut world = PhysicsWorld::new();
            let settings = SolverSettings::default();
            // Start touching the wall (gap = min contact offset)
            let gap = settings.min_contact_offset;
            let (shape, pose) = character(&mut world, Vec2::ZERO);
            wall(
                &mut world,
                Vec2::new(side * (0.5 + gap + 0.5), 0.0),
                Vec2::new(1.0, 20.0),
            );

            let d = Vec2::new(5.0 * side, 5.0) * 0.02;
            for rule in [TangentRule::Walker, TangentRule::Free] {
                let moved = run(&world, &shape, pose, d, MoveMode::Slide, rule);
                assert_relative_eq!(moved.displacement.x, 0.0, epsilon = 1e-4);
                assert_relative_eq!(moved.displacement.y, 0.1, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_collide_does_not_slide() {
        let mut world = PhysicsWorld::new();
        let settings = SolverSettings::default();
        let (shape, pose) = character(&mut world, Vec2::ZERO);
        wall(
            &mut world,
            Vec2::new(1.0 + settings.min_contact_offset, 0.0),
            Vec2::new(1.0, 20.0),
        );
        let moved = run(&world, &shape, pose, Vec2::new(0.1, 0.1), MoveMode::Collide, TangentRule::Free);
        assert!(moved.displacement.length() < 1e-4);
    }

    #[test]
    fn test_landing_absorbs_vertical_motion() {
        let mut world = PhysicsWorld::new();
        let (shape, pose) = character(&mut world, Vec2::new(0.0, 1.0));
        // Floor top at y = 0
        wall(&mut world, Vec2::new(0.0, -0.5), Vec2::new(20.0, 1.0));

        let moved = run(&world, &shape, pose, Vec2::new(0.3, -1.0), MoveMode::Slide, TangentRule::Walker);
        let end = pose.position + moved.displacement;
        // Bottom edge rests one contact offset above the floor
        assert_relative_eq!(end.y - 0.5, SolverSettings::default().min_contact_offset, epsilon = 1e-4);
        assert!(end.x > 0.0 && end.x <= 0.3 + 1e-4);
    }

    #[test]
    fn test_walker_climbs_shallow_slope() {
        let rest = Vec2::new(1.0, 0.0);
        let normal = Vec2::new(-1.0, 2.0).normalize();
        let p = project_on_surface(rest, normal, TangentRule::Walker, &SolverSettings::default());
        assert!(p.x > 0.0 && p.y > 0.0);
        assert_relative_eq!(p.dot(normal), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_walker_cannot_walk_up_steep_slope() {
        let rest = Vec2::new(1.0, 0.0);
        let normal = Vec2::new(-2.0, 0.5).normalize();
        let p = project_on_surface(rest, normal, TangentRule::Walker, &SolverSettings::default());
        assert!(p.length() < 1e-6);
    }

    #[test]
    fn test_walker_ceiling_keeps_horizontal() {
        let rest = Vec2::new(1.0, 1.0);
        let p = project_on_surface(rest, -Vec2::Y, TangentRule::Walker, &SolverSettings::default());
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_exhausted_budget_keeps_partial_advance() {
        // Narrow V-shaped pocket: every slide bounces into the other wall
        let mut world = PhysicsWorld::new();
        let (shape, pose) = character(&mut world, Vec2::new(0.0, 2.0));
        for (x, angle) in [(-1.2_f32, 0.3_f32), (1.2, -0.3)] {
            let body = world.add_body(Pose::new(Vec2::new(x, 0.0), angle));
            world
                .add_collider(body, Primitive::Box { size: Vec2::new(1.0, 8.0) }, Vec2::ZERO, Layer::STATIC_BLOCK)
                .unwrap();
        }
        let settings = SolverSettings::default();
        let moved = run(&world, &shape, pose, Vec2::new(0.0, -10.0), MoveMode::Slide, TangentRule::Free);
        assert!(moved.iterations <= settings.max_slide_iterations);
        assert!(moved.displacement.y < 0.0);
        let end = pose.translated(moved.displacement);
        let filter = QueryFilter::new(LayerMask::PLATFORM);
        assert!(shape.overlap(&world, end, &filter).is_empty());
    }

    #[test]
    fn test_collide_applies_tiny_displacement() {
        let mut world = PhysicsWorld::new();
        let (shape, pose) = character(&mut world, Vec2::ZERO);
        let d = Vec2::new(5.0e-5, -2.0e-5);
        let moved = run(&world, &shape, pose, d, MoveMode::Collide, TangentRule::Walker);
        assert_eq!(moved.displacement, d);
        assert_eq!(moved.iterations, 0);
    }

    #[test]
    fn test_combine_push_keeps_larger_per_axis() {
        let total = combine_push(Vec2::ZERO, Vec2::new(0.2, 0.0));
        let total = combine_push(total, Vec2::new(-0.3, 0.1));
        assert_eq!(total, Vec2::new(-0.3, 0.1));
        let total = combine_push(total, Vec2::new(0.25, 0.05));
        assert_eq!(total, Vec2::new(-0.3, 0.1));
    }

    proptest! {
        #[test]
        fn prop_free_motion_is_exact(
            x in -5.0f32..5.0,
            y in -5.0f32..5.0,
            mode in prop_oneof![Just(MoveMode::None), Just(MoveMode::Collide), Just(MoveMode::Slide)],
        ) {
            let mut world = PhysicsWorld::new();
            let (shape, pose) = character(&mut world, Vec2::ZERO);
            let d = Vec2::new(x, y);
            let moved = run(&world, &shape, pose, d, mode, TangentRule::Walker);
            let settings = SolverSettings::default();
            prop_assert!((moved.displacement - d).length() <= settings.min_distance);
        }

        #[test]
        fn prop_never_penetrates_wall(speed in 0.0f32..60.0, dt in 0.005f32..0.1) {
            let mut world = PhysicsWorld::new();
            let (shape, pose) = character(&mut world, Vec2::ZERO);
            wall(&mut world, Vec2::new(1.5, 0.0), Vec2::new(1.0, 10.0));
            let moved = run(&world, &shape, pose, Vec2::new(speed * dt, 0.0), MoveMode::Slide, TangentRule::Walker);
            let leading_edge = moved.displacement.x + 0.5;
            prop_assert!(leading_edge <= 1.0 - SolverSettings::default().min_contact_offset + 1e-5);
        }
    }
}
