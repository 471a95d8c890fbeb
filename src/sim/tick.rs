//! Fixed timestep simulation tick
//!
//! Characters step first (in body id order), then platforms (in body id
//! order). Characters therefore see platform positions from the end of the
//! previous tick: a platform that closes in on a character this tick pushes
//! it on the next one.

use super::state::SimState;
use crate::error::WorldError;

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimState, dt: f32) -> Result<(), WorldError> {
    let SimState {
        world,
        platforms,
        characters,
        ..
    } = state;

    for character in characters.iter_mut() {
        character.step(world, platforms, dt)?;
    }
    for (_, platform) in platforms.iter() {
        platform.step(world, dt)?;
    }

    state.time_ticks += 1;
    Ok(())
}

/// Run as many fixed steps as `accumulator` holds, up to `max_substeps`.
///
/// Returns the number of ticks taken; leftover time stays in `accumulator`.
pub fn advance(
    state: &mut SimState,
    accumulator: &mut f32,
    dt: f32,
    max_substeps: u32,
) -> Result<u32, WorldError> {
    let mut substeps = 0;
    while *accumulator >= dt && substeps < max_substeps {
        tick(state, dt)?;
        *accumulator -= dt;
        substeps += 1;
    }
    if substeps == max_substeps && *accumulator >= dt {
        log::warn!("dropping {:.3}s of simulation time", *accumulator);
        *accumulator = 0.0;
    }
    Ok(substeps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::{ControllerMode, Layer, PlatformController, Pose, Primitive};
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn tall_platform(state: &mut SimState, x: f32, velocity: Vec2) {
        state
            .spawn_platform(
                Pose::at(Vec2::new(x, 0.0)),
                Primitive::Box { size: Vec2::new(1.0, 2.0) },
                Layer::DYNAMIC_BLOCK,
                velocity,
            )
            .unwrap();
    }

    fn floating_character(state: &mut SimState) {
        state
            .spawn_character(Pose::default(), Primitive::Box { size: Vec2::ONE })
            .unwrap();
        state.characters[0].set_mode(ControllerMode::Free);
    }

    #[test]
    fn test_tick_counts() {
        let mut state = SimState::default();
        tick(&mut state, SIM_DT).unwrap();
        tick(&mut state, SIM_DT).unwrap();
        assert_eq!(state.time_ticks, 2);
    }

    #[test]
    fn test_advance_keeps_remainder() {
        let mut state = SimState::default();
        let mut accumulator = SIM_DT * 2.5;
        let ticks = advance(&mut state, &mut accumulator, SIM_DT, 8).unwrap();
        assert_eq!(ticks, 2);
        assert_relative_eq!(accumulator, SIM_DT * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_advance_drops_backlog() {
        let mut state = SimState::default();
        let mut accumulator = SIM_DT * 20.0;
        let ticks = advance(&mut state, &mut accumulator, SIM_DT, 4).unwrap();
        assert_eq!(ticks, 4);
        assert_eq!(accumulator, 0.0);
    }

    #[test]
    fn test_push_lags_one_tick() {
        let mut state = SimState::default();
        floating_character(&mut state);
        // Face 0.1 from the character, closing at 0.02 per tick
        tall_platform(&mut state, -1.1, Vec2::new(1.0, 0.0));

        let mut positions = Vec::new();
        for _ in 0..6 {
            tick(&mut state, SIM_DT).unwrap();
            positions.push(state.characters[0].position().x);
        }

        // Gap reaches contact range (0.04) at the end of tick 3; the push
        // starts on tick 4
        for x in &positions[..3] {
            assert_eq!(*x, 0.0);
        }
        assert_relative_eq!(positions[3], 0.02, epsilon = 1e-4);
        assert_relative_eq!(positions[5] - positions[4], 0.02, epsilon = 1e-4);
    }

    #[test]
    fn test_converging_pushes_keep_larger_per_axis() {
        let mut state = SimState::default();
        floating_character(&mut state);
        let settings = state.settings;

        // Left face 0.045 away pushing at 2, right face 0.03 away pushing at 3
        tall_platform(&mut state, -1.045, Vec2::new(2.0, 0.0));
        tall_platform(&mut state, 1.03, Vec2::new(-3.0, 0.0));

        tick(&mut state, SIM_DT).unwrap();

        // The stronger push wins outright and is cut short by the left platform
        let expected = -(0.045 - settings.min_contact_offset);
        assert_relative_eq!(state.characters[0].position().x, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_rider_follows_platform() {
        let mut state = SimState::default();
        let lift = state
            .spawn_platform(
                Pose::default(),
                Primitive::Box { size: Vec2::new(4.0, 0.5) },
                Layer::DYNAMIC_BLOCK,
                Vec2::new(2.0, 0.0),
            )
            .unwrap();
        let rest = 0.25 + 0.5 + state.settings.min_contact_offset;
        state
            .spawn_character(Pose::at(Vec2::new(0.0, rest)), Primitive::Box { size: Vec2::ONE })
            .unwrap();

        let mut previous = state.characters[0].position();
        for _ in 0..10 {
            tick(&mut state, SIM_DT).unwrap();
            let now = state.characters[0].position();
            assert_relative_eq!(now.x - previous.x, 2.0 * SIM_DT, epsilon = 1e-4);
            assert_relative_eq!(now.y, rest, epsilon = 1e-4);
            previous = now;
        }
        assert_eq!(state.characters[0].riding(), Some(lift));
    }

    #[test]
    fn test_oneway_platform_passes_through_from_above() {
        for (layer, pushed) in [(Layer::DYNAMIC_ONEWAY, false), (Layer::DYNAMIC_BLOCK, true)] {
            let mut state = SimState::default();
            floating_character(&mut state);
            // Bottom face 0.03 above the character, descending
            state
                .spawn_platform(
                    Pose::at(Vec2::new(0.0, 0.63)),
                    Primitive::Box { size: Vec2::new(2.0, 0.2) },
                    layer,
                    Vec2::new(0.0, -1.0),
                )
                .unwrap();

            for _ in 0..10 {
                tick(&mut state, SIM_DT).unwrap();
            }
            let y = state.characters[0].position().y;
            if pushed {
                assert!(y < -0.1, "{layer:?} should push, y = {y}");
            } else {
                assert_eq!(y, 0.0, "{layer:?} should pass through");
            }
        }
    }

    #[test]
    fn test_rider_not_pushed_by_own_platform() {
        let mut state = SimState::default();
        let lift = state
            .spawn_platform(
                Pose::default(),
                Primitive::Box { size: Vec2::new(4.0, 0.5) },
                Layer::DYNAMIC_BLOCK,
                Vec2::new(0.0, 3.0),
            )
            .unwrap();
        let rest = 0.25 + 0.5 + state.settings.min_contact_offset;
        state
            .spawn_character(Pose::at(Vec2::new(0.0, rest)), Primitive::Box { size: Vec2::ONE })
            .unwrap();

        let mut previous = state.characters[0].position().y;
        for _ in 0..10 {
            tick(&mut state, SIM_DT).unwrap();
            let y = state.characters[0].position().y;
            // Carried once, not carried and pushed
            assert_relative_eq!(y - previous, 3.0 * SIM_DT, epsilon = 1e-4);
            previous = y;
        }
        assert_eq!(state.characters[0].riding(), Some(lift));
    }

    #[test]
    fn test_push_counts_each_body_once() {
        let mut state = SimState::default();
        floating_character(&mut state);

        // One body, two colliders: a wall left of the character and a floor
        // under it, both 0.01 away, moving diagonally
        let body = state.world.add_body(Pose::default());
        state
            .world
            .add_collider(
                body,
                Primitive::Box { size: Vec2::new(1.0, 2.0) },
                Vec2::new(-1.01, 0.5),
                Layer::DYNAMIC_BLOCK,
            )
            .unwrap();
        state
            .world
            .add_collider(
                body,
                Primitive::Box { size: Vec2::new(3.0, 1.0) },
                Vec2::new(1.0, -1.01),
                Layer::DYNAMIC_BLOCK,
            )
            .unwrap();
        let mut platform = PlatformController::new(&state.world, body).unwrap();
        platform.set_target_velocity(Vec2::new(1.0, 1.0));
        state.platforms.add(body, platform).unwrap();

        tick(&mut state, SIM_DT).unwrap();

        let moved = state.characters[0].position();
        assert!((moved.x.abs() < 1e-6) != (moved.y.abs() < 1e-6), "moved {moved:?}");
        assert_relative_eq!(moved.length(), SIM_DT, epsilon = 1e-4);
    }

    #[test]
    fn test_determinism() {
        fn run() -> Vec<Vec2> {
            let mut state = SimState::default();
            state
                .spawn_static(
                    Pose::at(Vec2::new(0.0, -0.5)),
                    Primitive::Box { size: Vec2::new(20.0, 1.0) },
                    Layer::STATIC_BLOCK,
                )
                .unwrap();
            state
                .spawn_character(Pose::at(Vec2::new(0.0, 2.0)), Primitive::Circle { radius: 0.5 })
                .unwrap();
            state.characters[0].run(3.0);
            (0..60)
                .map(|_| {
                    tick(&mut state, SIM_DT).unwrap();
                    state.characters[0].position()
                })
                .collect()
        }
        assert_eq!(run(), run());
    }
}
