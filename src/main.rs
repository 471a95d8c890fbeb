//! Kinematic platformer demo
//!
//! Builds a small level (floor, slope, one-way ledge, moving lift) and runs a
//! scripted character through it headlessly, logging what it does.
//!
//! Usage: `kinematic-platformer [settings.json]`

use std::error::Error;
use std::process::ExitCode;

use glam::Vec2;

use kinematic_platformer::SolverSettings;
use kinematic_platformer::consts::*;
use kinematic_platformer::sim::{
    BodyId, CapsuleDirection, CharacterEvent, Layer, Pose, Primitive, SimState, advance,
};

/// Render-rate frames the demo feeds into the fixed-step accumulator
const FRAME_DT: f32 = 1.0 / 60.0;
const DEMO_FRAMES: u32 = 60 * 8;

fn main() -> ExitCode {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();

    log::info!("Kinematic platformer demo starting...");
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("demo failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings() -> Result<SolverSettings, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            log::info!("Loading solver settings from {path}");
            Ok(SolverSettings::from_json(&json)?)
        }
        None => Ok(SolverSettings::default()),
    }
}

/// Floor, a 30° ramp on the right, a one-way ledge above the start and a lift
fn build_level(state: &mut SimState) -> Result<BodyId, Box<dyn Error>> {
    state.spawn_static(
        Pose::at(Vec2::new(0.0, -0.5)),
        Primitive::Box { size: Vec2::new(60.0, 1.0) },
        Layer::STATIC_BLOCK,
    )?;
    state.spawn_static(
        Pose::new(Vec2::new(10.0, 1.0), 30.0_f32.to_radians()),
        Primitive::Box { size: Vec2::new(8.0, 0.5) },
        Layer::STATIC_BLOCK,
    )?;
    state.spawn_static(
        Pose::at(Vec2::new(2.0, 2.2)),
        Primitive::Box { size: Vec2::new(3.0, 0.2) },
        Layer::STATIC_ONEWAY,
    )?;
    let lift = state.spawn_platform(
        Pose::at(Vec2::new(-6.0, 0.25)),
        Primitive::Box { size: Vec2::new(2.0, 0.5) },
        Layer::DYNAMIC_BLOCK,
        Vec2::new(0.0, -1.0),
    )?;
    Ok(lift)
}

/// Scripted input for the character at `frame`
fn drive(state: &mut SimState, hero: BodyId, frame: u32) {
    let Some(character) = state.character_mut(hero) else {
        return;
    };
    match frame {
        30 => character.jump(12.0),
        120 => character.run(4.0),
        200 => character.jump(10.0),
        206 => character.break_jump(3.0),
        300 => character.run(-6.0),
        420 => character.run(0.0),
        _ => {}
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let settings = load_settings()?;
    let mut state = SimState::new(settings);
    let lift = build_level(&mut state)?;
    let hero = state.spawn_character(
        Pose::at(Vec2::new(2.0, 1.0)),
        Primitive::Capsule {
            size: Vec2::new(0.8, 1.6),
            direction: CapsuleDirection::Vertical,
        },
    )?;
    log::info!(
        "Level ready: {} bodies, {} colliders",
        state.world.body_count(),
        state.world.collider_count()
    );

    let mut accumulator = 0.0;
    for frame in 0..DEMO_FRAMES {
        drive(&mut state, hero, frame);

        // Lift reverses every two seconds, starting upward
        if frame % 120 == 0 {
            if let Some(platform) = state.platform_mut(lift) {
                let v = platform.velocity();
                platform.set_target_velocity(-v);
            }
        }

        accumulator += FRAME_DT;
        advance(&mut state, &mut accumulator, SIM_DT, MAX_SUBSTEPS)?;

        if let Some(character) = state.character_mut(hero) {
            for event in character.drain_events() {
                match event {
                    CharacterEvent::Slept | CharacterEvent::Woke => log::debug!("{event:?}"),
                    _ => log::info!("frame {frame}: {event:?}"),
                }
            }
        }
        if frame % 30 == 0 {
            if let Some(character) = state.character(hero) {
                log::info!(
                    "frame {frame}: pos ({:.3}, {:.3}) vel ({:.2}, {:.2}) ground={} asleep={}",
                    character.position().x,
                    character.position().y,
                    character.velocity().x,
                    character.velocity().y,
                    character.is_ground(),
                    character.is_asleep()
                );
            }
        }
    }

    log::info!("Demo finished after {} ticks", state.time_ticks);
    Ok(())
}
