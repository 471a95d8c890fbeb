//! Deterministic simulation module
//!
//! All movement logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (by body / collider id)
//! - No rendering or platform dependencies

pub mod character;
pub mod geometry;
pub mod layers;
pub mod platform;
pub mod registry;
pub mod shape;
pub mod solver;
pub mod state;
pub mod tick;
pub mod world;

pub use character::{CharacterController, CharacterEvent, ControllerMode, GroundContext};
pub use geometry::Hull;
pub use layers::{Layer, LayerMask, PlatformCategory};
pub use platform::PlatformController;
pub use registry::Registry;
pub use shape::{CapsuleDirection, Contact, Penetration, Pose, Primitive, Shape, SweepHit};
pub use solver::{MoveMode, Movement, TangentRule, apply_safety_movement, combine_push};
pub use state::SimState;
pub use tick::{advance, tick};
pub use world::{Body, BodyId, Collider, ColliderId, PhysicsWorld, QueryFilter};
