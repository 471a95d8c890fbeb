//! Error types
//!
//! Query failures are never errors (an empty hit list is a normal outcome);
//! these cover configuration and bookkeeping mistakes made by the caller.

use thiserror::Error;

use crate::sim::{BodyId, ColliderId};

/// Problems loading or validating [`crate::SolverSettings`]
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse solver settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("min contact offset {min} must be positive and below max contact offset {max}")]
    ContactOffsets { min: f32, max: f32 },

    #[error("cast buffer {buffer} must be non-negative and below min contact offset {min}")]
    CastBuffer { buffer: f32, min: f32 },

    #[error("slope limit {0}° must lie strictly between 0° and 90°")]
    SlopeLimit(f32),

    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f32 },

    #[error("max slide iterations must be at least 1")]
    NoSlideIterations,
}

/// Bookkeeping errors raised by [`crate::sim::PhysicsWorld`] and [`crate::sim::SimState`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),

    #[error("unknown collider {0:?}")]
    UnknownCollider(ColliderId),

    #[error("body {0:?} already has a registered controller")]
    AlreadyRegistered(BodyId),

    #[error("body {0:?} has no colliders")]
    NoColliders(BodyId),
}
