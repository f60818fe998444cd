//! Error taxonomy for the simulation layer.
//!
//! Mirrors the teacher's habit of concrete, typed errors returned from
//! fallible operations rather than a boxed catch-all. `MissingEntity` is
//! handled internally (attachment cleanup) and rarely escapes to a caller;
//! `InvariantViolation` is the one variant a room task should treat as fatal.

use crate::ids::SpacedId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("entity {0:?} missing from grid")]
    MissingEntity(SpacedId),

    #[error("grid invariant violated: {0}")]
    InvariantViolation(String),
}
