//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Decay: Halves cache hit counts after a quiet interval and drops entries
//!   that are no longer relevant

mod decay;

pub use decay::{spawn_decay_task, DecayTimer};
