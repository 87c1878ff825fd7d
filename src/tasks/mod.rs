//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: purges expired cache entries at the configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
