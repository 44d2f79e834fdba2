//! API route modules.

pub mod buckets;
pub mod events;
pub mod invocations;
pub mod topology;
