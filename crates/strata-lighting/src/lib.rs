//! Sunlight and block-light propagation for chunks.
//!
//! Lighting runs in two passes. [`generate_internal_lighting`] lights a single
//! freshly generated chunk in isolation; [`propagate_boundary_light`] later
//! carries light across the chunk's faces into its locked neighbors.

mod internal;
mod propagator;
pub mod rules;

pub use internal::generate_internal_lighting;
pub use propagator::propagate_boundary_light;
