//! Saturating fixed-point arithmetic used by the mixing paths.

pub mod helpers;
pub mod intrinsics;
