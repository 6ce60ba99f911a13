//! Lava Flow Rasterization Core Library
//!
//! Rasterizes elliptical lava-flow lobes against a regular elevation grid,
//! accumulates deposited thickness and downstream hazard per cell, and answers
//! the interpolated height/slope queries that steer flow propagation.
//!
//! ## Engine components
//!
//! - Scanline classification of grid cells into lobe-enclosed and
//!   boundary-intersecting sets, with a per-flow intersection cache
//! - Fractional cell coverage via sub-cell column sampling and bisection
//! - Worst-case hazard accumulation over a sequence of lobes
//! - Piecewise-linear height/slope interpolation with triangle selection

// Core types and utilities
pub mod core_types;

// Grid rasterization and field accumulation
pub mod grid;

// Re-export core types
pub use core_types::{Lobe, LobeGeometry, Vec2};

// Re-export grid types
pub use grid::{
    BoundingBox, FieldSnapshot, IntersectionCache, LobeCells, Output, Topography, TopographyError,
};
