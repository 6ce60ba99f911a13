//! Grid rasterization and field accumulation modules

pub mod hazard;
pub mod raster;
pub mod topography;

// Re-export main types
pub use raster::{IntersectionCache, LobeCells};
pub use topography::{BoundingBox, FieldSnapshot, Output, Topography, TopographyError};
