//! Core types and utilities

pub mod lobe;
pub mod vec2;

pub use lobe::{Lobe, LobeGeometry};
pub use vec2::Vec2;
