//! Types shared between the window-manager components

pub mod geometry;

pub use geometry::{Extents, Geometry};
