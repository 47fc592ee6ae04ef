//! Common utilities and data structures shared by the contour extraction and
//! tile assembly stages.

mod geometry;

pub use geometry::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid build input: {0}")]
    InvalidInput(String),

    #[error("contour generation failed: {0}")]
    ContourGeneration(String),

    #[error("tile assembly failed: {0}")]
    TileAssembly(String),
}

/// Result type for build operations
pub type Result<T> = std::result::Result<T, Error>;
