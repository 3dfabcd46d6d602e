//! tiler_core - adaptive octree mesh tiling for streaming asset pipelines
//!
//! This crate turns a large in-memory mesh into a multi-resolution,
//! spatially tiled hierarchy suitable for 3D-Tiles-style streaming. The
//! core pieces:
//!
//! - **Spatial partitioner**: face-atomic octant split of a mesh fragment
//!   by centroid against the bounding-box midpoint
//! - **Adaptive tile scheduler**: recursive decimate-or-split decision
//!   driven by a triangle threshold and a maximum depth, with a coarse
//!   placeholder materialized at every level
//! - **Texture budget planner**: deterministic per-tile output texture
//!   resolutions that respect the source texture's total pixel budget
//! - **Tileset hierarchy builder**: reassembles the flat tile manifest
//!   into the nested 3D Tiles bounding-volume hierarchy
//!
//! Mesh I/O, texture resizing, and subprocess orchestration are the
//! caller's business; the crate consumes an in-memory [`Mesh`] and
//! exports through the [`TileSink`] seam.
//!
//! # Example
//!
//! ```ignore
//! use tiler_core::{tile_mesh, Mesh, TilerConfig};
//!
//! let mesh: Mesh = load_from_somewhere();
//! let stats = tile_mesh(mesh, &TilerConfig::default(), &mut sink)?;
//!
//! println!("exported {} tiles ({} decimations)",
//!     stats.exported, stats.decimated);
//! ```

pub mod bounds;
pub mod budget;
pub mod decimate;
pub mod error;
pub mod mesh;
pub mod partition;
pub mod scheduler;
pub mod tile;
pub mod tileset;

// Re-export commonly used items
pub use bounds::Aabb;
pub use budget::{
  estimate_tile_count, TextureBudget, BASE_TEXTURE_SIZE, LEVEL_LINEAR_REDUCTION, MIN_TEXTURE_SIZE,
};
pub use decimate::decimate_to_target;
pub use error::TilerError;
pub use mesh::{Face, Mesh};
pub use partition::{partition_octants, Fragment};
pub use scheduler::{
  tile_mesh, TileKind, TileManifestEntry, TileSink, TilerConfig, TilingStats,
  DEFAULT_MAX_LEVEL, DEFAULT_TRIANGLE_THRESHOLD,
};
pub use tile::TileId;
pub use tileset::{build_tileset, geometric_error, TilesetTile};
