//! Error type for the tiling core.

use thiserror::Error;

/// Errors surfaced by the core tiling algorithms.
///
/// Per-face problems (degenerate or duplicate topology) are not errors;
/// they are skipped during partitioning. These variants are the fatal
/// per-source-mesh conditions plus sink I/O propagation.
#[derive(Debug, Error)]
pub enum TilerError {
  /// The source mesh has no vertices or no faces.
  #[error("mesh has no geometry to tile")]
  EmptyMesh,

  /// The source bounding box has zero volume, so octant midpoints
  /// cannot be derived.
  #[error("degenerate bounding box (size {0:?}), cannot partition")]
  DegenerateBounds([f64; 3]),

  /// The tileset builder was given tiles but none at level 0.
  #[error("no level-0 tile present, cannot build tileset hierarchy")]
  MissingRootTile,

  /// An export sink failed to persist a tile.
  #[error("tile export failed: {0}")]
  Io(#[from] std::io::Error),
}
