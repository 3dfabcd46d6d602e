//! Adaptive tile scheduler: the recursive decimate-or-split decision.
//!
//! Each fragment lands in one of three states on entry:
//!
//! - **Leaf-Export**: at or below the triangle threshold, exported as-is.
//! - **Decimate-And-Export**: over threshold at the maximum level,
//!   reduced in place and exported.
//! - **Split-And-Recurse**: a decimated copy of the fragment is exported
//!   as the coarse placeholder for this level, then the original is
//!   partitioned into octants and each child is scheduled at level + 1.
//!
//! Every level of the tree gets a materialized LOD, not just the leaves.
//! Recursion terminates because the level strictly increases up to the
//! configured maximum and children carry strict subsets of their parent's
//! faces.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::decimate::decimate_to_target;
use crate::error::TilerError;
use crate::mesh::Mesh;
use crate::partition::partition_octants;
use crate::tile::TileId;

/// Default per-tile triangle budget.
pub const DEFAULT_TRIANGLE_THRESHOLD: usize = 20_000;

/// Default maximum octree depth.
pub const DEFAULT_MAX_LEVEL: u32 = 3;

/// Tiling parameters.
#[derive(Clone, Copy, Debug)]
pub struct TilerConfig {
  /// Fragments at or below this triangle count become leaves.
  pub triangle_threshold: usize,
  /// Fragments at this level are decimated instead of split.
  pub max_level: u32,
}

impl Default for TilerConfig {
  fn default() -> Self {
    Self {
      triangle_threshold: DEFAULT_TRIANGLE_THRESHOLD,
      max_level: DEFAULT_MAX_LEVEL,
    }
  }
}

/// How an exported tile was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
  /// At or below threshold, exported unchanged.
  Leaf,
  /// Over threshold at max level, decimated in place.
  Decimated,
  /// Coarse placeholder for a fragment that was split further.
  Coarse,
}

/// One row of the tile manifest, produced per exported tile and consumed
/// by texture sizing, external conversion, and the hierarchy builder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileManifestEntry {
  pub tile_name: String,
  pub level: u32,
  pub ix: u32,
  pub iy: u32,
  pub iz: u32,
  pub kind: TileKind,
  pub triangle_count: usize,
  pub material_count: usize,
  pub bounds_min: [f64; 3],
  pub bounds_max: [f64; 3],
  pub output_path: PathBuf,
}

impl TileManifestEntry {
  /// The tile id this entry describes.
  pub fn id(&self) -> TileId {
    TileId::new(self.level, self.ix, self.iy, self.iz)
  }

  /// The tile's bounding box as recorded at export time.
  pub fn bounds(&self) -> Aabb {
    Aabb::new(self.bounds_min.into(), self.bounds_max.into())
  }
}

/// Result of a tiling run: explicit counters plus the full manifest.
#[derive(Clone, Debug, Default)]
pub struct TilingStats {
  /// Tiles exported across all levels.
  pub exported: usize,
  /// Decimation operations performed.
  pub decimated: usize,
  /// Manifest rows in export order.
  pub manifest: Vec<TileManifestEntry>,
}

/// Export seam between the scheduler and the surrounding pipeline.
///
/// The sink persists one finished tile and reports where it put it. Tile
/// data is self-contained at this point; a sink failure aborts the run
/// but cannot corrupt previously exported tiles.
pub trait TileSink {
  fn export(&mut self, id: TileId, kind: TileKind, mesh: &Mesh) -> Result<PathBuf, TilerError>;
}

/// Run adaptive octree tiling over a whole source mesh.
///
/// Consumes the mesh: fragment ownership flows down the recursion and a
/// parent's geometry is dropped as soon as its children exist.
pub fn tile_mesh<S: TileSink>(
  mesh: Mesh,
  config: &TilerConfig,
  sink: &mut S,
) -> Result<TilingStats, TilerError> {
  if mesh.is_empty() {
    return Err(TilerError::EmptyMesh);
  }
  let bounds = Aabb::from_positions(&mesh.positions).ok_or(TilerError::EmptyMesh)?;
  if bounds.is_degenerate() {
    return Err(TilerError::DegenerateBounds(bounds.size().into()));
  }

  let mut stats = TilingStats::default();
  process_fragment(mesh, TileId::ROOT, config, sink, &mut stats)?;

  tracing::info!(
    exported = stats.exported,
    decimated = stats.decimated,
    "adaptive tiling complete"
  );
  Ok(stats)
}

fn process_fragment<S: TileSink>(
  mesh: Mesh,
  id: TileId,
  config: &TilerConfig,
  sink: &mut S,
  stats: &mut TilingStats,
) -> Result<(), TilerError> {
  let triangles = mesh.triangle_count();
  tracing::debug!(tile = %id, triangles, "processing fragment");

  if triangles <= config.triangle_threshold {
    export_tile(sink, stats, id, TileKind::Leaf, &mesh)?;
    return Ok(());
  }

  if id.level >= config.max_level {
    tracing::debug!(tile = %id, "maximum tile level reached - decimating and exporting");
    let reduced = decimate_to_target(&mesh, config.triangle_threshold);
    stats.decimated += 1;
    export_tile(sink, stats, id, TileKind::Decimated, &reduced)?;
    return Ok(());
  }

  // Coarse placeholder for this level, rendered while children stream in.
  let coarse = decimate_to_target(&mesh, config.triangle_threshold);
  stats.decimated += 1;
  export_tile(sink, stats, id, TileKind::Coarse, &coarse)?;
  drop(coarse);

  // Bounds are recomputed from the undecimated fragment right before the
  // split; a cached box from an earlier level would be stale.
  let bounds = Aabb::from_positions(&mesh.positions).ok_or(TilerError::EmptyMesh)?;
  let children = partition_octants(&mesh, &bounds, id);
  drop(mesh);

  for child in children {
    process_fragment(child.mesh, child.id, config, sink, stats)?;
  }
  Ok(())
}

fn export_tile<S: TileSink>(
  sink: &mut S,
  stats: &mut TilingStats,
  id: TileId,
  kind: TileKind,
  mesh: &Mesh,
) -> Result<(), TilerError> {
  let output_path = sink.export(id, kind, mesh)?;
  let bounds = Aabb::from_positions(&mesh.positions).ok_or(TilerError::EmptyMesh)?;

  stats.exported += 1;
  stats.manifest.push(TileManifestEntry {
    tile_name: id.name(),
    level: id.level,
    ix: id.x,
    iy: id.y,
    iz: id.z,
    kind,
    triangle_count: mesh.triangle_count(),
    material_count: mesh.material_count(),
    bounds_min: bounds.min.into(),
    bounds_max: bounds.max.into(),
    output_path,
  });

  tracing::debug!(
    tile = %id,
    kind = ?kind,
    triangles = mesh.triangle_count(),
    "exported tile"
  );
  Ok(())
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
