//! Texture budget planner: per-tile output resolutions that respect the
//! source texture's total pixel budget.
//!
//! Planning runs once per source mesh and is persisted as a JSON sidecar
//! next to the tile manifest, so later per-tile sizing queries (possibly
//! in a different process) reproduce the same decisions without
//! re-deriving global stats. Both entry points are pure: identical inputs
//! always produce identical outputs, which is what makes independent,
//! parallel per-tile sizing safe.

use serde::{Deserialize, Serialize};

/// Base output resolution; level 0 always bakes at this size.
pub const BASE_TEXTURE_SIZE: u32 = 1024;

/// Smallest resolution a tile may shrink to.
pub const MIN_TEXTURE_SIZE: u32 = 32;

/// Linear resolution reduction per octree level past the budget level.
/// Each level octuples tile count, so shrinking each axis by ~sqrt(8)
/// keeps total pixels level-to-level constant.
pub const LEVEL_LINEAR_REDUCTION: f64 = 2.828;

/// Hard cap on simulated octree depth for both estimation loops.
const LEVEL_SEARCH_CAP: u32 = 10;

/// Persisted texture budget state, computed once per source mesh.
///
/// Field names are the sidecar wire format; every later texture-sizing
/// invocation reads this back instead of re-measuring the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureBudget {
  pub source_texture_width: u32,
  pub source_texture_height: u32,
  pub source_texture_pixels: u64,
  pub total_triangles: u64,
  pub triangle_threshold: u64,
  pub estimated_tiles: u64,
  pub estimated_max_depth: u32,
  pub base_texture_size: u32,
}

impl TextureBudget {
  /// Plan the budget for one source mesh and texture.
  pub fn plan(
    source_width: u32,
    source_height: u32,
    total_triangles: u64,
    triangle_threshold: u64,
  ) -> Self {
    let (estimated_tiles, estimated_max_depth) =
      estimate_tile_count(total_triangles, triangle_threshold);

    let budget = Self {
      source_texture_width: source_width,
      source_texture_height: source_height,
      source_texture_pixels: u64::from(source_width) * u64::from(source_height),
      total_triangles,
      triangle_threshold,
      estimated_tiles,
      estimated_max_depth,
      base_texture_size: BASE_TEXTURE_SIZE,
    };

    tracing::info!(
      source_width,
      source_height,
      total_triangles,
      estimated_tiles,
      estimated_max_depth,
      budget_level = budget.budget_level(),
      "planned texture budget"
    );
    budget
  }

  /// The smallest level at which the cumulative pixel count of all tiles
  /// at base resolution covers the source texture's pixels.
  ///
  /// Below this level every tile can keep full resolution without
  /// over-representing the source detail; past it, resolutions shrink.
  pub fn budget_level(&self) -> u32 {
    let base_pixels = u64::from(self.base_texture_size) * u64::from(self.base_texture_size);
    let mut cumulative: u64 = 0;
    for level in 0..=LEVEL_SEARCH_CAP {
      cumulative += 8u64.pow(level).saturating_mul(base_pixels);
      if cumulative >= self.source_texture_pixels {
        return level;
      }
    }
    LEVEL_SEARCH_CAP
  }

  /// Output texture resolution for a tile at `level`.
  ///
  /// Level 0 is the always-visible fallback and stays at base resolution
  /// by design. Levels within the budget keep full resolution; past the
  /// budget level the linear size shrinks by ~sqrt(8) per level, snapped
  /// to the nearest power of two and clamped to
  /// `[MIN_TEXTURE_SIZE, base]`. An exact tie between the neighboring
  /// powers of two resolves to the upper one.
  pub fn resolution_for_level(&self, level: u32) -> u32 {
    if level == 0 {
      return self.base_texture_size;
    }
    let budget_level = self.budget_level();
    if level <= budget_level {
      return self.base_texture_size;
    }
    let levels_past = level - budget_level;
    let reduction = LEVEL_LINEAR_REDUCTION.powi(levels_past as i32);
    let raw = f64::from(self.base_texture_size) / reduction;
    nearest_power_of_two(raw).clamp(MIN_TEXTURE_SIZE, self.base_texture_size)
  }
}

/// Heuristic upper-bound estimate of tile count and octree depth.
///
/// Simulates dividing the triangle load by 8 per level, adding at most
/// `8^depth` tiles per level, until the per-tile load fits the threshold
/// or the depth cap is hit. Reporting and metadata only: the real tile
/// count depends on how the geometry actually distributes over octants.
pub fn estimate_tile_count(total_triangles: u64, triangle_threshold: u64) -> (u64, u32) {
  if triangle_threshold == 0 || total_triangles <= triangle_threshold {
    return (1, 0);
  }

  let mut tiles: u64 = 1;
  let mut remaining = total_triangles as f64;
  let mut depth = 0;
  for d in 1..=LEVEL_SEARCH_CAP {
    tiles += 8u64.pow(d).min(total_triangles / triangle_threshold);
    remaining /= 8.0;
    depth = d;
    if remaining <= triangle_threshold as f64 {
      break;
    }
  }
  (tiles, depth)
}

/// Nearest power of two to `value`; exact midpoints resolve upward
/// because the comparison is strictly less-than.
fn nearest_power_of_two(value: f64) -> u32 {
  if value <= 1.0 {
    return 1;
  }
  let mut lower: u32 = 1;
  while f64::from(lower) * 2.0 <= value {
    lower *= 2;
  }
  let upper = lower * 2;
  if value - f64::from(lower) < f64::from(upper) - value {
    lower
  } else {
    upper
  }
}
