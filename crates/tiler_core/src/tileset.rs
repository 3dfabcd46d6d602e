//! Tileset hierarchy builder: reassembles the flat tile list into the
//! nested 3D Tiles document.
//!
//! Parent/child relationships are reconstructed from the octree
//! containment invariant: a tile at `(L+1, cx, cy, cz)` belongs under
//! `(L, cx/2, cy/2, cz/2)`. The output separates the structural root
//! (no content, bounding-box-diagonal error) from the first renderable
//! LOD, so a viewer always has one non-content traversal step before the
//! coarsest real geometry.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::bounds::Aabb;
use crate::error::TilerError;
use crate::tile::TileId;

/// A renderable tile fed to the hierarchy builder.
#[derive(Clone, Debug)]
pub struct TilesetTile {
  pub id: TileId,
  pub bounds: Aabb,
  /// Content URI relative to the tileset.json location.
  pub uri: String,
}

/// Refinement error for a tile at `level`, consumed by streaming viewers
/// to decide when finer children must replace a coarse tile.
///
/// Level 0 is the first renderable LOD and carries a fixed error of 1.0;
/// the structural root above it uses the bounding-box diagonal instead.
pub fn geometric_error(level: u32) -> f64 {
  match level {
    0 => 1.0,
    1 => 0.1,
    2 => 0.05,
    3 => 0.005,
    _ => 0.005 / f64::powi(2.0, (level - 3) as i32),
  }
}

/// Build the nested tileset document from a flat tile list.
///
/// The single level-0 tile becomes the sole child of a synthetic,
/// contentless structural root whose geometric error is the diagonal of
/// the root bounding box. An optional column-major 4x4 `transform` is
/// attached to the structural root.
pub fn build_tileset(
  tiles: &[TilesetTile],
  transform: Option<&[f64; 16]>,
) -> Result<Value, TilerError> {
  let mut by_level: HashMap<u32, HashMap<(u32, u32, u32), &TilesetTile>> = HashMap::new();
  for tile in tiles {
    by_level
      .entry(tile.id.level)
      .or_default()
      .insert((tile.id.x, tile.id.y, tile.id.z), tile);
  }

  let root_tile = by_level
    .get(&0)
    .and_then(|level0| {
      // A well-formed run has exactly one level-0 tile; pick the lowest
      // coordinate for a deterministic document either way.
      level0.values().min_by_key(|t| (t.id.x, t.id.y, t.id.z))
    })
    .copied()
    .ok_or(TilerError::MissingRootTile)?;

  let root_error = root_tile.bounds.diagonal();

  let lod0 = json!({
    "boundingVolume": { "box": bounding_volume_box(&root_tile.bounds) },
    "geometricError": geometric_error(0),
    "content": { "uri": root_tile.uri },
    "children": build_children(0, (root_tile.id.x, root_tile.id.y, root_tile.id.z), &by_level),
  });

  let mut root = json!({
    "boundingVolume": { "box": bounding_volume_box(&root_tile.bounds) },
    "geometricError": root_error,
    "refine": "REPLACE",
    "children": [lod0],
  });
  if let Some(t) = transform {
    root["transform"] = json!(t);
  }

  Ok(json!({
    "asset": {
      "version": "1.1",
      "generator": "mesh2tile",
    },
    "geometricError": root_error,
    "root": root,
  }))
}

/// Children of the tile at `(level, coords)`: every tile one level down
/// whose coordinates integer-divide back to this tile.
fn build_children(
  level: u32,
  coords: (u32, u32, u32),
  by_level: &HashMap<u32, HashMap<(u32, u32, u32), &TilesetTile>>,
) -> Vec<Value> {
  let next_level = level + 1;
  let Some(candidates) = by_level.get(&next_level) else {
    return Vec::new();
  };

  let mut children: Vec<&TilesetTile> = candidates
    .iter()
    .filter(|(&(cx, cy, cz), _)| (cx / 2, cy / 2, cz / 2) == coords)
    .map(|(_, tile)| *tile)
    .collect();
  children.sort_by_key(|t| (t.id.x, t.id.y, t.id.z));

  children
    .into_iter()
    .map(|tile| {
      json!({
        "boundingVolume": { "box": bounding_volume_box(&tile.bounds) },
        "geometricError": geometric_error(tile.id.level),
        "content": { "uri": tile.uri },
        "children": build_children(tile.id.level, (tile.id.x, tile.id.y, tile.id.z), by_level),
      })
    })
    .collect()
}

/// The 12-float `boundingVolume.box`: center plus three axis-aligned
/// half-axis columns.
fn bounding_volume_box(bounds: &Aabb) -> [f64; 12] {
  let c = bounds.center();
  let he = bounds.half_extents();
  [
    c.x, c.y, c.z, // center
    he.x, 0.0, 0.0, // x half-axis
    0.0, he.y, 0.0, // y half-axis
    0.0, 0.0, he.z, // z half-axis
  ]
}

#[cfg(test)]
#[path = "tileset_test.rs"]
mod tileset_test;
