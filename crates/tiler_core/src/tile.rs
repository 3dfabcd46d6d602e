//! TileId - immutable value type identifying an octree tile.
//!
//! Tiles are identified by their grid coordinates at their own level.
//! Level 0 is the whole-model root; each level doubles the grid along
//! every axis. The id is carried alongside each fragment from creation;
//! the `{level}_{x}_{y}_{z}` string form exists only at the
//! serialization boundary (file names, object names, tileset URIs).

use std::fmt;

/// Suffix carried by the working name of a coarse placeholder mesh,
/// stripped again on final export.
pub const DECIMATED_SUFFIX: &str = "_decimated";

/// Octree tile identifier - immutable value type.
///
/// Coordinates are at the tile's own level: a tile at level L with
/// coordinate (x, y, z) is spatially contained within its parent at
/// level L-1 with coordinate (x/2, y/2, z/2).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TileId {
  /// Octree depth (0 = whole model, higher = finer).
  pub level: u32,
  /// Grid X position at this tile's level.
  pub x: u32,
  /// Grid Y position at this tile's level.
  pub y: u32,
  /// Grid Z position at this tile's level.
  pub z: u32,
}

impl TileId {
  /// The whole-model root tile.
  pub const ROOT: Self = Self {
    level: 0,
    x: 0,
    y: 0,
    z: 0,
  };

  /// Create a new tile id.
  pub fn new(level: u32, x: u32, y: u32, z: u32) -> Self {
    Self { level, x, y, z }
  }

  /// Get the child tile id for an octant at level + 1.
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  pub fn child(&self, octant: u8) -> Self {
    debug_assert!(octant < 8, "octant must be 0-7");
    let dx = u32::from(octant & 1);
    let dy = u32::from((octant >> 1) & 1);
    let dz = u32::from((octant >> 2) & 1);
    Self {
      level: self.level + 1,
      x: self.x * 2 + dx,
      y: self.y * 2 + dy,
      z: self.z * 2 + dz,
    }
  }

  /// Get the parent tile id (coarser: level - 1).
  ///
  /// Returns None at level 0.
  pub fn parent(&self) -> Option<Self> {
    if self.level == 0 {
      return None;
    }
    Some(Self {
      level: self.level - 1,
      x: self.x / 2,
      y: self.y / 2,
      z: self.z / 2,
    })
  }

  /// Wire-format tile name: `{level}_{x}_{y}_{z}`.
  pub fn name(&self) -> String {
    format!("{}_{}_{}_{}", self.level, self.x, self.y, self.z)
  }

  /// Working name of this tile's coarse placeholder mesh.
  pub fn decimated_name(&self) -> String {
    format!("{}{DECIMATED_SUFFIX}", self.name())
  }

  /// Directory a tile of this level is exported into.
  pub fn level_dir(&self) -> String {
    format!("TileLevel_{}", self.level)
  }

  /// Parse a tile id back out of its wire-format name.
  ///
  /// Accepts an optional `_decimated` suffix and an optional file
  /// extension. This is the serialization-boundary fallback; ids carried
  /// in a manifest never round-trip through strings.
  pub fn parse_name(name: &str) -> Option<Self> {
    let name = name.split('.').next()?;
    let name = name.strip_suffix(DECIMATED_SUFFIX).unwrap_or(name);
    let mut parts = name.split('_');
    let level = parts.next()?.parse().ok()?;
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
      return None;
    }
    Some(Self { level, x, y, z })
  }
}

impl fmt::Display for TileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}_{}_{}", self.level, self.x, self.y, self.z)
  }
}

#[cfg(test)]
#[path = "tile_test.rs"]
mod tile_test;
