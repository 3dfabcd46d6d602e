//! Axis-aligned bounding box with double precision for building-scale scans.

use glam::{DVec3, Vec3};

/// Double-precision axis-aligned bounding box.
///
/// Recomputed fresh from a fragment's vertex positions before every split
/// decision; never inherited across a split, since partitioning and
/// decimation both change the geometry it would describe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl Aabb {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Tight bounds of a vertex set. Returns `None` for an empty set.
  pub fn from_positions(positions: &[Vec3]) -> Option<Self> {
    let first = positions.first()?.as_dvec3();
    let mut min = first;
    let mut max = first;
    for p in &positions[1..] {
      let p = p.as_dvec3();
      min = min.min(p);
      max = max.max(p);
    }
    Some(Self { min, max })
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Get the center of the AABB, the octant split midpoint.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Half-extents along each axis.
  #[inline]
  pub fn half_extents(&self) -> DVec3 {
    self.size() * 0.5
  }

  /// Full corner-to-corner diagonal length.
  #[inline]
  pub fn diagonal(&self) -> f64 {
    self.size().length()
  }

  /// Zero-volume check: flat on at least one axis.
  ///
  /// A degenerate box cannot produce eight usable octants.
  #[inline]
  pub fn is_degenerate(&self) -> bool {
    let size = self.size();
    size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_positions() {
    let positions = vec![
      Vec3::new(-1.0, 2.0, -3.0),
      Vec3::new(4.0, -5.0, 6.0),
      Vec3::new(0.0, 0.0, 0.0),
    ];
    let aabb = Aabb::from_positions(&positions).unwrap();
    assert_eq!(aabb.min, DVec3::new(-1.0, -5.0, -3.0));
    assert_eq!(aabb.max, DVec3::new(4.0, 2.0, 6.0));
  }

  #[test]
  fn test_from_positions_empty() {
    assert!(Aabb::from_positions(&[]).is_none());
  }

  #[test]
  fn test_center_and_size() {
    let aabb = Aabb::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
    assert_eq!(aabb.center(), DVec3::ZERO);
    assert_eq!(aabb.size(), DVec3::new(2.0, 4.0, 6.0));
    assert_eq!(aabb.half_extents(), DVec3::new(1.0, 2.0, 3.0));
  }

  #[test]
  fn test_diagonal() {
    let aabb = Aabb::new(DVec3::ZERO, DVec3::new(2.0, 3.0, 6.0));
    assert_eq!(aabb.diagonal(), 7.0);
  }

  #[test]
  fn test_degenerate_flat_axis() {
    let flat = Aabb::new(DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0));
    assert!(flat.is_degenerate());

    let point = Aabb::new(DVec3::splat(2.0), DVec3::splat(2.0));
    assert!(point.is_degenerate());

    let solid = Aabb::new(DVec3::ZERO, DVec3::splat(1.0));
    assert!(!solid.is_degenerate());
  }
}
