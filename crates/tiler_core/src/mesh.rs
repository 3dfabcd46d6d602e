//! Mesh data model: owned vertex/face collections for octree tiling.
//!
//! A `Mesh` owns its vertices; every face references vertices of the same
//! mesh instance by local index. Whenever a subset of faces is extracted
//! into a new mesh (partitioning, decimation) the indices are remapped to
//! a fresh, compact vertex set.

use glam::{DVec3, Vec2, Vec3};
use smallvec::SmallVec;

/// Per-face corner list. Inline capacity covers triangles and quads,
/// which dominate scan and CAD exports.
pub type CornerList = SmallVec<[u32; 4]>;

/// Per-corner UV list, parallel to the corner list.
pub type UvList = SmallVec<[Vec2; 4]>;

/// A polygonal face: ordered vertex indices, a material slot index, and
/// optional per-corner texture coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
  /// Ordered vertex indices, local to the owning mesh.
  pub vertices: CornerList,
  /// Material slot index carried through splits and decimation.
  pub material: u32,
  /// Per-corner UVs; `None` when the source mesh has no UV layer.
  pub uvs: Option<UvList>,
}

impl Face {
  /// Create a face without UVs.
  pub fn new(vertices: CornerList, material: u32) -> Self {
    Self {
      vertices,
      material,
      uvs: None,
    }
  }

  /// Triangle count after fan triangulation of this n-gon.
  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.vertices.len().saturating_sub(2)
  }
}

/// An owned mesh fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
  /// Vertex positions.
  pub positions: Vec<Vec3>,
  /// Faces referencing `positions` by index.
  pub faces: Vec<Face>,
}

impl Mesh {
  /// Number of vertices.
  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  /// Number of polygonal faces.
  #[inline]
  pub fn face_count(&self) -> usize {
    self.faces.len()
  }

  /// Total triangle count after fan triangulation of every face.
  pub fn triangle_count(&self) -> usize {
    self.faces.iter().map(Face::triangle_count).sum()
  }

  /// True when there is nothing to tile.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.positions.is_empty() || self.faces.is_empty()
  }

  /// Whether any face carries a UV layer.
  pub fn has_uvs(&self) -> bool {
    self.faces.iter().any(|f| f.uvs.is_some())
  }

  /// Number of distinct material slots referenced by faces.
  pub fn material_count(&self) -> usize {
    let mut seen: Vec<u32> = self.faces.iter().map(|f| f.material).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
  }

  /// Face centroid: mean of the face's vertex positions, in double
  /// precision so octant classification is stable for large coordinates.
  pub fn face_centroid(&self, face: &Face) -> DVec3 {
    let sum: DVec3 = face
      .vertices
      .iter()
      .map(|&v| self.positions[v as usize].as_dvec3())
      .sum();
    sum / face.vertices.len() as f64
  }
}

#[cfg(test)]
#[path = "mesh_test.rs"]
mod mesh_test;
