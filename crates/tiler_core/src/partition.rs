//! Spatial partitioner: face-atomic octant split of a mesh fragment.
//!
//! Faces are classified by centroid against the bounding-box midpoint and
//! assigned to exactly one octant; no face is ever clipped or duplicated.
//! Each non-empty octant gets its own compact vertex set built in a single
//! pass over only the faces assigned to it, so no full mesh copy is made
//! per octant.

use std::collections::{HashMap, HashSet};

use crate::bounds::Aabb;
use crate::mesh::{CornerList, Face, Mesh};
use crate::tile::TileId;

/// A non-empty child fragment produced by an octant split.
#[derive(Clone, Debug)]
pub struct Fragment {
  /// Child tile id at parent level + 1.
  pub id: TileId,
  /// The fragment's mesh with a local, compact vertex set.
  pub mesh: Mesh,
}

/// Split `mesh` into up to 8 child fragments, one per non-empty octant.
///
/// Classification per axis: octant bit 0 if the face centroid is strictly
/// below the midpoint, 1 otherwise. A centroid exactly on the midpoint
/// therefore lands in the upper octant; downstream naming depends on this
/// tie direction.
///
/// Faces whose remapped topology is degenerate (fewer than 3 distinct
/// vertices) or duplicates an already-created face are skipped; skipping
/// a face also skips its material, keeping face and material bookkeeping
/// aligned. Octants left with no faces are omitted entirely.
pub fn partition_octants(mesh: &Mesh, bounds: &Aabb, parent: TileId) -> Vec<Fragment> {
  let mid = bounds.center();

  // Single pass: assign every face index to its octant.
  let mut octant_faces: [Vec<usize>; 8] = Default::default();
  for (face_idx, face) in mesh.faces.iter().enumerate() {
    let centroid = mesh.face_centroid(face);
    let dx = usize::from(centroid.x >= mid.x);
    let dy = usize::from(centroid.y >= mid.y);
    let dz = usize::from(centroid.z >= mid.z);
    octant_faces[dx | dy << 1 | dz << 2].push(face_idx);
  }

  let mut fragments = Vec::new();

  // Emit octants in (dx, dy, dz) order.
  for dx in 0..2u8 {
    for dy in 0..2u8 {
      for dz in 0..2u8 {
        let octant = dx | dy << 1 | dz << 2;
        let face_list = &octant_faces[octant as usize];
        let child = parent.child(octant);

        if face_list.is_empty() {
          tracing::debug!(tile = %child, "octant is empty - skipping");
          continue;
        }

        let fragment = extract_fragment(mesh, face_list);
        if fragment.is_empty() {
          tracing::debug!(tile = %child, "octant has no valid faces - skipping");
          continue;
        }

        tracing::debug!(
          tile = %child,
          faces = fragment.face_count(),
          vertices = fragment.vertex_count(),
          "created octant fragment"
        );
        fragments.push(Fragment {
          id: child,
          mesh: fragment,
        });
      }
    }
  }

  fragments
}

/// Build a compact mesh from a subset of faces.
///
/// Vertices are deduplicated and remapped via an original-index to
/// local-index map built lazily while walking the face list. Per-corner
/// UVs and the per-face material index are carried over unchanged.
fn extract_fragment(mesh: &Mesh, face_indices: &[usize]) -> Mesh {
  let mut vert_map: HashMap<u32, u32> = HashMap::new();
  let mut positions: Vec<glam::Vec3> = Vec::new();
  let mut faces: Vec<Face> = Vec::new();
  let mut seen_topology: HashSet<CornerList> = HashSet::new();

  for &face_idx in face_indices {
    let face = &mesh.faces[face_idx];

    let mut corners = CornerList::with_capacity(face.vertices.len());
    for &v in &face.vertices {
      let local = *vert_map.entry(v).or_insert_with(|| {
        positions.push(mesh.positions[v as usize]);
        (positions.len() - 1) as u32
      });
      corners.push(local);
    }

    let mut distinct = corners.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 3 {
      tracing::debug!(face = face_idx, "skipping degenerate face");
      continue;
    }
    if !seen_topology.insert(distinct) {
      tracing::debug!(face = face_idx, "skipping duplicate face topology");
      continue;
    }

    faces.push(Face {
      vertices: corners,
      material: face.material,
      uvs: face.uvs.clone(),
    });
  }

  Mesh { positions, faces }
}

#[cfg(test)]
#[path = "partition_test.rs"]
mod partition_test;
