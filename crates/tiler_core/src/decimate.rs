//! Ratio-based mesh decimation via greedy shortest-edge collapse.
//!
//! The scheduler asks for a reduction toward a target triangle count and
//! takes whatever comes back: collapses proceed shortest-edge-first until
//! the removal quota is met or no collapsible edge remains. There is no
//! outer feedback loop re-verifying the result against the target, so the
//! output may land slightly above or below it; downstream tile-count and
//! budget estimates assume exactly this best-effort behavior.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::mesh::{CornerList, Face, Mesh, UvList};

/// Reduce `mesh` toward at most `target_triangles` triangles.
///
/// Returns the input unchanged when it is already at or below the target.
/// Collapsed vertices move to the edge midpoint; per-corner UVs and
/// per-face materials are carried through, and faces that degenerate or
/// duplicate under a collapse are dropped.
pub fn decimate_to_target(mesh: &Mesh, target_triangles: usize) -> Mesh {
  let current = mesh.triangle_count();
  if current <= target_triangles {
    tracing::debug!(
      triangles = current,
      target = target_triangles,
      "mesh already within target - not decimating"
    );
    return mesh.clone();
  }

  tracing::debug!(
    triangles = current,
    target = target_triangles,
    ratio = target_triangles as f64 / current as f64,
    "decimating mesh"
  );

  // Each sweep collapses a vertex-disjoint edge set, so one sweep cannot
  // retire the whole quota on its own; keep sweeping until the quota is
  // met or a sweep stops making progress.
  let mut work = mesh.clone();
  loop {
    let before = work.triangle_count();
    if before <= target_triangles {
      break;
    }
    let collapsed = collapse_sweep(&work, before - target_triangles);
    if collapsed.triangle_count() >= before {
      break;
    }
    work = collapsed;
  }

  tracing::debug!(triangles = work.triangle_count(), "decimation result");
  work
}

/// One collapse sweep: merge a vertex-disjoint set of the shortest edges,
/// sized to remove about `quota` triangles.
fn collapse_sweep(mesh: &Mesh, quota: usize) -> Mesh {
  // Unique undirected edges with squared lengths.
  let mut edge_lengths: HashMap<(u32, u32), f64> = HashMap::new();
  for face in &mesh.faces {
    let n = face.vertices.len();
    for i in 0..n {
      let a = face.vertices[i];
      let b = face.vertices[(i + 1) % n];
      if a == b {
        continue;
      }
      let key = (a.min(b), a.max(b));
      edge_lengths.entry(key).or_insert_with(|| {
        (mesh.positions[key.0 as usize].as_dvec3() - mesh.positions[key.1 as usize].as_dvec3())
          .length_squared()
      });
    }
  }

  let mut edges: Vec<((u32, u32), f64)> = edge_lengths.into_iter().collect();
  edges.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

  // An interior-edge collapse removes two triangles, a boundary-edge
  // collapse one; plan on two and let the next sweep absorb the shortfall.
  let collapses_wanted = quota.div_ceil(2);

  let mut positions = mesh.positions.clone();
  let mut merged: HashMap<u32, u32> = HashMap::new();
  let mut touched: HashSet<u32> = HashSet::new();
  let mut performed = 0usize;

  for ((a, b), _len) in edges {
    if performed >= collapses_wanted {
      break;
    }
    if touched.contains(&a) || touched.contains(&b) {
      continue;
    }
    positions[a as usize] = (positions[a as usize] + positions[b as usize]) * 0.5;
    merged.insert(b, a);
    touched.insert(a);
    touched.insert(b);
    performed += 1;
  }

  rebuild(mesh, &positions, &merged)
}

/// Rebuild the mesh after a collapse sweep: remap face corners through the
/// merge map, drop faces that lost their area or duplicate another, and
/// compact the vertex set.
fn rebuild(mesh: &Mesh, positions: &[Vec3], merged: &HashMap<u32, u32>) -> Mesh {
  let mut vert_map: HashMap<u32, u32> = HashMap::new();
  let mut out_positions: Vec<Vec3> = Vec::new();
  let mut out_faces: Vec<Face> = Vec::new();
  let mut seen_topology: HashSet<CornerList> = HashSet::new();

  for face in &mesh.faces {
    // Remap and drop corners that became adjacent repeats.
    let mut corners: Vec<(u32, usize)> = Vec::with_capacity(face.vertices.len());
    for (corner_idx, &v) in face.vertices.iter().enumerate() {
      let v = *merged.get(&v).unwrap_or(&v);
      if corners.last().map(|&(prev, _)| prev) != Some(v) {
        corners.push((v, corner_idx));
      }
    }
    while corners.len() > 1 && corners.first().map(|&(v, _)| v) == corners.last().map(|&(v, _)| v)
    {
      corners.pop();
    }

    let mut distinct: Vec<u32> = corners.iter().map(|&(v, _)| v).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 3 {
      continue;
    }

    let mut local = CornerList::with_capacity(corners.len());
    let mut uvs = face.uvs.as_ref().map(|_| UvList::with_capacity(corners.len()));
    for &(v, corner_idx) in &corners {
      let mapped = *vert_map.entry(v).or_insert_with(|| {
        out_positions.push(positions[v as usize]);
        (out_positions.len() - 1) as u32
      });
      local.push(mapped);
      if let (Some(out_uvs), Some(face_uvs)) = (uvs.as_mut(), face.uvs.as_ref()) {
        out_uvs.push(face_uvs[corner_idx]);
      }
    }

    let mut key: CornerList = local.clone();
    key.sort_unstable();
    key.dedup();
    if !seen_topology.insert(key) {
      continue;
    }

    out_faces.push(Face {
      vertices: local,
      material: face.material,
      uvs,
    });
  }

  Mesh {
    positions: out_positions,
    faces: out_faces,
  }
}

#[cfg(test)]
#[path = "decimate_test.rs"]
mod decimate_test;
