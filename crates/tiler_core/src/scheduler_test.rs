use std::path::PathBuf;

use glam::Vec3;
use smallvec::smallvec;

use super::*;
use crate::mesh::Face;

/// Sink that keeps every exported tile in memory.
#[derive(Default)]
struct MemorySink {
  tiles: Vec<(TileId, TileKind, Mesh)>,
}

impl TileSink for MemorySink {
  fn export(&mut self, id: TileId, kind: TileKind, mesh: &Mesh) -> Result<PathBuf, TilerError> {
    self.tiles.push((id, kind, mesh.clone()));
    Ok(PathBuf::from(format!("{}/{}.obj", id.level_dir(), id.name())))
  }
}

/// n x n triangulated height field over the unit square; the sine-based
/// height keeps the bounding box non-degenerate and the octants uneven.
fn terrain_mesh(n: usize) -> Mesh {
  let side = n + 1;
  let mut mesh = Mesh::default();

  for y in 0..side {
    for x in 0..side {
      let fx = x as f32 / n as f32;
      let fy = y as f32 / n as f32;
      let fz = 0.3 * (6.0 * fx).sin() * (6.0 * fy).cos();
      mesh.positions.push(Vec3::new(fx, fy, fz));
    }
  }

  for y in 0..n {
    for x in 0..n {
      let tl = (y * side + x) as u32;
      let tr = tl + 1;
      let bl = tl + side as u32;
      let br = bl + 1;
      mesh.faces.push(Face::new(smallvec![tl, bl, tr], 0));
      mesh.faces.push(Face::new(smallvec![tr, bl, br], 0));
    }
  }

  mesh
}

fn config(threshold: usize, max_level: u32) -> TilerConfig {
  TilerConfig {
    triangle_threshold: threshold,
    max_level,
  }
}

#[test]
fn test_default_config() {
  let config = TilerConfig::default();
  assert_eq!(config.triangle_threshold, 20_000);
  assert_eq!(config.max_level, 3);
}

/// A mesh at or below the threshold exports as a single root leaf.
#[test]
fn test_small_mesh_is_single_leaf() {
  let mesh = terrain_mesh(8); // 128 triangles
  let mut sink = MemorySink::default();

  let stats = tile_mesh(mesh.clone(), &config(200, 3), &mut sink).unwrap();

  assert_eq!(stats.exported, 1);
  assert_eq!(stats.decimated, 0);
  assert_eq!(sink.tiles.len(), 1);

  let (id, kind, exported) = &sink.tiles[0];
  assert_eq!(*id, TileId::ROOT);
  assert_eq!(*kind, TileKind::Leaf);
  assert_eq!(exported.triangle_count(), mesh.triangle_count());

  let entry = &stats.manifest[0];
  assert_eq!(entry.tile_name, "0_0_0_0");
  assert_eq!(entry.level, 0);
  assert_eq!(entry.triangle_count, 128);
  assert_eq!(entry.output_path, PathBuf::from("TileLevel_0/0_0_0_0.obj"));
}

#[test]
fn test_empty_mesh_is_fatal() {
  let mut sink = MemorySink::default();
  let err = tile_mesh(Mesh::default(), &TilerConfig::default(), &mut sink);
  assert!(matches!(err, Err(TilerError::EmptyMesh)));
  assert!(sink.tiles.is_empty());
}

#[test]
fn test_degenerate_bounds_is_fatal() {
  // Flat in Z: midpoints cannot be derived for partitioning.
  let mut mesh = terrain_mesh(4);
  for p in &mut mesh.positions {
    p.z = 0.0;
  }

  let mut sink = MemorySink::default();
  let err = tile_mesh(mesh, &TilerConfig::default(), &mut sink);
  assert!(matches!(err, Err(TilerError::DegenerateBounds(_))));
}

/// Scaled version of the streaming round trip: an over-threshold mesh
/// produces a decimated level-0 placeholder plus a level-1 split, any
/// still-oversized fragment at max level is decimated rather than split,
/// and nothing deeper than max level is ever emitted.
#[test]
fn test_round_trip_scenario() {
  let mesh = terrain_mesh(23); // 1058 triangles
  let threshold = 200;
  let mut sink = MemorySink::default();

  let stats = tile_mesh(mesh, &config(threshold, 3), &mut sink).unwrap();

  // The root exports a coarse placeholder at its triangle budget.
  let (_, root_kind, root_mesh) = sink
    .tiles
    .iter()
    .find(|(id, _, _)| *id == TileId::ROOT)
    .expect("root tile must exist");
  assert_eq!(*root_kind, TileKind::Coarse);
  assert!(root_mesh.triangle_count() <= threshold);

  // A level-1 split into at most 8 children.
  let level1: Vec<_> = stats.manifest.iter().filter(|e| e.level == 1).collect();
  assert!(!level1.is_empty());
  assert!(level1.len() <= 8);

  for entry in &stats.manifest {
    // No tiles beyond max level.
    assert!(entry.level <= 3, "level {} tile emitted", entry.level);
    // Leaves respect the threshold; decimated tiles are best-effort.
    if entry.kind == TileKind::Leaf {
      assert!(entry.triangle_count <= threshold);
    }
    // Containment: every non-root tile nests under an exported coarse tile.
    if let Some(parent) = entry.id().parent() {
      let parent_entry = stats
        .manifest
        .iter()
        .find(|e| e.id() == parent)
        .unwrap_or_else(|| panic!("tile {} has no exported parent", entry.tile_name));
      assert_eq!(parent_entry.kind, TileKind::Coarse);
    }
  }
}

/// A fragment still over threshold at max level is decimated in place.
#[test]
fn test_oversized_fragment_at_max_level_is_decimated() {
  // Cluster all real geometry near one corner so the level-1 child
  // inherits the whole face set, plus one far triangle for bounds.
  let mut mesh = terrain_mesh(23); // 1058 triangles
  for p in &mut mesh.positions {
    *p *= 0.2;
  }
  let base = mesh.positions.len() as u32;
  mesh.positions.push(Vec3::new(1.9, 1.9, 1.9));
  mesh.positions.push(Vec3::new(2.0, 1.9, 1.9));
  mesh.positions.push(Vec3::new(1.9, 2.0, 1.9));
  mesh
    .faces
    .push(Face::new(smallvec![base, base + 1, base + 2], 0));

  let mut sink = MemorySink::default();
  let stats = tile_mesh(mesh, &config(200, 1), &mut sink).unwrap();

  let decimated: Vec<_> = stats
    .manifest
    .iter()
    .filter(|e| e.kind == TileKind::Decimated)
    .collect();
  assert!(!decimated.is_empty(), "expected a decimated max-level tile");
  for entry in decimated {
    assert_eq!(entry.level, 1);
  }
  assert!(stats.manifest.iter().all(|e| e.level <= 1));
}

#[test]
fn test_stats_counters_match_manifest() {
  let mesh = terrain_mesh(23);
  let mut sink = MemorySink::default();
  let stats = tile_mesh(mesh, &config(200, 3), &mut sink).unwrap();

  assert_eq!(stats.exported, stats.manifest.len());
  assert_eq!(stats.exported, sink.tiles.len());

  let decimation_ops = stats
    .manifest
    .iter()
    .filter(|e| matches!(e.kind, TileKind::Coarse | TileKind::Decimated))
    .count();
  assert_eq!(stats.decimated, decimation_ops);
}

/// Manifest rows record the bounds of the exported geometry.
#[test]
fn test_manifest_bounds_match_exported_meshes() {
  let mesh = terrain_mesh(23);
  let mut sink = MemorySink::default();
  let stats = tile_mesh(mesh, &config(200, 3), &mut sink).unwrap();

  for (entry, (id, _, exported)) in stats.manifest.iter().zip(&sink.tiles) {
    assert_eq!(entry.id(), *id);
    let bounds = Aabb::from_positions(&exported.positions).unwrap();
    assert_eq!(entry.bounds(), bounds);
    assert_eq!(entry.triangle_count, exported.triangle_count());
  }
}
