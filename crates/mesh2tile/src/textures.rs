//! Texture planning, per-level LOD resizing, and MTL retargeting.
//!
//! The planning phase measures the source texture once and persists the
//! budget as a JSON sidecar next to the tile manifest. Every later
//! sizing query, possibly from a different process, locates the sidecar
//! by searching the starting directory and up to 3 parents; when it
//! cannot be found, sizing degrades to the base resolution for every
//! tile instead of failing.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use rayon::prelude::*;
use tiler_core::{TextureBudget, TileManifestEntry, BASE_TEXTURE_SIZE};

/// Sidecar file written once by the planning phase.
pub const METADATA_FILE: &str = "texture_metadata.json";

/// How many parent directories the sidecar search climbs.
const METADATA_SEARCH_DEPTH: usize = 3;

/// Persist the budget sidecar into `dir`.
pub fn write_metadata(dir: &Path, budget: &TextureBudget) -> Result<PathBuf> {
	let path = dir.join(METADATA_FILE);
	let json = serde_json::to_string_pretty(budget)?;
	fs::write(&path, json)
		.with_context(|| format!("failed to write {}", path.display()))?;
	tracing::info!(path = %path.display(), "wrote texture metadata");
	Ok(path)
}

/// Locate the sidecar: `start` itself, then up to 3 parent directories.
pub fn find_metadata(start: &Path) -> Option<PathBuf> {
	let mut dir = Some(start);
	for _ in 0..=METADATA_SEARCH_DEPTH {
		let d = dir?;
		let candidate = d.join(METADATA_FILE);
		if candidate.is_file() {
			return Some(candidate);
		}
		dir = d.parent();
	}
	None
}

/// Load the budget sidecar if it can be found and parsed.
pub fn load_metadata(start: &Path) -> Option<TextureBudget> {
	let path = find_metadata(start)?;
	match fs::read_to_string(&path)
		.map_err(anyhow::Error::from)
		.and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
	{
		Ok(budget) => Some(budget),
		Err(err) => {
			tracing::warn!(path = %path.display(), %err, "unreadable texture metadata - ignoring");
			None
		}
	}
}

/// Resolution for a tile at `level`; without metadata every tile keeps
/// the base resolution.
pub fn resolution_for_tile(budget: Option<&TextureBudget>, level: u32) -> u32 {
	budget
		.map(|b| b.resolution_for_level(level))
		.unwrap_or(BASE_TEXTURE_SIZE)
}

/// Resize the source texture once per occupied tile level, at each
/// level's budgeted resolution. Returns the per-level output paths.
pub fn generate_level_textures(
	source: &Path,
	textures_dir: &Path,
	budget: Option<&TextureBudget>,
	levels: &[u32],
) -> Result<HashMap<u32, PathBuf>> {
	let image = image::open(source)
		.with_context(|| format!("failed to open source texture: {}", source.display()))?;
	let stem = source
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_else(|| "texture".to_string());

	let outputs: Result<Vec<(u32, PathBuf)>> = levels
		.par_iter()
		.map(|&level| {
			let resolution = resolution_for_tile(budget, level);
			let path = textures_dir.join(format!("{stem}_L{level}.png"));
			image
				.resize_exact(resolution, resolution, FilterType::Lanczos3)
				.save(&path)
				.with_context(|| format!("failed to write {}", path.display()))?;
			tracing::info!(
				level,
				resolution,
				path = %path.display(),
				"generated level texture"
			);
			Ok((level, path))
		})
		.collect();

	Ok(outputs?.into_iter().collect())
}

/// Point every tile's MTL at its level's texture. Per-tile problems are
/// logged and skipped; sibling tiles proceed. Returns the update count.
pub fn retarget_tile_mtls(
	manifest: &[TileManifestEntry],
	level_textures: &HashMap<u32, PathBuf>,
) -> Result<usize> {
	let updated = manifest
		.par_iter()
		.filter(|entry| {
			let Some(texture) = level_textures.get(&entry.level) else {
				return false;
			};
			let mtl_path = entry.output_path.with_extension("mtl");
			let mtl_dir = mtl_path.parent().unwrap_or(Path::new("."));
			let relative = relative_path(mtl_dir, texture);
			match update_map_kd(&mtl_path, &relative) {
				Ok(updated) => updated,
				Err(err) => {
					tracing::warn!(
						tile = %entry.tile_name,
						%err,
						"failed to retarget tile material"
					);
					false
				}
			}
		})
		.count();
	Ok(updated)
}

/// Rewrite every `map_Kd` line of an MTL file to `texture`.
fn update_map_kd(mtl_path: &Path, texture: &Path) -> Result<bool> {
	let text = fs::read_to_string(mtl_path)
		.with_context(|| format!("failed to read {}", mtl_path.display()))?;

	let mut updated = false;
	let lines: Vec<String> = text
		.lines()
		.map(|line| {
			if line.trim_start().to_ascii_lowercase().starts_with("map_kd") {
				updated = true;
				format!("map_Kd {}", path_to_uri(texture))
			} else {
				line.to_string()
			}
		})
		.collect();

	if updated {
		fs::write(mtl_path, lines.join("\n") + "\n")
			.with_context(|| format!("failed to write {}", mtl_path.display()))?;
	} else {
		tracing::warn!(mtl = %mtl_path.display(), "no map_Kd line to update");
	}
	Ok(updated)
}

/// Relative path from `from` (a directory) to `to`.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
	let from: Vec<Component<'_>> = from.components().collect();
	let to: Vec<Component<'_>> = to.components().collect();
	let common = from
		.iter()
		.zip(&to)
		.take_while(|(a, b)| a == b)
		.count();

	let mut rel = PathBuf::new();
	for _ in common..from.len() {
		rel.push("..");
	}
	for component in &to[common..] {
		rel.push(component);
	}
	if rel.as_os_str().is_empty() {
		rel.push(".");
	}
	rel
}

/// Forward-slash form for wire formats (MTL references, tileset URIs).
pub fn path_to_uri(path: &Path) -> String {
	path
		.components()
		.map(|c| c.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;
	use tiler_core::scheduler::TileKind;

	fn budget() -> TextureBudget {
		TextureBudget::plan(4096, 4096, 500_000, 20_000)
	}

	#[test]
	fn test_metadata_roundtrip_and_search() {
		let dir = tempfile::tempdir().unwrap();
		let nested = dir.path().join("a/b/c");
		fs::create_dir_all(&nested).unwrap();

		write_metadata(dir.path(), &budget()).unwrap();

		// Found from the directory itself and from 3 levels down.
		assert!(find_metadata(dir.path()).is_some());
		let found = find_metadata(&nested).expect("search must climb 3 parents");
		assert_eq!(found, dir.path().join(METADATA_FILE));

		let loaded = load_metadata(&nested).unwrap();
		assert_eq!(loaded, budget());

		// One directory too deep is out of search range.
		let too_deep = dir.path().join("a/b/c/d");
		fs::create_dir_all(&too_deep).unwrap();
		assert!(find_metadata(&too_deep).is_none());
	}

	/// Metadata-absent scenario: every sizing call returns the base
	/// resolution without raising.
	#[test]
	fn test_missing_metadata_falls_back_to_base() {
		let dir = tempfile::tempdir().unwrap();
		assert!(load_metadata(dir.path()).is_none());

		for level in 0..=6 {
			assert_eq!(resolution_for_tile(None, level), 1024);
		}
	}

	#[test]
	fn test_generate_level_textures_sizes() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("diffuse.png");
		image::RgbaImage::new(64, 48).save(&source).unwrap();

		let textures_dir = dir.path().join("textures");
		fs::create_dir_all(&textures_dir).unwrap();

		let budget = budget();
		let outputs =
			generate_level_textures(&source, &textures_dir, Some(&budget), &[0, 3]).unwrap();

		let level0 = &outputs[&0];
		assert_eq!(level0.file_name().unwrap(), "diffuse_L0.png");
		assert_eq!(image::image_dimensions(level0).unwrap(), (1024, 1024));

		// Level 3 is one level past the 4k budget level.
		let level3 = &outputs[&3];
		let expected = budget.resolution_for_level(3);
		assert_eq!(
			image::image_dimensions(level3).unwrap(),
			(expected, expected)
		);
	}

	#[test]
	fn test_retarget_updates_map_kd() {
		let dir = tempfile::tempdir().unwrap();
		let tile_dir = dir.path().join("tiles/TileLevel_1");
		fs::create_dir_all(&tile_dir).unwrap();
		fs::write(
			tile_dir.join("1_0_0_0.mtl"),
			"newmtl brick\nKd 0.8 0.8 0.8\nmap_Kd brick.png\n",
		)
		.unwrap();

		let entry = TileManifestEntry {
			tile_name: "1_0_0_0".to_string(),
			level: 1,
			ix: 0,
			iy: 0,
			iz: 0,
			kind: TileKind::Leaf,
			triangle_count: 10,
			material_count: 1,
			bounds_min: [0.0; 3],
			bounds_max: [1.0; 3],
			output_path: tile_dir.join("1_0_0_0.obj"),
		};
		let level_textures =
			HashMap::from([(1u32, dir.path().join("textures/diffuse_L1.png"))]);

		let updated = retarget_tile_mtls(&[entry], &level_textures).unwrap();
		assert_eq!(updated, 1);

		let contents = fs::read_to_string(tile_dir.join("1_0_0_0.mtl")).unwrap();
		assert!(
			contents.contains("map_Kd ../../textures/diffuse_L1.png"),
			"unexpected MTL contents:\n{contents}"
		);
	}

	#[test]
	fn test_retarget_skips_tile_without_mtl() {
		let dir = tempfile::tempdir().unwrap();
		let entry = TileManifestEntry {
			tile_name: "0_0_0_0".to_string(),
			level: 0,
			ix: 0,
			iy: 0,
			iz: 0,
			kind: TileKind::Leaf,
			triangle_count: 1,
			material_count: 1,
			bounds_min: [0.0; 3],
			bounds_max: [1.0; 3],
			output_path: dir.path().join("missing/0_0_0_0.obj"),
		};
		let level_textures = HashMap::from([(0u32, dir.path().join("t.png"))]);

		let updated = retarget_tile_mtls(&[entry], &level_textures).unwrap();
		assert_eq!(updated, 0);
	}

	#[test]
	fn test_relative_path() {
		assert_eq!(
			relative_path(Path::new("/out/tiles/TileLevel_1"), Path::new("/out/textures/t.png")),
			PathBuf::from("../../textures/t.png")
		);
		assert_eq!(
			relative_path(Path::new("/out"), Path::new("/out/tiles/a.obj")),
			PathBuf::from("tiles/a.obj")
		);
		assert_eq!(
			relative_path(Path::new("/a/b"), Path::new("/a/b")),
			PathBuf::from(".")
		);
	}

	#[test]
	fn test_path_to_uri_uses_forward_slashes() {
		let rel = relative_path(Path::new("out"), Path::new("out/tiles/TileLevel_0/a.glb"));
		assert_eq!(path_to_uri(&rel), "tiles/TileLevel_0/a.glb");
	}
}
