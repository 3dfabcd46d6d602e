//! Per-source pipeline and batch orchestration.
//!
//! One source OBJ flows through: validate and import, adaptive octree
//! tiling into `tiles/TileLevel_{level}/`, manifest and texture-budget
//! sidecar, per-level LOD textures with MTL retargeting, optional
//! external per-tile conversion, and finally `tileset.json`. The batch
//! runner walks a directory tree and reports a succeeded/failed/skipped
//! summary; per-tile worker failures never abort sibling tiles, and
//! per-file failures only abort the batch when `--continue-on-error`
//! was not given.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use tiler_core::{
	build_tileset, tile_mesh, Mesh, TextureBudget, TileId, TileKind, TileManifestEntry, TileSink,
	TilerConfig, TilerError, TilesetTile, TilingStats,
};

use crate::geo::east_north_up_transform;
use crate::obj::{self, LoadedObj, MaterialLib};
use crate::textures;

/// File holding the tile manifest inside each model's output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Settings shared by the whole pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
	pub threshold: usize,
	pub max_level: u32,
	pub force: bool,
	pub keep_temp: bool,
	/// External per-tile converter command with `{input}`/`{output}`
	/// placeholders.
	pub convert_cmd: Option<String>,
	pub longitude: f64,
	pub latitude: f64,
	pub height: f64,
}

/// Per-file outcome; failures are reported through `Err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
	Succeeded,
	Skipped,
}

/// Batch totals for the final summary.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchSummary {
	pub succeeded: usize,
	pub failed: usize,
	pub skipped: usize,
}

/// Export sink writing `tiles/TileLevel_{level}/{name}.obj` tiles.
pub struct ObjTileSink<'a> {
	tiles_dir: &'a Path,
	materials: &'a MaterialLib,
}

impl TileSink for ObjTileSink<'_> {
	fn export(&mut self, id: TileId, kind: TileKind, mesh: &Mesh) -> Result<PathBuf, TilerError> {
		let dir = self.tiles_dir.join(id.level_dir());
		fs::create_dir_all(&dir)?;

		// The coarse placeholder keeps its working suffix as the object
		// name only; the exported file name is always the clean tile name.
		let object_name = match kind {
			TileKind::Coarse => id.decimated_name(),
			TileKind::Leaf | TileKind::Decimated => id.name(),
		};
		let path = obj::write_obj(&dir, &id.name(), &object_name, mesh, self.materials)?;
		Ok(path)
	}
}

/// Result of tiling one source mesh into a model directory.
pub struct TiledModel {
	pub stats: TilingStats,
	pub materials: MaterialLib,
	pub budget: Option<TextureBudget>,
}

/// Import a source OBJ and tile it into `model_dir`.
///
/// Writes the tile tree, the manifest, and (when the source references a
/// readable texture) the texture-budget sidecar. This is the planning
/// phase; texture generation and tileset emission build on its outputs.
pub fn tile_into(input: &Path, model_dir: &Path, config: &TilerConfig) -> Result<TiledModel> {
	let LoadedObj { mesh, materials } = obj::load_obj(input)?;
	let total_triangles = mesh.triangle_count();

	let tiles_dir = model_dir.join("tiles");
	let mut sink = ObjTileSink {
		tiles_dir: &tiles_dir,
		materials: &materials,
	};
	let stats = tile_mesh(mesh, config, &mut sink)
		.with_context(|| format!("tiling failed for {}", input.display()))?;

	write_manifest(model_dir, &stats.manifest)?;

	let budget = match materials.first_texture() {
		Some(texture) => match image::image_dimensions(texture) {
			Ok((width, height)) => {
				let budget = TextureBudget::plan(
					width,
					height,
					total_triangles as u64,
					config.triangle_threshold as u64,
				);
				textures::write_metadata(model_dir, &budget)?;
				Some(budget)
			}
			Err(err) => {
				warn!(
					texture = %texture.display(),
					%err,
					"source texture unreadable - skipping texture budget"
				);
				None
			}
		},
		None => {
			warn!("no diffuse texture referenced - skipping texture budget");
			None
		}
	};

	Ok(TiledModel {
		stats,
		materials,
		budget,
	})
}

fn write_manifest(model_dir: &Path, manifest: &[TileManifestEntry]) -> Result<PathBuf> {
	let path = model_dir.join(MANIFEST_FILE);
	let file = fs::File::create(&path)
		.with_context(|| format!("failed to create {}", path.display()))?;
	serde_json::to_writer_pretty(BufWriter::new(file), manifest)?;
	Ok(path)
}

/// Read a model directory's tile manifest back.
pub fn load_manifest(model_dir: &Path) -> Result<Vec<TileManifestEntry>> {
	let path = model_dir.join(MANIFEST_FILE);
	let text = fs::read_to_string(&path)
		.with_context(|| format!("failed to read {}", path.display()))?;
	serde_json::from_str(&text).with_context(|| format!("invalid manifest: {}", path.display()))
}

/// Process one source OBJ through the whole pipeline.
pub fn process_single(
	input: &Path,
	output_base: &Path,
	opts: &PipelineOptions,
) -> Result<ProcessOutcome> {
	let stem = input
		.file_stem()
		.context("input file has no name")?
		.to_string_lossy()
		.into_owned();
	let model_dir = output_base.join(&stem);

	if model_dir.exists() {
		if opts.force {
			warn!(dir = %model_dir.display(), "output directory exists - removing due to --force");
			fs::remove_dir_all(&model_dir)
				.with_context(|| format!("failed to remove {}", model_dir.display()))?;
		} else {
			info!(dir = %model_dir.display(), "output directory exists - skipping");
			return Ok(ProcessOutcome::Skipped);
		}
	}
	fs::create_dir_all(&model_dir)
		.with_context(|| format!("failed to create {}", model_dir.display()))?;

	info!(input = %input.display(), output = %model_dir.display(), "processing");

	let config = TilerConfig {
		triangle_threshold: opts.threshold,
		max_level: opts.max_level,
	};
	let tiled = tile_into(input, &model_dir, &config)?;

	// Per-level LOD textures and MTL retargeting.
	if let (Some(budget), Some(texture)) = (&tiled.budget, tiled.materials.first_texture()) {
		let textures_dir = model_dir.join("textures");
		fs::create_dir_all(&textures_dir)?;

		let mut levels: Vec<u32> = tiled.stats.manifest.iter().map(|e| e.level).collect();
		levels.sort_unstable();
		levels.dedup();

		let level_textures =
			textures::generate_level_textures(texture, &textures_dir, Some(budget), &levels)?;
		let updated = textures::retarget_tile_mtls(&tiled.stats.manifest, &level_textures)?;
		info!(updated, total = tiled.stats.manifest.len(), "retargeted tile materials");
	}

	// Optional external per-tile conversion.
	if let Some(template) = &opts.convert_cmd {
		let (converted, failed) = convert_tiles(template, &tiled.stats.manifest);
		info!(converted, failed, "external conversion finished");
		if !opts.keep_temp {
			remove_converted_sources(&tiled.stats.manifest);
		}
	}

	write_tileset_json(&model_dir, &tiled.stats.manifest, opts)?;

	info!(
		tiles = tiled.stats.exported,
		decimations = tiled.stats.decimated,
		"finished {stem}"
	);
	Ok(ProcessOutcome::Succeeded)
}

/// Build and write `tileset.json` for a model directory.
pub fn write_tileset_json(
	model_dir: &Path,
	manifest: &[TileManifestEntry],
	opts: &PipelineOptions,
) -> Result<PathBuf> {
	let tiles: Vec<TilesetTile> = manifest
		.iter()
		.map(|entry| TilesetTile {
			id: entry.id(),
			bounds: entry.bounds(),
			uri: content_uri(model_dir, entry),
		})
		.collect();

	let transform = east_north_up_transform(opts.longitude, opts.latitude, opts.height);
	let doc = build_tileset(&tiles, Some(&transform))?;

	let path = model_dir.join("tileset.json");
	fs::write(&path, serde_json::to_string_pretty(&doc)?)
		.with_context(|| format!("failed to write {}", path.display()))?;
	info!(path = %path.display(), tiles = tiles.len(), "wrote tileset.json");
	Ok(path)
}

/// Content URI for a tile, relative to the tileset.json location.
/// Prefers a converted `.glb` sitting next to the exported OBJ.
fn content_uri(model_dir: &Path, entry: &TileManifestEntry) -> String {
	let glb = entry.output_path.with_extension("glb");
	let target = if glb.is_file() { &glb } else { &entry.output_path };
	textures::path_to_uri(&textures::relative_path(model_dir, target))
}

/// Run the external converter once per tile, in parallel. A failing
/// worker marks its own tile failed and leaves the siblings alone.
fn convert_tiles(template: &str, manifest: &[TileManifestEntry]) -> (usize, usize) {
	let results: Vec<bool> = manifest
		.par_iter()
		.map(|entry| {
			let output = entry.output_path.with_extension("glb");
			let command = template
				.replace("{input}", &entry.output_path.display().to_string())
				.replace("{output}", &output.display().to_string());

			let mut parts = command.split_whitespace();
			let Some(program) = parts.next() else {
				error!("empty convert command");
				return false;
			};
			match Command::new(program).args(parts).status() {
				Ok(status) if status.success() => true,
				Ok(status) => {
					error!(tile = %entry.tile_name, code = ?status.code(), "converter failed");
					false
				}
				Err(err) => {
					error!(tile = %entry.tile_name, %err, "converter did not start");
					false
				}
			}
		})
		.collect();

	let converted = results.iter().filter(|&&ok| ok).count();
	(converted, results.len() - converted)
}

/// Drop intermediate OBJ/MTL pairs whose converted GLB exists.
fn remove_converted_sources(manifest: &[TileManifestEntry]) {
	for entry in manifest {
		if !entry.output_path.with_extension("glb").is_file() {
			continue;
		}
		for path in [
			entry.output_path.clone(),
			entry.output_path.with_extension("mtl"),
		] {
			if let Err(err) = fs::remove_file(&path) {
				warn!(path = %path.display(), %err, "failed to remove intermediate file");
			}
		}
	}
}

/// Process every OBJ under `input_dir`.
pub fn run_batch(
	input_dir: &Path,
	output_dir: &Path,
	opts: &PipelineOptions,
	continue_on_error: bool,
) -> Result<BatchSummary> {
	if !input_dir.is_dir() {
		bail!("input path '{}' is not a directory", input_dir.display());
	}
	fs::create_dir_all(output_dir)
		.with_context(|| format!("failed to create {}", output_dir.display()))?;

	let mut obj_files: Vec<PathBuf> = WalkDir::new(input_dir)
		.into_iter()
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_type().is_file())
		.map(|entry| entry.into_path())
		.filter(|path| {
			path.extension()
				.is_some_and(|ext| ext.eq_ignore_ascii_case("obj"))
		})
		.collect();
	obj_files.sort();

	if obj_files.is_empty() {
		bail!("no OBJ files found under {}", input_dir.display());
	}
	info!(count = obj_files.len(), "found OBJ files to process");

	let mut summary = BatchSummary::default();
	for (index, file) in obj_files.iter().enumerate() {
		info!(
			file = %file.display(),
			"processing file {}/{}",
			index + 1,
			obj_files.len()
		);
		match process_single(file, output_dir, opts) {
			Ok(ProcessOutcome::Succeeded) => summary.succeeded += 1,
			Ok(ProcessOutcome::Skipped) => summary.skipped += 1,
			Err(err) => {
				error!(file = %file.display(), "processing failed: {err:#}");
				summary.failed += 1;
				if !continue_on_error {
					warn!("stopping; use --continue-on-error to process remaining files");
					break;
				}
			}
		}
	}
	Ok(summary)
}
