//! mesh2tile - batch OBJ to 3D Tiles pipeline.
//!
//! Converts building/city-scale OBJ models into multi-resolution,
//! spatially tiled asset hierarchies: adaptive octree tiling by triangle
//! budget, texture-budget-driven LOD textures, and 3D Tiles tileset
//! emission.

mod geo;
mod obj;
mod pipeline;
mod textures;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tiler_core::{TilerConfig, DEFAULT_MAX_LEVEL, DEFAULT_TRIANGLE_THRESHOLD};

use pipeline::PipelineOptions;

/// Converts large OBJ meshes into streamable 3D Tiles hierarchies.
#[derive(Parser, Debug)]
#[command(name = "mesh2tile")]
#[command(about = "Converts large OBJ meshes into streamable 3D Tiles hierarchies")]
struct Cli {
	/// Worker threads for per-tile processing (default: all cores).
	#[arg(long, global = true)]
	workers: Option<usize>,

	#[command(subcommand)]
	command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
	/// Process every OBJ under a directory through the full pipeline.
	Run(RunArgs),
	/// Adaptive octree tiling of a single OBJ file.
	Tile(TileArgs),
	/// Generate budgeted LOD textures and retarget tile materials.
	Textures(TexturesArgs),
	/// Build tileset.json from a model directory's tile manifest.
	Tileset(TilesetArgs),
}

#[derive(Args, Debug)]
struct TilingFlags {
	/// Maximum octree depth.
	#[arg(short = 'l', long = "lods", default_value_t = DEFAULT_MAX_LEVEL)]
	lods: u32,

	/// Per-tile triangle budget.
	#[arg(long, default_value_t = DEFAULT_TRIANGLE_THRESHOLD)]
	threshold: usize,
}

#[derive(Args, Debug)]
struct GeoFlags {
	/// Longitude in degrees.
	#[arg(long, default_value_t = -75.703833, allow_hyphen_values = true)]
	longitude: f64,

	/// Latitude in degrees.
	#[arg(long, default_value_t = 45.417139, allow_hyphen_values = true)]
	latitude: f64,

	/// Height in meters.
	#[arg(long, default_value_t = 77.572, allow_hyphen_values = true)]
	height: f64,
}

#[derive(Args, Debug)]
struct RunArgs {
	/// Input directory containing OBJ files.
	#[arg(short, long)]
	input: PathBuf,

	/// Output directory.
	#[arg(short, long)]
	output: PathBuf,

	#[command(flatten)]
	tiling: TilingFlags,

	#[command(flatten)]
	geo: GeoFlags,

	/// Overwrite existing per-model output directories.
	#[arg(long)]
	force: bool,

	/// Keep intermediate OBJ tiles after external conversion.
	#[arg(long)]
	keep_temp: bool,

	/// Continue processing remaining files after a failure.
	#[arg(long)]
	continue_on_error: bool,

	/// External per-tile converter, e.g. "obj2gltf -i {input} -o {output}".
	#[arg(long)]
	convert_cmd: Option<String>,
}

#[derive(Args, Debug)]
struct TileArgs {
	/// Input OBJ file.
	#[arg(short, long)]
	input: PathBuf,

	/// Model output directory.
	#[arg(short, long)]
	output: PathBuf,

	#[command(flatten)]
	tiling: TilingFlags,
}

#[derive(Args, Debug)]
struct TexturesArgs {
	/// Model directory containing manifest.json and the tile tree.
	#[arg(short, long)]
	input: PathBuf,

	/// Source texture image.
	#[arg(short, long)]
	texture: PathBuf,
}

#[derive(Args, Debug)]
struct TilesetArgs {
	/// Model directory containing manifest.json.
	#[arg(short, long)]
	input: PathBuf,

	/// Output path (default: <input>/tileset.json).
	#[arg(short, long)]
	output: Option<PathBuf>,

	#[command(flatten)]
	geo: GeoFlags,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();
	if let Some(workers) = cli.workers {
		rayon::ThreadPoolBuilder::new()
			.num_threads(workers)
			.build_global()
			.context("failed to configure worker pool")?;
	}

	match cli.command {
		CliCommand::Run(args) => run(args),
		CliCommand::Tile(args) => tile(args),
		CliCommand::Textures(args) => generate_textures(args),
		CliCommand::Tileset(args) => build_tileset_file(args),
	}
}

fn run(args: RunArgs) -> Result<()> {
	let opts = PipelineOptions {
		threshold: args.tiling.threshold,
		max_level: args.tiling.lods,
		force: args.force,
		keep_temp: args.keep_temp,
		convert_cmd: args.convert_cmd,
		longitude: args.geo.longitude,
		latitude: args.geo.latitude,
		height: args.geo.height,
	};

	let summary = pipeline::run_batch(&args.input, &args.output, &opts, args.continue_on_error)?;

	println!("Successfully processed: {} file(s)", summary.succeeded);
	println!("Skipped (already exists): {} file(s)", summary.skipped);
	println!("Failed to process: {} file(s)", summary.failed);
	println!("Output directory: {}", args.output.display());

	if summary.failed > 0 && !args.continue_on_error {
		std::process::exit(1);
	}
	Ok(())
}

fn tile(args: TileArgs) -> Result<()> {
	std::fs::create_dir_all(&args.output)
		.with_context(|| format!("failed to create {}", args.output.display()))?;

	let config = TilerConfig {
		triangle_threshold: args.tiling.threshold,
		max_level: args.tiling.lods,
	};
	let tiled = pipeline::tile_into(&args.input, &args.output, &config)?;

	println!("Exported {} tile(s)", tiled.stats.exported);
	println!("Decimation operations: {}", tiled.stats.decimated);
	if let Some(budget) = &tiled.budget {
		println!(
			"Estimated {} tile(s) to depth {} (actual: {})",
			budget.estimated_tiles,
			budget.estimated_max_depth,
			tiled.stats.exported
		);
	}
	Ok(())
}

fn generate_textures(args: TexturesArgs) -> Result<()> {
	let manifest = pipeline::load_manifest(&args.input)?;
	let budget = textures::load_metadata(&args.input);
	if budget.is_none() {
		tracing::warn!("no texture metadata found - using base resolution for every tile");
	}

	let mut levels: Vec<u32> = manifest.iter().map(|e| e.level).collect();
	levels.sort_unstable();
	levels.dedup();

	let textures_dir = args.input.join("textures");
	std::fs::create_dir_all(&textures_dir)
		.with_context(|| format!("failed to create {}", textures_dir.display()))?;

	let level_textures =
		textures::generate_level_textures(&args.texture, &textures_dir, budget.as_ref(), &levels)?;
	let updated = textures::retarget_tile_mtls(&manifest, &level_textures)?;

	println!("Generated {} level texture(s)", level_textures.len());
	println!("Retargeted {updated}/{} tile material(s)", manifest.len());
	Ok(())
}

fn build_tileset_file(args: TilesetArgs) -> Result<()> {
	let manifest = pipeline::load_manifest(&args.input)?;
	let opts = PipelineOptions {
		threshold: DEFAULT_TRIANGLE_THRESHOLD,
		max_level: DEFAULT_MAX_LEVEL,
		force: false,
		keep_temp: false,
		convert_cmd: None,
		longitude: args.geo.longitude,
		latitude: args.geo.latitude,
		height: args.geo.height,
	};

	let default_path = pipeline::write_tileset_json(&args.input, &manifest, &opts)?;
	if let Some(target) = args.output {
		if target != default_path {
			std::fs::rename(&default_path, &target)
				.with_context(|| format!("failed to move tileset to {}", target.display()))?;
		}
		println!("Wrote {}", target.display());
	} else {
		println!("Wrote {}", default_path.display());
	}
	Ok(())
}
