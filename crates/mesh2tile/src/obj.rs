//! OBJ/MTL boundary: imports source meshes into the core mesh model and
//! exports per-tile OBJ files.
//!
//! Supports the subset the pipeline round-trips: `v`, `vt`, `f` (all
//! index forms, negative indices included), `usemtl`/`mtllib` on the OBJ
//! side and `newmtl`/`map_Kd` on the MTL side. Vertex normals are not
//! part of the tiling data model and are dropped on import.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};
use tiler_core::mesh::{CornerList, Face, Mesh, UvList};

/// One material slot: name plus optional diffuse texture path.
#[derive(Clone, Debug)]
pub struct Material {
	pub name: String,
	/// Resolved `map_Kd` path, relative paths anchored at the MTL file.
	pub texture: Option<PathBuf>,
}

/// Materials shared by a source mesh and all of its tile fragments.
///
/// Tile meshes reference these slots by index; every exported tile gets
/// its own MTL file rendered from this table.
#[derive(Clone, Debug, Default)]
pub struct MaterialLib {
	pub materials: Vec<Material>,
}

impl MaterialLib {
	fn find_or_add(&mut self, name: &str) -> u32 {
		if let Some(idx) = self.materials.iter().position(|m| m.name == name) {
			return idx as u32;
		}
		self.materials.push(Material {
			name: name.to_string(),
			texture: None,
		});
		(self.materials.len() - 1) as u32
	}

	/// Name for a material slot, with a stable fallback for indices the
	/// source never declared.
	pub fn name_for(&self, index: u32) -> String {
		self.materials
			.get(index as usize)
			.map(|m| m.name.clone())
			.unwrap_or_else(|| format!("material_{index}"))
	}

	/// The first diffuse texture referenced by any material.
	pub fn first_texture(&self) -> Option<&Path> {
		self.materials
			.iter()
			.find_map(|m| m.texture.as_deref())
	}
}

/// A source mesh and its material table.
#[derive(Clone, Debug)]
pub struct LoadedObj {
	pub mesh: Mesh,
	pub materials: MaterialLib,
}

/// Import an OBJ file, following its `mtllib` reference when present.
pub fn load_obj(path: &Path) -> Result<LoadedObj> {
	let text = fs::read_to_string(path)
		.with_context(|| format!("failed to read OBJ file: {}", path.display()))?;

	let mut mesh = Mesh::default();
	let mut uv_pool: Vec<Vec2> = Vec::new();
	let mut materials = MaterialLib::default();
	let mut mtl_name: Option<String> = None;
	let mut current_material = 0u32;

	for (line_no, raw) in text.lines().enumerate() {
		let line = raw.trim();
		let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
			continue;
		};
		let rest = rest.trim();

		match keyword {
			"v" => {
				let p = parse_floats::<3>(rest)
					.with_context(|| format!("bad vertex at {}:{}", path.display(), line_no + 1))?;
				mesh.positions.push(Vec3::from_array(p));
			}
			"vt" => {
				let uv = parse_floats::<2>(rest)
					.with_context(|| format!("bad UV at {}:{}", path.display(), line_no + 1))?;
				uv_pool.push(Vec2::from_array(uv));
			}
			"f" => {
				let face = parse_face(
					rest,
					mesh.positions.len(),
					&uv_pool,
					current_material,
				)
				.with_context(|| format!("bad face at {}:{}", path.display(), line_no + 1))?;
				if let Some(face) = face {
					mesh.faces.push(face);
				}
			}
			"usemtl" => current_material = materials.find_or_add(rest),
			"mtllib" => mtl_name = Some(rest.to_string()),
			_ => {}
		}
	}

	if let Some(name) = mtl_name {
		let mtl_path = path.parent().unwrap_or(Path::new(".")).join(name);
		if mtl_path.is_file() {
			parse_mtl(&mtl_path, &mut materials)?;
		} else {
			tracing::warn!(mtl = %mtl_path.display(), "referenced MTL file not found");
		}
	}

	tracing::info!(
		file = %path.display(),
		vertices = mesh.vertex_count(),
		faces = mesh.face_count(),
		triangles = mesh.triangle_count(),
		materials = materials.materials.len(),
		"imported OBJ"
	);
	Ok(LoadedObj { mesh, materials })
}

fn parse_floats<const N: usize>(rest: &str) -> Result<[f32; N]> {
	let mut out = [0.0f32; N];
	let mut parts = rest.split_whitespace();
	for slot in &mut out {
		let token = parts.next().context("too few components")?;
		*slot = token.parse().context("not a number")?;
	}
	Ok(out)
}

/// Parse one `f` statement. Faces with fewer than 3 corners are skipped
/// (returns `None`); out-of-range indices are errors.
fn parse_face(
	rest: &str,
	vertex_count: usize,
	uv_pool: &[Vec2],
	material: u32,
) -> Result<Option<Face>> {
	let mut vertices = CornerList::new();
	let mut uvs = UvList::new();
	let mut all_corners_have_uvs = true;

	for corner in rest.split_whitespace() {
		let mut indices = corner.split('/');
		let v_token = indices.next().context("empty face corner")?;
		let v = resolve_index(v_token, vertex_count)
			.with_context(|| format!("vertex index '{v_token}' out of range"))?;
		vertices.push(v as u32);

		match indices.next().filter(|t| !t.is_empty()) {
			Some(t_token) => {
				let t = resolve_index(t_token, uv_pool.len())
					.with_context(|| format!("UV index '{t_token}' out of range"))?;
				uvs.push(uv_pool[t]);
			}
			None => all_corners_have_uvs = false,
		}
	}

	if vertices.len() < 3 {
		tracing::debug!("skipping face with fewer than 3 corners");
		return Ok(None);
	}

	Ok(Some(Face {
		vertices,
		material,
		uvs: (all_corners_have_uvs && !uvs.is_empty()).then_some(uvs),
	}))
}

/// Resolve a 1-based (or negative, end-relative) OBJ index to 0-based.
fn resolve_index(token: &str, len: usize) -> Result<usize> {
	let raw: i64 = token.parse().context("not an index")?;
	let resolved = if raw > 0 {
		raw - 1
	} else if raw < 0 {
		len as i64 + raw
	} else {
		bail!("OBJ indices are 1-based, got 0");
	};
	if resolved < 0 || resolved >= len as i64 {
		bail!("index {raw} out of range for {len} entries");
	}
	Ok(resolved as usize)
}

/// Merge `newmtl`/`map_Kd` declarations into the material table.
fn parse_mtl(path: &Path, materials: &mut MaterialLib) -> Result<()> {
	let text = fs::read_to_string(path)
		.with_context(|| format!("failed to read MTL file: {}", path.display()))?;
	let mtl_dir = path.parent().unwrap_or(Path::new("."));

	let mut current: Option<u32> = None;
	for raw in text.lines() {
		let line = raw.trim();
		let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
			continue;
		};
		let rest = rest.trim();

		if keyword == "newmtl" {
			current = Some(materials.find_or_add(rest));
		} else if keyword.eq_ignore_ascii_case("map_kd") {
			if let Some(idx) = current {
				materials.materials[idx as usize].texture = Some(mtl_dir.join(rest));
			}
		}
	}
	Ok(())
}

/// Export one tile as `{file_stem}.obj` + `{file_stem}.mtl` in `dir`.
///
/// The object name inside the file may carry the `_decimated` working
/// suffix; the file name is always the clean tile name.
pub fn write_obj(
	dir: &Path,
	file_stem: &str,
	object_name: &str,
	mesh: &Mesh,
	materials: &MaterialLib,
) -> std::io::Result<PathBuf> {
	let obj_path = dir.join(format!("{file_stem}.obj"));
	let mtl_name = format!("{file_stem}.mtl");

	let mut out = BufWriter::new(fs::File::create(&obj_path)?);
	writeln!(out, "mtllib {mtl_name}")?;
	writeln!(out, "o {object_name}")?;

	for p in &mesh.positions {
		writeln!(out, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
	}

	let has_uvs = mesh.has_uvs();
	let mut uv_base = 1usize;
	let mut used_materials: Vec<u32> = Vec::new();
	let mut current_material: Option<u32> = None;

	// UVs are written per corner, in face order, so each face's `vt`
	// indices are a contiguous run starting at its uv_base.
	if has_uvs {
		for face in &mesh.faces {
			if let Some(uvs) = &face.uvs {
				for uv in uvs {
					writeln!(out, "vt {:.6} {:.6}", uv.x, uv.y)?;
				}
			}
		}
	}

	for face in &mesh.faces {
		if current_material != Some(face.material) {
			writeln!(out, "usemtl {}", materials.name_for(face.material))?;
			current_material = Some(face.material);
			if !used_materials.contains(&face.material) {
				used_materials.push(face.material);
			}
		}

		write!(out, "f")?;
		match &face.uvs {
			Some(uvs) => {
				for (i, &v) in face.vertices.iter().enumerate() {
					write!(out, " {}/{}", v + 1, uv_base + i)?;
				}
				uv_base += uvs.len();
			}
			None => {
				for &v in &face.vertices {
					write!(out, " {}", v + 1)?;
				}
			}
		}
		writeln!(out)?;
	}
	out.flush()?;

	write_mtl(&dir.join(&mtl_name), &used_materials, materials)?;
	Ok(obj_path)
}

fn write_mtl(path: &Path, used: &[u32], materials: &MaterialLib) -> std::io::Result<()> {
	let mut out = BufWriter::new(fs::File::create(path)?);
	for &index in used {
		writeln!(out, "newmtl {}", materials.name_for(index))?;
		writeln!(out, "Kd 0.800000 0.800000 0.800000")?;
		if let Some(texture) = materials
			.materials
			.get(index as usize)
			.and_then(|m| m.texture.as_ref())
		{
			if let Some(file_name) = texture.file_name() {
				writeln!(out, "map_Kd {}", file_name.to_string_lossy())?;
			}
		}
		writeln!(out)?;
	}
	out.flush()
}

#[cfg(test)]
mod tests {
	use super::*;
	use tiler_core::TileId;

	fn write_temp(dir: &Path, name: &str, contents: &str) -> PathBuf {
		let path = dir.join(name);
		fs::write(&path, contents).unwrap();
		path
	}

	#[test]
	fn test_load_simple_obj() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_temp(
			dir.path(),
			"tri.obj",
			"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
		);

		let loaded = load_obj(&path).unwrap();
		assert_eq!(loaded.mesh.vertex_count(), 3);
		assert_eq!(loaded.mesh.face_count(), 1);
		assert_eq!(loaded.mesh.triangle_count(), 1);
		assert!(!loaded.mesh.has_uvs());
		assert_eq!(loaded.mesh.faces[0].material, 0);
	}

	#[test]
	fn test_load_obj_with_uvs_and_materials() {
		let dir = tempfile::tempdir().unwrap();
		write_temp(
			dir.path(),
			"model.mtl",
			"newmtl brick\nKd 0.8 0.8 0.8\nmap_Kd textures/brick.png\n",
		);
		let path = write_temp(
			dir.path(),
			"model.obj",
			concat!(
				"mtllib model.mtl\n",
				"v 0 0 0\nv 1 0 0\nv 0 1 0\n",
				"vt 0 0\nvt 1 0\nvt 0 1\n",
				"usemtl brick\n",
				"f 1/1 2/2 3/3\n",
			),
		);

		let loaded = load_obj(&path).unwrap();
		assert!(loaded.mesh.has_uvs());
		let uvs = loaded.mesh.faces[0].uvs.as_ref().unwrap();
		assert_eq!(uvs[2], Vec2::new(0.0, 1.0));

		assert_eq!(loaded.materials.materials[0].name, "brick");
		let texture = loaded.materials.first_texture().unwrap();
		assert_eq!(texture, dir.path().join("textures/brick.png"));
	}

	#[test]
	fn test_load_obj_negative_and_normal_indices() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_temp(
			dir.path(),
			"neg.obj",
			"v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\nf 1//5 2//5 3//5\n",
		);

		let loaded = load_obj(&path).unwrap();
		assert_eq!(loaded.mesh.face_count(), 2);
		assert_eq!(loaded.mesh.faces[0].vertices.as_slice(), &[0, 1, 2]);
		// v//vn corners have no UV component.
		assert!(loaded.mesh.faces[1].uvs.is_none());
	}

	#[test]
	fn test_load_obj_rejects_out_of_range_index() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_temp(dir.path(), "bad.obj", "v 0 0 0\nf 1 2 3\n");
		assert!(load_obj(&path).is_err());
	}

	#[test]
	fn test_write_then_load_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let source = write_temp(
			dir.path(),
			"src.obj",
			concat!(
				"v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n",
				"vt 0 0\nvt 1 0\nvt 0 1\nvt 1 1\n",
				"usemtl walls\n",
				"f 1/1 2/2 3/3\n",
				"f 2/2 4/4 3/3\n",
			),
		);
		let loaded = load_obj(&source).unwrap();

		let id = TileId::new(1, 0, 1, 0);
		let path = write_obj(
			dir.path(),
			&id.name(),
			&id.name(),
			&loaded.mesh,
			&loaded.materials,
		)
		.unwrap();
		assert_eq!(path.file_name().unwrap(), "1_0_1_0.obj");
		assert!(dir.path().join("1_0_1_0.mtl").is_file());

		let back = load_obj(&path).unwrap();
		assert_eq!(back.mesh.vertex_count(), loaded.mesh.vertex_count());
		assert_eq!(back.mesh.face_count(), loaded.mesh.face_count());
		assert!(back.mesh.has_uvs());
		assert_eq!(back.materials.materials[0].name, "walls");
		assert_eq!(
			back.mesh.faces[1].uvs.as_ref().unwrap()[1],
			Vec2::new(1.0, 1.0)
		);
	}

	#[test]
	fn test_write_obj_keeps_decimated_object_name_only() {
		let dir = tempfile::tempdir().unwrap();
		let mesh = Mesh {
			positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
			faces: vec![Face::new(CornerList::from_slice(&[0, 1, 2]), 0)],
		};

		let id = TileId::ROOT;
		let path = write_obj(
			dir.path(),
			&id.name(),
			&id.decimated_name(),
			&mesh,
			&MaterialLib::default(),
		)
		.unwrap();

		// Clean file name, suffixed object name.
		assert_eq!(path.file_name().unwrap(), "0_0_0_0.obj");
		let contents = fs::read_to_string(&path).unwrap();
		assert!(contents.contains("o 0_0_0_0_decimated"));
	}
}
