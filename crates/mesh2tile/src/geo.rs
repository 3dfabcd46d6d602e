//! WGS84 georeferencing for the tileset root transform.

use glam::DVec3;

const WGS84_SEMI_MAJOR: f64 = 6_378_137.0;
const WGS84_FIRST_ECCENTRICITY_SQ: f64 = 6.694_379_990_14e-3;

/// Column-major east-north-up to earth-fixed frame at the given
/// cartographic position, attached to the structural root so viewers
/// place the model on the globe.
pub fn east_north_up_transform(longitude_deg: f64, latitude_deg: f64, height: f64) -> [f64; 16] {
	let (sin_lon, cos_lon) = longitude_deg.to_radians().sin_cos();
	let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();

	// Prime vertical radius of curvature at this latitude.
	let n = WGS84_SEMI_MAJOR / (1.0 - WGS84_FIRST_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
	let origin = DVec3::new(
		(n + height) * cos_lat * cos_lon,
		(n + height) * cos_lat * sin_lon,
		(n * (1.0 - WGS84_FIRST_ECCENTRICITY_SQ) + height) * sin_lat,
	);

	let east = DVec3::new(-sin_lon, cos_lon, 0.0);
	let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
	let up = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

	[
		east.x, east.y, east.z, 0.0, //
		north.x, north.y, north.z, 0.0, //
		up.x, up.y, up.z, 0.0, //
		origin.x, origin.y, origin.z, 1.0,
	]
}
