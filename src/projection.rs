//! Map projections.
//!
//! A [`MapProjection`] turns geographic coordinates (degrees) into planar map
//! coordinates and back. Only the two cylindrical projections needed for
//! global and regional climate maps are provided; [`projection_factory`]
//! resolves them by name.

/// Latitude limit for Mercator, beyond which y diverges
pub const MERCATOR_MAX_LAT: f64 = 85.0511;

const EARTH_RADIUS_M: f64 = 6378137.0;

pub trait MapProjection {
    /// Geographic (lon, lat) in degrees to planar (x, y)
    fn project(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Planar (x, y) back to geographic (lon, lat) in degrees
    fn unproject(&self, x: f64, y: f64) -> (f64, f64);

    fn name(&self) -> &'static str;

    /// Clamps a latitude into the range the projection can represent
    fn clamp_lat(&self, lat: f64) -> f64 {
        lat.clamp(-90.0, 90.0)
    }
}

/// Equirectangular projection: x = lon, y = lat
#[derive(Debug, Clone, Copy, Default)]
pub struct PlateCarree;

impl MapProjection for PlateCarree {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (lon, lat)
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn name(&self) -> &'static str {
        "PlateCarree"
    }
}

/// Spherical Mercator in metres
#[derive(Debug, Clone, Copy, Default)]
pub struct Mercator;

impl MapProjection for Mercator {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = self.clamp_lat(lat).to_radians();
        let x = lon.to_radians() * EARTH_RADIUS_M;
        let y = (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln() * EARTH_RADIUS_M;
        (x, y)
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS_M).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
        (lon, lat)
    }

    fn name(&self) -> &'static str {
        "Mercator"
    }

    fn clamp_lat(&self, lat: f64) -> f64 {
        lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT)
    }
}

/// Resolves a projection by name (case-insensitive).
pub fn projection_factory(name: &str) -> Option<Box<dyn MapProjection>> {
    match name.to_lowercase().replace(['_', '-'], "").as_str() {
        "platecarree" | "equirectangular" | "latlon" => Some(Box::new(PlateCarree)),
        "mercator" => Some(Box::new(Mercator)),
        _ => None,
    }
}
