use super::Vec3;

/// Unit vector from the planet center toward the sub-solar point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SunDirection(Vec3);

impl SunDirection {
    /// Treats `(latitude, longitude)` in degrees as the spherical coordinates
    /// of the sub-solar point.
    ///
    /// The result has unit length by construction; no range check is applied,
    /// so longitudes outside -180..180 simply wrap.
    pub fn from_lat_lon(latitude_degrees: f64, longitude_degrees: f64) -> Self {
        let lat = latitude_degrees.to_radians();
        let lon = longitude_degrees.to_radians();
        Self(Vec3::new(
            lat.cos() * lon.cos(),
            lat.cos() * lon.sin(),
            lat.sin(),
        ))
    }

    #[inline]
    pub fn vector(self) -> Vec3 {
        self.0
    }
}
