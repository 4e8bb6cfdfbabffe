//! Coordinates: extraction from stored values and great-circle distance.

/// Mean Earth radius used for all distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_010.0;

/// A point on the sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat_degrees: f64,
    pub lng_degrees: f64,
}

impl LatLng {
    pub fn new(lat_degrees: f64, lng_degrees: f64) -> Self {
        Self {
            lat_degrees,
            lng_degrees,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat_degrees.abs() <= 90.0 && self.lng_degrees.abs() <= 180.0
    }
}

/// Haversine distance between two points, in meters.
pub fn distance_meters(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat_degrees.to_radians();
    let lat2 = b.lat_degrees.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng_degrees - a.lng_degrees).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Pulls coordinates out of a delimited value such as
/// `id|name|...|lng|lat|...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatLngExtractor {
    pub separator: u8,
    pub lat_index: usize,
    pub lng_index: usize,
}

impl Default for LatLngExtractor {
    fn default() -> Self {
        Self {
            separator: b'|',
            lat_index: 5,
            lng_index: 4,
        }
    }
}

impl LatLngExtractor {
    pub fn new(separator: u8, lat_index: usize, lng_index: usize) -> Self {
        Self {
            separator,
            lat_index,
            lng_index,
        }
    }

    /// Returns `None` if either field is missing, unparsable or out of range.
    pub fn extract(&self, value: &[u8]) -> Option<LatLng> {
        let fields: Vec<&[u8]> = value.split(|b| *b == self.separator).collect();
        let lat = parse_f64(fields.get(self.lat_index)?)?;
        let lng = parse_f64(fields.get(self.lng_index)?)?;
        let latlng = LatLng::new(lat, lng);
        latlng.is_valid().then_some(latlng)
    }
}

fn parse_f64(field: &[u8]) -> Option<f64> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}
