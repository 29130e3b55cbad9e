use geo::HaversineDistance;

use crate::models::{BoundingBox, Point};

/// Mean Earth radius (WGS84) in meters
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Meters per degree of latitude on the mean sphere
const METERS_PER_DEGREE: f64 = EARTH_MEAN_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle (haversine) distance between two points in meters
#[inline]
pub fn haversine_distance(from: Point, to: Point) -> f64 {
    geo::Point::from(from).haversine_distance(&geo::Point::from(to))
}

/// Calculate a bounding box around a center point
///
/// Used as a cheap SQL pre-filter ahead of the exact haversine check, never
/// as the distance test itself. Longitude span is widened by 1/cos(lat) and
/// covers the whole circle near the poles. A span running past ±180 wraps
/// around, leaving `min_lon > max_lon`.
///
/// # Arguments
/// * `center` - Center of the search
/// * `radius_m` - Radius in meters
pub fn calculate_bounding_box(center: Point, radius_m: f64) -> BoundingBox {
    let lat_delta = radius_m / METERS_PER_DEGREE;

    let min_lat = (center.latitude() - lat_delta).max(-90.0);
    let max_lat = (center.latitude() + lat_delta).min(90.0);

    let cos_lat = center.latitude().to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-6 || max_lat >= 90.0 || min_lat <= -90.0 {
        180.0
    } else {
        radius_m / (METERS_PER_DEGREE * cos_lat)
    };

    if lon_delta >= 180.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    let mut min_lon = center.longitude() - lon_delta;
    let mut max_lon = center.longitude() + lon_delta;
    if min_lon < -180.0 {
        min_lon += 360.0;
    }
    if max_lon > 180.0 {
        max_lon -= 360.0;
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(point: Point, bbox: &BoundingBox) -> bool {
    let lon = point.longitude();
    let lon_inside = if bbox.crosses_antimeridian() {
        lon >= bbox.min_lon || lon <= bbox.max_lon
    } else {
        lon >= bbox.min_lon && lon <= bbox.max_lon
    };

    lon_inside && point.latitude() >= bbox.min_lat && point.latitude() <= bbox.max_lat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> Point {
        Point::new(lat, lon).unwrap()
    }

    #[test]
    fn test_haversine_distance() {
        // London to Paris is roughly 344 km
        let london = point(51.5074, -0.1278);
        let paris = point(48.8566, 2.3522);

        let distance = haversine_distance(london, paris);
        assert!((distance - 344_000.0).abs() < 10_000.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        let p = point(40.0, -73.0);
        assert!(haversine_distance(p, p) < 1e-9);
    }

    #[test]
    fn test_short_distance() {
        // 0.0005 degrees of latitude is ~55.6 m
        let distance = haversine_distance(point(40.0, -73.0), point(40.0005, -73.0));
        assert!((distance - 55.6).abs() < 0.5, "got {}", distance);
    }

    #[test]
    fn test_bounding_box() {
        let center = point(40.7128, -74.0060);
        let bbox = calculate_bounding_box(center, 10_000.0);

        assert!(bbox.min_lat < 40.7128);
        assert!(bbox.max_lat > 40.7128);
        assert!(bbox.min_lon < -74.0060);
        assert!(bbox.max_lon > -74.0060);

        // 20km / ~111.2km per degree
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.18).abs() < 0.02, "Lat span should be ~0.18 degrees");
    }

    #[test]
    fn test_bounding_box_widens_with_latitude() {
        let equator = calculate_bounding_box(point(0.0, 10.0), 1_000.0);
        let north = calculate_bounding_box(point(70.0, 10.0), 1_000.0);

        assert!(north.max_lon - north.min_lon > equator.max_lon - equator.min_lon);
    }

    #[test]
    fn test_bounding_box_at_pole_covers_all_longitudes() {
        let bbox = calculate_bounding_box(point(90.0, 0.0), 1_000.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);
    }

    #[test]
    fn test_bounding_box_wraps_antimeridian() {
        let center = point(0.0, 179.9995);
        let across = point(0.0, -179.9995);
        let bbox = calculate_bounding_box(center, 200.0);

        assert!(haversine_distance(center, across) < 200.0);
        assert!(bbox.crosses_antimeridian());
        assert!(is_within_bounding_box(across, &bbox));
        assert!(is_within_bounding_box(center, &bbox));
        assert!(!is_within_bounding_box(point(0.0, 0.0), &bbox));

        let [east, west] = bbox.longitude_ranges();
        assert_eq!(east.1, 180.0);
        assert_eq!(west.0, -180.0);
        assert!(west.1 > -179.9995);
    }

    #[test]
    fn test_bounding_box_wraps_west() {
        let bbox = calculate_bounding_box(point(10.0, -179.999), 1_000.0);
        assert!(bbox.crosses_antimeridian());
        assert!(is_within_bounding_box(point(10.0, 179.999), &bbox));
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(point(40.7128, -74.0060), 10_000.0);

        assert!(is_within_bounding_box(point(40.7128, -74.0060), &bbox));
        assert!(is_within_bounding_box(point(40.71, -74.0), &bbox));
        assert!(!is_within_bounding_box(point(50.0, -80.0), &bbox));
    }
}
