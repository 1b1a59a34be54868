//! local equirectangular frame for meters-scale spatial filtering. a
//! query-centered frame is area-appropriate for the tens-of-meters search
//! radii used by waypoint projection, anywhere outside the immediate polar
//! regions.

use geo::LineString;

pub const METERS_PER_DEGREE_LAT: f64 = 111_132.954;
const METERS_PER_DEGREE_LON_EQUATOR: f64 = 111_319.458;

pub fn meters_per_degree_lon(lat: f64) -> f64 {
    METERS_PER_DEGREE_LON_EQUATOR * lat.to_radians().cos()
}

/// the degree-space bounding box of a square of `radius_m` meters centered
/// on `(lon, lat)`, as `(left, bottom, right, top)`.
pub fn degree_bbox(lon: f64, lat: f64, radius_m: f64) -> (f64, f64, f64, f64) {
    let d_lat = radius_m / METERS_PER_DEGREE_LAT;
    let d_lon = radius_m / meters_per_degree_lon(lat);
    (lon - d_lon, lat - d_lat, lon + d_lon, lat + d_lat)
}

/// euclidean distance in meters from `(lon, lat)` to the nearest point of
/// the polyline, computed in the local frame centered on the query point.
pub fn distance_to_linestring_meters(lon: f64, lat: f64, line: &LineString<f64>) -> f64 {
    let k_lon = meters_per_degree_lon(lat);
    let k_lat = METERS_PER_DEGREE_LAT;

    let mut best = f64::INFINITY;
    let coords = &line.0;
    if coords.len() == 1 {
        let dx = (coords[0].x - lon) * k_lon;
        let dy = (coords[0].y - lat) * k_lat;
        return (dx * dx + dy * dy).sqrt();
    }
    for w in coords.windows(2) {
        let ax = (w[0].x - lon) * k_lon;
        let ay = (w[0].y - lat) * k_lat;
        let bx = (w[1].x - lon) * k_lon;
        let by = (w[1].y - lat) * k_lat;
        best = best.min(point_segment_distance2_meters(ax, ay, bx, by));
    }
    best.sqrt()
}

/// squared distance from the origin to segment `(a, b)` in meters.
fn point_segment_distance2_meters(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let abx = bx - ax;
    let aby = by - ay;
    let len2 = abx * abx + aby * aby;
    let t = if len2 <= f64::EPSILON {
        0.0
    } else {
        ((-ax * abx - ay * aby) / len2).clamp(0.0, 1.0)
    };
    let cx = ax + t * abx;
    let cy = ay + t * aby;
    cx * cx + cy * cy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_bbox_symmetric() {
        let (left, bottom, right, top) = degree_bbox(-122.3, 47.66, 30.0);
        assert!(((-122.3 - left) - (right - -122.3)).abs() < 1e-12);
        assert!(((47.66 - bottom) - (top - 47.66)).abs() < 1e-12);
        // ~30m of latitude is about 0.00027 degrees
        assert!((top - 47.66) > 0.0002 && (top - 47.66) < 0.0003);
    }

    #[test]
    fn test_distance_to_vertical_line() {
        // a north-south line 0.001 degrees east of the query point at the
        // equator: distance should be ~111.3 meters
        let line = LineString::from(vec![(0.001, -0.01), (0.001, 0.01)]);
        let d = distance_to_linestring_meters(0.0, 0.0, &line);
        assert!((d - 111.319458).abs() < 0.01);
    }

    #[test]
    fn test_distance_to_endpoint() {
        // query point past the end of a segment: nearest is the endpoint
        let line = LineString::from(vec![(0.0, 0.001), (0.0, 0.002)]);
        let d = distance_to_linestring_meters(0.0, 0.0, &line);
        assert!((d - 0.001 * METERS_PER_DEGREE_LAT).abs() < 1e-6);
    }
}
