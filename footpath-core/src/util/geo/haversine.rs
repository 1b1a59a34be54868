use geo::{Coord, LineString};

pub const APPROX_EARTH_RADIUS_M: f64 = 6_371_000.0;

/// get the great-circle distance between two coordinates in meters.
/// coordinates are assumed to be in the WGS84 Coordinate System.
pub fn coord_distance_meters(src: Coord, dst: Coord) -> Result<f64, String> {
    if !(-180.0..=180.0).contains(&src.x) {
        return Err(format!("src x value not in range [-180, 180]: {}", src.x));
    }
    if !(-180.0..=180.0).contains(&dst.x) {
        return Err(format!("dst x value not in range [-180, 180]: {}", dst.x));
    }
    if !(-90.0..=90.0).contains(&src.y) {
        return Err(format!("src y value not in range [-90, 90]: {}", src.y));
    }
    if !(-90.0..=90.0).contains(&dst.y) {
        return Err(format!("dst y value not in range [-90, 90]: {}", dst.y));
    }

    let lat1 = src.y.to_radians();
    let lat2 = dst.y.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (dst.x - src.x).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().asin();
    Ok(APPROX_EARTH_RADIUS_M * c)
}

/// great-circle length of a polyline in meters, the sum of its
/// segment distances.
pub fn linestring_length_meters(line: &LineString<f64>) -> Result<f64, String> {
    let mut total = 0.0;
    for pair in line.0.windows(2) {
        total += coord_distance_meters(pair[0], pair[1])?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_one_degree_longitude_at_equator() {
        let src = coord! {x: 0.0, y: 0.0};
        let dst = coord! {x: 1.0, y: 0.0};
        let d = coord_distance_meters(src, dst).unwrap();
        // one degree of arc on a 6,371km sphere
        let expected = APPROX_EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_zero_distance() {
        let p = coord! {x: -122.313108, y: 47.661011};
        let d = coord_distance_meters(p, p).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_out_of_range_longitude() {
        let src = coord! {x: -190.0, y: 0.0};
        let dst = coord! {x: 0.0, y: 0.0};
        assert!(coord_distance_meters(src, dst).is_err());
    }

    #[test]
    fn test_linestring_length_sums_segments() {
        let line = LineString::from(vec![(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)]);
        let total = linestring_length_meters(&line).unwrap();
        let seg = coord_distance_meters(coord! {x: 0.0, y: 0.0}, coord! {x: 0.001, y: 0.0}).unwrap();
        assert!((total - 2.0 * seg).abs() < 1e-9);
    }
}
