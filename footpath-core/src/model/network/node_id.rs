use geo::Coord;

/// default coordinate rounding precision for node keys: 7 decimal places is
/// roughly 10cm at the equator, enough to join polyline endpoints digitized
/// from the same source.
pub const DEFAULT_PRECISION: u32 = 7;

/// node id assigned to the temporary node created when a waypoint projects
/// onto the interior of an edge. unique within a single query's overlay.
pub const PROJECTION_NODE_ID: &str = "-1";

/// canonical node key for a coordinate: `"<lon>, <lat>"` with both values
/// rounded to `precision` decimal places. two polylines whose endpoints
/// round to the same key are topologically joined.
pub fn node_key(lon: f64, lat: f64, precision: u32) -> String {
    format!("{}, {}", round_to(lon, precision), round_to(lat, precision))
}

/// key for a pseudo-node interpolated mid-edge during reachable fringe
/// extension. full-precision coordinates keep it from colliding with any
/// on-graph key.
pub fn pseudo_node_key(coord: Coord<f64>) -> String {
    format!("{}, {}", coord.x, coord.y)
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_node_key_rounds_to_precision() {
        assert_eq!(
            node_key(-122.31549031, 47.65629925, 7),
            "-122.3154903, 47.6562992"
        );
    }

    #[test]
    fn test_node_key_joins_close_endpoints() {
        let a = node_key(-122.31549031, 47.65629925, 7);
        let b = node_key(-122.31549034, 47.65629921, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_node_key_low_precision() {
        assert_eq!(node_key(-122.316, 47.657, 2), "-122.32, 47.66");
    }

    #[test]
    fn test_pseudo_node_key_full_precision() {
        let key = pseudo_node_key(coord! {x: -122.31311850634, y: 47.66101102943});
        assert_eq!(key, "-122.31311850634, 47.66101102943");
    }
}
