//! the synchronous query pipelines: project waypoints, augment the view,
//! search, and shape the response through the profile's interpretation.
//! domain failures (no candidate, no path) become status envelopes, not
//! errors.

use geo::Point;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use footpath_core::algorithm::projection::{choose_candidate, waypoint_candidates, Role};
use footpath_core::algorithm::reachable::reachable;
use footpath_core::algorithm::search::SearchError;
use footpath_core::algorithm::shortest_path::{shortest_path_multi, waypoint_nodes};
use footpath_core::algorithm::shortest_path_tree::shortest_path_tree;
use footpath_core::model::network::{AttrValue, PROJECTION_NODE_ID};
use footpath_core::model::profile::{
    status_document, CostFunction, Profile, QueryStatus,
};
use footpath_core::storage::{prepare_augmented, GraphStore, StoreView, DEFAULT_SEARCH_RADIUS_M};

use super::server_error::ServerError;

/// the search weight: the precomputed column when the profile is flagged
/// for precomputation, the dynamically compiled function otherwise.
fn search_cost(
    profile: &Profile,
    args: &IndexMap<String, AttrValue>,
) -> Result<Box<dyn CostFunction>, ServerError> {
    if profile.precalculate {
        Ok(Box::new(profile.static_cost_function()))
    } else {
        Ok(profile.cost_function(args)?)
    }
}

pub fn shortest_path_query(
    store: &GraphStore,
    profile: &Profile,
    lon1: f64,
    lat1: f64,
    lon2: f64,
    lat2: f64,
    args: &IndexMap<String, AttrValue>,
) -> Result<JsonValue, ServerError> {
    let view = StoreView::new(store);
    let origin = Point::new(lon1, lat1);
    let destination = Point::new(lon2, lat2);

    // candidate admissibility always uses the dynamic cost so that request
    // arguments can rule edges out
    let filter_cost = profile.cost_function(args)?;
    let nodes = match waypoint_nodes(
        &view,
        &[origin, destination],
        filter_cost.as_ref(),
        DEFAULT_SEARCH_RADIUS_M,
        &[],
        &[],
    ) {
        Ok(nodes) => nodes,
        Err(SearchError::InvalidWaypoint { .. }) => {
            return Ok(status_document(QueryStatus::InvalidWaypoint))
        }
        Err(SearchError::NoPath) => return Ok(status_document(QueryStatus::NoPath)),
        Err(SearchError::Network(e)) => return Err(e.into()),
    };

    let cost = search_cost(profile, args)?;
    let legs = match shortest_path_multi(&view, &nodes, cost.as_ref()) {
        Ok(legs) => legs,
        Err(SearchError::NoPath) => return Ok(status_document(QueryStatus::NoPath)),
        Err(SearchError::InvalidWaypoint { .. }) => {
            return Ok(status_document(QueryStatus::InvalidWaypoint))
        }
        Err(SearchError::Network(e)) => return Err(e.into()),
    };

    Ok(profile
        .interpretation()
        .shortest_path(&origin, &destination, &legs[0]))
}

pub fn shortest_path_tree_query(
    store: &GraphStore,
    profile: &Profile,
    lon: f64,
    lat: f64,
    max_cost: f64,
    args: &IndexMap<String, AttrValue>,
) -> Result<JsonValue, ServerError> {
    let view = StoreView::new(store);
    let origin_point = Point::new(lon, lat);

    let filter_cost = profile.cost_function(args)?;
    let candidates = waypoint_candidates(
        &view,
        lon,
        lat,
        4,
        DEFAULT_SEARCH_RADIUS_M,
        &[],
        &[],
        PROJECTION_NODE_ID,
    )?;
    let origin = match choose_candidate(&view, candidates, Role::Origin, filter_cost.as_ref())? {
        Some(candidate) => candidate,
        None => return Ok(status_document(QueryStatus::InvalidWaypoint)),
    };

    let cost = search_cost(profile, args)?;
    let augmented = prepare_augmented(&view, &origin);
    let tree = match shortest_path_tree(&augmented, &origin, cost.as_ref(), Some(max_cost)) {
        Ok(tree) => tree,
        Err(SearchError::Network(e)) => return Err(e.into()),
        Err(_) => return Ok(status_document(QueryStatus::NoPath)),
    };

    Ok(profile
        .interpretation()
        .shortest_path_tree(&origin_point, &tree))
}

pub fn reachable_tree_query(
    store: &GraphStore,
    profile: &Profile,
    lon: f64,
    lat: f64,
    max_cost: f64,
    args: &IndexMap<String, AttrValue>,
) -> Result<JsonValue, ServerError> {
    let view = StoreView::new(store);
    let origin_point = Point::new(lon, lat);

    let filter_cost = profile.cost_function(args)?;
    let candidates = waypoint_candidates(
        &view,
        lon,
        lat,
        4,
        DEFAULT_SEARCH_RADIUS_M,
        &[],
        &[],
        PROJECTION_NODE_ID,
    )?;
    let origin = match choose_candidate(&view, candidates, Role::Origin, filter_cost.as_ref())? {
        Some(candidate) => candidate,
        None => return Ok(status_document(QueryStatus::InvalidWaypoint)),
    };

    let cost = search_cost(profile, args)?;
    let augmented = prepare_augmented(&view, &origin);
    let result = match reachable(&augmented, &origin, cost.as_ref(), max_cost) {
        Ok(result) => result,
        Err(SearchError::Network(e)) => return Err(e.into()),
        Err(_) => return Ok(status_document(QueryStatus::NoPath)),
    };

    Ok(profile
        .interpretation()
        .reachable_tree(&origin_point, &result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use footpath_core::build::build_graph;
    use footpath_core::model::profile::{parse_profiles, precalculate_weights};
    use footpath_core::util::geo::linestring_length_meters;
    use geo::LineString;
    use std::fs;

    const LAYER: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0.0, 0.0], [0.002, 0.0]]
                },
                "properties": { "footway": "sidewalk", "incline": 0.02 }
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0.002, 0.0], [0.002, 0.002]]
                },
                "properties": { "footway": "sidewalk", "incline": 0.1 }
            }
        ]
    }"#;

    const WHEELCHAIR_COST: &str = r#"{
        "base": "length",
        "rules": [
            {
                "attribute": "incline",
                "when": { "abs_above": { "arg": "max_incline", "default": 0.083 } },
                "then": { "impassable": true }
            }
        ]
    }"#;

    /// a full project directory: layers, a precalculated distance profile,
    /// and a dynamic wheelchair profile
    fn project() -> (tempfile::TempDir, GraphStore, Vec<Profile>) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("layers")).unwrap();
        fs::write(dir.path().join("layers/streets.geojson"), LAYER).unwrap();
        fs::write(
            dir.path().join("profile-distance.json"),
            r#"{ "id": "distance", "name": "Distance", "precalculate": true }"#,
        )
        .unwrap();
        fs::write(dir.path().join("cost-wheelchair.json"), WHEELCHAIR_COST).unwrap();
        fs::write(
            dir.path().join("profile-wheelchair.json"),
            r#"{
                "id": "wheelchair",
                "name": "Wheelchair",
                "args": [ { "name": "max_incline", "type": "float" } ],
                "cost_function": "cost-wheelchair.json"
            }"#,
        )
        .unwrap();

        let mut store =
            build_graph(dir.path(), 7, vec!["incline".to_string()], None).unwrap();
        let profiles = parse_profiles(dir.path()).unwrap();
        precalculate_weights(&mut store, &profiles, None).unwrap();
        (dir, store, profiles)
    }

    fn east_half_length() -> f64 {
        linestring_length_meters(&LineString::from(vec![(0.001, 0.0), (0.002, 0.0)])).unwrap()
    }

    fn north_half_length() -> f64 {
        linestring_length_meters(&LineString::from(vec![(0.002, 0.0), (0.002, 0.001)])).unwrap()
    }

    #[test]
    fn test_shortest_path_query_with_precalculated_weights() {
        let (_dir, store, profiles) = project();
        let distance = &profiles[0];
        assert_eq!(distance.id, "distance");

        let doc = shortest_path_query(
            &store,
            distance,
            0.001,
            0.0,
            0.002,
            0.001,
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(doc["status"], "Ok");

        // half-edges at the waypoints carry the parent's precomputed
        // weight, so the meaningful distance check is the scaled lengths
        let expected = east_half_length() + north_half_length();
        let edge_sum: f64 = doc["edges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["length"].as_f64().unwrap())
            .sum();
        assert!(
            (edge_sum - expected).abs() < 0.1,
            "length sum {} != expected {}",
            edge_sum,
            expected
        );
        assert!(doc["total_cost"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_wheelchair_profile_blocks_steep_street() {
        let (_dir, store, profiles) = project();
        let wheelchair = &profiles[1];
        assert_eq!(wheelchair.id, "wheelchair");

        // the north street has incline 0.1, impassable at the default
        // threshold: a destination there has no admissible projection
        let doc = shortest_path_query(
            &store,
            wheelchair,
            0.001,
            0.0,
            0.002,
            0.0018,
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(doc["status"], "InvalidWaypoint");

        // raising max_incline clears the way
        let mut args = IndexMap::new();
        args.insert("max_incline".to_string(), AttrValue::Float(0.15));
        let doc =
            shortest_path_query(&store, wheelchair, 0.001, 0.0, 0.002, 0.0018, &args).unwrap();
        assert_eq!(doc["status"], "Ok");
    }

    #[test]
    fn test_far_waypoint_is_invalid() {
        let (_dir, store, profiles) = project();
        let doc = shortest_path_query(
            &store,
            &profiles[0],
            1.0,
            1.0,
            0.002,
            0.001,
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(doc["status"], "InvalidWaypoint");
    }

    #[test]
    fn test_tree_query_budget() {
        let (_dir, store, profiles) = project();
        let doc = shortest_path_tree_query(
            &store,
            &profiles[0],
            0.0,
            0.0,
            150.0,
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(doc["status"], "Ok");
        for feature in doc["node_costs"]["features"].as_array().unwrap() {
            assert!(feature["properties"]["cost"].as_f64().unwrap() <= 150.0);
        }
    }

    #[test]
    fn test_reachable_query_tiny_budget() {
        let (_dir, store, profiles) = project();
        // mid-block on the east street: 1m of reach in each direction
        let doc = reachable_tree_query(
            &store,
            &profiles[0],
            0.001,
            0.0,
            1.0,
            &IndexMap::new(),
        )
        .unwrap();
        assert_eq!(doc["status"], "Ok");

        let total: f64 = doc["edges"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["properties"]["length"].as_f64().unwrap())
            .sum();
        assert!((total - 2.0).abs() < 1e-3, "total reached length {}", total);
    }

    #[test]
    fn test_store_untouched_by_queries() {
        let (_dir, store, profiles) = project();
        let before = store.size().unwrap();
        let _ = shortest_path_query(
            &store,
            &profiles[0],
            0.001,
            0.0,
            0.002,
            0.001,
            &IndexMap::new(),
        )
        .unwrap();
        let _ = reachable_tree_query(&store, &profiles[0], 0.001, 0.0, 30.0, &IndexMap::new())
            .unwrap();
        assert_eq!(store.size().unwrap(), before);
    }
}
