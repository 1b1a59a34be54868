//! response shaping: turn search results into the JSON documents the query
//! surface returns. profiles may swap in their own [`Interpretation`]; the
//! default produces the documented envelope.

use geo::Point;
use geojson::{Feature, FeatureCollection};
use itertools::Itertools;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::algorithm::reachable::ReachableResult;
use crate::algorithm::shortest_path::RouteLeg;
use crate::algorithm::shortest_path_tree::TreeResult;
use crate::model::network::{EdgeTuple, GEOM_COLUMN};

/// the status field of every query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Ok,
    InvalidWaypoint,
    NoPath,
    NoGraph,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Ok => "Ok",
            QueryStatus::InvalidWaypoint => "InvalidWaypoint",
            QueryStatus::NoPath => "NoPath",
            QueryStatus::NoGraph => "NoGraph",
        }
    }
}

/// response-shaping seam: one method per query kind, with the documented
/// envelope as the default behavior.
pub trait Interpretation: Send + Sync {
    fn shortest_path(
        &self,
        origin: &Point<f64>,
        destination: &Point<f64>,
        leg: &RouteLeg,
    ) -> JsonValue {
        shortest_path_document(origin, destination, leg)
    }

    fn shortest_path_tree(&self, origin: &Point<f64>, tree: &TreeResult) -> JsonValue {
        shortest_path_tree_document(origin, tree)
    }

    fn reachable_tree(&self, origin: &Point<f64>, result: &ReachableResult) -> JsonValue {
        reachable_tree_document(origin, result)
    }
}

pub struct DefaultInterpretation;

impl Interpretation for DefaultInterpretation {}

/// the non-Ok envelope: just the status.
pub fn status_document(status: QueryStatus) -> JsonValue {
    json!({ "status": status.as_str() })
}

pub fn shortest_path_document(
    origin: &Point<f64>,
    destination: &Point<f64>,
    leg: &RouteLeg,
) -> JsonValue {
    let edges: Vec<JsonValue> = leg
        .edges
        .iter()
        .map(|d| {
            let mut properties = d.to_properties();
            properties.insert(
                GEOM_COLUMN.to_string(),
                serde_json::to_value(geojson::Geometry::from(&d.geom)).unwrap_or(JsonValue::Null),
            );
            JsonValue::Object(properties)
        })
        .collect();

    json!({
        "status": QueryStatus::Ok.as_str(),
        "origin": point_feature(origin),
        "destination": point_feature(destination),
        "total_cost": leg.cost,
        "path": leg.path,
        "edges": edges,
    })
}

pub fn shortest_path_tree_document(origin: &Point<f64>, tree: &TreeResult) -> JsonValue {
    json!({
        "status": QueryStatus::Ok.as_str(),
        "origin": point_feature(origin),
        "paths": tree.paths.values().collect::<Vec<_>>(),
        "edges": edge_collection(tree.edges.iter()),
        "node_costs": node_cost_collection(
            tree.nodes.iter().map(|(_, n)| (n.geom, n.cost))
        ),
    })
}

pub fn reachable_tree_document(origin: &Point<f64>, result: &ReachableResult) -> JsonValue {
    // report each undirected edge once: a (v, u) whose (u, v) was already
    // emitted is dropped
    let unique: Vec<&EdgeTuple> = result
        .edges
        .iter()
        .unique_by(|(u, v, _)| {
            if u <= v {
                (u.clone(), v.clone())
            } else {
                (v.clone(), u.clone())
            }
        })
        .collect();

    json!({
        "status": QueryStatus::Ok.as_str(),
        "origin": point_feature(origin),
        "edges": edge_collection(unique.into_iter()),
        "node_costs": node_cost_collection(
            result.nodes.iter().map(|(_, n)| (n.geom, n.cost))
        ),
    })
}

fn point_feature(point: &Point<f64>) -> JsonValue {
    let feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::from(point)),
        id: None,
        properties: Some(JsonMap::new()),
        foreign_members: None,
    };
    serde_json::to_value(feature).unwrap_or(JsonValue::Null)
}

fn edge_collection<'a, I>(edges: I) -> JsonValue
where
    I: Iterator<Item = &'a EdgeTuple>,
{
    let features = edges
        .map(|(u, v, d)| {
            let mut properties = d.to_properties();
            properties.insert("_u".to_string(), JsonValue::from(u.clone()));
            properties.insert("_v".to_string(), JsonValue::from(v.clone()));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::from(&d.geom)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect::<Vec<Feature>>();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    serde_json::to_value(collection).unwrap_or(JsonValue::Null)
}

fn node_cost_collection<I>(nodes: I) -> JsonValue
where
    I: Iterator<Item = (Point<f64>, f64)>,
{
    let features = nodes
        .map(|(geom, cost)| {
            let mut properties = JsonMap::new();
            properties.insert("cost".to_string(), JsonValue::from(cost));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::from(&geom)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect::<Vec<Feature>>();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    serde_json::to_value(collection).unwrap_or(JsonValue::Null)
}
