//! waypoint projection: map a query point onto the nearest edge, splitting
//! it into temporary half-edges when the projection lands mid-edge.

use geo::Point;

use crate::model::network::{EdgeTuple, NetworkError, PROJECTION_NODE_ID};
use crate::model::profile::CostFunction;
use crate::storage::graph_view::GraphView;
use crate::util::geo::{cut, planar_length, project, CUT_SLACK};

/// a query point mapped onto the graph: either an existing on-graph node
/// (no temporary edges) or a temporary split point with two pairs of
/// half-edges.
#[derive(Debug, Clone)]
pub struct ProjectedNode {
    pub key: String,
    pub geom: Point<f64>,
    pub edges_in: Vec<EdgeTuple>,
    pub edges_out: Vec<EdgeTuple>,
}

impl ProjectedNode {
    pub fn on_graph(key: impl Into<String>, geom: Point<f64>) -> ProjectedNode {
        ProjectedNode {
            key: key.into(),
            geom,
            edges_in: Vec::new(),
            edges_out: Vec::new(),
        }
    }

    /// true when the projection coincided with an existing node.
    pub fn is_on_graph(&self) -> bool {
        self.edges_in.is_empty() && self.edges_out.is_empty()
    }

    pub fn temporary_edges(&self) -> impl Iterator<Item = &EdgeTuple> {
        self.edges_in.iter().chain(self.edges_out.iter())
    }
}

/// which end of a search a candidate serves. determines which of its
/// temporary edges must be admissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Origin,
    Destination,
    Both,
}

/// produce projection candidates for a query point, nearest edge first.
///
/// each candidate projects the point onto one nearby edge. a projection
/// within 1e-12 of an endpoint snaps to that node; otherwise the edge is
/// split at the projection into four temporary directed half-edges around
/// a fresh node with id `node_id`. edges that cannot be split are skipped.
pub fn waypoint_candidates<V: GraphView>(
    view: &V,
    lon: f64,
    lat: f64,
    n: usize,
    radius_m: f64,
    invert: &[String],
    flip: &[String],
    node_id: &str,
) -> Result<Vec<ProjectedNode>, NetworkError> {
    let point = Point::new(lon, lat);
    let nearby = view.edges_dwithin(lon, lat, radius_m, true)?;

    let mut candidates = Vec::new();
    for edge in nearby.into_iter().take(n) {
        if let Some(candidate) = split_edge(&edge, &point, invert, flip, node_id) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

/// project `point` onto one edge. returns None when the edge geometry
/// cannot be split at the projection (degenerate geometry), which callers
/// treat as "try the next candidate".
pub fn split_edge(
    edge: &EdgeTuple,
    point: &Point<f64>,
    invert: &[String],
    flip: &[String],
    node_id: &str,
) -> Option<ProjectedNode> {
    let (u, v, d) = edge;
    let distance = project(&d.geom, point);

    if distance < CUT_SLACK {
        // at the start of the edge: already on the graph
        return Some(ProjectedNode::on_graph(u.clone(), *point));
    }
    if planar_length(&d.geom) - distance < CUT_SLACK {
        return Some(ProjectedNode::on_graph(v.clone(), *point));
    }

    let (geom1, geom2) = match cut(&d.geom, distance) {
        (head, Some(tail)) => (head, tail),
        (_, None) => return None,
    };

    let d1 = d.with_geometry(geom1);
    let d2 = d.with_geometry(geom2);
    let d1_rev = d1.reversed(invert, flip);
    let d2_rev = d2.reversed(invert, flip);

    let edge1 = (u.clone(), node_id.to_string(), d1);
    let edge1_rev = (node_id.to_string(), u.clone(), d1_rev);
    let edge2 = (node_id.to_string(), v.clone(), d2);
    let edge2_rev = (v.clone(), node_id.to_string(), d2_rev);

    Some(ProjectedNode {
        key: node_id.to_string(),
        geom: *point,
        edges_in: vec![edge1, edge2_rev],
        edges_out: vec![edge2, edge1_rev],
    })
}

/// pick the first candidate with at least one admissible role-relevant
/// edge under the cost function (non-None cost means admissible). returns
/// None when no candidate qualifies.
pub fn choose_candidate<V: GraphView>(
    view: &V,
    candidates: Vec<ProjectedNode>,
    role: Role,
    cost: &dyn CostFunction,
) -> Result<Option<ProjectedNode>, NetworkError> {
    for candidate in candidates {
        if candidate.is_on_graph() {
            if matches!(role, Role::Origin | Role::Both)
                && !any_admissible_out(view, &candidate.key, cost)?
            {
                continue;
            }
            if matches!(role, Role::Destination | Role::Both)
                && !any_admissible_in(view, &candidate.key, cost)?
            {
                continue;
            }
            return Ok(Some(candidate));
        }

        let in_ok = || {
            candidate
                .edges_in
                .iter()
                .any(|(u, v, d)| cost.cost(u, v, d).is_some())
        };
        let out_ok = || {
            candidate
                .edges_out
                .iter()
                .any(|(u, v, d)| cost.cost(u, v, d).is_some())
        };
        let admissible = match role {
            Role::Origin => !candidate.edges_out.is_empty() && out_ok(),
            Role::Destination => !candidate.edges_in.is_empty() && in_ok(),
            Role::Both => {
                !candidate.edges_in.is_empty()
                    && !candidate.edges_out.is_empty()
                    && in_ok()
                    && out_ok()
            }
        };
        if admissible {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn any_admissible_out<V: GraphView>(
    view: &V,
    u: &str,
    cost: &dyn CostFunction,
) -> Result<bool, NetworkError> {
    Ok(view
        .successors(u)?
        .iter()
        .any(|(v, d)| cost.cost(u, v, d).is_some()))
}

fn any_admissible_in<V: GraphView>(
    view: &V,
    v: &str,
    cost: &dyn CostFunction,
) -> Result<bool, NetworkError> {
    Ok(view
        .predecessors(v)?
        .iter()
        .any(|(u, d)| cost.cost(u, v, d).is_some()))
}

/// default id sequence for temporary waypoint nodes: "-1", "-2", ...
/// negative-signed strings cannot collide with on-graph coordinate keys.
pub fn waypoint_node_id(index: usize) -> String {
    format!("-{}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::{AttrValue, EdgeRecord};
    use crate::model::profile::DistanceCost;
    use crate::storage::graph_store::{GraphStore, BATCH_SIZE};
    use crate::storage::graph_view::StoreView;
    use geo::LineString;
    use indexmap::IndexMap;

    fn sidewalk(u: &str, v: &str, coords: Vec<(f64, f64)>, length: f64) -> EdgeTuple {
        let mut attrs = IndexMap::new();
        attrs.insert("length".to_string(), AttrValue::Float(length));
        attrs.insert("incline".to_string(), AttrValue::Float(0.1));
        attrs.insert(
            "footway".to_string(),
            AttrValue::Text("sidewalk".to_string()),
        );
        (
            u.to_string(),
            v.to_string(),
            EdgeRecord::new(LineString::from(coords), attrs),
        )
    }

    fn store(dir: &std::path::Path) -> GraphStore {
        let mut store = GraphStore::create(dir.join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![sidewalk("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 111.3)],
                BATCH_SIZE,
                None,
            )
            .unwrap();
        store.add_rtree().unwrap();
        store
    }

    #[test]
    fn test_project_onto_endpoint_returns_node() {
        let edge = sidewalk("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 111.3);
        let onto_start = split_edge(&edge, &Point::new(0.0, 0.0), &[], &[], "-1").unwrap();
        assert!(onto_start.is_on_graph());
        assert_eq!(onto_start.key, "a");

        let onto_end = split_edge(&edge, &Point::new(0.001, 0.0), &[], &[], "-1").unwrap();
        assert!(onto_end.is_on_graph());
        assert_eq!(onto_end.key, "b");
    }

    #[test]
    fn test_project_mid_edge_creates_four_half_edges() {
        let edge = sidewalk("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 111.3);
        let invert = vec!["incline".to_string()];
        let projected =
            split_edge(&edge, &Point::new(0.00025, 0.0001), &invert, &[], "-1").unwrap();

        assert!(!projected.is_on_graph());
        assert_eq!(projected.key, "-1");
        assert_eq!(projected.edges_in.len(), 2);
        assert_eq!(projected.edges_out.len(), 2);

        // all four share the fresh node id
        for (u, v, _) in projected.temporary_edges() {
            assert!(u == "-1" || v == "-1");
        }

        // the half geometries sum to the original length
        let total: f64 = projected
            .edges_in
            .iter()
            .map(|(_, _, d)| planar_length(&d.geom))
            .sum();
        assert!((total - 0.001).abs() < 1e-12);

        // length attribute split proportionally, 1/4 and 3/4
        let lengths: Vec<f64> = projected
            .edges_out
            .iter()
            .map(|(_, _, d)| d.length().unwrap())
            .collect();
        assert!(lengths.iter().any(|l| (l - 83.475).abs() < 1e-9));
        assert!(lengths.iter().any(|l| (l - 27.825).abs() < 1e-9));

        // reverse half-edges negate the incline
        let (_, _, rev) = projected
            .edges_out
            .iter()
            .find(|(u, v, _)| u == "-1" && v == "a")
            .unwrap();
        assert_eq!(rev.get("incline"), Some(&AttrValue::Float(-0.1)));
        let (_, _, fwd) = projected
            .edges_out
            .iter()
            .find(|(u, v, _)| u == "-1" && v == "b")
            .unwrap();
        assert_eq!(fwd.get("incline"), Some(&AttrValue::Float(0.1)));
    }

    #[test]
    fn test_waypoint_candidates_nearest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let view = StoreView::new(&store);

        let candidates =
            waypoint_candidates(&view, 0.0005, 0.00005, 4, 30.0, &[], &[], "-1").unwrap();
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].key, "-1");
        assert_eq!(candidates[0].edges_out.len(), 2);
    }

    #[test]
    fn test_choose_candidate_origin_role() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let view = StoreView::new(&store);

        let candidates =
            waypoint_candidates(&view, 0.0005, 0.00005, 4, 30.0, &[], &[], "-1").unwrap();
        let chosen = choose_candidate(&view, candidates, Role::Origin, &DistanceCost).unwrap();
        assert!(chosen.is_some());
    }

    #[test]
    fn test_choose_candidate_rejects_inadmissible() {
        struct NoWay;
        impl CostFunction for NoWay {
            fn cost(&self, _u: &str, _v: &str, _d: &EdgeRecord) -> Option<f64> {
                None
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let view = StoreView::new(&store);

        let candidates =
            waypoint_candidates(&view, 0.0005, 0.00005, 4, 30.0, &[], &[], "-1").unwrap();
        let chosen = choose_candidate(&view, candidates, Role::Origin, &NoWay).unwrap();
        assert!(chosen.is_none());
    }

    #[test]
    fn test_on_graph_candidate_admissibility() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let view = StoreView::new(&store);

        let on_a = ProjectedNode::on_graph("a", Point::new(0.0, 0.0));
        // node a has an outgoing edge, so it works as an origin
        let chosen =
            choose_candidate(&view, vec![on_a.clone()], Role::Origin, &DistanceCost).unwrap();
        assert!(chosen.is_some());
        // but no incoming edge, so it fails as a destination
        let chosen =
            choose_candidate(&view, vec![on_a], Role::Destination, &DistanceCost).unwrap();
        assert!(chosen.is_none());
    }
}
