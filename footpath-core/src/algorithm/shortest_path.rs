//! on-graph shortest path between two or more geolocated waypoints.

use geo::Point;

use super::projection::{choose_candidate, waypoint_candidates, waypoint_node_id, ProjectedNode, Role};
use super::search::{single_source_dijkstra, SearchError};
use crate::model::network::EdgeRecord;
use crate::model::profile::CostFunction;
use crate::storage::augmented::{AugmentedView, Overlay};
use crate::storage::graph_view::GraphView;

/// one leg of a route: its total cost, node sequence, and the edges
/// traversed in order.
#[derive(Debug)]
pub struct RouteLeg {
    pub cost: f64,
    pub path: Vec<String>,
    pub edges: Vec<EdgeRecord>,
}

/// default candidate fan-out per waypoint.
pub const WAYPOINT_CANDIDATES: usize = 4;

/// project every waypoint onto the graph. the first waypoint is an origin,
/// the last a destination, interior waypoints both. each waypoint gets its
/// own temporary node id so that multiple split points coexist in one
/// overlay. a waypoint with no admissible candidate yields
/// `InvalidWaypoint`.
pub fn waypoint_nodes<V: GraphView>(
    view: &V,
    waypoints: &[Point<f64>],
    cost: &dyn CostFunction,
    radius_m: f64,
    invert: &[String],
    flip: &[String],
) -> Result<Vec<ProjectedNode>, SearchError> {
    let mut nodes = Vec::with_capacity(waypoints.len());
    for (i, point) in waypoints.iter().enumerate() {
        let role = if i == 0 {
            Role::Origin
        } else if i == waypoints.len() - 1 {
            Role::Destination
        } else {
            Role::Both
        };
        let candidates = waypoint_candidates(
            view,
            point.x(),
            point.y(),
            WAYPOINT_CANDIDATES,
            radius_m,
            invert,
            flip,
            &waypoint_node_id(i),
        )?;
        match choose_candidate(view, candidates, role, cost)? {
            Some(node) => nodes.push(node),
            None => {
                return Err(SearchError::InvalidWaypoint {
                    lon: point.x(),
                    lat: point.y(),
                })
            }
        }
    }
    Ok(nodes)
}

/// find the shortest path through consecutive waypoint pairs. one overlay
/// collects the temporary edges of every projected waypoint, so all legs
/// run over a single augmented view.
pub fn shortest_path_multi<V: GraphView>(
    view: &V,
    waypoints: &[ProjectedNode],
    cost: &dyn CostFunction,
) -> Result<Vec<RouteLeg>, SearchError> {
    if waypoints.len() < 2 {
        return Err(SearchError::NoPath);
    }

    let mut overlay = Overlay::new();
    for waypoint in waypoints {
        for (u, v, d) in waypoint.temporary_edges() {
            overlay.add_edge(u, v, d.clone());
        }
    }
    let augmented = AugmentedView::new(view, overlay);

    let mut legs = Vec::with_capacity(waypoints.len() - 1);
    for pair in waypoints.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        let search =
            single_source_dijkstra(&augmented, &from.key, cost, None, Some(&to.key))?;
        let total = match search.distances.get(&to.key) {
            Some(total) => *total,
            None => return Err(SearchError::NoPath),
        };
        let path = search
            .paths
            .get(&to.key)
            .cloned()
            .ok_or(SearchError::NoPath)?;
        let edges = path
            .windows(2)
            .map(|step| augmented.edge(&step[0], &step[1]))
            .collect::<Result<Vec<EdgeRecord>, _>>()?;
        legs.push(RouteLeg {
            cost: total,
            path,
            edges,
        });
    }
    Ok(legs)
}

/// the common two-waypoint case: project both points and route between
/// them.
pub fn shortest_path<V: GraphView>(
    view: &V,
    origin: Point<f64>,
    destination: Point<f64>,
    cost: &dyn CostFunction,
    radius_m: f64,
) -> Result<RouteLeg, SearchError> {
    let nodes = waypoint_nodes(view, &[origin, destination], cost, radius_m, &[], &[])?;
    let mut legs = shortest_path_multi(view, &nodes, cost)?;
    Ok(legs.remove(0))
}
