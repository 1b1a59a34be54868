//! reachable subgraph under a cost budget: the shortest-path tree, plus
//! whole edges that fit inside the budget without lying on any shortest
//! path, plus partial extensions of edges at the frontier cut to land
//! exactly on the budget.

use geo::Point;
use indexmap::{IndexMap, IndexSet};

use super::projection::ProjectedNode;
use super::search::SearchError;
use super::shortest_path_tree::{shortest_path_tree, ReachedNode, TreeResult};
use crate::model::network::{node_id::pseudo_node_key, EdgeRecord, EdgeTuple};
use crate::model::profile::CostFunction;
use crate::storage::graph_view::GraphView;
use crate::util::geo::{cut_off, interpolate, planar_length};

#[derive(Debug, Default)]
pub struct ReachableResult {
    pub nodes: IndexMap<String, ReachedNode>,
    pub edges: Vec<EdgeTuple>,
}

struct FringeCandidate {
    edge: EdgeRecord,
    proportion: f64,
}

/// everything reachable from a projected origin within `max_cost`,
/// allowing partial extensions beyond the last reached node. `view` must
/// already be augmented with the origin's temporary edges.
pub fn reachable<V: GraphView>(
    view: &V,
    origin: &ProjectedNode,
    cost: &dyn CostFunction,
    max_cost: f64,
) -> Result<ReachableResult, SearchError> {
    let TreeResult {
        mut nodes,
        paths,
        edges,
    } = shortest_path_tree(view, origin, cost, Some(max_cost))?;

    let mut traveled_edges: IndexSet<(String, String)> = edges
        .iter()
        .map(|(u, v, _)| (u.clone(), v.clone()))
        .collect();
    let traveled_nodes: IndexSet<String> = paths
        .values()
        .flat_map(|path| path.iter().cloned())
        .collect();

    // collect candidate extensions off every traveled node
    let mut fringe_candidates: IndexMap<(String, String), FringeCandidate> = IndexMap::new();
    for u in &traveled_nodes {
        let u_cost = match nodes.get(u) {
            Some(n) => n.cost,
            None => continue,
        };
        for (v, d) in view.successors(u)? {
            let key = (u.clone(), v.clone());
            if traveled_edges.contains(&key) {
                continue;
            }
            traveled_edges.insert(key.clone());

            let edge_cost = match cost.cost(u, &v, &d) {
                Some(c) => c,
                None => continue,
            };

            // the whole edge fits when its far end was reached and can
            // absorb the traversal inside the budget
            let proportion = match nodes.get(&v) {
                Some(reached) if reached.cost + edge_cost < max_cost => 1.0,
                _ => {
                    if edge_cost <= 0.0 {
                        1.0
                    } else {
                        (max_cost - u_cost) / edge_cost
                    }
                }
            };
            fringe_candidates.insert(key, FringeCandidate { edge: d, proportion });
        }
    }

    // resolve candidates into whole edges and partial fringe edges
    let mut fringe_edges: Vec<EdgeTuple> = Vec::new();
    let mut seen: IndexSet<(String, String)> = IndexSet::new();
    for ((u, v), candidate) in &fringe_candidates {
        let key = (u.clone(), v.clone());
        if seen.contains(&key) {
            continue;
        }

        if candidate.proportion >= 1.0 {
            fringe_edges.push((u.clone(), v.clone(), candidate.edge.clone()));
            continue;
        }

        let rev_key = (v.clone(), u.clone());
        if let Some(inverse) = fringe_candidates.get(&rev_key) {
            if candidate.proportion + inverse.proportion > 1.0 {
                // the two partial extensions meet: the whole edge is
                // reachable, once
                fringe_edges.push((u.clone(), v.clone(), candidate.edge.clone()));
                seen.insert(key);
                seen.insert(rev_key);
                continue;
            }
        }

        // a partial extension down the edge, cut to land exactly on the
        // budget
        let (fringe_edge, fringe_node_key, fringe_geom) =
            make_partial_edge(&candidate.edge, candidate.proportion);
        nodes.insert(
            fringe_node_key.clone(),
            ReachedNode {
                geom: fringe_geom,
                cost: max_cost,
            },
        );
        fringe_edges.push((u.clone(), fringe_node_key, fringe_edge));
        seen.insert(key);
    }

    let mut all_edges = edges;
    all_edges.extend(fringe_edges);

    Ok(ReachableResult {
        nodes,
        edges: all_edges,
    })
}

/// cut an edge at `proportion` of its geometry, producing the partial edge
/// record and the interpolated pseudo-node that terminates it.
fn make_partial_edge(edge: &EdgeRecord, proportion: f64) -> (EdgeRecord, String, Point<f64>) {
    let geom_length = planar_length(&edge.geom);
    let cut_distance = proportion * geom_length;

    let head = cut_off(&edge.geom, cut_distance);
    let endpoint = interpolate(&edge.geom, cut_distance);
    let node_key = pseudo_node_key(endpoint);
    let partial = edge.with_geometry(head);

    (partial, node_key, Point(endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::projection::{choose_candidate, waypoint_candidates, Role};
    use crate::model::network::{AttrValue, EdgeTuple};
    use crate::model::profile::DistanceCost;
    use crate::storage::augmented::prepare_augmented;
    use crate::storage::graph_store::{GraphStore, BATCH_SIZE};
    use crate::storage::graph_view::StoreView;
    use geo::LineString;
    use indexmap::IndexMap;

    fn edge(u: &str, v: &str, coords: Vec<(f64, f64)>, length: f64) -> EdgeTuple {
        let mut attrs = IndexMap::new();
        attrs.insert("length".to_string(), AttrValue::Float(length));
        (
            u.to_string(),
            v.to_string(),
            EdgeRecord::new(LineString::from(coords), attrs),
        )
    }

    /// two long sidewalks meeting at node m, both directions stored
    fn junction(dir: &std::path::Path) -> GraphStore {
        let mut store = GraphStore::create(dir.join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![
                    edge("m", "w", vec![(0.0, 0.0), (-0.001, 0.0)], 100.0),
                    edge("w", "m", vec![(-0.001, 0.0), (0.0, 0.0)], 100.0),
                    edge("m", "e", vec![(0.0, 0.0), (0.001, 0.0)], 100.0),
                    edge("e", "m", vec![(0.001, 0.0), (0.0, 0.0)], 100.0),
                ],
                BATCH_SIZE,
                None,
            )
            .unwrap();
        store.add_rtree().unwrap();
        store
    }

    /// a triangle of 100m legs, both directions stored
    fn triangle(dir: &std::path::Path) -> GraphStore {
        let mut store = GraphStore::create(dir.join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![
                    edge("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 100.0),
                    edge("b", "a", vec![(0.001, 0.0), (0.0, 0.0)], 100.0),
                    edge("a", "c", vec![(0.0, 0.0), (0.0005, 0.001)], 100.0),
                    edge("c", "a", vec![(0.0005, 0.001), (0.0, 0.0)], 100.0),
                    edge("b", "c", vec![(0.001, 0.0), (0.0005, 0.001)], 100.0),
                    edge("c", "b", vec![(0.0005, 0.001), (0.001, 0.0)], 100.0),
                ],
                BATCH_SIZE,
                None,
            )
            .unwrap();
        store.add_rtree().unwrap();
        store
    }

    fn total_length(result: &ReachableResult) -> f64 {
        result
            .edges
            .iter()
            .filter_map(|(_, _, d)| d.length())
            .sum()
    }

    #[test]
    fn test_tiny_budget_extends_partially_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let store = junction(dir.path());
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("m", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        let result = reachable(&aug, &origin, &DistanceCost, 1.0).unwrap();
        // both outgoing sidewalks are much longer than 1m, so each is
        // extended 1m: total reached length is 2m
        assert!((total_length(&result) - 2.0).abs() < 1e-3);
        // budgets are honored exactly
        for node in result.nodes.values() {
            assert!(node.cost <= 1.0 + 1e-9);
        }
        // two interpolated pseudo-nodes at cost max_cost
        let fringe_nodes: Vec<_> = result
            .nodes
            .iter()
            .filter(|(key, _)| !["m", "w", "e"].contains(&key.as_str()))
            .collect();
        assert_eq!(fringe_nodes.len(), 2);
        for (_, node) in fringe_nodes {
            assert_eq!(node.cost, 1.0);
        }
    }

    #[test]
    fn test_partial_edge_length_is_proportional() {
        let dir = tempfile::tempdir().unwrap();
        let store = junction(dir.path());
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("m", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        let result = reachable(&aug, &origin, &DistanceCost, 25.0).unwrap();
        assert_eq!(result.edges.len(), 2);
        for (u, v, d) in &result.edges {
            // partial edges carry a quarter of the parent's length and
            // geometry
            let length = d.length().unwrap();
            assert!((length - 25.0).abs() < 1e-9, "({}, {}): {}", u, v, length);
            let planar = crate::util::geo::planar_length(&d.geom);
            assert!((planar - 0.00025).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reverse_of_tree_edge_fits_whole() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GraphStore::create(dir.path().join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![
                    edge("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 100.0),
                    edge("b", "a", vec![(0.001, 0.0), (0.0, 0.0)], 100.0),
                ],
                BATCH_SIZE,
                None,
            )
            .unwrap();
        store.add_rtree().unwrap();
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("a", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        // 100m out plus the full 100m back fits a 250m budget, so the
        // reverse edge is a whole non-tree reachable edge
        let result = reachable(&aug, &origin, &DistanceCost, 250.0).unwrap();
        let mut pairs: Vec<(&str, &str)> = result
            .edges
            .iter()
            .map(|(u, v, _)| (u.as_str(), v.as_str()))
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec![("a", "b"), ("b", "a")]);
        assert_eq!(result.nodes.len(), 2);
    }

    #[test]
    fn test_meeting_partials_emit_full_edge_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = triangle(dir.path());
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("a", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        // at 151m: b and c are reached at 100; the (b, c) and (c, b)
        // extensions each cover 51% and meet, so the whole leg appears
        // exactly once
        let result = reachable(&aug, &origin, &DistanceCost, 151.0).unwrap();
        let bc: Vec<_> = result
            .edges
            .iter()
            .filter(|(u, v, _)| (u == "b" && v == "c") || (u == "c" && v == "b"))
            .collect();
        assert_eq!(bc.len(), 1);
        let (_, _, d) = bc[0];
        assert_eq!(d.length(), Some(100.0), "the full parent edge is emitted");
    }

    #[test]
    fn test_non_meeting_partials_stay_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = triangle(dir.path());
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("a", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        // at 140m the two extensions cover 40% each and do not meet
        let result = reachable(&aug, &origin, &DistanceCost, 140.0).unwrap();
        let partials: Vec<_> = result
            .edges
            .iter()
            .filter(|(u, v, _)| {
                (u == "b" || u == "c") && v != "a" && v != "b" && v != "c"
            })
            .collect();
        assert_eq!(partials.len(), 2);
        for (_, _, d) in partials {
            assert!((d.length().unwrap() - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_projected_origin_counts_half_edges_naturally() {
        let dir = tempfile::tempdir().unwrap();
        let store = junction(dir.path());
        let view = StoreView::new(&store);

        // project onto the midpoint of (m, e): 50m to either endpoint
        let candidates =
            waypoint_candidates(&view, 0.0005, 0.0, 4, 30.0, &[], &[], "-1").unwrap();
        let origin = choose_candidate(&view, candidates, Role::Origin, &DistanceCost)
            .unwrap()
            .unwrap();
        let aug = prepare_augmented(&view, &origin);

        let result = reachable(&aug, &origin, &DistanceCost, 60.0).unwrap();
        // both on-graph endpoints of the split edge are reached
        assert!(result.nodes.contains_key("m"));
        assert!(result.nodes.contains_key("e"));
        assert!((result.nodes["m"].cost - 50.0).abs() < 1e-6);
    }
}
