use geo::Point;
use indexmap::{IndexMap, IndexSet};

use super::projection::ProjectedNode;
use super::search::{single_source_dijkstra, SearchError};
use crate::model::network::EdgeTuple;
use crate::model::profile::CostFunction;
use crate::storage::graph_view::GraphView;

/// a node reached by a tree search, with its point geometry and the cost
/// to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachedNode {
    pub geom: Point<f64>,
    pub cost: f64,
}

/// the shortest-path tree from an origin under a cost budget.
#[derive(Debug, Default)]
pub struct TreeResult {
    pub nodes: IndexMap<String, ReachedNode>,
    pub paths: IndexMap<String, Vec<String>>,
    /// the unique edges appearing on any returned path.
    pub edges: Vec<EdgeTuple>,
}

/// find the shortest-path tree starting at a projected origin. `view` must
/// already be augmented with the origin's temporary edges (see
/// `prepare_augmented`).
pub fn shortest_path_tree<V: GraphView>(
    view: &V,
    origin: &ProjectedNode,
    cost: &dyn CostFunction,
    max_cost: Option<f64>,
) -> Result<TreeResult, SearchError> {
    let search = single_source_dijkstra(view, &origin.key, cost, max_cost, None)?;

    let mut edge_ids: IndexSet<(String, String)> = IndexSet::new();
    for path in search.paths.values() {
        for pair in path.windows(2) {
            edge_ids.insert((pair[0].clone(), pair[1].clone()));
        }
    }
    let edges = edge_ids
        .into_iter()
        .map(|(u, v)| {
            let d = view.edge(&u, &v)?;
            Ok((u, v, d))
        })
        .collect::<Result<Vec<EdgeTuple>, SearchError>>()?;

    let mut nodes = IndexMap::new();
    for (key, distance) in &search.distances {
        let record = view.node(key)?;
        nodes.insert(
            key.clone(),
            ReachedNode {
                geom: record.geom,
                cost: *distance,
            },
        );
    }

    Ok(TreeResult {
        nodes,
        paths: search.paths,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::projection::{choose_candidate, waypoint_candidates, Role};
    use crate::model::network::{AttrValue, EdgeRecord, EdgeTuple};
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

    /// a corridor of three nodes west to east along the equator, 100m per
    /// edge, bidirectional
    fn corridor(dir: &std::path::Path) -> GraphStore {
        let mut store = GraphStore::create(dir.join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![
                    edge("a", "b", vec![(0.0, 0.0), (0.001, 0.0)], 100.0),
                    edge("b", "a", vec![(0.001, 0.0), (0.0, 0.0)], 100.0),
                    edge("b", "c", vec![(0.001, 0.0), (0.002, 0.0)], 100.0),
                    edge("c", "b", vec![(0.002, 0.0), (0.001, 0.0)], 100.0),
                ],
                BATCH_SIZE,
                None,
            )
            .unwrap();
        store.add_rtree().unwrap();
        store
    }

    #[test]
    fn test_tree_from_on_graph_node() {
        let dir = tempfile::tempdir().unwrap();
        let store = corridor(dir.path());
        let view = StoreView::new(&store);
        let origin = ProjectedNode::on_graph("a", geo::Point::new(0.0, 0.0));
        let aug = prepare_augmented(&view, &origin);

        let tree = shortest_path_tree(&aug, &origin, &DistanceCost, Some(150.0)).unwrap();
        assert_eq!(tree.nodes.get("a").map(|n| n.cost), Some(0.0));
        assert_eq!(tree.nodes.get("b").map(|n| n.cost), Some(100.0));
        assert!(!tree.nodes.contains_key("c"), "c is beyond the budget");
        assert_eq!(tree.edges.len(), 1);
    }

    #[test]
    fn test_tree_from_projected_origin_includes_half_edges() {
        let dir = tempfile::tempdir().unwrap();
        let store = corridor(dir.path());
        let view = StoreView::new(&store);

        // midpoint of edge (a, b)
        let candidates =
            waypoint_candidates(&view, 0.0005, 0.0, 4, 30.0, &[], &[], "-1").unwrap();
        let origin = choose_candidate(&view, candidates, Role::Origin, &DistanceCost)
            .unwrap()
            .unwrap();
        assert!(!origin.is_on_graph());
        let aug = prepare_augmented(&view, &origin);

        let tree = shortest_path_tree(&aug, &origin, &DistanceCost, Some(60.0)).unwrap();
        // 50m to each of a and b from the split point
        let a_cost = tree.nodes.get("a").map(|n| n.cost).unwrap();
        let b_cost = tree.nodes.get("b").map(|n| n.cost).unwrap();
        assert!((a_cost - 50.0).abs() < 1e-6);
        assert!((b_cost - 50.0).abs() < 1e-6);
        // the origin itself is in the tree at zero cost
        assert_eq!(tree.nodes.get("-1").map(|n| n.cost), Some(0.0));
        // tree edges are the two outgoing half-edges
        assert_eq!(tree.edges.len(), 2);
    }
}
