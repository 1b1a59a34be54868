use std::cmp::Reverse;
use std::collections::HashMap;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::model::network::NetworkError;
use crate::model::profile::CostFunction;
use crate::storage::graph_view::GraphView;

/// result of a single-source search: the cost to each reached node and the
/// node sequence from the source to it. unreached nodes have no entry.
#[derive(Debug, Default)]
pub struct DijkstraResult {
    pub distances: IndexMap<String, f64>,
    pub paths: IndexMap<String, Vec<String>>,
}

/// frontier ordering: cost first, then the node's arrival number, so
/// equal-cost nodes settle in the order they were first reached.
type FrontierPriority = Reverse<(OrderedFloat<f64>, u64)>;

/// single-source shortest paths over any [`GraphView`], with a weight
/// callback and an optional cost cutoff.
///
/// an edge for which the weight function returns `None` is not
/// traversable. a neighbor whose tentative cost exceeds `cutoff` is not
/// expanded. when `target` is given the search stops as soon as the target
/// is settled. ties are broken by insertion order. negative weights are
/// not supported.
pub fn single_source_dijkstra<V: GraphView>(
    view: &V,
    source: &str,
    weight: &dyn CostFunction,
    cutoff: Option<f64>,
    target: Option<&str>,
) -> Result<DijkstraResult, NetworkError> {
    let mut distances: IndexMap<String, f64> = IndexMap::new();
    let mut paths: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut tentative: HashMap<String, f64> = HashMap::new();
    let mut frontier: PriorityQueue<String, FrontierPriority> = PriorityQueue::new();
    // arrival numbers are assigned once, at a node's first relaxation, and
    // kept across cost improvements
    let mut arrival: HashMap<String, u64> = HashMap::new();
    let mut next_arrival: u64 = 0;

    tentative.insert(source.to_string(), 0.0);
    paths.insert(source.to_string(), vec![source.to_string()]);
    arrival.insert(source.to_string(), next_arrival);
    next_arrival += 1;
    frontier.push(source.to_string(), Reverse((OrderedFloat(0.0), 0)));

    while let Some((u, Reverse((OrderedFloat(cost_u), _)))) = frontier.pop() {
        if distances.contains_key(&u) {
            continue;
        }
        distances.insert(u.clone(), cost_u);
        if target == Some(u.as_str()) {
            break;
        }

        for (v, edge) in view.successors(&u)? {
            let edge_cost = match weight.cost(&u, &v, &edge) {
                Some(c) => c,
                None => continue,
            };
            let candidate = cost_u + edge_cost;
            if let Some(max_cost) = cutoff {
                if candidate > max_cost {
                    continue;
                }
            }
            if distances.contains_key(&v) {
                continue;
            }
            let improved = match tentative.get(&v) {
                Some(existing) => candidate < *existing,
                None => true,
            };
            if improved {
                tentative.insert(v.clone(), candidate);
                let mut path = paths
                    .get(&u)
                    .cloned()
                    .unwrap_or_else(|| vec![u.clone()]);
                path.push(v.clone());
                paths.insert(v.clone(), path);
                let order = *arrival.entry(v.clone()).or_insert_with(|| {
                    let order = next_arrival;
                    next_arrival += 1;
                    order
                });
                frontier.push_increase(v, Reverse((OrderedFloat(candidate), order)));
            }
        }
    }

    log::debug!(
        "dijkstra from {}: {} nodes settled",
        source,
        distances.len()
    );

    // drop path entries for nodes that were relaxed but never settled
    paths.retain(|key, _| distances.contains_key(key));

    Ok(DijkstraResult { distances, paths })
}
