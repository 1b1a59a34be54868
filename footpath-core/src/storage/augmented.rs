use geo::Point;
use indexmap::IndexMap;

use super::graph_view::GraphView;
use crate::algorithm::projection::ProjectedNode;
use crate::model::network::{EdgeRecord, EdgeTuple, NetworkError, NodeRecord};

/// a small in-memory directed graph of temporary nodes and edges, laid
/// over a persistent view for the duration of one query.
#[derive(Debug, Default, Clone)]
pub struct Overlay {
    nodes: IndexMap<String, Point<f64>>,
    succ: IndexMap<String, IndexMap<String, EdgeRecord>>,
    pred: IndexMap<String, IndexMap<String, EdgeRecord>>,
}

impl Overlay {
    pub fn new() -> Overlay {
        Overlay::default()
    }

    /// insert a temporary edge. endpoint nodes are created from the first
    /// and last coordinate of the edge geometry.
    pub fn add_edge(&mut self, u: &str, v: &str, record: EdgeRecord) {
        let coords = &record.geom.0;
        if let Some(first) = coords.first() {
            self.nodes.entry(u.to_string()).or_insert(Point(*first));
        }
        if let Some(last) = coords.last() {
            self.nodes.entry(v.to_string()).or_insert(Point(*last));
        }
        self.succ
            .entry(u.to_string())
            .or_default()
            .insert(v.to_string(), record.clone());
        self.pred
            .entry(v.to_string())
            .or_default()
            .insert(u.to_string(), record);
    }

    pub fn is_empty(&self) -> bool {
        self.succ.is_empty() && self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.succ.values().map(|adj| adj.len()).sum()
    }

    fn get(&self, u: &str, v: &str) -> Option<&EdgeRecord> {
        self.succ.get(u).and_then(|adj| adj.get(v))
    }
}

/// a [`GraphView`] plus an in-memory overlay, presented as one graph. the
/// overlay wins on key collisions and is consulted first during iteration;
/// the underlying store is never mutated.
pub struct AugmentedView<'a, V: GraphView> {
    base: &'a V,
    overlay: Overlay,
}

impl<'a, V: GraphView> AugmentedView<'a, V> {
    pub fn new(base: &'a V, overlay: Overlay) -> AugmentedView<'a, V> {
        AugmentedView { base, overlay }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

/// build an augmented view for a projected candidate. a candidate that
/// split an edge contributes its temporary half-edges to the overlay; a
/// pure on-graph candidate contributes nothing and the augmented view
/// behaves exactly like the base view.
pub fn prepare_augmented<'a, V: GraphView>(
    base: &'a V,
    candidate: &ProjectedNode,
) -> AugmentedView<'a, V> {
    let mut overlay = Overlay::new();
    for (u, v, d) in candidate.temporary_edges() {
        overlay.add_edge(u, v, d.clone());
    }
    AugmentedView::new(base, overlay)
}

impl<V: GraphView> GraphView for AugmentedView<'_, V> {
    fn node(&self, key: &str) -> Result<NodeRecord, NetworkError> {
        if let Some(point) = self.overlay.nodes.get(key) {
            return Ok(NodeRecord::new(key, *point));
        }
        self.base.node(key)
    }

    fn has_node(&self, key: &str) -> bool {
        self.overlay.nodes.contains_key(key) || self.base.has_node(key)
    }

    fn edge(&self, u: &str, v: &str) -> Result<EdgeRecord, NetworkError> {
        if let Some(record) = self.overlay.get(u, v) {
            return Ok(record.clone());
        }
        self.base.edge(u, v)
    }

    fn successors(&self, u: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError> {
        let mut merged = self.base.successors(u)?;
        if let Some(overlay_adj) = self.overlay.succ.get(u) {
            for (v, record) in overlay_adj {
                match merged.iter_mut().find(|(key, _)| key == v) {
                    Some(entry) => entry.1 = record.clone(),
                    None => merged.push((v.clone(), record.clone())),
                }
            }
        }
        Ok(merged)
    }

    fn predecessors(&self, v: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError> {
        let mut merged = self.base.predecessors(v)?;
        if let Some(overlay_adj) = self.overlay.pred.get(v) {
            for (u, record) in overlay_adj {
                match merged.iter_mut().find(|(key, _)| key == u) {
                    Some(entry) => entry.1 = record.clone(),
                    None => merged.push((u.clone(), record.clone())),
                }
            }
        }
        Ok(merged)
    }

    fn edges(&self) -> Result<Vec<EdgeTuple>, NetworkError> {
        let mut all: Vec<EdgeTuple> = self
            .overlay
            .succ
            .iter()
            .flat_map(|(u, adj)| {
                adj.iter()
                    .map(|(v, d)| (u.clone(), v.clone(), d.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (u, v, d) in self.base.edges()? {
            if self.overlay.get(&u, &v).is_none() {
                all.push((u, v, d));
            }
        }
        Ok(all)
    }

    fn edges_dwithin(
        &self,
        lon: f64,
        lat: f64,
        radius_m: f64,
        sort: bool,
    ) -> Result<Vec<EdgeTuple>, NetworkError> {
        self.base.edges_dwithin(lon, lat, radius_m, sort)
    }

    fn edge_count(&self) -> usize {
        self.base.edge_count() + self.overlay.edge_count()
    }

    fn node_count(&self) -> usize {
        self.base.node_count() + self.overlay.node_count()
    }
}
