use super::graph_store::GraphStore;
use super::storage_error::StorageError;
use crate::model::network::{EdgeRecord, EdgeTuple, NetworkError, NodeRecord};

/// read-only adjacency over a graph. every search algorithm is written
/// against this interface, so an overlay-augmented graph can stand in for
/// the persistent store anywhere.
///
/// immutability is structural: there are no write methods to misuse.
pub trait GraphView {
    /// node attributes, failing with `NodeNotFound` for unknown keys.
    fn node(&self, key: &str) -> Result<NodeRecord, NetworkError>;

    fn has_node(&self, key: &str) -> bool;

    /// edge attributes, failing with `EdgeNotFound` for unknown pairs.
    fn edge(&self, u: &str, v: &str) -> Result<EdgeRecord, NetworkError>;

    /// outgoing `(v, attrs)` pairs of `u`. an unknown node has no
    /// successors.
    fn successors(&self, u: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError>;

    /// incoming `(u, attrs)` pairs of `v`.
    fn predecessors(&self, v: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError>;

    /// every edge visible through this view.
    fn edges(&self) -> Result<Vec<EdgeTuple>, NetworkError>;

    /// spatial filter over edges, forwarded to the backing store's r-tree.
    fn edges_dwithin(
        &self,
        lon: f64,
        lat: f64,
        radius_m: f64,
        sort: bool,
    ) -> Result<Vec<EdgeTuple>, NetworkError>;

    /// approximate edge count; augmented views may double-count keys
    /// shared with their overlay.
    fn edge_count(&self) -> usize;

    /// approximate node count, with the same caveat.
    fn node_count(&self) -> usize;
}

/// a read-only view borrowing a [`GraphStore`].
pub struct StoreView<'a> {
    store: &'a GraphStore,
}

impl<'a> StoreView<'a> {
    pub fn new(store: &'a GraphStore) -> StoreView<'a> {
        StoreView { store }
    }
}

/// collapse storage failures into the adjacency error space: lookup misses
/// pass through, anything else is internal.
fn adapt(err: StorageError) -> NetworkError {
    match err {
        StorageError::Network(e) => e,
        other => NetworkError::InternalError(other.to_string()),
    }
}

impl GraphView for StoreView<'_> {
    fn node(&self, key: &str) -> Result<NodeRecord, NetworkError> {
        self.store.get_node(key).map_err(adapt)
    }

    fn has_node(&self, key: &str) -> bool {
        self.store.has_node(key).unwrap_or(false)
    }

    fn edge(&self, u: &str, v: &str) -> Result<EdgeRecord, NetworkError> {
        self.store.get_edge(u, v).map_err(adapt)
    }

    fn successors(&self, u: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError> {
        self.store.successors(u).map_err(adapt)
    }

    fn predecessors(&self, v: &str) -> Result<Vec<(String, EdgeRecord)>, NetworkError> {
        self.store.predecessors(v).map_err(adapt)
    }

    fn edges(&self) -> Result<Vec<EdgeTuple>, NetworkError> {
        self.store.edges().map_err(adapt)
    }

    fn edges_dwithin(
        &self,
        lon: f64,
        lat: f64,
        radius_m: f64,
        sort: bool,
    ) -> Result<Vec<EdgeTuple>, NetworkError> {
        self.store
            .dwithin_edges(lon, lat, radius_m, sort)
            .map_err(adapt)
    }

    fn edge_count(&self) -> usize {
        self.store.size().unwrap_or(0)
    }

    fn node_count(&self) -> usize {
        self.store.node_count().unwrap_or(0)
    }
}
