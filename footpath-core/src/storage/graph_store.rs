use std::path::Path;

use geo::Point;
use indexmap::IndexMap;
use rusqlite::types::Value as SqlValue;

use super::feature_table::{FeatureRow, FeatureTable, GeomType};
use super::geom_blob::{self, Geometry};
use super::geopackage::{GeoPackage, SRID_WGS84};
use super::storage_error::StorageError;
use crate::model::network::{
    AttrValue, EdgeRecord, EdgeTuple, NetworkError, NodeRecord, U_COLUMN, V_COLUMN,
};

/// the single persistent artifact in a project directory.
pub const GRAPH_FILE_NAME: &str = "graph.gpkg";

/// default rectangular search radius for nearest-edge queries, in meters.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 30.0;

/// default database insert/update batch size.
pub const BATCH_SIZE: usize = 1000;

pub const EDGE_TABLE: &str = "edges";
pub const NODE_TABLE: &str = "nodes";
pub const NODE_KEY_COLUMN: &str = "_n";

/// the file-backed directed graph: an edge table and a node table in a
/// GeoPackage, plus r-tree indexes over their geometry. exclusively owns
/// the on-disk file and its connection; read-only views borrow it.
///
/// nodes are created implicitly when edges referencing them are written.
pub struct GraphStore {
    gpkg: GeoPackage,
    edges: FeatureTable,
    nodes: FeatureTable,
}

impl GraphStore {
    /// create a new graph database at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<GraphStore, StorageError> {
        let gpkg = GeoPackage::create(path)?;
        let mut edges = FeatureTable::new(EDGE_TABLE, GeomType::LineString, SRID_WGS84);
        let mut nodes = FeatureTable::new(NODE_TABLE, GeomType::Point, SRID_WGS84);
        edges.create(&gpkg)?;
        nodes.create(&gpkg)?;

        edges.add_column(&gpkg, U_COLUMN, "TEXT")?;
        edges.add_column(&gpkg, V_COLUMN, "TEXT")?;
        nodes.add_column(&gpkg, NODE_KEY_COLUMN, "TEXT")?;
        gpkg.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS edges_uv ON edges (\"_u\", \"_v\")",
            [],
        )?;
        gpkg.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS nodes_n ON nodes (\"_n\")",
            [],
        )?;

        Ok(GraphStore { gpkg, edges, nodes })
    }

    /// open an existing graph database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GraphStore, StorageError> {
        let gpkg = GeoPackage::open(path)?;
        let mut edges = FeatureTable::new(EDGE_TABLE, GeomType::LineString, SRID_WGS84);
        let mut nodes = FeatureTable::new(NODE_TABLE, GeomType::Point, SRID_WGS84);
        if !edges.exists(&gpkg)? || !nodes.exists(&gpkg)? {
            return Err(StorageError::UnderspecifiedGraph(format!(
                "no graph tables in {}",
                gpkg.path().display()
            )));
        }
        edges.load_columns(&gpkg)?;
        nodes.load_columns(&gpkg)?;
        Ok(GraphStore { gpkg, edges, nodes })
    }

    pub fn path(&self) -> &Path {
        self.gpkg.path()
    }

    /// clone the graph to a new location (`:memory:` included) and return
    /// a store over the copy.
    pub fn copy<P: AsRef<Path>>(&self, path: P) -> Result<GraphStore, StorageError> {
        let gpkg = self.gpkg.copy(path)?;
        let mut edges = FeatureTable::new(EDGE_TABLE, GeomType::LineString, SRID_WGS84);
        let mut nodes = FeatureTable::new(NODE_TABLE, GeomType::Point, SRID_WGS84);
        edges.load_columns(&gpkg)?;
        nodes.load_columns(&gpkg)?;
        Ok(GraphStore { gpkg, edges, nodes })
    }

    /// idempotent batched upsert of directed edges keyed by `(u, v)`. the
    /// two endpoint nodes of every edge are upserted alongside it, with
    /// point geometry taken from the edge geometry's first and last
    /// coordinates.
    pub fn add_edges<I>(
        &mut self,
        edges: I,
        batch_size: usize,
        mut counter: Option<&mut dyn FnMut(usize)>,
    ) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = EdgeTuple>,
    {
        let mut total = 0;
        let mut edge_rows: Vec<(Vec<u8>, IndexMap<String, AttrValue>)> = Vec::new();
        let mut node_rows: Vec<(Vec<u8>, IndexMap<String, AttrValue>)> = Vec::new();
        let mut batch_nodes: indexmap::IndexSet<String> = indexmap::IndexSet::new();

        for (u, v, record) in edges {
            let coords = &record.geom.0;
            if coords.len() < 2 {
                return Err(StorageError::InvalidGeometry(format!(
                    "edge ({}, {}) has fewer than two coordinates",
                    u, v
                )));
            }
            for (key, coord) in [(&u, coords[0]), (&v, coords[coords.len() - 1])] {
                if batch_nodes.insert(key.clone()) {
                    let mut attrs = IndexMap::new();
                    attrs.insert(NODE_KEY_COLUMN.to_string(), AttrValue::Text(key.clone()));
                    node_rows.push((
                        geom_blob::encode_point(&Point(coord), SRID_WGS84),
                        attrs,
                    ));
                }
            }

            let mut attrs = IndexMap::new();
            attrs.insert(U_COLUMN.to_string(), AttrValue::Text(u));
            attrs.insert(V_COLUMN.to_string(), AttrValue::Text(v));
            for (key, value) in &record.attrs {
                if key != U_COLUMN && key != V_COLUMN {
                    attrs.insert(key.clone(), value.clone());
                }
            }
            edge_rows.push((
                geom_blob::encode_linestring(&record.geom, SRID_WGS84),
                attrs,
            ));

            if edge_rows.len() >= batch_size {
                let n = edge_rows.len();
                self.flush_batch(&mut node_rows, &mut edge_rows)?;
                batch_nodes.clear();
                total += n;
                if let Some(cb) = counter.as_mut() {
                    cb(n);
                }
            }
        }
        let n = edge_rows.len();
        if n > 0 {
            self.flush_batch(&mut node_rows, &mut edge_rows)?;
            total += n;
            if let Some(cb) = counter.as_mut() {
                cb(n);
            }
        }
        Ok(total)
    }

    fn flush_batch(
        &mut self,
        node_rows: &mut Vec<(Vec<u8>, IndexMap<String, AttrValue>)>,
        edge_rows: &mut Vec<(Vec<u8>, IndexMap<String, AttrValue>)>,
    ) -> Result<(), StorageError> {
        self.nodes
            .upsert_batch(&self.gpkg, &[NODE_KEY_COLUMN], node_rows)?;
        self.edges
            .upsert_batch(&self.gpkg, &[U_COLUMN, V_COLUMN], edge_rows)?;
        node_rows.clear();
        edge_rows.clear();
        Ok(())
    }

    /// batched partial update of edge attributes keyed by `(u, v)`.
    /// unspecified columns are untouched; an explicit `Null` overwrites to
    /// SQL NULL.
    pub fn update_edges(
        &mut self,
        updates: &[(String, String, IndexMap<String, AttrValue>)],
    ) -> Result<(), StorageError> {
        let batch: Vec<(Vec<AttrValue>, IndexMap<String, AttrValue>)> = updates
            .iter()
            .map(|(u, v, attrs)| {
                (
                    vec![
                        AttrValue::Text(u.clone()),
                        AttrValue::Text(v.clone()),
                    ],
                    attrs.clone(),
                )
            })
            .collect();
        self.edges
            .update_batch(&self.gpkg, &[U_COLUMN, V_COLUMN], &batch)
    }

    /// build (or rebuild) the spatial indexes over both tables and install
    /// their synchronization triggers.
    pub fn add_rtree(&mut self) -> Result<(), StorageError> {
        self.edges.add_rtree(&self.gpkg)?;
        self.nodes.add_rtree(&self.gpkg)?;
        Ok(())
    }

    pub fn get_edge(&self, u: &str, v: &str) -> Result<EdgeRecord, StorageError> {
        let rows = self.edges.select_where(
            &self.gpkg,
            "WHERE \"_u\" = ?1 AND \"_v\" = ?2",
            &[SqlValue::from(u.to_string()), SqlValue::from(v.to_string())],
        )?;
        match rows.into_iter().next() {
            Some(row) => Ok(edge_from_row(row)?.2),
            None => Err(NetworkError::EdgeNotFound(u.to_string(), v.to_string()).into()),
        }
    }

    pub fn get_node(&self, key: &str) -> Result<NodeRecord, StorageError> {
        let rows = self.nodes.select_where(
            &self.gpkg,
            "WHERE \"_n\" = ?1",
            &[SqlValue::from(key.to_string())],
        )?;
        match rows.into_iter().next() {
            Some(row) => node_from_row(row),
            None => Err(NetworkError::NodeNotFound(key.to_string()).into()),
        }
    }

    pub fn has_node(&self, key: &str) -> Result<bool, StorageError> {
        let count: i64 = self.gpkg.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE \"_n\" = ?1",
            [key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// outgoing edges of `u` as `(v, attrs)` pairs.
    pub fn successors(&self, u: &str) -> Result<Vec<(String, EdgeRecord)>, StorageError> {
        let rows = self.edges.select_where(
            &self.gpkg,
            "WHERE \"_u\" = ?1",
            &[SqlValue::from(u.to_string())],
        )?;
        rows.into_iter()
            .map(|row| edge_from_row(row).map(|(_, v, d)| (v, d)))
            .collect()
    }

    /// incoming edges of `v` as `(u, attrs)` pairs.
    pub fn predecessors(&self, v: &str) -> Result<Vec<(String, EdgeRecord)>, StorageError> {
        let rows = self.edges.select_where(
            &self.gpkg,
            "WHERE \"_v\" = ?1",
            &[SqlValue::from(v.to_string())],
        )?;
        rows.into_iter()
            .map(|row| edge_from_row(row).map(|(u, _, d)| (u, d)))
            .collect()
    }

    /// id-only fast path: the destination node of every outgoing edge.
    pub fn successor_nodes(&self, u: &str) -> Result<Vec<String>, StorageError> {
        self.adjacent_node_ids("SELECT \"_v\" FROM edges WHERE \"_u\" = ?1", u)
    }

    /// id-only fast path: the source node of every incoming edge.
    pub fn predecessor_nodes(&self, v: &str) -> Result<Vec<String>, StorageError> {
        self.adjacent_node_ids("SELECT \"_u\" FROM edges WHERE \"_v\" = ?1", v)
    }

    pub fn unique_successors(&self, u: &str) -> Result<Vec<String>, StorageError> {
        self.adjacent_node_ids("SELECT DISTINCT \"_v\" FROM edges WHERE \"_u\" = ?1", u)
    }

    pub fn unique_predecessors(&self, v: &str) -> Result<Vec<String>, StorageError> {
        self.adjacent_node_ids("SELECT DISTINCT \"_u\" FROM edges WHERE \"_v\" = ?1", v)
    }

    fn adjacent_node_ids(&self, sql: &str, key: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.gpkg.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map([key], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// every edge in the table.
    pub fn edges(&self) -> Result<Vec<EdgeTuple>, StorageError> {
        let rows = self.edges.select_all(&self.gpkg)?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// a page of edges in primary-key order, for streaming passes over
    /// large graphs.
    pub fn edges_page(&self, offset: usize, limit: usize) -> Result<Vec<EdgeTuple>, StorageError> {
        let rows = self.edges.select_page(&self.gpkg, offset, limit)?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// every node in the table.
    pub fn nodes(&self) -> Result<Vec<NodeRecord>, StorageError> {
        let rows = self.nodes.select_all(&self.gpkg)?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// edge count.
    pub fn size(&self) -> Result<usize, StorageError> {
        self.edges.count(&self.gpkg)
    }

    /// the sum of a numeric edge column across the whole table.
    pub fn size_weighted(&self, column: &str) -> Result<f64, StorageError> {
        if !self.edges.columns().contains(column) {
            return Err(NetworkError::AttributeError(
                column.to_string(),
                "no such edge column".to_string(),
            )
            .into());
        }
        self.edges.sum_column(&self.gpkg, column)
    }

    pub fn node_count(&self) -> Result<usize, StorageError> {
        self.nodes.count(&self.gpkg)
    }

    /// edges whose bounding box intersects a square of `radius_m` meters
    /// around `(lon, lat)`. with `sort`, results are refined by exact
    /// distance and returned nearest-first.
    pub fn dwithin_edges(
        &self,
        lon: f64,
        lat: f64,
        radius_m: f64,
        sort: bool,
    ) -> Result<Vec<EdgeTuple>, StorageError> {
        let rows = self.edges.dwithin(&self.gpkg, lon, lat, radius_m, sort)?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// the set of edge attribute columns currently in the schema.
    pub fn edge_columns(&self) -> &indexmap::IndexSet<String> {
        self.edges.columns()
    }
}

fn edge_from_row(row: FeatureRow) -> Result<EdgeTuple, StorageError> {
    let u = match row.attrs.get(U_COLUMN) {
        Some(AttrValue::Text(u)) => u.clone(),
        _ => {
            return Err(StorageError::InternalError(format!(
                "edge row {} is missing _u",
                row.fid
            )))
        }
    };
    let v = match row.attrs.get(V_COLUMN) {
        Some(AttrValue::Text(v)) => v.clone(),
        _ => {
            return Err(StorageError::InternalError(format!(
                "edge row {} is missing _v",
                row.fid
            )))
        }
    };
    let geom = match row.geom {
        Some(Geometry::LineString(ls)) => ls,
        _ => {
            return Err(StorageError::InvalidGeometry(format!(
                "edge ({}, {}) has no LineString geometry",
                u, v
            )))
        }
    };
    Ok((u, v, EdgeRecord::new(geom, row.attrs)))
}

fn node_from_row(row: FeatureRow) -> Result<NodeRecord, StorageError> {
    let key = match row.attrs.get(NODE_KEY_COLUMN) {
        Some(AttrValue::Text(n)) => n.clone(),
        _ => {
            return Err(StorageError::InternalError(format!(
                "node row {} is missing _n",
                row.fid
            )))
        }
    };
    let geom = match row.geom {
        Some(Geometry::Point(p)) => p,
        _ => {
            return Err(StorageError::InvalidGeometry(format!(
                "node {} has no Point geometry",
                key
            )))
        }
    };
    Ok(NodeRecord::new(key, geom))
}
