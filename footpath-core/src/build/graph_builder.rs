use std::fs;
use std::path::{Path, PathBuf};

use super::build_error::BuildError;
use super::edge_generator::layer_edges;
use super::layers::get_layers_paths;
use crate::storage::graph_store::{GraphStore, BATCH_SIZE, GRAPH_FILE_NAME};

/// incrementally builds a graph database into a temporary file beside the
/// destination, then finalizes it with spatial indexes and an atomic move
/// over `graph.gpkg`.
pub struct GraphBuilder {
    store: GraphStore,
    temp_path: PathBuf,
    precision: u32,
    changes_sign: Vec<String>,
}

impl GraphBuilder {
    pub fn new<P: AsRef<Path>>(
        project_dir: P,
        precision: u32,
        changes_sign: Vec<String>,
    ) -> Result<GraphBuilder, BuildError> {
        let temp_path = project_dir
            .as_ref()
            .join(format!("{}.build", GRAPH_FILE_NAME));
        if temp_path.exists() {
            fs::remove_file(&temp_path)?;
        }
        let store = GraphStore::create(&temp_path)?;
        Ok(GraphBuilder {
            store,
            temp_path,
            precision,
            changes_sign,
        })
    }

    /// ingest one layer file: two directed edges per LineString feature.
    pub fn add_layer<P: AsRef<Path>>(
        &mut self,
        path: P,
        counter: Option<&mut dyn FnMut(usize)>,
    ) -> Result<usize, BuildError> {
        let edges = layer_edges(path, self.precision, &self.changes_sign, true)?;
        let added = self.store.add_edges(edges, BATCH_SIZE, counter)?;
        Ok(added)
    }

    /// build the spatial indexes and move the database into place,
    /// replacing any previous build.
    pub fn finalize<P: AsRef<Path>>(mut self, destination: P) -> Result<GraphStore, BuildError> {
        self.store.add_rtree()?;
        drop(self.store);

        let destination = destination.as_ref();
        if destination.exists() {
            fs::remove_file(destination)?;
        }
        fs::rename(&self.temp_path, destination)?;
        Ok(GraphStore::open(destination)?)
    }
}

/// build `graph.gpkg` from the layer files of a project directory.
pub fn build_graph<P: AsRef<Path>>(
    project_dir: P,
    precision: u32,
    changes_sign: Vec<String>,
    mut counter: Option<&mut dyn FnMut(usize)>,
) -> Result<GraphStore, BuildError> {
    let project_dir = project_dir.as_ref();
    let layer_paths = get_layers_paths(project_dir)?;

    let mut builder = GraphBuilder::new(project_dir, precision, changes_sign)?;
    for path in &layer_paths {
        log::info!("importing {}", path.display());
        builder.add_layer(
            path,
            counter.as_mut().map(|c| c as &mut dyn FnMut(usize)),
        )?;
    }
    builder.finalize(project_dir.join(GRAPH_FILE_NAME))
}
