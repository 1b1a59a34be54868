pub mod build_error;
pub mod edge_generator;
pub mod graph_builder;
pub mod layers;

pub use build_error::BuildError;
pub use edge_generator::{count_layer_features, layer_edges};
pub use graph_builder::{build_graph, GraphBuilder};
pub use layers::get_layers_paths;
