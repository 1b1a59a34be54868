pub mod augmented;
pub mod feature_table;
pub mod geom_blob;
pub mod geopackage;
pub mod graph_store;
pub mod graph_view;
pub mod storage_error;

pub use augmented::{prepare_augmented, AugmentedView, Overlay};
pub use feature_table::{FeatureTable, GeomType};
pub use geopackage::GeoPackage;
pub use graph_store::{GraphStore, BATCH_SIZE, DEFAULT_SEARCH_RADIUS_M, GRAPH_FILE_NAME};
pub use graph_view::{GraphView, StoreView};
pub use storage_error::StorageError;
