pub mod attr_value;
pub mod edge_record;
pub mod network_error;
pub mod node_id;
pub mod node_record;

pub use attr_value::AttrValue;
pub use edge_record::{
    EdgeRecord, EdgeTuple, GEOM_COLUMN, LENGTH_KEY, U_COLUMN, V_COLUMN, WEIGHT_COLUMN_PREFIX,
};
pub use network_error::NetworkError;
pub use node_id::{node_key, pseudo_node_key, DEFAULT_PRECISION, PROJECTION_NODE_ID};
pub use node_record::NodeRecord;
