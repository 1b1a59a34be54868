use crate::storage::storage_error::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("missing layers: {0}")]
    MissingLayers(String),
    #[error("{0} has an unrecognized format: {1}")]
    UnrecognizedFileFormat(String, String),
    #[error("invalid feature geometry: {0}")]
    InvalidGeometry(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failure accessing build input: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}
