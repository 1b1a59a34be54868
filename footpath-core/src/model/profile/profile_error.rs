use crate::storage::storage_error::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("failure reading profile file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("failure parsing profile JSON: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid profile descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("missing required argument: {0}")]
    MissingArg(String),
    #[error("invalid value for argument {name}: {value}")]
    InvalidArgValue { name: String, value: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
