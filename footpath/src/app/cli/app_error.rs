use footpath_core::build::BuildError;
use footpath_core::model::profile::ProfileError;
use footpath_core::storage::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("server failure: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}
