use footpath_core::model::network::NetworkError;
use footpath_core::model::profile::ProfileError;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("graph failure: {0}")]
    Graph(#[from] NetworkError),
}
