use crate::model::network::NetworkError;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("sqlite failure: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("invalid geometry blob: {0}")]
    InvalidGeometry(String),
    #[error("cannot open graph: {0}")]
    UnderspecifiedGraph(String),
    #[error("failure accessing graph file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("{0}")]
    InternalError(String),
}
