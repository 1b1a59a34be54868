#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("edge not found: ({0}, {1})")]
    EdgeNotFound(String, String),
    #[error("error with graph attribute {0}: {1}")]
    AttributeError(String, String),
    #[error("{0}")]
    InternalError(String),
}
