use crate::model::network::NetworkError;

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("no viable path found")]
    NoPath,
    #[error("no admissible candidate for waypoint ({lon}, {lat})")]
    InvalidWaypoint { lon: f64, lat: f64 },
    #[error(transparent)]
    Network(#[from] NetworkError),
}
