use geo::Point;

/// a node row: its canonical key and point geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub key: String,
    pub geom: Point<f64>,
}

impl NodeRecord {
    pub fn new(key: impl Into<String>, geom: Point<f64>) -> Self {
        NodeRecord {
            key: key.into(),
            geom,
        }
    }
}
