use geo::LineString;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::attr_value::AttrValue;
use crate::util::geo::{planar_length, reverse};

pub const GEOM_COLUMN: &str = "geom";
pub const U_COLUMN: &str = "_u";
pub const V_COLUMN: &str = "_v";
pub const LENGTH_KEY: &str = "length";
pub const WEIGHT_COLUMN_PREFIX: &str = "_weight_";

/// a directed edge keyed by its endpoint node ids, with its attribute data.
pub type EdgeTuple = (String, String, EdgeRecord);

/// attribute data for a single directed edge: a LineString geometry whose
/// first coordinate is node `u`'s point and last coordinate is node `v`'s
/// point, plus a free-form attribute map in stable insertion order.
///
/// algorithms consume edges through this record's well-known keys
/// (`length`, `_weight_*`) plus whatever the input features carried.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub geom: LineString<f64>,
    pub attrs: IndexMap<String, AttrValue>,
}

impl EdgeRecord {
    pub fn new(geom: LineString<f64>, attrs: IndexMap<String, AttrValue>) -> Self {
        EdgeRecord { geom, attrs }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// the `length` attribute as a number, if present and non-null.
    pub fn length(&self) -> Option<f64> {
        self.attrs.get(LENGTH_KEY).and_then(|v| v.as_f64())
    }

    /// a precomputed static weight, if the reserved column is present and
    /// non-null. null means the cost function returned no cost for this
    /// edge (infinite cost).
    pub fn weight(&self, column: &str) -> Option<f64> {
        self.attrs.get(column).and_then(|v| v.as_f64())
    }

    /// a copy of this edge with new geometry. a `length` attribute is
    /// rescaled by the ratio of planar lengths; other attributes are kept.
    pub fn with_geometry(&self, geom: LineString<f64>) -> EdgeRecord {
        let mut attrs = self.attrs.clone();
        if let Some(length) = self.length() {
            let orig_len = planar_length(&self.geom);
            if orig_len > 0.0 {
                let scaled = length * (planar_length(&geom) / orig_len);
                attrs.insert(LENGTH_KEY.to_string(), AttrValue::Float(scaled));
            }
        }
        EdgeRecord { geom, attrs }
    }

    /// a copy of this edge in the reverse orientation: coordinates
    /// reversed, `invert` attributes negated, `flip` attributes toggled.
    pub fn reversed(&self, invert: &[String], flip: &[String]) -> EdgeRecord {
        let mut attrs = self.attrs.clone();
        for key in invert {
            if let Some(v) = attrs.get(key) {
                let negated = v.negated();
                attrs.insert(key.clone(), negated);
            }
        }
        for key in flip {
            if let Some(v) = attrs.get(key) {
                let toggled = v.toggled();
                attrs.insert(key.clone(), toggled);
            }
        }
        EdgeRecord {
            geom: reverse(&self.geom),
            attrs,
        }
    }

    /// the attributes as a JSON object, for response documents.
    pub fn to_properties(&self) -> JsonMap<String, JsonValue> {
        self.attrs
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(v)))
            .collect()
    }
}
