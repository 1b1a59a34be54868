use std::fs;
use std::path::Path;

use geo::{Coord, LineString};
use geojson::{FeatureCollection, GeoJson, Value as GeoJsonValue};
use indexmap::IndexMap;

use super::build_error::BuildError;
use crate::model::network::{node_key, AttrValue, EdgeRecord, EdgeTuple, LENGTH_KEY};
use crate::util::geo::linestring_length_meters;

const LAYER_KEY: &str = "_layer";
const U_OVERRIDE: &str = "_u";
const V_OVERRIDE: &str = "_v";

/// parse one GeoJSON layer file into directed edges. every LineString
/// feature yields a forward edge and, with `add_reverse`, its reverse with
/// the `changes_sign` attributes negated. non-LineString features are
/// skipped; null properties are dropped; a missing `length` is computed as
/// the haversine length of the geometry.
pub fn layer_edges<P: AsRef<Path>>(
    path: P,
    precision: u32,
    changes_sign: &[String],
    add_reverse: bool,
) -> Result<Vec<EdgeTuple>, BuildError> {
    let path = path.as_ref();
    let collection = read_collection(path)?;
    let layer = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer")
        .to_string();

    let mut edges = Vec::new();
    let mut skipped = 0usize;
    for feature in collection.features {
        let coords = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(GeoJsonValue::LineString(positions)) => positions,
            _ => {
                skipped += 1;
                continue;
            }
        };
        if coords.len() < 2 {
            skipped += 1;
            continue;
        }
        let geom = LineString::new(
            coords
                .iter()
                .map(|position| Coord {
                    x: position[0],
                    y: position[1],
                })
                .collect(),
        );

        let mut attrs: IndexMap<String, AttrValue> = IndexMap::new();
        if let Some(properties) = &feature.properties {
            for (key, value) in properties {
                if value.is_null() {
                    continue;
                }
                match AttrValue::try_from(value) {
                    Ok(attr) => {
                        attrs.insert(key.clone(), attr);
                    }
                    Err(e) => {
                        log::warn!("{}: dropping property {}: {}", layer, key, e);
                    }
                }
            }
        }

        // upstream node ids win over coordinate-derived keys and are not
        // stored as attributes
        let u = match attrs.shift_remove(U_OVERRIDE) {
            Some(AttrValue::Text(u)) => u,
            _ => {
                let first = geom.0[0];
                node_key(first.x, first.y, precision)
            }
        };
        let v = match attrs.shift_remove(V_OVERRIDE) {
            Some(AttrValue::Text(v)) => v,
            _ => {
                let last = geom.0[geom.0.len() - 1];
                node_key(last.x, last.y, precision)
            }
        };

        attrs.insert(LAYER_KEY.to_string(), AttrValue::Text(layer.clone()));
        if !attrs.contains_key(LENGTH_KEY) {
            let length = linestring_length_meters(&geom)
                .map_err(BuildError::InvalidGeometry)?;
            attrs.insert(LENGTH_KEY.to_string(), AttrValue::Float(length));
        }

        let record = EdgeRecord::new(geom, attrs);
        if add_reverse {
            let reversed = record.reversed(changes_sign, &[]);
            edges.push((u.clone(), v.clone(), record));
            edges.push((v, u, reversed));
        } else {
            edges.push((u, v, record));
        }
    }
    if skipped > 0 {
        log::info!("{}: skipped {} non-LineString features", layer, skipped);
    }
    Ok(edges)
}

/// the number of LineString features in a layer file, for sizing progress
/// reporting before a build.
pub fn count_layer_features<P: AsRef<Path>>(path: P) -> Result<usize, BuildError> {
    let collection = read_collection(path.as_ref())?;
    let count = collection
        .features
        .iter()
        .filter(|f| {
            matches!(
                f.geometry.as_ref().map(|g| &g.value),
                Some(GeoJsonValue::LineString(_))
            )
        })
        .count();
    Ok(count)
}

fn read_collection(path: &Path) -> Result<FeatureCollection, BuildError> {
    let raw = fs::read_to_string(path)?;
    let unrecognized = |detail: String| {
        BuildError::UnrecognizedFileFormat(path.display().to_string(), detail)
    };
    match raw.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => Ok(collection),
        Ok(_) => Err(unrecognized("not a FeatureCollection".to_string())),
        Err(e) => Err(unrecognized(e.to_string())),
    }
}
