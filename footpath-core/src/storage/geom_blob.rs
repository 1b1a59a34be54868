//! GeoPackage geometry blob codec: a short binary header (magic `GP`,
//! version, flags, srid) followed by little-endian WKB. only the two
//! geometry types the graph stores are supported: Point for nodes,
//! LineString for edges.

use geo::{Coord, LineString, Point};

use super::storage_error::StorageError;

const MAGIC: [u8; 2] = *b"GP";
const VERSION: u8 = 0;
// flags: bit 0 = header byte order (1 = little-endian), bits 1-3 = envelope
// indicator, bit 4 = empty flag
const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_EMPTY: u8 = 0b0001_0000;
const ENVELOPE_SHIFT: u8 = 1;
const ENVELOPE_MASK: u8 = 0b0000_1110;

const WKB_LITTLE_ENDIAN: u8 = 1;
const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// serialize a point geometry to a GeoPackage blob.
pub fn encode_point(point: &Point<f64>, srid: i32) -> Vec<u8> {
    let mut buf = header(srid);
    buf.push(WKB_LITTLE_ENDIAN);
    buf.extend_from_slice(&WKB_POINT.to_le_bytes());
    buf.extend_from_slice(&point.0.x.to_le_bytes());
    buf.extend_from_slice(&point.0.y.to_le_bytes());
    buf
}

/// serialize a polyline geometry to a GeoPackage blob.
pub fn encode_linestring(line: &LineString<f64>, srid: i32) -> Vec<u8> {
    let mut buf = header(srid);
    buf.push(WKB_LITTLE_ENDIAN);
    buf.extend_from_slice(&WKB_LINESTRING.to_le_bytes());
    buf.extend_from_slice(&(line.0.len() as u32).to_le_bytes());
    for c in &line.0 {
        buf.extend_from_slice(&c.x.to_le_bytes());
        buf.extend_from_slice(&c.y.to_le_bytes());
    }
    buf
}

fn header(srid: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(FLAG_LITTLE_ENDIAN);
    buf.extend_from_slice(&srid.to_le_bytes());
    buf
}

/// deserialize a GeoPackage blob. tolerates blobs written with an envelope
/// (indicator 1) by skipping it.
pub fn decode(blob: &[u8]) -> Result<Geometry, StorageError> {
    let (wkb, empty) = strip_header(blob)?;
    if empty {
        return Err(StorageError::InvalidGeometry(
            "empty geometry in graph table".to_string(),
        ));
    }
    decode_wkb(wkb)
}

/// the geometry's bounding box, or None when the blob is flagged empty.
pub fn envelope(blob: &[u8]) -> Result<Option<Envelope>, StorageError> {
    let (wkb, empty) = strip_header(blob)?;
    if empty {
        return Ok(None);
    }
    let coords = match decode_wkb(wkb)? {
        Geometry::Point(p) => vec![p.0],
        Geometry::LineString(ls) => ls.0,
    };
    if coords.is_empty() {
        return Ok(None);
    }
    let mut env = Envelope {
        min_x: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        min_y: f64::INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    for c in coords {
        env.min_x = env.min_x.min(c.x);
        env.max_x = env.max_x.max(c.x);
        env.min_y = env.min_y.min(c.y);
        env.max_y = env.max_y.max(c.y);
    }
    Ok(Some(env))
}

/// validate the GP header and return the WKB payload plus the empty flag.
fn strip_header(blob: &[u8]) -> Result<(&[u8], bool), StorageError> {
    if blob.len() < 8 || blob[0..2] != MAGIC {
        return Err(StorageError::InvalidGeometry(
            "missing GP header".to_string(),
        ));
    }
    let flags = blob[3];
    let empty = flags & FLAG_EMPTY != 0;
    let envelope_indicator = (flags & ENVELOPE_MASK) >> ENVELOPE_SHIFT;
    let envelope_len = match envelope_indicator {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => {
            return Err(StorageError::InvalidGeometry(format!(
                "invalid envelope indicator: {}",
                other
            )))
        }
    };
    let offset = 8 + envelope_len;
    if blob.len() < offset {
        return Err(StorageError::InvalidGeometry(
            "truncated GP header".to_string(),
        ));
    }
    Ok((&blob[offset..], empty))
}

fn decode_wkb(wkb: &[u8]) -> Result<Geometry, StorageError> {
    if wkb.len() < 5 {
        return Err(StorageError::InvalidGeometry("truncated WKB".to_string()));
    }
    let little_endian = match wkb[0] {
        0 => false,
        1 => true,
        other => {
            return Err(StorageError::InvalidGeometry(format!(
                "invalid WKB byte order: {}",
                other
            )))
        }
    };
    let geom_type = read_u32(&wkb[1..5], little_endian)?;
    // strip any srid flag bits (EWKB) down to the base type
    match geom_type & 0xFF {
        WKB_POINT => {
            let x = read_f64(wkb, 5, little_endian)?;
            let y = read_f64(wkb, 13, little_endian)?;
            Ok(Geometry::Point(Point::new(x, y)))
        }
        WKB_LINESTRING => {
            if wkb.len() < 9 {
                return Err(StorageError::InvalidGeometry("truncated WKB".to_string()));
            }
            let n = read_u32(&wkb[5..9], little_endian)? as usize;
            let mut coords = Vec::with_capacity(n);
            for i in 0..n {
                let base = 9 + i * 16;
                coords.push(Coord {
                    x: read_f64(wkb, base, little_endian)?,
                    y: read_f64(wkb, base + 8, little_endian)?,
                });
            }
            Ok(Geometry::LineString(LineString::new(coords)))
        }
        other => Err(StorageError::InvalidGeometry(format!(
            "unsupported WKB geometry type: {}",
            other
        ))),
    }
}

fn read_u32(bytes: &[u8], little_endian: bool) -> Result<u32, StorageError> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidGeometry("truncated WKB".to_string()))?;
    Ok(if little_endian {
        u32::from_le_bytes(arr)
    } else {
        u32::from_be_bytes(arr)
    })
}

fn read_f64(wkb: &[u8], offset: usize, little_endian: bool) -> Result<f64, StorageError> {
    let bytes = wkb
        .get(offset..offset + 8)
        .ok_or_else(|| StorageError::InvalidGeometry("truncated WKB".to_string()))?;
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::InvalidGeometry("truncated WKB".to_string()))?;
    Ok(if little_endian {
        f64::from_le_bytes(arr)
    } else {
        f64::from_be_bytes(arr)
    })
}
