mod cut;
mod haversine;
mod local;

pub use cut::{cut, cut_off, interpolate, planar_length, project, reverse, CUT_SLACK};
pub use haversine::{coord_distance_meters, linestring_length_meters, APPROX_EARTH_RADIUS_M};
pub use local::{
    degree_bbox, distance_to_linestring_meters, meters_per_degree_lon, METERS_PER_DEGREE_LAT,
};
