use std::fs;
use std::path::{Path, PathBuf};

use super::build_error::BuildError;

/// find the GeoJSON layer files of a project directory, sorted by name.
/// fails with `MissingLayers` when the `layers` directory is absent or
/// holds no `.geojson` files.
pub fn get_layers_paths<P: AsRef<Path>>(project_dir: P) -> Result<Vec<PathBuf>, BuildError> {
    let layers_dir = project_dir.as_ref().join("layers");
    if !layers_dir.exists() {
        return Err(BuildError::MissingLayers(
            "layers directory not found".to_string(),
        ));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(&layers_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "geojson")
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(BuildError::MissingLayers(
            "no GeoJSON files in layers directory".to_string(),
        ));
    }
    Ok(paths)
}
