use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use super::geom_blob;
use super::storage_error::StorageError;

/// "GPKG" in ASCII, the format's PRAGMA application_id.
pub const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
pub const GPKG_USER_VERSION: i32 = 10200;
pub const SRID_WGS84: i32 = 4326;

/// a GeoPackage file: a SQLite database with the format's metadata tables
/// and geometry blobs. owns the single connection to the file; read-only
/// views borrow it.
pub struct GeoPackage {
    pub(crate) conn: Connection,
    path: PathBuf,
}

impl GeoPackage {
    /// create a new GeoPackage, initializing the metadata tables if the
    /// database is empty.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<GeoPackage, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        register_envelope_functions(&conn)?;
        let gpkg = GeoPackage {
            conn,
            path: path.as_ref().to_path_buf(),
        };
        if gpkg.is_empty_database()? {
            gpkg.initialize()?;
        }
        Ok(gpkg)
    }

    /// open an existing GeoPackage. fails with `UnderspecifiedGraph` when
    /// the file does not exist or lacks the format's metadata tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GeoPackage, StorageError> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(StorageError::UnderspecifiedGraph(format!(
                "no such file: {}",
                path_ref.display()
            )));
        }
        let conn = Connection::open(path_ref)?;
        register_envelope_functions(&conn)?;
        let gpkg = GeoPackage {
            conn,
            path: path_ref.to_path_buf(),
        };
        if gpkg.is_empty_database()? {
            return Err(StorageError::UnderspecifiedGraph(format!(
                "not a GeoPackage: {}",
                path_ref.display()
            )));
        }
        Ok(gpkg)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// clone the full database to a new location and return a handle to the
    /// copy. `path` may be `:memory:`.
    pub fn copy<P: AsRef<Path>>(&self, path: P) -> Result<GeoPackage, StorageError> {
        let mut dst = Connection::open(path.as_ref())?;
        {
            let backup = Backup::new(&self.conn, &mut dst)?;
            backup.run_to_completion(64, Duration::from_millis(0), None)?;
        }
        register_envelope_functions(&dst)?;
        Ok(GeoPackage {
            conn: dst,
            path: path.as_ref().to_path_buf(),
        })
    }

    fn is_empty_database(&self) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.conn
            .pragma_update(None, "application_id", GPKG_APPLICATION_ID)?;
        self.conn
            .pragma_update(None, "user_version", GPKG_USER_VERSION)?;

        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS gpkg_contents (
                table_name TEXT,
                data_type TEXT NOT NULL,
                identifier TEXT UNIQUE,
                description TEXT DEFAULT '',
                last_change TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                min_x DOUBLE,
                min_y DOUBLE,
                max_x DOUBLE,
                max_y DOUBLE,
                srs_id INTEGER,
                PRIMARY KEY (table_name)
            );
            CREATE TABLE IF NOT EXISTS gpkg_extensions (
                table_name TEXT,
                column_name TEXT,
                extension_name TEXT NOT NULL,
                definition TEXT NOT NULL,
                scope TEXT NOT NULL,
                UNIQUE (table_name, column_name, extension_name)
            );
            CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
                table_name TEXT UNIQUE NOT NULL,
                column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL,
                m TINYINT NOT NULL,
                PRIMARY KEY (table_name, column_name)
            );
            CREATE TABLE IF NOT EXISTS gpkg_ogr_contents (
                table_name TEXT NOT NULL,
                feature_count INTEGER DEFAULT NULL,
                PRIMARY KEY (table_name)
            );
            CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL,
                organization TEXT NOT NULL,
                organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL,
                description TEXT,
                PRIMARY KEY (srs_id)
            );",
        )?;

        self.add_srs()?;
        Ok(())
    }

    /// bootstrap the spatial reference table with the two undefined systems
    /// the format requires plus WGS84, the system all graph data uses.
    fn add_srs(&self) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
                         (srs_name, srs_id, organization, organization_coordsys_id, definition)
                  VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(rusqlite::params![
            "Undefined cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
        ])?;
        stmt.execute(rusqlite::params![
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
        ])?;
        stmt.execute(rusqlite::params![
            "WGS 84 geodetic",
            SRID_WGS84,
            "EPSG",
            SRID_WGS84,
            "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]]]",
        ])?;
        Ok(())
    }
}

/// register the scalar functions the r-tree synchronization triggers call
/// to read bounding boxes out of geometry blobs. invalid blobs yield NULL
/// so a bad row cannot wedge a trigger.
fn register_envelope_functions(conn: &Connection) -> Result<(), StorageError> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("fp_min_x", 1, flags, |ctx| {
        let blob: Vec<u8> = ctx.get(0)?;
        Ok(geom_blob::envelope(&blob).ok().flatten().map(|e| e.min_x))
    })?;
    conn.create_scalar_function("fp_max_x", 1, flags, |ctx| {
        let blob: Vec<u8> = ctx.get(0)?;
        Ok(geom_blob::envelope(&blob).ok().flatten().map(|e| e.max_x))
    })?;
    conn.create_scalar_function("fp_min_y", 1, flags, |ctx| {
        let blob: Vec<u8> = ctx.get(0)?;
        Ok(geom_blob::envelope(&blob).ok().flatten().map(|e| e.min_y))
    })?;
    conn.create_scalar_function("fp_max_y", 1, flags, |ctx| {
        let blob: Vec<u8> = ctx.get(0)?;
        Ok(geom_blob::envelope(&blob).ok().flatten().map(|e| e.max_y))
    })?;
    conn.create_scalar_function("fp_is_empty", 1, flags, |ctx| {
        let blob: Vec<u8> = ctx.get(0)?;
        let empty = match geom_blob::envelope(&blob) {
            Ok(Some(_)) => 0i64,
            _ => 1i64,
        };
        Ok(empty)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_create_initializes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let gpkg = GeoPackage::create(dir.path().join("graph.gpkg")).unwrap();

        let app_id: i32 = gpkg
            .conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .unwrap();
        assert_eq!(app_id, GPKG_APPLICATION_ID);

        let srs_count: i64 = gpkg
            .conn
            .query_row(
                "SELECT COUNT(*) FROM gpkg_spatial_ref_sys WHERE srs_id = 4326",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(srs_count, 1);
    }

    #[test]
    fn test_open_missing_file_is_underspecified() {
        let dir = tempfile::tempdir().unwrap();
        let result = GeoPackage::open(dir.path().join("nope.gpkg"));
        assert!(matches!(
            result,
            Err(StorageError::UnderspecifiedGraph(_))
        ));
    }

    #[test]
    fn test_envelope_functions_registered() {
        let dir = tempfile::tempdir().unwrap();
        let gpkg = GeoPackage::create(dir.path().join("graph.gpkg")).unwrap();
        let blob = geom_blob::encode_point(&Point::new(-122.3, 47.6), SRID_WGS84);
        let min_x: f64 = gpkg
            .conn
            .query_row("SELECT fp_min_x(?1)", [&blob], |row| row.get(0))
            .unwrap();
        assert_eq!(min_x, -122.3);
    }

    #[test]
    fn test_copy_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let gpkg = GeoPackage::create(dir.path().join("graph.gpkg")).unwrap();
        let copy = gpkg.copy(":memory:").unwrap();
        let count: i64 = copy
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'gpkg_contents'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
