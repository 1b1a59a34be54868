use geo::LineString;
use indexmap::{IndexMap, IndexSet};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

use super::geom_blob::{self, Geometry};
use super::geopackage::GeoPackage;
use super::storage_error::StorageError;
use crate::model::network::AttrValue;
use crate::util::geo as geo_util;

pub const GEOM_COLUMN: &str = "geom";
pub const PRIMARY_KEY: &str = "fid";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeomType {
    Point,
    LineString,
}

impl GeomType {
    fn name(&self) -> &'static str {
        match self {
            GeomType::Point => "POINT",
            GeomType::LineString => "LINESTRING",
        }
    }
}

/// a row read back from a feature table. attributes stored as SQL NULL are
/// absent from `attrs`.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub fid: i64,
    pub geom: Option<Geometry>,
    pub attrs: IndexMap<String, AttrValue>,
}

/// one geometry-bearing table in a GeoPackage, with a dynamically extended
/// attribute schema. new attribute keys get a column on first sight with a
/// type inferred from the first observed value; later nulls do not change
/// the column type.
pub struct FeatureTable {
    pub name: String,
    pub geom_type: GeomType,
    pub srid: i32,
    columns: IndexSet<String>,
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, geom_type: GeomType, srid: i32) -> FeatureTable {
        FeatureTable {
            name: name.into(),
            geom_type,
            srid,
            columns: IndexSet::new(),
        }
    }

    /// register the table in the GeoPackage metadata and create it. the
    /// base schema is just the primary key and the geometry blob; attribute
    /// columns are added as data arrives.
    pub fn create(&mut self, gpkg: &GeoPackage) -> Result<(), StorageError> {
        let conn = &gpkg.conn;
        conn.execute(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id)
             VALUES (?1, 'features', ?1, ?2)",
            rusqlite::params![self.name, self.srid],
        )?;
        conn.execute(
            "INSERT INTO gpkg_ogr_contents (table_name) VALUES (?1)",
            rusqlite::params![self.name],
        )?;
        conn.execute(
            "INSERT INTO gpkg_geometry_columns
                         (table_name, column_name, geometry_type_name, srs_id, z, m)
                  VALUES (?1, ?2, ?3, ?4, 0, 0)",
            rusqlite::params![self.name, GEOM_COLUMN, self.geom_type.name(), self.srid],
        )?;
        conn.execute(
            &format!(
                "CREATE TABLE {} (
                    {} INTEGER PRIMARY KEY AUTOINCREMENT,
                    {} BLOB
                )",
                quote_ident(&self.name),
                PRIMARY_KEY,
                GEOM_COLUMN
            ),
            [],
        )?;
        self.columns.clear();
        Ok(())
    }

    /// true when the backing table exists in the database.
    pub fn exists(&self, gpkg: &GeoPackage) -> Result<bool, StorageError> {
        let count: i64 = gpkg.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            rusqlite::params![self.name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// populate the in-memory column set from the live schema.
    pub fn load_columns(&mut self, gpkg: &GeoPackage) -> Result<(), StorageError> {
        let mut stmt = gpkg
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(&self.name)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<String>, _>>()?;
        self.columns = names
            .into_iter()
            .filter(|n| n != PRIMARY_KEY && n != GEOM_COLUMN)
            .collect();
        Ok(())
    }

    pub fn columns(&self) -> &IndexSet<String> {
        &self.columns
    }

    /// add a typed attribute column up front, ahead of any data. a no-op
    /// when the column already exists.
    pub fn add_column(
        &mut self,
        gpkg: &GeoPackage,
        name: &str,
        sql_type: &str,
    ) -> Result<(), StorageError> {
        if self.columns.contains(name) {
            return Ok(());
        }
        gpkg.conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(&self.name),
                quote_ident(name),
                sql_type
            ),
            [],
        )?;
        self.columns.insert(name.to_string());
        Ok(())
    }

    /// add columns for any attribute keys not yet in the schema, typed from
    /// the first value observed for the key. runs against `conn` so that a
    /// caller-held transaction covers the ALTERs.
    fn ensure_columns<'a, I>(&mut self, conn: &Connection, attrs: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (&'a String, &'a AttrValue)>,
    {
        for (key, value) in attrs {
            if key == GEOM_COLUMN || key == PRIMARY_KEY || self.columns.contains(key) {
                continue;
            }
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_ident(&self.name),
                    quote_ident(key),
                    value.sql_type()
                ),
                [],
            )?;
            self.columns.insert(key.clone());
        }
        Ok(())
    }

    /// batched idempotent upsert. `conflict_columns` names the attribute
    /// columns forming the row identity (a matching unique index must
    /// exist); on conflict, the supplied columns and geometry overwrite the
    /// stored row and unspecified columns are untouched.
    pub fn upsert_batch(
        &mut self,
        gpkg: &GeoPackage,
        conflict_columns: &[&str],
        rows: &[(Vec<u8>, IndexMap<String, AttrValue>)],
    ) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = gpkg.conn.unchecked_transaction()?;
        for (_, attrs) in rows {
            self.ensure_columns(&tx, attrs.iter())?;
        }
        for (blob, attrs) in rows {
            let mut columns = vec![GEOM_COLUMN.to_string()];
            let mut params: Vec<SqlValue> = vec![SqlValue::Blob(blob.clone())];
            for (key, value) in attrs {
                columns.push(key.clone());
                params.push(to_sql_value(value));
            }
            let column_list = columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let conflict_list = conflict_columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let updates = columns
                .iter()
                .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
                quote_ident(&self.name),
                column_list,
                placeholders,
                conflict_list,
                updates
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// batched partial update. each entry carries the values of
    /// `key_columns` identifying the row and the columns to set;
    /// unspecified columns are untouched, and an explicit `Null` value
    /// overwrites the stored value with SQL NULL.
    pub fn update_batch(
        &mut self,
        gpkg: &GeoPackage,
        key_columns: &[&str],
        updates: &[(Vec<AttrValue>, IndexMap<String, AttrValue>)],
    ) -> Result<(), StorageError> {
        if updates.is_empty() {
            return Ok(());
        }
        let tx = gpkg.conn.unchecked_transaction()?;
        for (_, attrs) in updates {
            self.ensure_columns(&tx, attrs.iter())?;
        }
        for (keys, attrs) in updates {
            if attrs.is_empty() {
                continue;
            }
            let mut params: Vec<SqlValue> = Vec::with_capacity(attrs.len() + keys.len());
            let set_clauses = attrs
                .iter()
                .enumerate()
                .map(|(i, (key, value))| {
                    params.push(to_sql_value(value));
                    format!("{} = ?{}", quote_ident(key), i + 1)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let where_clauses = key_columns
                .iter()
                .enumerate()
                .map(|(i, key)| format!("{} = ?{}", quote_ident(key), attrs.len() + i + 1))
                .collect::<Vec<_>>()
                .join(" AND ");
            for key_value in keys {
                params.push(to_sql_value(key_value));
            }
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_ident(&self.name),
                set_clauses,
                where_clauses
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// rows matching a WHERE clause. `clause` is trusted SQL owned by this
    /// module's callers, never user input.
    pub fn select_where(
        &self,
        gpkg: &GeoPackage,
        clause: &str,
        params: &[SqlValue],
    ) -> Result<Vec<FeatureRow>, StorageError> {
        let sql = if clause.is_empty() {
            format!("SELECT * FROM {}", quote_ident(&self.name))
        } else {
            format!("SELECT * FROM {} {}", quote_ident(&self.name), clause)
        };
        let mut stmt = gpkg.conn.prepare_cached(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            features.push(read_row(&names, row)?);
        }
        Ok(features)
    }

    pub fn select_all(&self, gpkg: &GeoPackage) -> Result<Vec<FeatureRow>, StorageError> {
        self.select_where(gpkg, "", &[])
    }

    pub fn select_page(
        &self,
        gpkg: &GeoPackage,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FeatureRow>, StorageError> {
        self.select_where(
            gpkg,
            "ORDER BY fid LIMIT ?1 OFFSET ?2",
            &[SqlValue::from(limit as i64), SqlValue::from(offset as i64)],
        )
    }

    pub fn count(&self, gpkg: &GeoPackage) -> Result<usize, StorageError> {
        let count: i64 = gpkg.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&self.name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// sum a numeric column across all rows, treating NULL as zero.
    pub fn sum_column(&self, gpkg: &GeoPackage, column: &str) -> Result<f64, StorageError> {
        let total: f64 = gpkg.conn.query_row(
            &format!(
                "SELECT COALESCE(SUM({}), 0.0) FROM {}",
                quote_ident(column),
                quote_ident(&self.name)
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn rtree_table(&self) -> String {
        format!("rtree_{}_{}", self.name, GEOM_COLUMN)
    }

    /// build (or rebuild) the r-tree index over this table's geometry and
    /// install the triggers that keep it synchronized with INSERT, UPDATE,
    /// and DELETE on the feature table.
    pub fn add_rtree(&self, gpkg: &GeoPackage) -> Result<(), StorageError> {
        let conn = &gpkg.conn;
        let t = quote_ident(&self.name);
        let rtree = self.rtree_table();
        let rt = quote_ident(&rtree);

        conn.execute(
            "INSERT OR IGNORE INTO gpkg_extensions
                         (table_name, column_name, extension_name, definition, scope)
                  VALUES (?1, ?2, 'gpkg_rtree_index',
                          'http://www.geopackage.org/spec120/#extension_rtree', 'write-only')",
            rusqlite::params![self.name, GEOM_COLUMN],
        )?;

        conn.execute(
            &format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING rtree(id, minX, maxX, minY, maxY)",
                rt
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {rt}
                      SELECT {pk} id,
                             fp_min_x({g}) minX,
                             fp_max_x({g}) maxX,
                             fp_min_y({g}) minY,
                             fp_max_y({g}) maxY
                        FROM {t}
                       WHERE {g} NOT NULL AND NOT fp_is_empty({g})",
                rt = rt,
                pk = PRIMARY_KEY,
                g = GEOM_COLUMN,
                t = t
            ),
            [],
        )?;

        let triggers = [
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_insert AFTER INSERT ON {t}
                   WHEN (NEW.{g} NOT NULL AND NOT fp_is_empty(NEW.{g}))
                 BEGIN
                   INSERT OR REPLACE INTO {rt} VALUES (
                     NEW.{pk},
                     fp_min_x(NEW.{g}), fp_max_x(NEW.{g}),
                     fp_min_y(NEW.{g}), fp_max_y(NEW.{g})
                   );
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_update1 AFTER UPDATE OF {g} ON {t}
                   WHEN OLD.{pk} = NEW.{pk}
                    AND (NEW.{g} NOT NULL AND NOT fp_is_empty(NEW.{g}))
                 BEGIN
                   INSERT OR REPLACE INTO {rt} VALUES (
                     NEW.{pk},
                     fp_min_x(NEW.{g}), fp_max_x(NEW.{g}),
                     fp_min_y(NEW.{g}), fp_max_y(NEW.{g})
                   );
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_update2 AFTER UPDATE OF {g} ON {t}
                   WHEN OLD.{pk} = NEW.{pk}
                    AND (NEW.{g} ISNULL OR fp_is_empty(NEW.{g}))
                 BEGIN
                   DELETE FROM {rt} WHERE id = OLD.{pk};
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_update3 AFTER UPDATE ON {t}
                   WHEN OLD.{pk} != NEW.{pk}
                    AND (NEW.{g} NOT NULL AND NOT fp_is_empty(NEW.{g}))
                 BEGIN
                   DELETE FROM {rt} WHERE id = OLD.{pk};
                   INSERT OR REPLACE INTO {rt} VALUES (
                     NEW.{pk},
                     fp_min_x(NEW.{g}), fp_max_x(NEW.{g}),
                     fp_min_y(NEW.{g}), fp_max_y(NEW.{g})
                   );
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_update4 AFTER UPDATE ON {t}
                   WHEN OLD.{pk} != NEW.{pk}
                    AND (NEW.{g} ISNULL OR fp_is_empty(NEW.{g}))
                 BEGIN
                   DELETE FROM {rt} WHERE id IN (OLD.{pk}, NEW.{pk});
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
            format!(
                "CREATE TRIGGER IF NOT EXISTS {rtn}_delete AFTER DELETE ON {t}
                   WHEN OLD.{g} NOT NULL
                 BEGIN
                   DELETE FROM {rt} WHERE id = OLD.{pk};
                 END",
                rtn = self.rtree_table(),
                rt = rt,
                t = t,
                g = GEOM_COLUMN,
                pk = PRIMARY_KEY
            ),
        ];
        for trigger in &triggers {
            conn.execute(trigger, [])?;
        }
        Ok(())
    }

    /// rows whose bounding box intersects the given degree-space box,
    /// via the r-tree.
    pub fn intersects(
        &self,
        gpkg: &GeoPackage,
        left: f64,
        bottom: f64,
        right: f64,
        top: f64,
    ) -> Result<Vec<FeatureRow>, StorageError> {
        let sql = format!(
            "SELECT t.* FROM {t} t
              JOIN {rt} r ON t.{pk} = r.id
             WHERE r.maxX >= ?1 AND r.minX <= ?2
               AND r.maxY >= ?3 AND r.minY <= ?4",
            t = quote_ident(&self.name),
            rt = quote_ident(&self.rtree_table()),
            pk = PRIMARY_KEY
        );
        let mut stmt = gpkg.conn.prepare_cached(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(rusqlite::params![left, right, bottom, top])?;
        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            features.push(read_row(&names, row)?);
        }
        Ok(features)
    }

    /// rows within `radius_m` meters of `(lon, lat)`. the r-tree narrows by
    /// bounding box; with `sort`, candidates are refined by exact distance
    /// in a local meters frame and returned nearest-first with box-only
    /// false positives dropped.
    pub fn dwithin(
        &self,
        gpkg: &GeoPackage,
        lon: f64,
        lat: f64,
        radius_m: f64,
        sort: bool,
    ) -> Result<Vec<FeatureRow>, StorageError> {
        let (left, bottom, right, top) = geo_util::degree_bbox(lon, lat, radius_m);
        let candidates = self.intersects(gpkg, left, bottom, right, top)?;
        if !sort {
            return Ok(candidates);
        }

        let mut measured: Vec<(FeatureRow, f64)> = candidates
            .into_iter()
            .map(|row| {
                let d = match &row.geom {
                    Some(Geometry::LineString(ls)) => {
                        geo_util::distance_to_linestring_meters(lon, lat, ls)
                    }
                    Some(Geometry::Point(p)) => {
                        let single = LineString::new(vec![p.0]);
                        geo_util::distance_to_linestring_meters(lon, lat, &single)
                    }
                    None => f64::INFINITY,
                };
                (row, d)
            })
            .filter(|(_, d)| *d <= radius_m)
            .collect();
        measured.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(measured.into_iter().map(|(row, _)| row).collect())
    }
}

fn to_sql_value(value: &AttrValue) -> SqlValue {
    match value {
        AttrValue::Int(i) => SqlValue::Integer(*i),
        AttrValue::Float(f) => SqlValue::Real(*f),
        AttrValue::Text(t) => SqlValue::Text(t.clone()),
        AttrValue::Bool(b) => SqlValue::Integer(*b as i64),
        AttrValue::Null => SqlValue::Null,
    }
}

fn read_row(names: &[String], row: &rusqlite::Row) -> Result<FeatureRow, StorageError> {
    use rusqlite::types::ValueRef;

    let mut fid = 0i64;
    let mut geom = None;
    let mut attrs = IndexMap::new();
    for (i, name) in names.iter().enumerate() {
        match row.get_ref(i)? {
            ValueRef::Null => {}
            value if name == PRIMARY_KEY => {
                if let ValueRef::Integer(id) = value {
                    fid = id;
                }
            }
            ValueRef::Blob(blob) if name == GEOM_COLUMN => {
                geom = Some(geom_blob::decode(blob)?);
            }
            ValueRef::Integer(i64_value) => {
                attrs.insert(name.clone(), AttrValue::Int(i64_value));
            }
            ValueRef::Real(f64_value) => {
                attrs.insert(name.clone(), AttrValue::Float(f64_value));
            }
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| StorageError::InternalError(format!("non-utf8 text: {}", e)))?;
                attrs.insert(name.clone(), AttrValue::Text(text.to_string()));
            }
            ValueRef::Blob(_) => {}
        }
    }
    Ok(FeatureRow { fid, geom, attrs })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
