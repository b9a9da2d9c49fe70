//! Stockage PostgreSQL/PostGIS

use std::sync::OnceLock;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use geo::Geometry;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wkb::geom_to_wkb;

use super::{FeatureStore, ImportRecord, InsertOutcome, PlotRecord, StoredPlot};
use crate::error::StoreError;
use crate::report::ImportStatus;

/// Drapeau EWKB indiquant la présence d'un SRID
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid regex"))
}

/// Stockage des imports et parcelles dans un schéma PostGIS
pub struct PostgisStore {
    pool: Pool,
    schema: String,
}

impl PostgisStore {
    /// Le nom de schéma est interpolé dans le SQL: seuls les identifiants
    /// simples sont acceptés
    pub fn new(pool: Pool, schema: &str) -> Result<Self, StoreError> {
        if !identifier_re().is_match(schema) {
            return Err(StoreError::Query(format!("Invalid schema name: {}", schema)));
        }
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Crée le schéma, l'extension PostGIS et les tables
    pub async fn ensure_schema(&self, drop_existing: bool) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let schema = &self.schema;

        if drop_existing {
            client
                .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
                .await?;
        }

        client
            .batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
            .await?;

        // L'extension peut exister sans que l'utilisateur ait le droit de la créer
        if let Err(e) = client
            .batch_execute("CREATE EXTENSION IF NOT EXISTS postgis")
            .await
        {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await?
                .is_some();
            if !exists {
                return Err(StoreError::Query(format!(
                    "PostGIS extension is not installed and could not be created: {e}"
                )));
            }
        }

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.imports (
                id UUID PRIMARY KEY,
                file_name TEXT NOT NULL,
                archive_checksum TEXT NOT NULL,
                crs_epsg INTEGER,
                status TEXT NOT NULL,
                imported_count BIGINT NOT NULL DEFAULT 0,
                message TEXT,
                started_at TIMESTAMPTZ NOT NULL,
                finished_at TIMESTAMPTZ
            );

            CREATE TABLE IF NOT EXISTS {schema}.plots (
                id UUID PRIMARY KEY,
                import_id UUID NOT NULL REFERENCES {schema}.imports(id),
                plot_code TEXT NOT NULL UNIQUE,
                geom geometry NOT NULL,
                area_m2 DOUBLE PRECISION NOT NULL,
                land_use TEXT,
                owner_name TEXT,
                price DOUBLE PRECISION,
                notes TEXT,
                attributes JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                geometry_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS plots_geom_idx ON {schema}.plots USING GIST (geom);
            CREATE INDEX IF NOT EXISTS plots_import_idx ON {schema}.plots (import_id);
            "#,
        );
        client.batch_execute(&sql).await?;

        info!(schema = %schema, "Schema ready");
        Ok(())
    }
}

#[async_trait]
impl FeatureStore for PostgisStore {
    async fn begin_import(&self, import: &ImportRecord) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let crs_epsg = import.crs_epsg.map(|code| code as i32);

        client
            .execute(
                &format!(
                    "INSERT INTO {}.imports (id, file_name, archive_checksum, crs_epsg, status, started_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                    self.schema
                ),
                &[
                    &import.id,
                    &import.file_name,
                    &import.archive_checksum,
                    &crs_epsg,
                    &ImportStatus::Processing.as_str(),
                    &import.started_at,
                ],
            )
            .await?;

        debug!(import_id = %import.id, "Import row created");
        Ok(())
    }

    async fn insert_plots(
        &self,
        import_id: Uuid,
        plots: &[PlotRecord],
    ) -> Result<InsertOutcome, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let stmt = tx
            .prepare(&format!(
                "INSERT INTO {}.plots \
                 (id, import_id, plot_code, geom, area_m2, land_use, owner_name, price, notes, attributes, geometry_hash) \
                 VALUES ($1, $2, $3, ST_GeomFromEWKB($4), $5, $6, $7, $8, $9, $10, $11)",
                self.schema
            ))
            .await?;

        let mut outcome = InsertOutcome::default();

        for record in plots {
            let ewkb = match record_to_ewkb(record) {
                Ok(ewkb) => ewkb,
                Err(e) => {
                    outcome.errors.push(format!("plot {}: {}", record.plot_code, e));
                    continue;
                }
            };

            // Un savepoint par ligne: un refus n'annule pas les lignes précédentes
            tx.batch_execute("SAVEPOINT plot_row").await?;

            let id = Uuid::new_v4();
            let result = tx
                .execute(
                    &stmt,
                    &[
                        &id,
                        &import_id,
                        &record.plot_code,
                        &ewkb,
                        &record.area_m2,
                        &record.land_use,
                        &record.owner_name,
                        &record.price,
                        &record.notes,
                        &record.attributes,
                        &record.geometry_hash,
                    ],
                )
                .await;

            match result {
                Ok(_) => {
                    tx.batch_execute("RELEASE SAVEPOINT plot_row").await?;
                    outcome.ids.push(id);
                    outcome.inserted += 1;
                }
                Err(e) => {
                    tx.batch_execute("ROLLBACK TO SAVEPOINT plot_row").await?;
                    let message = e
                        .as_db_error()
                        .map(|db| db.message().to_string())
                        .unwrap_or_else(|| e.to_string());
                    warn!(plot_code = %record.plot_code, error = %message, "Row rejected by store");
                    outcome.errors.push(format!("plot {}: {}", record.plot_code, message));
                }
            }
        }

        tx.commit().await?;

        info!(
            import_id = %import_id,
            inserted = outcome.inserted,
            errors = outcome.errors.len(),
            "Plots inserted"
        );
        Ok(outcome)
    }

    async fn finalize_import(
        &self,
        import_id: Uuid,
        status: ImportStatus,
        imported_count: usize,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let imported_count = imported_count as i64;

        let updated = client
            .execute(
                &format!(
                    "UPDATE {}.imports SET status = $2, imported_count = $3, message = $4, finished_at = NOW() \
                     WHERE id = $1",
                    self.schema
                ),
                &[&import_id, &status.as_str(), &imported_count, &message],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::UnknownImport(import_id));
        }
        Ok(())
    }

    async fn get_plot(&self, id: Uuid) -> Result<Option<StoredPlot>, StoreError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!(
                    "SELECT id, import_id, plot_code, ST_AsGeoJSON(geom) AS geometry, ST_SRID(geom) AS srid, \
                     area_m2, land_use, owner_name, price, notes, attributes, geometry_hash \
                     FROM {}.plots WHERE id = $1",
                    self.schema
                ),
                &[&id],
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let geometry: String = row.get("geometry");
        let srid: i32 = row.get("srid");

        Ok(Some(StoredPlot {
            id: row.get("id"),
            import_id: row.get("import_id"),
            record: PlotRecord {
                plot_code: row.get("plot_code"),
                geometry: serde_json::from_str(&geometry)?,
                srid: srid as u32,
                area_m2: row.get("area_m2"),
                land_use: row.get("land_use"),
                owner_name: row.get("owner_name"),
                price: row.get("price"),
                notes: row.get("notes"),
                attributes: row.get("attributes"),
                geometry_hash: row.get("geometry_hash"),
            },
        }))
    }
}

/// Géométrie GeoJSON vers EWKB avec le SRID de la parcelle
fn record_to_ewkb(record: &PlotRecord) -> Result<Vec<u8>, StoreError> {
    let geometry = Geometry::<f64>::try_from(&record.geometry.value)
        .map_err(|e| StoreError::Geometry(e.to_string()))?;
    geometry_to_ewkb(&geometry, record.srid)
}

/// Convertit une géométrie en EWKB (WKB + SRID)
pub fn geometry_to_ewkb(geom: &Geometry, srid: u32) -> Result<Vec<u8>, StoreError> {
    let wkb = geom_to_wkb(geom)
        .map_err(|e| StoreError::Geometry(format!("Failed to convert geometry to WKB: {:?}", e)))?;

    if wkb.len() < 5 {
        return Err(StoreError::Geometry("WKB too short".to_string()));
    }

    let little_endian = wkb[0] == 1;
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];

    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);
    if little_endian {
        let geom_type = u32::from_le_bytes(type_bytes) | EWKB_SRID_FLAG;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | EWKB_SRID_FLAG;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }
    ewkb.extend_from_slice(&wkb[5..]);

    Ok(ewkb)
}
