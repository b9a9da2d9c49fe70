//! Définition et implémentation des commandes CLI
//!
//! - `import`: archive → PostGIS
//! - `check`: essai à blanc dans un stockage en mémoire
//! - `to-geojson`: parcelles acceptées → GeoJSON (sans base)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;
use uuid::Uuid;

use plot_ingest::config::ImportConfig;
use plot_ingest::export::geojson::export_to_geojson;
use plot_ingest::pipeline::{cancel_signal, prepare_import, run_import, ImportOutcome, Upload};
use plot_ingest::store::pool::{create_pool, test_connection, DatabaseConfig};
use plot_ingest::store::{FeatureStore, MemoryStore, PostgisStore};
use plot_ingest::{ImportContext, ImportError};

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a zipped shapefile and insert accepted plots into PostGIS
    Import {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        path: PathBuf,

        /// Target PostgreSQL schema
        #[arg(long, default_value = "plots")]
        schema: String,

        /// Config preset name (default/strict) or path to a JSON config
        #[arg(long, default_value = "default")]
        config: String,

        /// Drop schema before import
        #[arg(long)]
        drop_schema: bool,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Validate an archive without a database and print the report
    Check {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        path: PathBuf,

        /// Config preset name (default/strict) or path to a JSON config
        #[arg(long, default_value = "default")]
        config: String,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Export accepted plots to GeoJSON (no database required)
    ToGeojson {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        path: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Config preset name (default/strict) or path to a JSON config
        #[arg(long, default_value = "default")]
        config: String,
    },
}

/// Surcharges de connexion (défaut: variables PG* / .env)
#[derive(Args, Debug, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / plots)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Exécute la commande import
pub async fn cmd_import(
    path: &Path,
    schema: &str,
    config_spec: &str,
    drop_schema: bool,
    report_path: Option<&Path>,
    db: DatabaseArgs,
) -> Result<()> {
    let config = ImportConfig::from_spec(config_spec)?;

    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, db);
    info!(
        host = %db_config.host,
        port = db_config.port,
        database = %db_config.dbname,
        ssl = ?db_config.ssl_mode,
        "Connecting to PostgreSQL"
    );

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;

    let store = PostgisStore::new(pool, schema)?;
    store
        .ensure_schema(drop_schema)
        .await
        .context("Failed to prepare schema")?;

    let outcome = execute(Arc::new(store), config, path).await?;
    finish(&outcome, report_path)
}

/// Exécute la commande check (stockage en mémoire)
pub async fn cmd_check(path: &Path, config_spec: &str, report_path: Option<&Path>) -> Result<()> {
    let config = ImportConfig::from_spec(config_spec)?;
    let outcome = execute(Arc::new(MemoryStore::new()), config, path).await?;
    finish(&outcome, report_path)
}

/// Exécute la commande to-geojson
pub fn cmd_to_geojson(path: &Path, output: &Path, config_spec: &str) -> Result<()> {
    let config = ImportConfig::from_spec(config_spec)?;
    let cancel = cancel_signal(&config);
    let ctx = ImportContext::new(Arc::new(MemoryStore::new()), config);
    let upload = read_upload(path)?;

    let prepared = prepare_import(&ctx, Uuid::new_v4(), &upload, &cancel).map_err(fatal)?;
    export_to_geojson(&prepared.batch.plots, prepared.crs.epsg, output)?;

    info!(
        output = %output.display(),
        plots = prepared.batch.accepted_count(),
        skipped = prepared.batch.skipped_count(),
        "GeoJSON written"
    );
    Ok(())
}

async fn execute(store: Arc<dyn FeatureStore>, config: ImportConfig, path: &Path) -> Result<ImportOutcome> {
    let cancel = cancel_signal(&config);
    let ctx = ImportContext::new(store, config);
    let upload = read_upload(path)?;

    run_import(&ctx, upload, &cancel).await.map_err(fatal)
}

fn finish(outcome: &ImportOutcome, report_path: Option<&Path>) -> Result<()> {
    let report = &outcome.report;
    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    info!("{}", report.summary());
    Ok(())
}

/// Erreur fatale: un message lisible par ligne
fn fatal(err: ImportError) -> anyhow::Error {
    anyhow::anyhow!(err.messages().join("\n"))
}

fn read_upload(path: &Path) -> Result<Upload> {
    let data = std::fs::read(path).context(format!("Failed to read archive: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(file_name, data))
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: DatabaseArgs) {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_ingest::store::pool::SslMode;

    #[test]
    fn test_database_overrides() {
        let mut config = DatabaseConfig::default();
        apply_database_overrides(
            &mut config,
            DatabaseArgs {
                host: Some("db".into()),
                port: Some(6543),
                ssl: Some("require".into()),
                ..Default::default()
            },
        );
        assert_eq!(config.host, "db");
        assert_eq!(config.port, 6543);
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.dbname, "plots");
    }

    #[test]
    fn test_invalid_ssl_override_is_ignored() {
        let mut config = DatabaseConfig::default();
        apply_database_overrides(
            &mut config,
            DatabaseArgs {
                ssl: Some("sometimes".into()),
                ..Default::default()
            },
        );
        assert_eq!(config.ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_read_upload_uses_file_name() {
        let dir = std::env::temp_dir().join(format!("plot-ingest-cli-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("parcels.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let upload = read_upload(&path).unwrap();
        assert_eq!(upload.file_name, "parcels.zip");
        assert_eq!(upload.data.len(), 4);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
