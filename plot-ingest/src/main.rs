//! Point d'entrée CLI pour plot-ingest

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::Commands;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Valider des parcelles en shapefile zippé et les importer dans PostGIS
#[derive(Parser)]
#[command(name = "plot-ingest")]
#[command(author, version)]
#[command(about = "Valider un shapefile zippé de parcelles et l'importer dans PostGIS")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Import {
            path,
            schema,
            config,
            drop_schema,
            report,
            db,
        } => {
            info!(path = %path.display(), schema = %schema, "Import vers PostGIS");
            cli::cmd_import(&path, &schema, &config, drop_schema, report.as_deref(), db).await?;
        }
        Commands::Check {
            path,
            config,
            report,
        } => {
            info!(path = %path.display(), "Vérification à blanc");
            cli::cmd_check(&path, &config, report.as_deref()).await?;
        }
        Commands::ToGeojson {
            path,
            output,
            config,
        } => {
            info!(path = %path.display(), output = %output.display(), "Export vers GeoJSON");
            cli::cmd_to_geojson(&path, &output, &config)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
