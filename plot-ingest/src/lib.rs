//! # plot-ingest
//!
//! Validation de parcelles foncières livrées en shapefile zippé et insertion
//! groupée dans PostGIS.
//!
//! ## Features
//!
//! - Normalisation des champs (table d'alias déclarative, codes générés)
//! - Surface recalculée (géodésique ou plane) et validité topologique
//! - Rejets motivés, sans court-circuit, dans l'ordre de l'archive
//! - Dédoublonnage par code et par géométrie
//! - Stockage PostGIS (savepoint par ligne) ou en mémoire
//! - Rapport JSON et export GeoJSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import vers PostGIS
//! plot-ingest import --path ./plots.zip --schema market
//!
//! # Essai à blanc
//! plot-ingest check --path ./plots.zip --report report.json
//!
//! # Export GeoJSON (sans base de données)
//! plot-ingest to-geojson --path ./plots.zip --output plots.geojson
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod dedup;
pub mod error;
pub mod export;
pub mod geometry;
pub mod normalize;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod store;
pub mod validate;

pub use batch::{ImportBatch, SkipReason};
pub use config::ImportConfig;
pub use context::ImportContext;
pub use error::{ImportError, StoreError};
pub use geometry::{GeometryMath, PlanarGeometryMath};
pub use pipeline::{run_import, ImportOutcome, Upload};
pub use plot::CanonicalPlot;
pub use report::{ImportReport, ImportStatus};
pub use store::{FeatureStore, MemoryStore, PostgisStore};
pub use validate::{RejectionReason, ValidationOutcome};
