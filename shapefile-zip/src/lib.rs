//! # shapefile-zip
//!
//! Lecture d'archives ZIP contenant un ESRI Shapefile (.shp, .shx, .dbf, .prj, .cpg).
//!
//! ## Features
//!
//! - Extraction en mémoire avec limites de taille (compressée et décompressée)
//! - Parsing binaire des .shp/.shx/.dbf, sans dépendance GDAL
//! - Détection de l'encodage de la table attributaire (.cpg, language driver)
//! - Lecture du WKT du .prj (EPSG, famille, unité, ordre des axes)
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shapefile_zip::{parse, ArchiveLimits, CancelSignal};
//!
//! let data = std::fs::read("plots.zip")?;
//! let result = parse(data.into(), &ArchiveLimits::default(), &CancelSignal::new())?;
//! println!("CRS: {:?}", result.crs);
//!
//! for feature in result.features {
//!     let feature = feature?;
//!     println!("{}: {:?}", feature.record_index, feature.attributes);
//! }
//! ```

pub mod archive;
pub mod cancel;
pub mod decoder;
pub mod error;
/// Générateurs d'archives en mémoire pour les tests et benchmarks
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod parser;
pub mod rings;
pub mod types;

pub use archive::{check_upload, read_archive, ArchiveContents, ArchiveLimits};
pub use cancel::CancelSignal;
pub use decoder::{FeatureDecoder, FeatureStream, ShapefileDecoder};
pub use error::ShapefileError;
pub use types::{
    AttributeValue, Attributes, AxisOrder, Crs, CrsKind, EntryRole, RawArchiveEntry, RawFeature,
    ShapeType,
};

use bytes::Bytes;

/// Résultat de la lecture d'une archive
pub struct ParseResult {
    /// Fichiers extraits et composants retenus
    pub contents: ArchiveContents,

    /// Système de coordonnées (WGS84 si aucun .prj)
    pub crs: Crs,

    /// Enregistrements, décodés à la demande
    pub features: FeatureStream,
}

impl ParseResult {
    /// Checksum blake3 de l'archive
    pub fn checksum(&self) -> &str {
        &self.contents.checksum
    }
}

/// Lit une archive shapefile avec le décodeur par défaut
///
/// # Errors
///
/// Retourne `ShapefileError` si l'archive est illisible, incomplète, ou si
/// géométries et attributs ne correspondent pas.
pub fn parse(
    data: Bytes,
    limits: &ArchiveLimits,
    cancel: &CancelSignal,
) -> Result<ParseResult, ShapefileError> {
    parse_with(&ShapefileDecoder, data, limits, cancel)
}

/// Lit une archive avec un décodeur donné
pub fn parse_with(
    decoder: &dyn FeatureDecoder,
    data: Bytes,
    limits: &ArchiveLimits,
    cancel: &CancelSignal,
) -> Result<ParseResult, ShapefileError> {
    let contents = read_archive(data, limits, cancel)?;
    let crs = decoder.crs(&contents);
    let features = decoder.decode(&contents, cancel)?;

    Ok(ParseResult {
        contents,
        crs,
        features,
    })
}
