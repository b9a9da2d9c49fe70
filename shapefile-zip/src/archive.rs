//! Extraction des archives shapefile (.zip)

use std::io::{Cursor, Read};

use bytes::Bytes;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::cancel::CancelSignal;
use crate::types::{EntryRole, RawArchiveEntry};
use crate::ShapefileError;

/// Taille maximale d'une archive téléversée (50 Mo)
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;

/// Taille maximale cumulée des fichiers décompressés
pub const DEFAULT_MAX_UNCOMPRESSED_BYTES: u64 = 512 * 1024 * 1024;

/// Types MIME acceptés pour un téléversement
const ZIP_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-zip",
    "multipart/x-zip",
];

/// Signatures ZIP: en-tête local, archive vide, archive multi-volumes
const ZIP_SIGNATURES: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

/// Limites appliquées à la lecture d'une archive
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_archive_bytes: u64,
    pub max_uncompressed_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_uncompressed_bytes: DEFAULT_MAX_UNCOMPRESSED_BYTES,
        }
    }
}

/// Contenu extrait d'une archive shapefile
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    /// Fichier .shp retenu
    pub geometry: RawArchiveEntry,

    /// Fichier .dbf associé
    pub attributes: RawArchiveEntry,

    /// Fichier .shx associé (optionnel)
    pub index: Option<RawArchiveEntry>,

    /// Fichier .prj associé (optionnel)
    pub projection: Option<RawArchiveEntry>,

    /// Fichier .cpg associé (optionnel)
    pub encoding: Option<RawArchiveEntry>,

    /// Tous les fichiers de l'archive, dans l'ordre de l'archive
    pub entries: Vec<RawArchiveEntry>,

    /// Checksum blake3 (hex) de l'archive téléversée
    pub checksum: String,
}

impl ArchiveContents {
    /// Sans .prj, les géométries sont supposées en WGS84 géographique
    pub fn has_projection(&self) -> bool {
        self.projection.is_some()
    }
}

/// Vérifie une archive téléversée avant toute décompression
///
/// # Errors
///
/// `SizeExceeded` si l'archive dépasse la limite, `UnsupportedFormat` si
/// l'extension, le type MIME ou la signature ne correspondent pas à un ZIP.
pub fn check_upload(
    file_name: &str,
    content_type: Option<&str>,
    data: &[u8],
    limits: &ArchiveLimits,
) -> Result<(), ShapefileError> {
    let size = data.len() as u64;
    if size > limits.max_archive_bytes {
        return Err(ShapefileError::SizeExceeded {
            size,
            limit: limits.max_archive_bytes,
        });
    }

    if !file_name.to_ascii_lowercase().ends_with(".zip") {
        return Err(ShapefileError::UnsupportedFormat(format!(
            "expected a .zip file, got '{}'",
            file_name
        )));
    }

    if let Some(mime) = content_type {
        // Ignorer les paramètres éventuels (ex: "; charset=binary")
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if !ZIP_MIME_TYPES.contains(&essence.as_str()) {
            return Err(ShapefileError::UnsupportedFormat(format!(
                "unsupported content type '{}'",
                mime
            )));
        }
    }

    if !ZIP_SIGNATURES.iter().any(|sig| data.starts_with(sig)) {
        return Err(ShapefileError::UnsupportedFormat(
            "missing ZIP signature".to_string(),
        ));
    }

    Ok(())
}

/// Extrait une archive ZIP en mémoire et localise les composants du shapefile
///
/// # Arguments
///
/// * `data` - Contenu brut de l'archive
/// * `limits` - Limites de taille (compressée et décompressée)
/// * `cancel` - Signal vérifié entre deux fichiers
///
/// # Errors
///
/// `MissingRequiredComponent` si aucun .shp ou aucun .dbf n'est présent.
pub fn read_archive(
    data: Bytes,
    limits: &ArchiveLimits,
    cancel: &CancelSignal,
) -> Result<ArchiveContents, ShapefileError> {
    let size = data.len() as u64;
    if size > limits.max_archive_bytes {
        return Err(ShapefileError::SizeExceeded {
            size,
            limit: limits.max_archive_bytes,
        });
    }

    let checksum = blake3::hash(&data).to_hex().to_string();
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut total_uncompressed: u64 = 0;

    for i in 0..archive.len() {
        cancel.check()?;

        let file = archive.by_index(i)?;
        let name = file.name().to_string();

        // Ignorer les répertoires et les resource forks macOS
        if file.is_dir() || name.starts_with("__MACOSX/") || is_apple_double(&name) {
            continue;
        }

        // Lecture bornée: la taille déclarée dans le ZIP n'est pas fiable
        let remaining = limits.max_uncompressed_bytes - total_uncompressed;
        let mut content = Vec::new();
        file.take(remaining.saturating_add(1)).read_to_end(&mut content)?;
        total_uncompressed += content.len() as u64;

        if total_uncompressed > limits.max_uncompressed_bytes {
            return Err(ShapefileError::SizeExceeded {
                size: total_uncompressed,
                limit: limits.max_uncompressed_bytes,
            });
        }

        let entry = RawArchiveEntry::new(name, content);
        debug!(name = %entry.name, role = ?entry.role, bytes = entry.content.len(), "Archive entry");
        entries.push(entry);
    }

    locate_components(entries, checksum)
}

/// Sélectionne le .shp et les fichiers qui l'accompagnent
fn locate_components(
    entries: Vec<RawArchiveEntry>,
    checksum: String,
) -> Result<ArchiveContents, ShapefileError> {
    let geometry = entries.iter().find(|e| e.role == EntryRole::Geometry).cloned();
    let has_attributes = entries.iter().any(|e| e.role == EntryRole::Attributes);

    let mut missing = Vec::new();
    if geometry.is_none() {
        missing.push(EntryRole::Geometry.suffix().to_string());
    }
    if !has_attributes {
        missing.push(EntryRole::Attributes.suffix().to_string());
    }

    let Some(geometry) = geometry else {
        return Err(ShapefileError::MissingRequiredComponent(missing));
    };
    if !missing.is_empty() {
        return Err(ShapefileError::MissingRequiredComponent(missing));
    }

    let stem = geometry.stem();
    let attributes = companion(&entries, EntryRole::Attributes, &stem)
        .ok_or_else(|| ShapefileError::MissingRequiredComponent(vec![".dbf".into()]))?;
    let index = companion(&entries, EntryRole::Index, &stem);
    let projection = companion(&entries, EntryRole::Projection, &stem);
    let encoding = companion(&entries, EntryRole::Encoding, &stem);

    Ok(ArchiveContents {
        geometry,
        attributes,
        index,
        projection,
        encoding,
        entries,
        checksum,
    })
}

/// Fichier de même nom que le .shp
///
/// Un fichier du même rôle portant un autre nom appartient à un autre jeu de
/// données et n'est jamais retenu.
fn companion(entries: &[RawArchiveEntry], role: EntryRole, stem: &str) -> Option<RawArchiveEntry> {
    let found = entries
        .iter()
        .filter(|e| e.role == role)
        .find(|e| e.stem() == stem)
        .cloned();

    if found.is_none() {
        if let Some(other) = entries.iter().find(|e| e.role == role) {
            warn!(
                name = %other.name,
                expected = %format!("{}{}", stem, role.suffix()),
                "Ignoring file from another dataset"
            );
        }
    }
    found
}

/// Resource fork AppleDouble (`._plots.shp`), à la racine ou dans un dossier
fn is_apple_double(name: &str) -> bool {
    name.rsplit('/').next().map_or(false, |base| base.starts_with("._"))
}
