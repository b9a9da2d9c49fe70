//! Parser pour les fichiers SHP (géométries)
//!
//! En-tête de 100 octets (big-endian pour le code fichier et la longueur,
//! little-endian pour le reste), puis une suite d'enregistrements
//! `[numéro BE][longueur BE en mots de 16 bits][contenu LE]`.

use std::ops::Range;

use geo::Coord;

use crate::types::ShapeType;
use crate::ShapefileError;

/// Code magique des fichiers .shp et .shx
pub const FILE_CODE: i32 = 9994;

/// Version du format
pub const VERSION: i32 = 1000;

/// Taille de l'en-tête fichier
pub const HEADER_LEN: usize = 100;

/// Taille d'un en-tête d'enregistrement
const RECORD_HEADER_LEN: usize = 8;

/// En-tête d'un fichier .shp / .shx
#[derive(Debug, Clone, Copy)]
pub struct ShpHeader {
    /// Longueur totale déclarée, en octets
    pub file_length: usize,

    /// Type de forme déclaré pour tout le fichier
    pub shape_type: ShapeType,

    /// Emprise déclarée (xmin, ymin, xmax, ymax)
    pub bbox: [f64; 4],
}

/// Position d'un enregistrement dans le fichier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpan {
    /// Numéro déclaré (1-based)
    pub number: i32,

    /// Plage du contenu (sans l'en-tête d'enregistrement)
    pub content: Range<usize>,
}

/// Contenu décodé d'un enregistrement
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRecord {
    Null,
    Point(Coord),
    MultiPoint(Vec<Coord>),
    PolyLine(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
}

/// Parse l'en-tête commun aux fichiers .shp et .shx
pub fn parse_header(data: &[u8], file: &str) -> Result<ShpHeader, ShapefileError> {
    if data.len() < HEADER_LEN {
        return Err(ShapefileError::parse_error(
            file,
            format!("file too short ({} bytes)", data.len()),
        ));
    }

    let code = be_i32(data, 0).unwrap_or_default();
    if code != FILE_CODE {
        return Err(ShapefileError::parse_error(
            file,
            format!("bad file code {} (expected {})", code, FILE_CODE),
        ));
    }

    let version = le_i32(data, 28).unwrap_or_default();
    if version != VERSION {
        return Err(ShapefileError::parse_error(
            file,
            format!("unsupported version {}", version),
        ));
    }

    let length_words = be_i32(data, 24).unwrap_or_default();
    if length_words < 0 {
        return Err(ShapefileError::parse_error(file, "negative file length"));
    }

    let shape_code = le_i32(data, 32).unwrap_or_default();
    let shape_type = ShapeType::from_code(shape_code).ok_or_else(|| {
        ShapefileError::parse_error(file, format!("unknown shape type {}", shape_code))
    })?;

    let mut bbox = [0.0; 4];
    for (i, value) in bbox.iter_mut().enumerate() {
        *value = le_f64(data, 36 + i * 8).unwrap_or_default();
    }

    Ok(ShpHeader {
        file_length: length_words as usize * 2,
        shape_type,
        bbox,
    })
}

/// Parcourt les en-têtes d'enregistrements sans décoder leur contenu
///
/// Un dernier enregistrement tronqué est conservé (sa plage est coupée à la
/// fin des données) pour être signalé comme malformé au décodage.
pub fn scan_records(data: &[u8], header: &ShpHeader) -> Result<Vec<RecordSpan>, ShapefileError> {
    // La longueur déclarée peut être fausse: on se borne aux données réelles
    let end = if header.file_length >= HEADER_LEN {
        header.file_length.min(data.len())
    } else {
        data.len()
    };

    let mut spans = Vec::new();
    let mut pos = HEADER_LEN;

    while pos + RECORD_HEADER_LEN <= end {
        let number = be_i32(data, pos).unwrap_or_default();
        let length_words = be_i32(data, pos + 4).unwrap_or_default();
        if length_words < 0 {
            return Err(ShapefileError::parse_error(
                ".shp",
                format!("negative content length in record {}", spans.len() + 1),
            ));
        }

        let start = pos + RECORD_HEADER_LEN;
        let declared_end = start + length_words as usize * 2;
        let content_end = declared_end.min(data.len());

        spans.push(RecordSpan {
            number,
            content: start..content_end,
        });

        if declared_end > data.len() {
            tracing::warn!(
                record = spans.len(),
                declared = length_words * 2,
                available = content_end - start,
                "Truncated .shp record"
            );
            break;
        }

        pos = declared_end;
    }

    Ok(spans)
}

/// Décode le contenu d'un enregistrement (`record` sert aux messages d'erreur)
pub fn decode_record(content: &[u8], record: usize) -> Result<(ShapeType, ShapeRecord), ShapefileError> {
    let truncated = || ShapefileError::malformed(record, "truncated record content");

    let code = le_i32(content, 0).ok_or_else(truncated)?;
    let shape_type = ShapeType::from_code(code)
        .ok_or_else(|| ShapefileError::malformed(record, format!("unknown shape type {}", code)))?;

    let shape = match shape_type {
        ShapeType::Null => ShapeRecord::Null,
        ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => {
            ShapeRecord::Point(read_coord(content, 4).ok_or_else(truncated)?)
        }
        ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
            let num_points = read_count(content, 36, record, "points")?;
            let points = read_coords(content, 40, num_points).ok_or_else(truncated)?;
            ShapeRecord::MultiPoint(points)
        }
        ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
            ShapeRecord::PolyLine(read_parts(content, record)?)
        }
        ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => {
            ShapeRecord::Polygon(read_parts(content, record)?)
        }
        ShapeType::MultiPatch => {
            return Err(ShapefileError::malformed(
                record,
                "MultiPatch shapes are not supported",
            ))
        }
    };

    Ok((shape_type, shape))
}

/// Lit les parties (anneaux ou lignes) d'un PolyLine/Polygon
///
/// Les valeurs Z et M éventuelles suivent les points XY et sont ignorées.
fn read_parts(content: &[u8], record: usize) -> Result<Vec<Vec<Coord>>, ShapefileError> {
    let num_parts = read_count(content, 36, record, "parts")?;
    let num_points = read_count(content, 40, record, "points")?;

    if num_parts == 0 {
        return Err(ShapefileError::malformed(record, "shape has no parts"));
    }

    let parts_start = 44;
    let points_start = parts_start + num_parts * 4;
    let mut starts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        let start = le_i32(content, parts_start + i * 4)
            .ok_or_else(|| ShapefileError::malformed(record, "truncated part index"))?;
        if start < 0 || start as usize >= num_points.max(1) {
            return Err(ShapefileError::malformed(
                record,
                format!("part {} starts at invalid point index {}", i, start),
            ));
        }
        starts.push(start as usize);
    }

    if starts.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ShapefileError::malformed(record, "part indices are not increasing"));
    }

    let points = read_coords(content, points_start, num_points)
        .ok_or_else(|| ShapefileError::malformed(record, "truncated point array"))?;

    let parts = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(num_points);
            points[start..end].to_vec()
        })
        .collect();

    Ok(parts)
}

/// Lit un compteur positif en vérifiant qu'il tient dans le contenu
fn read_count(content: &[u8], offset: usize, record: usize, what: &str) -> Result<usize, ShapefileError> {
    let value = le_i32(content, offset)
        .ok_or_else(|| ShapefileError::malformed(record, format!("missing {} count", what)))?;
    // Un point occupe 16 octets: un compteur plus grand que le contenu est forcément faux
    if value < 0 || value as usize > content.len() / 4 {
        return Err(ShapefileError::malformed(
            record,
            format!("invalid {} count {}", what, value),
        ));
    }
    Ok(value as usize)
}

fn read_coords(content: &[u8], offset: usize, count: usize) -> Option<Vec<Coord>> {
    let end = offset.checked_add(count.checked_mul(16)?)?;
    if end > content.len() {
        return None;
    }
    (0..count).map(|i| read_coord(content, offset + i * 16)).collect()
}

#[inline]
fn read_coord(content: &[u8], offset: usize) -> Option<Coord> {
    Some(Coord {
        x: le_f64(content, offset)?,
        y: le_f64(content, offset + 8)?,
    })
}

#[inline]
pub(crate) fn be_i32(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(i32::from_be_bytes(bytes.try_into().ok()?))
}

#[inline]
pub(crate) fn le_i32(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(i32::from_le_bytes(bytes.try_into().ok()?))
}

#[inline]
fn le_f64(data: &[u8], offset: usize) -> Option<f64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(f64::from_le_bytes(bytes.try_into().ok()?))
}
