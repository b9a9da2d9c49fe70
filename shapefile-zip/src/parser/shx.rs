//! Parser pour les fichiers SHX (index des enregistrements)

use crate::parser::shp::{self, HEADER_LEN};
use crate::ShapefileError;

/// Entrée d'index: position et longueur d'un enregistrement du .shp, en octets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: usize,
    pub length: usize,
}

/// Parse un fichier .shx complet
pub fn parse(data: &[u8]) -> Result<Vec<IndexEntry>, ShapefileError> {
    shp::parse_header(data, ".shx")?;

    let body = &data[HEADER_LEN..];
    if body.len() % 8 != 0 {
        return Err(ShapefileError::parse_error(
            ".shx",
            format!("index body length {} is not a multiple of 8", body.len()),
        ));
    }

    let entries = body
        .chunks_exact(8)
        .map(|chunk| {
            let offset = shp::be_i32(chunk, 0).unwrap_or_default().max(0) as usize * 2;
            let length = shp::be_i32(chunk, 4).unwrap_or_default().max(0) as usize * 2;
            IndexEntry { offset, length }
        })
        .collect();

    Ok(entries)
}

/// Nombre d'enregistrements déclarés par l'index
pub fn record_count(data: &[u8]) -> Result<usize, ShapefileError> {
    parse(data).map(|entries| entries.len())
}
