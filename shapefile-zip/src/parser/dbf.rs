//! Parser pour les fichiers DBF (table attributaire dBASE III)

use bytes::Bytes;
use encoding_rs::Encoding;

use crate::parser::cpg;
use crate::types::{AttributeValue, Attributes};
use crate::ShapefileError;

/// Taille de l'en-tête fixe et d'un descripteur de champ
const BLOCK_LEN: usize = 32;

/// Fin des descripteurs de champs
const FIELD_TERMINATOR: u8 = 0x0D;

/// Marqueur d'enregistrement supprimé
const DELETED_FLAG: u8 = b'*';

/// Descripteur d'un champ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    /// Type dBASE (C, N, F, L, D, I, O, M, ...)
    pub kind: char,
    pub length: usize,
    pub decimals: u8,
    /// Position dans l'enregistrement (après l'octet de suppression)
    offset: usize,
}

/// Table DBF prête à être lue enregistrement par enregistrement
#[derive(Debug, Clone)]
pub struct DbfTable {
    data: Bytes,
    pub fields: Vec<DbfField>,
    pub record_count: usize,
    header_len: usize,
    record_len: usize,
    encoding: Option<&'static Encoding>,
}

impl DbfTable {
    /// Parse l'en-tête et les descripteurs de champs
    ///
    /// `encoding` provient du .cpg; à défaut on utilise l'octet "language
    /// driver" de l'en-tête, puis UTF-8 avec repli Windows-1252.
    pub fn parse(data: Bytes, encoding: Option<&'static Encoding>) -> Result<Self, ShapefileError> {
        if data.len() < BLOCK_LEN + 1 {
            return Err(ShapefileError::parse_error(
                ".dbf",
                format!("file too short ({} bytes)", data.len()),
            ));
        }

        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;
        let ldid = data[29];

        if header_len < BLOCK_LEN + 1 || header_len > data.len() {
            return Err(ShapefileError::parse_error(
                ".dbf",
                format!("invalid header length {}", header_len),
            ));
        }

        let fields = parse_fields(&data[BLOCK_LEN..header_len])?;

        let fields_len: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
        if record_len < fields_len {
            return Err(ShapefileError::parse_error(
                ".dbf",
                format!("record length {} shorter than fields ({})", record_len, fields_len),
            ));
        }

        let available = (data.len() - header_len) / record_len.max(1);
        if available < record_count {
            return Err(ShapefileError::parse_error(
                ".dbf",
                format!(
                    "table declares {} records but only {} are present",
                    record_count, available
                ),
            ));
        }

        let encoding = encoding.or_else(|| cpg::from_language_driver(ldid));

        Ok(Self {
            data,
            fields,
            record_count,
            header_len,
            record_len,
            encoding,
        })
    }

    /// Lit l'enregistrement `index` (0-based)
    ///
    /// Les enregistrements marqués supprimés sont lus comme les autres: la
    /// jointure avec le .shp est positionnelle.
    pub fn record(&self, index: usize) -> Result<Attributes, ShapefileError> {
        if index >= self.record_count {
            return Err(ShapefileError::parse_error(
                ".dbf",
                format!("record {} out of range ({} records)", index, self.record_count),
            ));
        }

        let start = self.header_len + index * self.record_len;
        let row = &self.data[start..start + self.record_len];

        if row[0] == DELETED_FLAG {
            tracing::debug!(record = index, "Deleted flag set on .dbf record");
        }

        let attributes = self
            .fields
            .iter()
            .map(|field| {
                let raw = &row[1 + field.offset..1 + field.offset + field.length];
                (field.name.clone(), self.decode_value(field, raw))
            })
            .collect();

        Ok(attributes)
    }

    /// Encodage retenu pour les champs texte
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.encoding
    }

    fn decode_value(&self, field: &DbfField, raw: &[u8]) -> AttributeValue {
        match field.kind {
            'C' => {
                let text = decode_text(raw, self.encoding);
                let text = text.trim_end_matches([' ', '\0']);
                if text.trim().is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::Text(text.to_string())
                }
            }
            'N' | 'F' => parse_numeric(raw),
            'L' => match raw.first().copied().unwrap_or(b'?') {
                b'T' | b't' | b'Y' | b'y' => AttributeValue::Boolean(true),
                b'F' | b'f' | b'N' | b'n' => AttributeValue::Boolean(false),
                _ => AttributeValue::Null,
            },
            'D' => parse_date(raw),
            'I' if raw.len() == 4 => {
                AttributeValue::Number(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
            }
            'O' if raw.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(raw);
                AttributeValue::Number(f64::from_le_bytes(bytes))
            }
            _ => {
                let text = decode_text(raw, self.encoding);
                let text = text.trim();
                if text.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::Text(text.to_string())
                }
            }
        }
    }
}

/// Parse les descripteurs de champs jusqu'au terminateur 0x0D
fn parse_fields(block: &[u8]) -> Result<Vec<DbfField>, ShapefileError> {
    let mut fields = Vec::new();
    let mut offset = 0;

    for descriptor in block.chunks(BLOCK_LEN) {
        if descriptor[0] == FIELD_TERMINATOR {
            return Ok(fields);
        }
        if descriptor.len() < BLOCK_LEN {
            break;
        }

        let name_end = memchr::memchr(0, &descriptor[..11]).unwrap_or(11);
        let name = String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string();
        let kind = (descriptor[11] as char).to_ascii_uppercase();
        let length = descriptor[16] as usize;
        let decimals = descriptor[17];

        fields.push(DbfField {
            name,
            kind,
            length,
            decimals,
            offset,
        });
        offset += length;
    }

    Err(ShapefileError::parse_error(
        ".dbf",
        "missing field descriptor terminator",
    ))
}

/// Décode un champ texte
fn decode_text(raw: &[u8], encoding: Option<&'static Encoding>) -> String {
    match encoding {
        Some(encoding) => encoding.decode_without_bom_handling(raw).0.into_owned(),
        None => match simdutf8::basic::from_utf8(raw) {
            Ok(text) => text.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(raw)
                .0
                .into_owned(),
        },
    }
}

/// Parse un champ numérique (N/F), texte ASCII justifié à droite
fn parse_numeric(raw: &[u8]) -> AttributeValue {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim().trim_matches('\0');
    // Champ vide ou débordement (rempli d'astérisques)
    if text.is_empty() || text.chars().all(|c| c == '*') {
        return AttributeValue::Null;
    }
    let cleaned = text.trim_start_matches('+');
    match fast_float::parse::<f64, _>(cleaned) {
        Ok(value) if value.is_finite() => AttributeValue::Number(value),
        _ => AttributeValue::Text(text.to_string()),
    }
}

/// Parse une date YYYYMMDD vers YYYY-MM-DD
fn parse_date(raw: &[u8]) -> AttributeValue {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim().trim_matches('\0');
    if text.is_empty() || text.chars().all(|c| c == '0') {
        return AttributeValue::Null;
    }
    if text.len() == 8 && text.chars().all(|c| c.is_ascii_digit()) {
        AttributeValue::Date(format!("{}-{}-{}", &text[..4], &text[4..6], &text[6..8]))
    } else {
        AttributeValue::Text(text.to_string())
    }
}
