//! Types d'erreurs pour le crate shapefile-zip

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'une archive shapefile
#[derive(Debug, Error)]
pub enum ShapefileError {
    /// Erreur d'I/O lors de la lecture de l'archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive ZIP corrompue
    #[error("Invalid ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Archive plus grosse que la limite autorisée
    #[error("Archive too large: {size} bytes (limit {limit} bytes)")]
    SizeExceeded { size: u64, limit: u64 },

    /// Extension, type MIME ou signature non reconnus
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Composants obligatoires absents de l'archive (.shp, .dbf)
    #[error("Missing required component(s): {}", .0.join(", "))]
    MissingRequiredComponent(Vec<String>),

    /// Nombre d'enregistrements différent entre géométries et attributs
    #[error("Record count mismatch: {geometry} geometry records, {attributes} attribute records")]
    RecordCountMismatch { geometry: usize, attributes: usize },

    /// Enregistrement géométrique inutilisable
    #[error("Malformed geometry in record {record}: {reason}")]
    MalformedGeometry { record: usize, reason: String },

    /// Erreur de parsing d'un fichier
    #[error("Parse error in {file}: {reason}")]
    ParseError { file: String, reason: String },

    /// Traitement annulé par l'appelant
    #[error("Processing cancelled")]
    Cancelled,

    /// Échéance dépassée
    #[error("Processing deadline exceeded")]
    DeadlineExceeded,
}

impl ShapefileError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie malformée
    pub fn malformed(record: usize, reason: impl Into<String>) -> Self {
        Self::MalformedGeometry {
            record,
            reason: reason.into(),
        }
    }

    /// Messages lisibles destinés à l'utilisateur (un par problème détecté)
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::MissingRequiredComponent(missing) => missing
                .iter()
                .map(|suffix| format!("Missing required file: {}", suffix))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_component_messages() {
        let err = ShapefileError::MissingRequiredComponent(vec![".shp".into(), ".dbf".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required component(s): .shp, .dbf"
        );
        assert_eq!(
            err.messages(),
            vec!["Missing required file: .shp", "Missing required file: .dbf"]
        );
    }

    #[test]
    fn test_size_exceeded_message() {
        let err = ShapefileError::SizeExceeded {
            size: 60,
            limit: 50,
        };
        assert_eq!(err.messages().len(), 1);
        assert!(err.to_string().contains("limit 50"));
    }
}
