//! Types d'erreurs de l'import

use shapefile_zip::ShapefileError;
use thiserror::Error;

/// Erreurs du stockage des parcelles
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connexion impossible ou pool épuisé
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Requête rejetée par le stockage
    #[error("Store query error: {0}")]
    Query(String),

    /// Import inconnu du stockage
    #[error("Unknown import {0}")]
    UnknownImport(uuid::Uuid),

    /// Géométrie non convertible pour le stockage
    #[error("Geometry conversion error: {0}")]
    Geometry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Erreur fatale d'un import: aucun rapport n'est produit
#[derive(Debug, Error)]
pub enum ImportError {
    /// Archive refusée ou illisible
    #[error(transparent)]
    Archive(#[from] ShapefileError),

    /// Stockage indisponible avant toute insertion
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Messages lisibles destinés à l'appelant
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Archive(e) => e.messages(),
            Self::Store(e) => vec![e.to_string()],
        }
    }
}
