//! Stockage des parcelles importées
//!
//! Le pipeline ne connaît que le trait [`FeatureStore`]; l'implémentation
//! concrète (mémoire pour les essais à blanc, PostGIS en production) est
//! injectée par l'appelant.

pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dedup::geometry_hash_hex;
use crate::error::StoreError;
use crate::plot::CanonicalPlot;
use crate::report::ImportStatus;

pub use memory::MemoryStore;
pub use postgres::PostgisStore;

/// SRID retenu quand le .prj ne déclare pas de code EPSG
pub const DEFAULT_SRID: u32 = 4326;

/// Métadonnées d'un import, enregistrées avant toute insertion
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub id: Uuid,
    pub file_name: String,
    pub archive_checksum: String,
    pub crs_epsg: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// Parcelle sous sa forme transmise au stockage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotRecord {
    pub plot_code: String,

    /// Géométrie GeoJSON (anneaux imbriqués)
    pub geometry: geojson::Geometry,

    pub srid: u32,
    pub area_m2: f64,
    pub land_use: Option<String>,
    pub owner_name: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,

    /// Attributs d'origine (objet JSON)
    pub attributes: serde_json::Value,

    pub geometry_hash: String,
}

impl PlotRecord {
    pub fn from_plot(plot: &CanonicalPlot, srid: u32) -> Result<Self, StoreError> {
        Ok(Self {
            plot_code: plot.plot_code.clone(),
            geometry: geojson::Geometry::new(geojson::Value::from(&plot.geometry)),
            srid,
            area_m2: plot.area_m2,
            land_use: plot.land_use.clone(),
            owner_name: plot.owner_name.clone(),
            price: plot.price,
            notes: plot.notes.clone(),
            attributes: serde_json::to_value(&plot.attributes)?,
            geometry_hash: geometry_hash_hex(&plot.geometry),
        })
    }
}

/// Parcelle relue depuis le stockage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlot {
    pub id: Uuid,
    pub import_id: Uuid,
    pub record: PlotRecord,
}

/// Résultat d'une insertion groupée
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub inserted: usize,

    /// Identifiants des lignes insérées, dans l'ordre du lot
    pub ids: Vec<Uuid>,

    /// Erreurs par ligne
    pub errors: Vec<String>,
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Ouvre l'import (statut `processing`)
    async fn begin_import(&self, import: &ImportRecord) -> Result<(), StoreError>;

    /// Insère le lot; une ligne refusée n'interrompt pas les suivantes
    async fn insert_plots(
        &self,
        import_id: Uuid,
        plots: &[PlotRecord],
    ) -> Result<InsertOutcome, StoreError>;

    /// Statut terminal de l'import
    async fn finalize_import(
        &self,
        import_id: Uuid,
        status: ImportStatus,
        imported_count: usize,
        message: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn get_plot(&self, id: Uuid) -> Result<Option<StoredPlot>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, BoundingRect, Geometry};
    use shapefile_zip::{AttributeValue, Attributes};

    #[test]
    fn test_plot_record_serialization() {
        let geometry = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 0.0)
        ]);
        let mut attributes = Attributes::new();
        attributes.insert("PLOT_CODE".into(), AttributeValue::Text("NRB-1".into()));
        attributes.insert("PRICE".into(), AttributeValue::Number(500.0));

        let plot = CanonicalPlot {
            source_index: 0,
            plot_code: "NRB-1".into(),
            bbox: geometry.bounding_rect(),
            geometry,
            area_m2: 100.0,
            land_use: Some("residential".into()),
            owner_name: None,
            price: Some(500.0),
            notes: None,
            attributes,
        };

        let record = PlotRecord::from_plot(&plot, 32736).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["plotCode"], "NRB-1");
        assert_eq!(json["geometry"]["type"], "Polygon");
        assert_eq!(json["geometry"]["coordinates"][0][1], serde_json::json!([0.0, 10.0]));
        assert_eq!(json["areaM2"], 100.0);
        assert_eq!(json["landUse"], "residential");
        assert_eq!(json["ownerName"], serde_json::Value::Null);
        assert_eq!(json["attributes"], serde_json::json!({"PLOT_CODE": "NRB-1", "PRICE": 500.0}));
        assert_eq!(record.geometry_hash.len(), 64);
        assert_eq!(record.srid, 32736);
    }
}
