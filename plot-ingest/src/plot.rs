//! Représentation canonique d'une parcelle

use geo::{Geometry, Rect};
use serde::Serialize;
use shapefile_zip::Attributes;

/// Parcelle normalisée, indépendante des particularités du fichier source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPlot {
    /// Position de l'enregistrement dans l'archive
    #[serde(skip)]
    pub source_index: usize,

    pub plot_code: String,

    /// Géométrie en x = longitude / est
    #[serde(skip)]
    pub geometry: Geometry,

    /// Surface recalculée (m²)
    pub area_m2: f64,

    /// Emprise (xmin, ymin, xmax, ymax)
    #[serde(serialize_with = "serialize_bbox")]
    pub bbox: Option<Rect>,

    pub land_use: Option<String>,
    pub owner_name: Option<String>,
    pub price: Option<f64>,
    pub notes: Option<String>,

    /// Attributs d'origine, inchangés
    pub attributes: Attributes,
}

impl CanonicalPlot {
    /// Emprise sous forme de tableau
    pub fn bbox_array(&self) -> Option<[f64; 4]> {
        self.bbox
            .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
    }
}

fn serialize_bbox<S: serde::Serializer>(bbox: &Option<Rect>, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::Serialize as _;
    bbox.map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
        .serialize(serializer)
}
