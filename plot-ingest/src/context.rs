//! Collaborateurs injectés dans le pipeline

use std::sync::Arc;

use shapefile_zip::{FeatureDecoder, ShapefileDecoder};

use crate::config::ImportConfig;
use crate::geometry::{GeometryMath, PlanarGeometryMath};
use crate::store::FeatureStore;

/// Contexte d'un import: stockage, calcul géométrique, décodeur et configuration
///
/// Partageable entre imports concurrents (tout est derrière `Arc`).
#[derive(Clone)]
pub struct ImportContext {
    pub store: Arc<dyn FeatureStore>,
    pub math: Arc<dyn GeometryMath>,
    pub decoder: Arc<dyn FeatureDecoder>,
    pub config: Arc<ImportConfig>,
}

impl ImportContext {
    /// Contexte avec le décodeur shapefile et le calcul `geo` par défaut
    pub fn new(store: Arc<dyn FeatureStore>, config: ImportConfig) -> Self {
        Self {
            store,
            math: Arc::new(PlanarGeometryMath),
            decoder: Arc::new(ShapefileDecoder),
            config: Arc::new(config),
        }
    }

    pub fn with_math(mut self, math: Arc<dyn GeometryMath>) -> Self {
        self.math = math;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn FeatureDecoder>) -> Self {
        self.decoder = decoder;
        self
    }
}
