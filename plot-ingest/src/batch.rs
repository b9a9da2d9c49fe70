//! Lot d'import: parcelles acceptées et rejets, dans l'ordre de l'archive

use serde::Serialize;
use uuid::Uuid;

use crate::plot::CanonicalPlot;
use crate::validate::RejectionReason;

/// Parcelle écartée et ses motifs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipReason {
    #[serde(skip)]
    pub source_index: usize,

    pub plot_code: String,
    pub reasons: Vec<RejectionReason>,
}

/// Unité atomique d'un import
#[derive(Debug, Clone)]
pub struct ImportBatch {
    /// Identifiant attribué avant le décodage
    pub id: Uuid,

    /// Parcelles acceptées, ordre de décodage
    pub plots: Vec<CanonicalPlot>,

    /// Rejets (décodage et validation), ordre de décodage
    pub rejections: Vec<SkipReason>,
}

impl ImportBatch {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            plots: Vec::new(),
            rejections: Vec::new(),
        }
    }

    pub fn accept(&mut self, plot: CanonicalPlot) {
        self.plots.push(plot);
    }

    pub fn reject(&mut self, source_index: usize, plot_code: String, reasons: Vec<RejectionReason>) {
        self.rejections.push(SkipReason {
            source_index,
            plot_code,
            reasons,
        });
    }

    /// Remet les rejets dans l'ordre des enregistrements source
    pub fn sort_rejections(&mut self) {
        self.rejections.sort_by_key(|skip| skip.source_index);
    }

    pub fn accepted_count(&self) -> usize {
        self.plots.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.rejections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_sorted_by_source() {
        let mut batch = ImportBatch::new(Uuid::new_v4());
        batch.reject(4, "D".into(), vec![RejectionReason::AreaTooSmall]);
        batch.reject(1, "B".into(), vec![RejectionReason::MalformedGeometry("null shape".into())]);
        batch.reject(2, "C".into(), vec![RejectionReason::SelfIntersection]);
        batch.sort_rejections();

        let codes: Vec<&str> = batch.rejections.iter().map(|s| s.plot_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "C", "D"]);
        assert_eq!(batch.skipped_count(), 3);
        assert_eq!(batch.accepted_count(), 0);
    }

    #[test]
    fn test_skip_reason_json() {
        let skip = SkipReason {
            source_index: 7,
            plot_code: "NRB-9".into(),
            reasons: vec![RejectionReason::SelfIntersection, RejectionReason::InvalidPolygon],
        };
        let json = serde_json::to_value(&skip).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"plotCode": "NRB-9", "reasons": ["SelfIntersection", "InvalidPolygon"]})
        );
    }
}
