//! Règles de validation des parcelles normalisées

use std::fmt;

use geo::Geometry;
use rayon::prelude::*;
use serde::{Serialize, Serializer};

use crate::config::ImportLimits;
use crate::geometry::GeometryMath;
use crate::plot::CanonicalPlot;

/// Motif de rejet d'une parcelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Enregistrement illisible au décodage
    MalformedGeometry(String),
    /// Pas un polygone simple (multi-polygone, point, ligne)
    InvalidGeometryType,
    SelfIntersection,
    InvalidPolygon,
    AreaTooSmall,
    AreaTooLarge,
    DuplicatePlotCode,
    DuplicateGeometry,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedGeometry(detail) => write!(f, "MalformedGeometry: {}", detail),
            Self::InvalidGeometryType => f.write_str("InvalidGeometryType"),
            Self::SelfIntersection => f.write_str("SelfIntersection"),
            Self::InvalidPolygon => f.write_str("InvalidPolygon"),
            Self::AreaTooSmall => f.write_str("AreaTooSmall"),
            Self::AreaTooLarge => f.write_str("AreaTooLarge"),
            Self::DuplicatePlotCode => f.write_str("DuplicatePlotCode"),
            Self::DuplicateGeometry => f.write_str("DuplicateGeometry"),
        }
    }
}

impl Serialize for RejectionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Résultat de l'évaluation d'une parcelle
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub accepted: bool,

    /// Toutes les règles en échec, dans l'ordre d'évaluation
    pub reasons: Vec<RejectionReason>,
}

impl ValidationOutcome {
    fn from_reasons(reasons: Vec<RejectionReason>) -> Self {
        Self {
            accepted: reasons.is_empty(),
            reasons,
        }
    }
}

/// Validateur géométrique et surfacique
pub struct Validator<'a> {
    math: &'a dyn GeometryMath,
    min_area_m2: f64,
    max_area_m2: f64,
}

impl<'a> Validator<'a> {
    pub fn new(math: &'a dyn GeometryMath, limits: &ImportLimits) -> Self {
        Self {
            math,
            min_area_m2: limits.min_area_m2,
            max_area_m2: limits.max_area_m2,
        }
    }

    /// Évalue toutes les règles, sans s'arrêter à la première en échec
    pub fn evaluate(&self, plot: &CanonicalPlot) -> ValidationOutcome {
        let mut reasons = Vec::new();

        match &plot.geometry {
            Geometry::Polygon(polygon) => {
                if !self.math.is_simple(polygon) {
                    reasons.push(RejectionReason::SelfIntersection);
                }
                if !self.math.is_valid(polygon) {
                    reasons.push(RejectionReason::InvalidPolygon);
                }
            }
            _ => reasons.push(RejectionReason::InvalidGeometryType),
        }

        // NaN compte comme trop petit
        if plot.area_m2.is_nan() || plot.area_m2 < self.min_area_m2 {
            reasons.push(RejectionReason::AreaTooSmall);
        }
        if plot.area_m2 > self.max_area_m2 {
            reasons.push(RejectionReason::AreaTooLarge);
        }

        ValidationOutcome::from_reasons(reasons)
    }

    /// Évaluation parallèle, résultats dans l'ordre des parcelles
    pub fn evaluate_all(&self, plots: &[CanonicalPlot]) -> Vec<ValidationOutcome> {
        plots.par_iter().map(|plot| self.evaluate(plot)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarGeometryMath;
    use geo::{point, polygon, BoundingRect, MultiPolygon, Polygon};
    use shapefile_zip::Attributes;

    fn plot(geometry: Geometry, area_m2: f64) -> CanonicalPlot {
        CanonicalPlot {
            source_index: 0,
            plot_code: "P-1".into(),
            bbox: geometry.bounding_rect(),
            geometry,
            area_m2,
            land_use: None,
            owner_name: None,
            price: None,
            notes: None,
            attributes: Attributes::new(),
        }
    }

    fn square(size: f64) -> Polygon {
        polygon![(x: 0.0, y: 0.0), (x: 0.0, y: size), (x: size, y: size), (x: size, y: 0.0), (x: 0.0, y: 0.0)]
    }

    fn validator(math: &PlanarGeometryMath) -> Validator<'_> {
        Validator::new(math, &ImportLimits::default())
    }

    #[test]
    fn test_valid_polygon_is_accepted() {
        let math = PlanarGeometryMath;
        let outcome = validator(&math).evaluate(&plot(Geometry::Polygon(square(100.0)), 10_000.0));
        assert!(outcome.accepted);
        assert!(outcome.reasons.is_empty());
    }

    #[test]
    fn test_area_bounds() {
        let math = PlanarGeometryMath;
        let v = validator(&math);

        let small = v.evaluate(&plot(Geometry::Polygon(square(0.5)), 0.25));
        assert_eq!(small.reasons, vec![RejectionReason::AreaTooSmall]);

        let large = v.evaluate(&plot(Geometry::Polygon(square(5_000.0)), 25_000_000.0));
        assert_eq!(large.reasons, vec![RejectionReason::AreaTooLarge]);

        let nan = v.evaluate(&plot(Geometry::Polygon(square(10.0)), f64::NAN));
        assert_eq!(nan.reasons, vec![RejectionReason::AreaTooSmall]);

        // Bornes incluses
        assert!(v.evaluate(&plot(Geometry::Polygon(square(1.0)), 1.0)).accepted);
    }

    #[test]
    fn test_self_intersection_and_invalid_together() {
        let math = PlanarGeometryMath;
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)];
        let outcome = validator(&math).evaluate(&plot(Geometry::Polygon(bowtie), 50.0));

        assert!(!outcome.accepted);
        assert!(outcome.reasons.contains(&RejectionReason::SelfIntersection));
        assert!(outcome.reasons.contains(&RejectionReason::InvalidPolygon));
    }

    #[test]
    fn test_no_short_circuit_on_small_bowtie() {
        let math = PlanarGeometryMath;
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 0.1, y: 0.1), (x: 0.1, y: 0.0), (x: 0.0, y: 0.1), (x: 0.0, y: 0.0)];
        let outcome = validator(&math).evaluate(&plot(Geometry::Polygon(bowtie), 0.0));

        assert_eq!(
            outcome.reasons,
            vec![
                RejectionReason::SelfIntersection,
                RejectionReason::InvalidPolygon,
                RejectionReason::AreaTooSmall,
            ]
        );
    }

    #[test]
    fn test_non_polygon_types() {
        let math = PlanarGeometryMath;
        let v = validator(&math);

        let multi = MultiPolygon::new(vec![square(10.0), square(10.0)]);
        let outcome = v.evaluate(&plot(Geometry::MultiPolygon(multi), 200.0));
        assert_eq!(outcome.reasons, vec![RejectionReason::InvalidGeometryType]);

        let outcome = v.evaluate(&plot(Geometry::Point(point!(x: 1.0, y: 1.0)), 0.0));
        assert_eq!(
            outcome.reasons,
            vec![RejectionReason::InvalidGeometryType, RejectionReason::AreaTooSmall]
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let math = PlanarGeometryMath;
        let limits = ImportLimits {
            min_area_m2: 500.0,
            ..Default::default()
        };
        let v = Validator::new(&math, &limits);
        let outcome = v.evaluate(&plot(Geometry::Polygon(square(10.0)), 100.0));
        assert_eq!(outcome.reasons, vec![RejectionReason::AreaTooSmall]);
    }

    #[test]
    fn test_evaluate_all_preserves_order() {
        let math = PlanarGeometryMath;
        let plots: Vec<CanonicalPlot> = (0..200)
            .map(|i| {
                let area = if i % 3 == 0 { 0.5 } else { 100.0 };
                plot(Geometry::Polygon(square(10.0)), area)
            })
            .collect();

        let outcomes = validator(&math).evaluate_all(&plots);
        assert_eq!(outcomes.len(), 200);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.accepted, i % 3 != 0, "plot {}", i);
        }
    }

    #[test]
    fn test_reason_serialization() {
        let reasons = vec![
            RejectionReason::AreaTooSmall,
            RejectionReason::MalformedGeometry("ring 0 is not closed".into()),
        ];
        let json = serde_json::to_string(&reasons).unwrap();
        assert_eq!(json, r#"["AreaTooSmall","MalformedGeometry: ring 0 is not closed"]"#);
    }
}
