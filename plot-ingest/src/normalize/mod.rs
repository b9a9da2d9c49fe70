//! Normalisation des enregistrements décodés en parcelles canoniques

pub mod fields;
pub mod plot_code;

use geo::{BoundingRect, Coord, Geometry, MapCoords, MultiPolygon, Polygon};
use shapefile_zip::{AxisOrder, Crs, RawFeature};
use tracing::debug;

use crate::config::ImportConfig;
use crate::geometry::GeometryMath;
use crate::plot::CanonicalPlot;
use plot_code::PlotCodeGenerator;

/// Résultat de la normalisation d'un enregistrement
#[derive(Debug)]
pub enum Normalized {
    Plot(CanonicalPlot),

    /// Enregistrement inutilisable dès le décodage
    Defect {
        source_index: usize,
        plot_code: String,
        detail: String,
    },
}

/// Normaliseur d'un import: l'ordre des axes et le générateur de codes sont
/// communs à tous les enregistrements
pub struct Normalizer<'a> {
    config: &'a ImportConfig,
    math: &'a dyn GeometryMath,
    crs: &'a Crs,
    codes: PlotCodeGenerator,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ImportConfig, math: &'a dyn GeometryMath, crs: &'a Crs) -> Self {
        Self {
            config,
            math,
            crs,
            codes: PlotCodeGenerator::new(&config.code_prefix),
        }
    }

    pub fn normalize(&mut self, feature: RawFeature) -> Normalized {
        let plot_code = self.plot_code(&feature);

        let geometry = match (feature.geometry, feature.defect) {
            (Some(geometry), None) => geometry,
            (_, defect) => {
                return Normalized::Defect {
                    source_index: feature.record_index,
                    plot_code,
                    detail: defect.unwrap_or_else(|| "missing geometry".to_string()),
                }
            }
        };

        let geometry = self.prepare_geometry(geometry);
        let area_m2 = self.math.area_m2(&geometry, self.crs);
        let bbox = geometry.bounding_rect();

        let aliases = &self.config.aliases;
        let attributes = feature.attributes;

        Normalized::Plot(CanonicalPlot {
            source_index: feature.record_index,
            plot_code,
            area_m2,
            bbox,
            land_use: fields::lookup_text(&attributes, &aliases.land_use),
            owner_name: fields::lookup_text(&attributes, &aliases.owner_name),
            price: fields::lookup(&attributes, &aliases.price).and_then(fields::coerce_price),
            notes: fields::lookup_text(&attributes, &aliases.notes),
            geometry,
            attributes,
        })
    }

    /// Code lu dans les attributs, sinon code généré
    fn plot_code(&mut self, feature: &RawFeature) -> String {
        match fields::lookup_text(&feature.attributes, &self.config.aliases.plot_code) {
            Some(code) => {
                self.codes.reserve(&code);
                code
            }
            None => {
                let code = self.codes.synthesize();
                debug!(record = feature.record_index, code = %code, "Synthesized plot code");
                code
            }
        }
    }

    /// Ordre des axes et trous, identiques pour tout l'import
    fn prepare_geometry(&self, geometry: Geometry) -> Geometry {
        let geometry = match self.crs.axis_order {
            AxisOrder::LonLat => geometry,
            AxisOrder::LatLon => geometry.map_coords(|Coord { x, y }| Coord { x: y, y: x }),
        };

        if self.config.keep_holes {
            return geometry;
        }

        match geometry {
            Geometry::Polygon(polygon) => Geometry::Polygon(exterior_only(polygon)),
            Geometry::MultiPolygon(multi) => Geometry::MultiPolygon(MultiPolygon::new(
                multi.0.into_iter().map(exterior_only).collect(),
            )),
            other => other,
        }
    }
}

fn exterior_only(polygon: Polygon) -> Polygon {
    let (exterior, _) = polygon.into_inner();
    Polygon::new(exterior, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarGeometryMath;
    use geo::{polygon, Area, LineString};
    use shapefile_zip::{AttributeValue, Attributes, CrsKind, ShapeType};

    fn utm() -> Crs {
        Crs {
            epsg: Some(32736),
            name: "UTM 36S".into(),
            kind: CrsKind::Projected,
            unit_to_meters: 1.0,
            axis_order: AxisOrder::LonLat,
        }
    }

    fn feature(index: usize, attributes: Attributes, geometry: Geometry) -> RawFeature {
        RawFeature {
            record_index: index,
            shape_type: ShapeType::Polygon,
            geometry: Some(geometry),
            attributes,
            defect: None,
        }
    }

    fn with_hole() -> Geometry {
        let exterior = LineString::from(vec![(0.0, 0.0), (0.0, 100.0), (100.0, 100.0), (100.0, 0.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0), (10.0, 10.0)]);
        Geometry::Polygon(Polygon::new(exterior, vec![hole]))
    }

    fn attributes(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_normalize_maps_fields() {
        let config = ImportConfig::default();
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        let attrs = attributes(&[
            ("PLOT_CODE", AttributeValue::Text("NRB-001".into())),
            ("ZONING", AttributeValue::Text("residential".into())),
            ("OWNER_NAME", AttributeValue::Text("Wanjiru".into())),
            ("PRICE", AttributeValue::Text("KES 1,200,000".into())),
            ("DESCRIPTION", AttributeValue::Text("corner plot".into())),
        ]);

        match normalizer.normalize(feature(3, attrs, with_hole())) {
            Normalized::Plot(plot) => {
                assert_eq!(plot.source_index, 3);
                assert_eq!(plot.plot_code, "NRB-001");
                assert_eq!(plot.land_use.as_deref(), Some("residential"));
                assert_eq!(plot.owner_name.as_deref(), Some("Wanjiru"));
                assert_eq!(plot.price, Some(1_200_000.0));
                assert_eq!(plot.notes.as_deref(), Some("corner plot"));
                assert_eq!(plot.bbox_array(), Some([0.0, 0.0, 100.0, 100.0]));
                // Trous ignorés par défaut
                assert!((plot.area_m2 - 10_000.0).abs() < 1e-9);
                assert_eq!(plot.attributes.len(), 5);
            }
            other => panic!("Expected plot, got {:?}", other),
        }
    }

    #[test]
    fn test_keep_holes() {
        let config = ImportConfig {
            keep_holes: true,
            ..Default::default()
        };
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        match normalizer.normalize(feature(0, Attributes::new(), with_hole())) {
            Normalized::Plot(plot) => {
                assert!((plot.area_m2 - 9_900.0).abs() < 1e-9);
                assert!(matches!(&plot.geometry, Geometry::Polygon(p) if p.interiors().len() == 1));
            }
            other => panic!("Expected plot, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_code_is_synthesized() {
        let config = ImportConfig::default();
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        let codes: Vec<String> = (0..3)
            .map(|i| match normalizer.normalize(feature(i, Attributes::new(), with_hole())) {
                Normalized::Plot(plot) => plot.plot_code,
                other => panic!("Expected plot, got {:?}", other),
            })
            .collect();

        assert!(codes.iter().all(|c| c.starts_with("PLOT-")));
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
    }

    #[test]
    fn test_blank_code_column_is_not_replaced_by_later_alias() {
        let config = ImportConfig::default();
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        let attrs = attributes(&[
            ("PLOT_CODE", AttributeValue::Text("".into())),
            ("ID", AttributeValue::Text("X-99".into())),
        ]);
        match normalizer.normalize(feature(0, attrs, with_hole())) {
            Normalized::Plot(plot) => {
                assert_ne!(plot.plot_code, "X-99");
                assert!(plot.plot_code.starts_with("PLOT-"));
            }
            other => panic!("Expected plot, got {:?}", other),
        }
    }

    #[test]
    fn test_lat_lon_axes_are_swapped() {
        let config = ImportConfig::default();
        let crs = Crs {
            axis_order: AxisOrder::LatLon,
            ..Crs::default()
        };
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        let geometry = Geometry::Polygon(polygon![
            (x: -1.0, y: 36.0), (x: -1.0, y: 36.001), (x: -0.999, y: 36.001), (x: -0.999, y: 36.0), (x: -1.0, y: 36.0)
        ]);
        match normalizer.normalize(feature(0, Attributes::new(), geometry)) {
            Normalized::Plot(plot) => {
                assert_eq!(plot.bbox_array(), Some([36.0, -1.0, 36.001, -0.999]));
                assert!(plot.area_m2 > 10_000.0);
            }
            other => panic!("Expected plot, got {:?}", other),
        }
    }

    #[test]
    fn test_defect_keeps_plot_code() {
        let config = ImportConfig::default();
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        let raw = RawFeature {
            record_index: 5,
            shape_type: ShapeType::Polygon,
            geometry: None,
            attributes: attributes(&[("PLOT_CODE", AttributeValue::Text("BAD-1".into()))]),
            defect: Some("ring 0 is not closed".into()),
        };

        match normalizer.normalize(raw) {
            Normalized::Defect {
                source_index,
                plot_code,
                detail,
            } => {
                assert_eq!(source_index, 5);
                assert_eq!(plot_code, "BAD-1");
                assert_eq!(detail, "ring 0 is not closed");
            }
            other => panic!("Expected defect, got {:?}", other),
        }
    }

    #[test]
    fn test_area_recomputation_is_idempotent() {
        let config = ImportConfig::default();
        let crs = utm();
        let mut normalizer = Normalizer::new(&config, &PlanarGeometryMath, &crs);

        if let Normalized::Plot(plot) = normalizer.normalize(feature(0, Attributes::new(), with_hole())) {
            let again = PlanarGeometryMath.area_m2(&plot.geometry, &crs);
            assert_eq!(again, plot.area_m2);
            assert_eq!(plot.geometry.unsigned_area(), plot.area_m2);
        } else {
            panic!("Expected plot");
        }
    }
}
