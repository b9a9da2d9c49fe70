//! Décodage des enregistrements (géométrie + attributs) d'une archive
//!
//! Le décodeur est une stratégie interchangeable: le reste de la chaîne ne
//! voit que des [`RawFeature`].

use std::iter::Enumerate;
use std::vec::IntoIter;

use bytes::Bytes;
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point};
use tracing::{info, warn};

use crate::archive::ArchiveContents;
use crate::cancel::CancelSignal;
use crate::parser::dbf::DbfTable;
use crate::parser::shp::{self, RecordSpan, ShapeRecord};
use crate::parser::{cpg, prj, shx};
use crate::rings;
use crate::types::{Crs, RawFeature, ShapeType};
use crate::ShapefileError;

/// Flux d'enregistrements décodés, à parcourir une seule fois
///
/// Une erreur fatale (annulation, table attributaire illisible) termine le flux.
pub type FeatureStream = Box<dyn Iterator<Item = Result<RawFeature, ShapefileError>> + Send>;

/// Stratégie de décodage d'une archive en enregistrements bruts
pub trait FeatureDecoder: Send + Sync {
    /// Système de coordonnées de l'archive, commun à tous les enregistrements
    fn crs(&self, contents: &ArchiveContents) -> Crs;

    /// Ouvre le flux d'enregistrements
    ///
    /// Les incohérences globales (nombre d'enregistrements différent entre
    /// géométries et attributs) sont détectées ici, avant le premier élément.
    fn decode(
        &self,
        contents: &ArchiveContents,
        cancel: &CancelSignal,
    ) -> Result<FeatureStream, ShapefileError>;
}

/// Décodeur ESRI Shapefile (.shp + .dbf, .shx et .cpg optionnels)
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapefileDecoder;

impl FeatureDecoder for ShapefileDecoder {
    fn crs(&self, contents: &ArchiveContents) -> Crs {
        prj::parse_or_default(contents.projection.as_ref().map(|entry| &entry.content[..]))
    }

    fn decode(
        &self,
        contents: &ArchiveContents,
        cancel: &CancelSignal,
    ) -> Result<FeatureStream, ShapefileError> {
        cancel.check()?;

        let shp_data = contents.geometry.content.clone();
        let header = shp::parse_header(&shp_data, &contents.geometry.name)?;
        let spans = shp::scan_records(&shp_data, &header)?;

        if let Some(index) = &contents.index {
            match shx::record_count(&index.content) {
                Ok(count) if count != spans.len() => {
                    return Err(ShapefileError::parse_error(
                        index.name.clone(),
                        format!(
                            "index lists {} records, geometry file has {}",
                            count,
                            spans.len()
                        ),
                    ));
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Unreadable .shx index, ignored"),
            }
        }

        let encoding = contents
            .encoding
            .as_ref()
            .and_then(|entry| cpg::parse(&entry.content));
        let table = DbfTable::parse(contents.attributes.content.clone(), encoding)?;

        if table.record_count != spans.len() {
            return Err(ShapefileError::RecordCountMismatch {
                geometry: spans.len(),
                attributes: table.record_count,
            });
        }

        info!(
            records = spans.len(),
            shape_type = ?header.shape_type,
            fields = table.fields.len(),
            encoding = table.encoding().map(|e| e.name()).unwrap_or("utf-8"),
            "Decoding shapefile"
        );

        Ok(Box::new(ShapefileFeatures {
            shp: shp_data,
            declared_type: header.shape_type,
            spans: spans.into_iter().enumerate(),
            table,
            cancel: cancel.clone(),
            done: false,
        }))
    }
}

/// Itérateur paresseux sur les enregistrements d'un shapefile
struct ShapefileFeatures {
    shp: Bytes,
    declared_type: ShapeType,
    spans: Enumerate<IntoIter<RecordSpan>>,
    table: DbfTable,
    cancel: CancelSignal,
    done: bool,
}

impl ShapefileFeatures {
    fn decode_one(&self, index: usize, span: RecordSpan) -> Result<RawFeature, ShapefileError> {
        self.cancel.check()?;

        let attributes = self.table.record(index)?;

        let decoded = shp::decode_record(&self.shp[span.content], index).and_then(
            |(shape_type, record)| {
                build_geometry(record)
                    .map(|geometry| (shape_type, geometry))
                    .map_err(|reason| ShapefileError::malformed(index, reason))
            },
        );

        match decoded {
            Ok((shape_type, geometry)) => Ok(RawFeature {
                record_index: index,
                shape_type,
                geometry: Some(geometry),
                attributes,
                defect: None,
            }),
            // Un enregistrement malformé n'arrête pas le décodage
            Err(ShapefileError::MalformedGeometry { reason, .. }) => {
                warn!(record = index, reason = %reason, "Malformed geometry record");
                Ok(RawFeature {
                    record_index: index,
                    shape_type: self.declared_type,
                    geometry: None,
                    attributes,
                    defect: Some(reason),
                })
            }
            Err(e) => Err(e),
        }
    }
}

impl Iterator for ShapefileFeatures {
    type Item = Result<RawFeature, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let (index, span) = self.spans.next()?;
        let result = self.decode_one(index, span);
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            self.spans.size_hint()
        }
    }
}

/// Convertit un enregistrement décodé en géométrie `geo`
fn build_geometry(record: ShapeRecord) -> Result<Geometry, String> {
    match record {
        ShapeRecord::Null => Err("null shape".to_string()),
        ShapeRecord::Point(coord) => {
            ensure_finite(&[coord])?;
            Ok(Geometry::Point(Point::from(coord)))
        }
        ShapeRecord::MultiPoint(points) => {
            if points.is_empty() {
                return Err("multipoint without points".to_string());
            }
            ensure_finite(&points)?;
            Ok(Geometry::MultiPoint(MultiPoint::new(
                points.into_iter().map(Point::from).collect(),
            )))
        }
        ShapeRecord::PolyLine(parts) => {
            for part in &parts {
                if part.len() < 2 {
                    return Err(format!("line part has {} points (minimum 2)", part.len()));
                }
                ensure_finite(part)?;
            }
            let mut lines: Vec<LineString> = parts.into_iter().map(LineString::new).collect();
            if lines.len() == 1 {
                Ok(Geometry::LineString(lines.remove(0)))
            } else {
                Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
            }
        }
        ShapeRecord::Polygon(parts) => {
            for (i, part) in parts.iter().enumerate() {
                rings::check_ring(part, i)?;
            }
            let mut polygons =
                rings::organize_rings(parts.into_iter().map(LineString::new).collect());
            match polygons.len() {
                0 => Err("polygon without rings".to_string()),
                1 => Ok(Geometry::Polygon(polygons.remove(0))),
                _ => Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
            }
        }
    }
}

fn ensure_finite(coords: &[Coord]) -> Result<(), String> {
    match coords.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        Some(c) => Err(format!("non-finite coordinate ({}, {})", c.x, c.y)),
        None => Ok(()),
    }
}
