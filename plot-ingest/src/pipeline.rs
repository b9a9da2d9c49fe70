//! Pipeline d'import: archive → enregistrements → parcelles → lot → stockage
//!
//! Toutes les étapes de calcul sont synchrones et terminées avant le premier
//! appel au stockage: une erreur fatale n'insère jamais de lot partiel.

use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use shapefile_zip::{check_upload, read_archive, CancelSignal, Crs, FeatureStream, ShapefileError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::ImportBatch;
use crate::config::ImportConfig;
use crate::context::ImportContext;
use crate::dedup::Deduplicator;
use crate::error::ImportError;
use crate::geometry::GeometryMath;
use crate::normalize::{Normalized, Normalizer};
use crate::report::ImportReport;
use crate::store::{ImportRecord, PlotRecord, DEFAULT_SRID};
use crate::validate::{RejectionReason, Validator};

/// Archive téléversée
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,

    /// Type MIME déclaré par le client
    pub content_type: Option<String>,

    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Lot prêt à être transmis au stockage
#[derive(Debug)]
pub struct PreparedImport {
    pub batch: ImportBatch,

    /// Empreinte blake3 de l'archive
    pub checksum: String,

    pub crs: Crs,
}

/// Résultat d'un import terminé
#[derive(Debug)]
pub struct ImportOutcome {
    pub report: ImportReport,
    pub batch: ImportBatch,
}

/// Signal d'annulation avec l'échéance configurée
pub fn cancel_signal(config: &ImportConfig) -> CancelSignal {
    match config.limits.timeout() {
        Some(timeout) => CancelSignal::with_timeout(timeout),
        None => CancelSignal::new(),
    }
}

/// Normalise, valide et déduplique les enregistrements décodés
///
/// # Errors
///
/// Seules les erreurs fatales du décodage (annulation, échéance, fichier
/// tronqué) interrompent la construction; un enregistrement défectueux
/// devient un rejet.
pub fn build_batch(
    id: Uuid,
    features: FeatureStream,
    crs: &Crs,
    config: &ImportConfig,
    math: &dyn GeometryMath,
) -> Result<ImportBatch, ShapefileError> {
    let mut batch = ImportBatch::new(id);
    let mut normalizer = Normalizer::new(config, math, crs);
    let mut plots = Vec::new();

    for feature in features {
        match normalizer.normalize(feature?) {
            Normalized::Plot(plot) => plots.push(plot),
            Normalized::Defect {
                source_index,
                plot_code,
                detail,
            } => {
                warn!(record = source_index, plot_code = %plot_code, reason = %detail, "Malformed record skipped");
                batch.reject(
                    source_index,
                    plot_code,
                    vec![RejectionReason::MalformedGeometry(detail)],
                );
            }
        }
    }

    let validator = Validator::new(math, &config.limits);
    let outcomes = validator.evaluate_all(&plots);
    let mut dedup = Deduplicator::new(config.deduplicate);

    for (plot, outcome) in plots.into_iter().zip(outcomes) {
        let reasons = if outcome.accepted {
            dedup.check(&plot)
        } else {
            outcome.reasons
        };

        if reasons.is_empty() {
            batch.accept(plot);
        } else {
            warn!(
                record = plot.source_index,
                plot_code = %plot.plot_code,
                reasons = ?reasons,
                "Plot rejected"
            );
            batch.reject(plot.source_index, plot.plot_code, reasons);
        }
    }

    batch.sort_rejections();
    Ok(batch)
}

/// Étapes de calcul d'un import, sans accès au stockage
///
/// # Errors
///
/// `ImportError::Archive` si l'archive est refusée, incomplète ou si le
/// décodage est interrompu.
pub fn prepare_import(
    ctx: &ImportContext,
    import_id: Uuid,
    upload: &Upload,
    cancel: &CancelSignal,
) -> Result<PreparedImport, ImportError> {
    let limits = ctx.config.limits.archive_limits();

    check_upload(
        &upload.file_name,
        upload.content_type.as_deref(),
        &upload.data,
        &limits,
    )?;

    let contents = read_archive(upload.data.clone(), &limits, cancel)?;
    let crs = ctx.decoder.crs(&contents);
    let features = ctx.decoder.decode(&contents, cancel)?;

    info!(
        import_id = %import_id,
        file = %upload.file_name,
        epsg = ?crs.epsg,
        has_projection = contents.has_projection(),
        "Archive decoded"
    );

    let batch = build_batch(import_id, features, &crs, &ctx.config, ctx.math.as_ref())?;

    info!(
        import_id = %import_id,
        accepted = batch.accepted_count(),
        skipped = batch.skipped_count(),
        "Batch ready"
    );

    Ok(PreparedImport {
        batch,
        checksum: contents.checksum,
        crs,
    })
}

/// Import complet d'une archive
///
/// Retourne un rapport dès que l'import a été ouvert dans le stockage, y
/// compris si l'insertion échoue (statut `failed`).
///
/// # Errors
///
/// `ImportError` si l'archive est refusée ou si le stockage refuse
/// l'ouverture de l'import: aucune parcelle n'a alors été transmise.
pub async fn run_import(
    ctx: &ImportContext,
    upload: Upload,
    cancel: &CancelSignal,
) -> Result<ImportOutcome, ImportError> {
    let start = Instant::now();
    let import_id = Uuid::new_v4();

    let prepared = prepare_import(ctx, import_id, &upload, cancel)?;
    let batch = prepared.batch;

    let srid = prepared.crs.epsg.unwrap_or(DEFAULT_SRID);
    let records = batch
        .plots
        .iter()
        .map(|plot| PlotRecord::from_plot(plot, srid))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = ImportReport::new(&batch, &upload.file_name, &prepared.checksum);

    ctx.store
        .begin_import(&ImportRecord {
            id: import_id,
            file_name: upload.file_name.clone(),
            archive_checksum: prepared.checksum.clone(),
            crs_epsg: prepared.crs.epsg,
            started_at: Utc::now(),
        })
        .await?;

    if !records.is_empty() {
        match ctx.store.insert_plots(import_id, &records).await {
            Ok(outcome) => {
                report.record_inserted(outcome.inserted);
                for error in outcome.errors {
                    report.record_store_error(error);
                }
            }
            Err(e) => {
                warn!(import_id = %import_id, error = %e, "Bulk insert failed");
                report.record_store_error(e.to_string());
            }
        }
    }

    let status = report.finalize();
    let message = report.failure_message();
    if let Err(e) = ctx
        .store
        .finalize_import(import_id, status, report.imported_count, message.as_deref())
        .await
    {
        warn!(import_id = %import_id, error = %e, "Failed to record import status");
        report.record_store_error(e.to_string());
        report.finalize();
    }

    report.set_duration(start.elapsed());

    info!(
        import_id = %import_id,
        status = report.status.as_str(),
        imported = report.imported_count,
        skipped = report.skipped_count,
        duration_secs = report.duration_secs,
        "Import finished"
    );

    Ok(ImportOutcome { report, batch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarGeometryMath;
    use geo::{Coord, LineString, Polygon};
    use shapefile_zip::{AttributeValue, Attributes, RawFeature, ShapeType};

    fn square(x: f64, y: f64, size: f64) -> geo::Geometry {
        let ring = LineString::from(vec![
            Coord { x, y },
            Coord { x, y: y + size },
            Coord { x: x + size, y: y + size },
            Coord { x: x + size, y },
            Coord { x, y },
        ]);
        geo::Geometry::Polygon(Polygon::new(ring, vec![]))
    }

    fn raw(index: usize, code: Option<&str>, geometry: Option<geo::Geometry>) -> RawFeature {
        let mut attributes = Attributes::new();
        if let Some(code) = code {
            attributes.insert("PLOT_CODE".into(), AttributeValue::Text(code.into()));
        }
        RawFeature {
            record_index: index,
            shape_type: ShapeType::Polygon,
            defect: geometry.is_none().then(|| "null shape".to_string()),
            geometry,
            attributes,
        }
    }

    fn projected() -> Crs {
        Crs {
            epsg: Some(32736),
            name: "UTM".into(),
            kind: shapefile_zip::CrsKind::Projected,
            unit_to_meters: 1.0,
            axis_order: shapefile_zip::AxisOrder::LonLat,
        }
    }

    fn stream(features: Vec<RawFeature>) -> FeatureStream {
        Box::new(features.into_iter().map(Ok))
    }

    #[test]
    fn test_build_batch_orders_and_rejects() {
        let features = vec![
            raw(0, Some("A"), Some(square(0.0, 0.0, 10.0))),
            raw(1, Some("B"), None),
            raw(2, Some("C"), Some(square(100.0, 0.0, 0.5))),
            raw(3, Some("A"), Some(square(200.0, 0.0, 10.0))),
            raw(4, Some("E"), Some(square(0.0, 0.0, 10.0))),
            raw(5, Some("F"), Some(square(300.0, 0.0, 10.0))),
        ];

        let batch = build_batch(
            Uuid::new_v4(),
            stream(features),
            &projected(),
            &ImportConfig::default(),
            &PlanarGeometryMath,
        )
        .unwrap();

        let accepted: Vec<&str> = batch.plots.iter().map(|p| p.plot_code.as_str()).collect();
        assert_eq!(accepted, vec!["A", "F"]);

        let rejected: Vec<(&str, Vec<RejectionReason>)> = batch
            .rejections
            .iter()
            .map(|s| (s.plot_code.as_str(), s.reasons.clone()))
            .collect();
        assert_eq!(
            rejected,
            vec![
                ("B", vec![RejectionReason::MalformedGeometry("null shape".into())]),
                ("C", vec![RejectionReason::AreaTooSmall]),
                ("A", vec![RejectionReason::DuplicatePlotCode]),
                ("E", vec![RejectionReason::DuplicateGeometry]),
            ]
        );
    }

    #[test]
    fn test_build_batch_stops_on_fatal_error() {
        let features: FeatureStream = Box::new(
            vec![
                Ok(raw(0, Some("A"), Some(square(0.0, 0.0, 10.0)))),
                Err(ShapefileError::Cancelled),
            ]
            .into_iter(),
        );

        let result = build_batch(
            Uuid::new_v4(),
            features,
            &projected(),
            &ImportConfig::default(),
            &PlanarGeometryMath,
        );
        assert!(matches!(result, Err(ShapefileError::Cancelled)));
    }

    #[test]
    fn test_cancel_signal_from_config() {
        let mut config = ImportConfig::default();
        assert!(cancel_signal(&config).check().is_ok());

        config.limits.timeout_secs = Some(0);
        assert!(matches!(
            cancel_signal(&config).check(),
            Err(ShapefileError::DeadlineExceeded)
        ));
    }
}
