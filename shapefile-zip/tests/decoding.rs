//! Tests d'intégration: archive ZIP complète jusqu'aux enregistrements décodés

use geo::{Area, Geometry};
use shapefile_zip::fixtures::{square, zip_archive, DbfFieldSpec, FixtureShape, ShapefileBuilder};
use shapefile_zip::{
    check_upload, parse, ArchiveLimits, AttributeValue, AxisOrder, CancelSignal, CrsKind,
    RawFeature, ShapefileError,
};

const UTM_36S: &str = r#"PROJCS["WGS 84 / UTM zone 36S",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],UNIT["metre",1],AUTHORITY["EPSG","32736"]]"#;

fn fields() -> Vec<DbfFieldSpec> {
    vec![
        DbfFieldSpec::text("PLOT_CODE", 12),
        DbfFieldSpec::text("OWNER", 24),
        DbfFieldSpec::numeric("PRICE", 12, 2),
    ]
}

fn decode(zip: Vec<u8>) -> (shapefile_zip::Crs, Vec<RawFeature>) {
    let result = parse(zip.into(), &ArchiveLimits::default(), &CancelSignal::new()).unwrap();
    let crs = result.crs.clone();
    let features = result.features.collect::<Result<Vec<_>, _>>().unwrap();
    (crs, features)
}

#[test]
fn test_projected_archive_with_hole() {
    let outer = square(500_000.0, 9_000_000.0, 100.0);
    let hole: Vec<(f64, f64)> = square(500_010.0, 9_000_010.0, 10.0).into_iter().rev().collect();

    let zip = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![outer, hole]), &["UTM-1", "Nakato", "25000"])
        .prj(UTM_36S)
        .zip("parcels");

    let (crs, features) = decode(zip);
    assert_eq!(crs.kind, CrsKind::Projected);
    assert_eq!(crs.epsg, Some(32736));
    assert_eq!(crs.axis_order, AxisOrder::LonLat);

    assert_eq!(features.len(), 1);
    match &features[0].geometry {
        Some(Geometry::Polygon(polygon)) => {
            assert_eq!(polygon.interiors().len(), 1);
            assert!((polygon.unsigned_area() - 9_900.0).abs() < 1e-6);
        }
        other => panic!("Expected polygon, got {:?}", other),
    }
    assert_eq!(features[0].attributes["PRICE"], AttributeValue::Number(25000.0));
}

#[test]
fn test_latin1_attributes_via_cpg() {
    let zip = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "Hélène", "1"])
        .cpg("ISO-8859-1")
        .zip("parcels");

    let (_, features) = decode(zip);
    assert_eq!(features[0].attributes["OWNER"], AttributeValue::Text("Hélène".into()));
}

#[test]
fn test_latin1_attributes_via_language_driver() {
    let zip = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "Müller", "1"])
        .language_driver(encoding_rs::WINDOWS_1252, 0x57)
        .zip("parcels");

    let (_, features) = decode(zip);
    assert_eq!(features[0].attributes["OWNER"], AttributeValue::Text("Müller".into()));
}

#[test]
fn test_missing_index_is_tolerated() {
    let zip = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "", ""])
        .without_index()
        .zip("parcels");

    let (crs, features) = decode(zip);
    assert_eq!(crs, shapefile_zip::Crs::default());
    assert_eq!(features.len(), 1);
    assert!(features[0].is_usable());
}

#[test]
fn test_index_count_mismatch_is_rejected() {
    let builder = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "", ""])
        .record(FixtureShape::Polygon(vec![square(1.0, 1.0, 0.01)]), &["B", "", ""]);

    // Remplace le .shx par celui d'un fichier à un seul enregistrement
    let single = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "", ""]);
    let mut files = builder.files("parcels");
    let shx = single
        .files("parcels")
        .into_iter()
        .find(|(name, _)| name.ends_with(".shx"))
        .unwrap();
    files.retain(|(name, _)| !name.ends_with(".shx"));
    files.push(shx);

    let refs: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, c)| (n.as_str(), c.clone())).collect();
    let result = parse(
        zip_archive(&refs).into(),
        &ArchiveLimits::default(),
        &CancelSignal::new(),
    );
    assert!(matches!(result.err(), Some(ShapefileError::ParseError { .. })));
}

#[test]
fn test_check_upload_then_parse() {
    let zip = ShapefileBuilder::new(fields())
        .record(FixtureShape::Polygon(vec![square(0.0, 0.0, 0.01)]), &["A", "", ""])
        .zip("parcels");

    assert!(check_upload("parcels.zip", Some("application/zip"), &zip, &ArchiveLimits::default()).is_ok());
    assert!(matches!(
        check_upload("parcels.zip", Some("text/plain"), &zip, &ArchiveLimits::default()),
        Err(ShapefileError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_components_messages() {
    let zip = zip_archive(&[("notes.txt", b"nothing here".to_vec())]);
    let err = parse(zip.into(), &ArchiveLimits::default(), &CancelSignal::new())
        .err()
        .unwrap();
    assert_eq!(
        err.messages(),
        vec![
            "Missing required file: .shp".to_string(),
            "Missing required file: .dbf".to_string()
        ]
    );
}
