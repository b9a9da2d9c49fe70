//! Parser pour les fichiers PRJ (système de coordonnées en WKT)

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::types::{AxisOrder, Crs, CrsKind};
use crate::ShapefileError;

fn authority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?"#).expect("valid regex")
    })
}

fn unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:UNIT|LENGTHUNIT)\[\s*"[^"]*"\s*,\s*([-+0-9.eE]+)"#).expect("valid regex")
    })
}

fn axis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)AXIS\[\s*"[^"]*"\s*,\s*([A-Za-z]+)"#).expect("valid regex")
    })
}

/// Parse un fichier .prj
///
/// Seule la description est lue: aucune reprojection n'est faite ici.
pub fn parse(data: &[u8]) -> Result<Crs, ShapefileError> {
    let text = match simdutf8::basic::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(data).into_owned(),
    };
    let wkt = text.trim().trim_start_matches('\u{feff}');

    let Some(open) = memchr::memchr(b'[', wkt.as_bytes()) else {
        return Err(ShapefileError::parse_error(".prj", "not a WKT definition"));
    };

    let keyword = wkt[..open].trim().to_ascii_uppercase();
    let kind = match keyword.as_str() {
        "PROJCS" | "PROJCRS" | "PROJECTEDCRS" => CrsKind::Projected,
        "GEOGCS" | "GEOGCRS" | "GEODCRS" | "GEOGRAPHICCRS" => CrsKind::Geographic,
        other => {
            return Err(ShapefileError::parse_error(
                ".prj",
                format!("unsupported CRS type '{}'", other),
            ))
        }
    };

    let name = wkt[open + 1..]
        .trim_start()
        .strip_prefix('"')
        .and_then(|rest| rest.split('"').next())
        .unwrap_or("")
        .to_string();

    // Seules les déclarations de premier niveau décrivent le CRS lui-même
    let epsg = top_level_capture(wkt, authority_re()).and_then(|code| code.parse().ok());

    let unit_to_meters = match kind {
        CrsKind::Projected => top_level_capture(wkt, unit_re())
            .and_then(|factor| factor.parse::<f64>().ok())
            .filter(|factor| factor.is_finite() && *factor > 0.0)
            .unwrap_or(1.0),
        CrsKind::Geographic => 1.0,
    };

    let axis_order = match top_level_capture(wkt, axis_re()).map(|d| d.to_ascii_uppercase()) {
        Some(direction) if direction == "NORTH" || direction == "SOUTH" => AxisOrder::LatLon,
        _ => AxisOrder::LonLat,
    };

    Ok(Crs {
        epsg,
        name,
        kind,
        unit_to_meters,
        axis_order,
    })
}

/// Parse un .prj optionnel; un .prj illisible retombe sur le CRS par défaut
pub fn parse_or_default(data: Option<&[u8]>) -> Crs {
    match data {
        Some(data) => parse(data).unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable .prj, assuming WGS 84 geographic coordinates");
            Crs::default()
        }),
        None => Crs::default(),
    }
}

/// Première capture dont le mot-clé est au premier niveau d'imbrication
fn top_level_capture<'a>(wkt: &'a str, re: &Regex) -> Option<&'a str> {
    re.captures_iter(wkt)
        .find(|caps| caps.get(0).map_or(false, |m| depth_at(wkt, m.start()) == 1))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Profondeur de crochets à la position `pos` (hors chaînes entre guillemets)
fn depth_at(wkt: &str, pos: usize) -> usize {
    let mut depth: usize = 0;
    let mut in_quotes = false;
    for &b in &wkt.as_bytes()[..pos] {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'[' | b'(' if !in_quotes => depth += 1,
            b']' | b')' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    const UTM_36S: &str = r#"PROJCS["WGS 84 / UTM zone 36S",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",33],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",10000000],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","32736"]]"#;

    const STATE_PLANE_FT: &str = r#"PROJCS["NAD_1983_StatePlane_Texas_Central_FIPS_4203_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],UNIT["Foot_US",0.3048006096012192]]"#;

    #[test]
    fn test_parse_esri_wgs84() {
        let crs = parse(WGS84.as_bytes()).unwrap();
        assert_eq!(crs.kind, CrsKind::Geographic);
        assert_eq!(crs.name, "GCS_WGS_1984");
        assert_eq!(crs.epsg, None);
        assert_eq!(crs.axis_order, AxisOrder::LonLat);
    }

    #[test]
    fn test_parse_projected_with_authority() {
        let crs = parse(UTM_36S.as_bytes()).unwrap();
        assert_eq!(crs.kind, CrsKind::Projected);
        // L'AUTHORITY du GEOGCS imbriqué (4326) ne doit pas être retenue
        assert_eq!(crs.epsg, Some(32736));
        assert_eq!(crs.unit_to_meters, 1.0);
        assert_eq!(crs.axis_order, AxisOrder::LonLat);
    }

    #[test]
    fn test_parse_projected_feet() {
        let crs = parse(STATE_PLANE_FT.as_bytes()).unwrap();
        assert!((crs.unit_to_meters - 0.3048006096).abs() < 1e-9);
    }

    #[test]
    fn test_parse_lat_first_axis() {
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;
        let crs = parse(wkt.as_bytes()).unwrap();
        assert_eq!(crs.axis_order, AxisOrder::LatLon);
        assert_eq!(crs.epsg, Some(4326));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse(b"hello").is_err());
        assert!(parse(b"VERTCS[\"x\"]").is_err());
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or_default(None), Crs::default());
        assert_eq!(parse_or_default(Some(b"garbage")), Crs::default());
    }
}
