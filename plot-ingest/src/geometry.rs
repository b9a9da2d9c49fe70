//! Calculs géométriques: surface et validité topologique
//!
//! Les calculs passent par le trait [`GeometryMath`] pour pouvoir être
//! remplacés (moteur externe, doublure de test) sans toucher au pipeline.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::orient::{Direction, Orient};
use geo::{Area, Contains, Coord, GeodesicArea, Geometry, Line, LineString, Polygon};
use shapefile_zip::{Crs, CrsKind};

/// Nombre minimal de coordonnées d'un anneau fermé
const MIN_RING_COORDS: usize = 4;

/// Collaborateur de calcul géométrique
pub trait GeometryMath: Send + Sync {
    /// Surface en m² dans le système de coordonnées donné
    fn area_m2(&self, geometry: &Geometry, crs: &Crs) -> f64;

    /// Aucun anneau ne se recoupe lui-même
    fn is_simple(&self, polygon: &Polygon) -> bool;

    /// Validité OGC (anneaux fermés, non dégénérés, sans pointe, trous dans
    /// l'extérieur, simplicité)
    fn is_valid(&self, polygon: &Polygon) -> bool;
}

/// Implémentation par défaut sur `geo`
///
/// Surface géodésique (ellipsoïde WGS84) pour un CRS géographique, surface
/// plane convertie en m² pour un CRS projeté.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarGeometryMath;

impl GeometryMath for PlanarGeometryMath {
    fn area_m2(&self, geometry: &Geometry, crs: &Crs) -> f64 {
        match crs.kind {
            CrsKind::Geographic => geodesic_area(geometry),
            CrsKind::Projected => geometry.unsigned_area() * crs.unit_to_meters.powi(2),
        }
    }

    fn is_simple(&self, polygon: &Polygon) -> bool {
        rings(polygon).all(|ring| ring_is_simple(&dedup_ring(ring)))
    }

    fn is_valid(&self, polygon: &Polygon) -> bool {
        let all_rings: Vec<Vec<Coord>> = rings(polygon).map(dedup_ring).collect();

        if !all_rings.iter().all(|ring| ring_is_well_formed(ring)) {
            return false;
        }

        let shell = Polygon::new(polygon.exterior().clone(), vec![]);
        if shell.unsigned_area() == 0.0 {
            return false;
        }

        if !all_rings.iter().all(|ring| ring_is_simple(ring)) {
            return false;
        }

        for hole in polygon.interiors() {
            let hole = Polygon::new(hole.clone(), vec![]);
            if !shell.contains(&hole) {
                return false;
            }
        }

        // Deux anneaux ne doivent pas se croiser
        for (i, a) in all_rings.iter().enumerate() {
            for b in &all_rings[i + 1..] {
                if rings_cross(a, b) {
                    return false;
                }
            }
        }

        true
    }
}

/// Surface géodésique, anneaux réorientés (extérieur anti-horaire)
///
/// Un extérieur horaire, la convention des shapefiles, donnerait la surface
/// du reste du globe.
fn geodesic_area(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Polygon(polygon) => polygon.orient(Direction::Default).geodesic_area_unsigned(),
        Geometry::MultiPolygon(multi) => multi.orient(Direction::Default).geodesic_area_unsigned(),
        other => other.geodesic_area_unsigned(),
    }
}

fn rings(polygon: &Polygon) -> impl Iterator<Item = &LineString> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors())
}

/// Coordonnées de l'anneau sans doublons consécutifs
fn dedup_ring(ring: &LineString) -> Vec<Coord> {
    let mut coords = ring.0.clone();
    coords.dedup();
    coords
}

fn ring_is_well_formed(coords: &[Coord]) -> bool {
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return false;
    }
    if coords.len() < MIN_RING_COORDS || coords.first() != coords.last() {
        return false;
    }

    // Au moins trois sommets distincts
    let open = &coords[..coords.len() - 1];
    let mut distinct: Vec<Coord> = Vec::with_capacity(open.len());
    for c in open {
        if !distinct.contains(c) {
            distinct.push(*c);
        }
    }
    if distinct.len() < 3 {
        return false;
    }

    !has_spike(coords)
}

/// Demi-tour sur place: A -> B -> A' avec A' sur le segment AB
fn has_spike(coords: &[Coord]) -> bool {
    let n = coords.len() - 1;
    (0..n).any(|i| {
        let a = coords[(i + n - 1) % n];
        let b = coords[i];
        let c = coords[(i + 1) % n];
        let ab = b - a;
        let bc = c - b;
        let cross = ab.x * bc.y - ab.y * bc.x;
        let dot = ab.x * bc.x + ab.y * bc.y;
        cross == 0.0 && dot < 0.0
    })
}

fn segments(coords: &[Coord]) -> Vec<Line> {
    coords.windows(2).map(|w| Line::new(w[0], w[1])).collect()
}

/// Deux segments non adjacents d'un même anneau ne se touchent pas
fn ring_is_simple(coords: &[Coord]) -> bool {
    let lines = segments(coords);
    let n = lines.len();
    if n < 3 {
        return true;
    }

    for i in 0..n {
        for j in i + 1..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(lines[i], lines[j]) {
                None => {}
                // Segments consécutifs: seul le sommet partagé est admis
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return false,
            }
        }
    }
    true
}

/// Deux anneaux se croisent (contact ponctuel en un sommet toléré)
fn rings_cross(a: &[Coord], b: &[Coord]) -> bool {
    let lines_b = segments(b);
    segments(a).iter().any(|la| {
        lines_b.iter().any(|lb| match line_intersection(*la, *lb) {
            Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
            Some(LineIntersection::Collinear { .. }) => true,
            None => false,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use shapefile_zip::{AxisOrder, Crs};

    fn utm() -> Crs {
        Crs {
            epsg: Some(32736),
            name: "WGS 84 / UTM zone 36S".into(),
            kind: CrsKind::Projected,
            unit_to_meters: 1.0,
            axis_order: AxisOrder::LonLat,
        }
    }

    fn square(size: f64) -> Polygon {
        polygon![(x: 0.0, y: 0.0), (x: 0.0, y: size), (x: size, y: size), (x: size, y: 0.0), (x: 0.0, y: 0.0)]
    }

    fn bowtie() -> Polygon {
        polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)]
    }

    #[test]
    fn test_projected_area() {
        let math = PlanarGeometryMath;
        let area = math.area_m2(&Geometry::Polygon(square(100.0)), &utm());
        assert!((area - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_projected_area_in_feet() {
        let math = PlanarGeometryMath;
        let crs = Crs {
            unit_to_meters: 0.3048,
            ..utm()
        };
        let area = math.area_m2(&Geometry::Polygon(square(100.0)), &crs);
        assert!((area - 929.0304).abs() < 1e-6);
    }

    #[test]
    fn test_geodesic_area() {
        // ~0.001° à l'équateur: environ 111 m de côté
        let poly = polygon![
            (x: 30.0, y: 0.0), (x: 30.0, y: 0.001), (x: 30.001, y: 0.001), (x: 30.001, y: 0.0), (x: 30.0, y: 0.0)
        ];
        let area = PlanarGeometryMath.area_m2(&Geometry::Polygon(poly), &Crs::default());
        assert!(area > 12_000.0 && area < 12_500.0, "area = {}", area);
    }

    #[test]
    fn test_geodesic_area_ignores_ring_orientation() {
        let clockwise = polygon![
            (x: 36.8, y: -1.3), (x: 36.8, y: -1.299), (x: 36.801, y: -1.299), (x: 36.801, y: -1.3), (x: 36.8, y: -1.3)
        ];
        let counter_clockwise = polygon![
            (x: 36.8, y: -1.3), (x: 36.801, y: -1.3), (x: 36.801, y: -1.299), (x: 36.8, y: -1.299), (x: 36.8, y: -1.3)
        ];
        let crs = Crs::default();

        let cw = PlanarGeometryMath.area_m2(&Geometry::Polygon(clockwise.clone()), &crs);
        let ccw = PlanarGeometryMath.area_m2(&Geometry::Polygon(counter_clockwise), &crs);
        assert!((cw - ccw).abs() < 1e-6, "cw = {}, ccw = {}", cw, ccw);
        assert!(cw > 12_000.0 && cw < 12_500.0, "area = {}", cw);

        let multi = geo::MultiPolygon::new(vec![clockwise]);
        let area = PlanarGeometryMath.area_m2(&Geometry::MultiPolygon(multi), &crs);
        assert!((area - cw).abs() < 1e-6);
    }

    #[test]
    fn test_projected_square_is_valid() {
        let poly = polygon![
            (x: 500_000.0, y: 9_000_000.0), (x: 500_000.0, y: 9_000_100.0), (x: 500_100.0, y: 9_000_100.0),
            (x: 500_100.0, y: 9_000_000.0), (x: 500_000.0, y: 9_000_000.0)
        ];
        assert!(PlanarGeometryMath.is_simple(&poly));
        assert!(PlanarGeometryMath.is_valid(&poly));
    }

    #[test]
    fn test_collinear_midpoint_is_valid() {
        let poly = polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 5.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 0.0)
        ];
        assert!(PlanarGeometryMath.is_valid(&poly));
    }

    #[test]
    fn test_area_is_stable() {
        let math = PlanarGeometryMath;
        let geometry = Geometry::Polygon(square(37.5));
        let first = math.area_m2(&geometry, &utm());
        let second = math.area_m2(&geometry, &utm());
        assert_eq!(first, second);
    }

    #[test]
    fn test_square_is_simple_and_valid() {
        let math = PlanarGeometryMath;
        assert!(math.is_simple(&square(10.0)));
        assert!(math.is_valid(&square(10.0)));
    }

    #[test]
    fn test_bowtie_is_neither_simple_nor_valid() {
        let math = PlanarGeometryMath;
        assert!(!math.is_simple(&bowtie()));
        assert!(!math.is_valid(&bowtie()));
    }

    #[test]
    fn test_repeated_vertex_is_tolerated() {
        let poly = polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 0.0)
        ];
        assert!(PlanarGeometryMath.is_simple(&poly));
        assert!(PlanarGeometryMath.is_valid(&poly));
    }

    #[test]
    fn test_spike_is_invalid() {
        let poly = polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 20.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 0.0)
        ];
        assert!(!PlanarGeometryMath.is_valid(&poly));
    }

    #[test]
    fn test_collinear_ring_is_invalid() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 0.0)];
        assert!(!PlanarGeometryMath.is_valid(&poly));
    }

    #[test]
    fn test_hole_outside_shell_is_invalid() {
        let shell = square(10.0).exterior().clone();
        let inside = LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)]);
        let outside =
            LineString::from(vec![(20.0, 20.0), (24.0, 20.0), (24.0, 24.0), (20.0, 24.0), (20.0, 20.0)]);

        assert!(PlanarGeometryMath.is_valid(&Polygon::new(shell.clone(), vec![inside])));
        assert!(!PlanarGeometryMath.is_valid(&Polygon::new(shell, vec![outside])));
    }

    #[test]
    fn test_non_finite_is_invalid() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: f64::NAN), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0)];
        assert!(!PlanarGeometryMath.is_valid(&poly));
    }
}
