//! Construction des polygones à partir des parties d'un enregistrement
//!
//! Dans un shapefile, les anneaux extérieurs sont en sens horaire et les trous
//! en sens anti-horaire. Beaucoup d'exports ne respectent pas cette règle: on
//! retombe alors sur un test d'inclusion pour rattacher les trous.

use geo::{Area, Contains, Coord, LineString, Point, Polygon, Winding};

/// Nombre minimal de coordonnées d'un anneau fermé
pub const MIN_RING_COORDS: usize = 4;

/// Vérifie qu'une partie forme un anneau exploitable
///
/// Retourne la raison du rejet le cas échéant.
pub fn check_ring(coords: &[Coord], part: usize) -> Result<(), String> {
    if let Some(bad) = coords.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(format!(
            "ring {} has a non-finite coordinate ({}, {})",
            part, bad.x, bad.y
        ));
    }

    if coords.len() < MIN_RING_COORDS {
        return Err(format!(
            "ring {} has {} points (minimum {})",
            part,
            coords.len(),
            MIN_RING_COORDS
        ));
    }

    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if first == last => Ok(()),
        _ => Err(format!("ring {} is not closed", part)),
    }
}

/// Organise les anneaux en polygones avec trous
///
/// L'ordre des anneaux extérieurs est conservé.
pub fn organize_rings(rings: Vec<LineString>) -> Vec<Polygon> {
    if rings.len() <= 1 {
        return rings
            .into_iter()
            .map(|ring| Polygon::new(ring, vec![]))
            .collect();
    }

    // Anneaux dégénérés (aire nulle, sans sens) traités comme extérieurs
    let (mut outers, holes): (Vec<LineString>, Vec<LineString>) =
        rings.into_iter().partition(|ring| !ring.is_ccw());

    // Aucun anneau horaire: l'export n'a pas respecté l'orientation
    if outers.is_empty() {
        return organize_by_containment(holes);
    }

    let mut interiors: Vec<Vec<LineString>> = vec![Vec::new(); outers.len()];
    let mut orphans = Vec::new();

    for hole in holes {
        match smallest_container(&outers, &hole) {
            Some(idx) => interiors[idx].push(hole),
            None => orphans.push(hole),
        }
    }

    // Un anneau anti-horaire hors de tout extérieur est un extérieur mal orienté
    for orphan in orphans {
        outers.push(orphan);
        interiors.push(Vec::new());
    }

    outers
        .into_iter()
        .zip(interiors)
        .map(|(outer, inners)| Polygon::new(outer, inners))
        .collect()
}

/// Rattache chaque anneau au plus petit anneau qui le contient, sans tenir
/// compte de l'orientation
fn organize_by_containment(rings: Vec<LineString>) -> Vec<Polygon> {
    let mut parent: Vec<Option<usize>> = vec![None; rings.len()];

    for (i, ring) in rings.iter().enumerate() {
        let candidates: Vec<LineString> = rings
            .iter()
            .enumerate()
            .map(|(j, other)| if i == j { LineString::new(vec![]) } else { other.clone() })
            .collect();
        parent[i] = smallest_container(&candidates, ring);
    }

    // Les anneaux de profondeur paire sont des extérieurs (îles dans les trous incluses)
    let depth = |mut idx: usize| {
        let mut d = 0;
        while let Some(p) = parent[idx] {
            d += 1;
            idx = p;
            if d > rings.len() {
                break;
            }
        }
        d
    };

    let mut polygons: Vec<(usize, Polygon)> = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if depth(i) % 2 == 0 {
            polygons.push((i, Polygon::new(ring.clone(), vec![])));
        }
    }

    for (i, ring) in rings.iter().enumerate() {
        if depth(i) % 2 == 1 {
            if let Some(p) = parent[i] {
                if let Some((_, polygon)) = polygons.iter_mut().find(|(idx, _)| *idx == p) {
                    polygon.interiors_push(ring.clone());
                }
            }
        }
    }

    polygons.into_iter().map(|(_, polygon)| polygon).collect()
}

/// Index du plus petit anneau de `outers` contenant `ring`
fn smallest_container(outers: &[LineString], ring: &LineString) -> Option<usize> {
    let probe = probe_point(ring)?;

    outers
        .iter()
        .enumerate()
        .filter(|(_, outer)| outer.0.len() >= MIN_RING_COORDS)
        .map(|(i, outer)| (i, Polygon::new(outer.clone(), vec![])))
        .filter(|(_, poly)| poly.contains(&probe))
        .min_by(|(_, a), (_, b)| {
            a.unsigned_area()
                .partial_cmp(&b.unsigned_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Point représentatif d'un anneau: milieu du premier segment non nul
///
/// Le premier sommet d'un trou touche parfois l'extérieur; le milieu d'un
/// segment est plus robuste pour le test d'inclusion.
fn probe_point(ring: &LineString) -> Option<Point> {
    ring.lines()
        .find(|line| line.start != line.end)
        .map(|line| Point::new((line.start.x + line.end.x) / 2.0, (line.start.y + line.end.y) / 2.0))
        .or_else(|| ring.0.first().map(|c| Point::new(c.x, c.y)))
}
