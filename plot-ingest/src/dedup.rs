//! Détection des doublons au sein d'un import
//!
//! Le hash de géométrie ne dépend pas du sommet de départ des anneaux: une
//! parcelle redessinée à partir d'un autre coin reste un doublon.

use std::cmp::Ordering;
use std::collections::HashSet;

use blake3::Hasher;
use geo::{Coord, Geometry, LineString, Polygon};

use crate::plot::CanonicalPlot;
use crate::validate::RejectionReason;

/// Hash stable d'une géométrie
///
/// Chaque anneau commence à son sommet lexicographiquement le plus petit
/// (x puis y), coordonnées arrondies à 1e-6.
pub fn geometry_hash(geom: &Geometry) -> [u8; 32] {
    let mut hasher = Hasher::new();

    match geom {
        Geometry::Polygon(p) => {
            hasher.update(b"POLYGON");
            hash_polygon(&mut hasher, p);
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            for poly in mp.0.iter() {
                hasher.update(b"POLY");
                hash_polygon(&mut hasher, poly);
            }
        }
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(&mut hasher, p.0);
        }
        _ => {
            hasher.update(format!("{:?}", geom).as_bytes());
        }
    }

    *hasher.finalize().as_bytes()
}

/// Hash en hexadécimal, tel que stocké avec la parcelle
pub fn geometry_hash_hex(geom: &Geometry) -> String {
    hex::encode(geometry_hash(geom))
}

fn hash_polygon(hasher: &mut Hasher, polygon: &Polygon) {
    hasher.update(b"EXT");
    hash_ring_normalized(hasher, polygon.exterior());
    for interior in polygon.interiors() {
        hasher.update(b"INT");
        hash_ring_normalized(hasher, interior);
    }
}

fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString) {
    // Le point de fermeture est ignoré
    let len = if ring.0.len() > 1 && ring.0.first() == ring.0.last() {
        ring.0.len() - 1
    } else {
        ring.0.len()
    };
    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            let (ca, cb) = (ring.0[a], ring.0[b]);
            ca.x.partial_cmp(&cb.x)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ca.y.partial_cmp(&cb.y).unwrap_or(Ordering::Equal))
        })
        .unwrap_or(0);

    for i in 0..len {
        hash_coord(hasher, ring.0[(min_idx + i) % len]);
    }
}

fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    let x = (coord.x * 1_000_000.0).round() as i64;
    let y = (coord.y * 1_000_000.0).round() as i64;
    hasher.update(&x.to_le_bytes());
    hasher.update(&y.to_le_bytes());
}

/// Registre des codes et géométries déjà acceptés dans l'import
#[derive(Debug)]
pub struct Deduplicator {
    enabled: bool,
    codes: HashSet<String>,
    geometries: HashSet<[u8; 32]>,
}

impl Deduplicator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            codes: HashSet::new(),
            geometries: HashSet::new(),
        }
    }

    /// Motifs de doublon d'une parcelle, vide si elle est nouvelle
    ///
    /// Une parcelle sans doublon est enregistrée: seules les suivantes seront
    /// rejetées.
    pub fn check(&mut self, plot: &CanonicalPlot) -> Vec<RejectionReason> {
        if !self.enabled {
            return Vec::new();
        }

        let hash = geometry_hash(&plot.geometry);
        let mut reasons = Vec::new();

        if self.codes.contains(&plot.plot_code) {
            reasons.push(RejectionReason::DuplicatePlotCode);
        }
        if self.geometries.contains(&hash) {
            reasons.push(RejectionReason::DuplicateGeometry);
        }

        if reasons.is_empty() {
            self.codes.insert(plot.plot_code.clone());
            self.geometries.insert(hash);
        }
        reasons
    }
}
