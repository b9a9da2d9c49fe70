//! Types de données pour le crate shapefile-zip

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use geo::Geometry;
use serde::{Deserialize, Serialize};

/// Rôle d'un fichier de l'archive, déduit de son suffixe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRole {
    /// `.shp` — géométries
    Geometry,
    /// `.shx` — index des enregistrements
    Index,
    /// `.dbf` — table attributaire
    Attributes,
    /// `.prj` — système de coordonnées (WKT)
    Projection,
    /// `.cpg` — page de code de la table attributaire
    Encoding,
    /// Tout le reste (.sbn, .xml, ...)
    Other,
}

impl EntryRole {
    /// Déduit le rôle depuis le nom de fichier (insensible à la casse)
    pub fn from_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "shp" => Self::Geometry,
            "shx" => Self::Index,
            "dbf" => Self::Attributes,
            "prj" => Self::Projection,
            "cpg" => Self::Encoding,
            _ => Self::Other,
        }
    }

    /// Suffixe canonique du rôle
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Geometry => ".shp",
            Self::Index => ".shx",
            Self::Attributes => ".dbf",
            Self::Projection => ".prj",
            Self::Encoding => ".cpg",
            Self::Other => "",
        }
    }
}

/// Un fichier extrait de l'archive
#[derive(Debug, Clone)]
pub struct RawArchiveEntry {
    /// Chemin du fichier dans l'archive
    pub name: String,

    /// Contenu décompressé
    pub content: Bytes,

    /// Rôle déduit du suffixe
    pub role: EntryRole,
}

impl RawArchiveEntry {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let role = EntryRole::from_name(&name);
        Self {
            name,
            content: content.into(),
            role,
        }
    }

    /// Nom de fichier sans répertoire ni extension, en minuscules
    pub fn stem(&self) -> String {
        let file_name = self.name.rsplit('/').next().unwrap_or(&self.name);
        file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
            .to_ascii_lowercase()
    }
}

/// Valeur brute d'un attribut DBF
///
/// Sérialisée sans étiquette: un dictionnaire d'attributs donne un objet JSON simple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Date au format ISO `YYYY-MM-DD`
    Date(String),
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) | Self::Date(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Représentation texte, `None` pour une valeur vide
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        match self {
            Self::Text(s) | Self::Date(s) => Some(s.trim().to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Null => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

/// Les entiers stockés en flottant sont affichés sans décimale ("12" et non "12.0")
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Dictionnaire d'attributs d'un enregistrement
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Type de forme d'un enregistrement .shp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Null,
            1 => Self::Point,
            3 => Self::PolyLine,
            5 => Self::Polygon,
            8 => Self::MultiPoint,
            11 => Self::PointZ,
            13 => Self::PolyLineZ,
            15 => Self::PolygonZ,
            18 => Self::MultiPointZ,
            21 => Self::PointM,
            23 => Self::PolyLineM,
            25 => Self::PolygonM,
            28 => Self::MultiPointM,
            31 => Self::MultiPatch,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Point => 1,
            Self::PolyLine => 3,
            Self::Polygon => 5,
            Self::MultiPoint => 8,
            Self::PointZ => 11,
            Self::PolyLineZ => 13,
            Self::PolygonZ => 15,
            Self::MultiPointZ => 18,
            Self::PointM => 21,
            Self::PolyLineM => 23,
            Self::PolygonM => 25,
            Self::MultiPointM => 28,
            Self::MultiPatch => 31,
        }
    }

    pub fn is_polygon(self) -> bool {
        matches!(self, Self::Polygon | Self::PolygonZ | Self::PolygonM)
    }
}

/// Famille de système de coordonnées
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Coordonnées angulaires (degrés)
    Geographic,
    /// Coordonnées planes (mètres, pieds, ...)
    Projected,
}

/// Ordre des axes déclaré par la projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// x = longitude / est
    LonLat,
    /// x = latitude / nord
    LatLon,
}

/// Système de coordonnées de l'archive (depuis le .prj)
#[derive(Debug, Clone, PartialEq)]
pub struct Crs {
    /// Code EPSG si déclaré via AUTHORITY
    pub epsg: Option<u32>,

    /// Nom déclaré dans le WKT
    pub name: String,

    pub kind: CrsKind,

    /// Facteur de conversion de l'unité linéaire vers le mètre (projeté)
    pub unit_to_meters: f64,

    pub axis_order: AxisOrder,
}

impl Default for Crs {
    fn default() -> Self {
        Self {
            epsg: Some(4326), // WGS84 géographique par défaut
            name: "WGS 84".to_string(),
            kind: CrsKind::Geographic,
            unit_to_meters: 1.0,
            axis_order: AxisOrder::LonLat,
        }
    }
}

/// Un enregistrement décodé avant normalisation
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// Position de l'enregistrement dans l'archive (0-based)
    pub record_index: usize,

    /// Type de forme déclaré par l'enregistrement
    pub shape_type: ShapeType,

    /// Géométrie (anneau extérieur en premier, trous ensuite), `None` si inutilisable
    pub geometry: Option<Geometry>,

    /// Attributs joints par index depuis le .dbf
    pub attributes: Attributes,

    /// Raison du rejet au décodage
    pub defect: Option<String>,
}

impl RawFeature {
    /// Enregistrement exploitable par les étapes suivantes
    pub fn is_usable(&self) -> bool {
        self.defect.is_none() && self.geometry.is_some()
    }
}
