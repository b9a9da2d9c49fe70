//! Configuration de l'import

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shapefile_zip::archive::{DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_UNCOMPRESSED_BYTES};
use shapefile_zip::ArchiveLimits;

/// Surface minimale d'une parcelle (m²)
pub const DEFAULT_MIN_AREA_M2: f64 = 1.0;

/// Surface maximale d'une parcelle (m², 10 km²)
pub const DEFAULT_MAX_AREA_M2: f64 = 10_000_000.0;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Noms de champs source acceptés pour chaque champ canonique
    #[serde(default)]
    pub aliases: FieldAliases,

    #[serde(default)]
    pub limits: ImportLimits,

    /// Conserver les trous des polygones (par défaut seul l'extérieur est transmis)
    #[serde(default)]
    pub keep_holes: bool,

    /// Préfixe des codes de parcelle générés
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,

    /// Rejeter les doublons de code ou de géométrie au sein d'un import
    #[serde(default = "default_true")]
    pub deduplicate: bool,
}

/// Table d'alias ordonnée par champ canonique
///
/// Le premier alias présent (insensible à la casse, valeur non vide) l'emporte.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldAliases {
    pub plot_code: Vec<String>,
    pub land_use: Vec<String>,
    pub owner_name: Vec<String>,
    pub price: Vec<String>,
    pub notes: Vec<String>,
}

/// Limites de taille et de surface
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportLimits {
    pub max_archive_bytes: u64,
    pub max_uncompressed_bytes: u64,
    pub min_area_m2: f64,
    pub max_area_m2: f64,

    /// Échéance pour la lecture et le décodage de l'archive
    pub timeout_secs: Option<u64>,
}

fn default_code_prefix() -> String {
    "PLOT".to_string()
}

fn default_true() -> bool {
    true
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            plot_code: names(&["PLOT_CODE", "plot_code", "ID"]),
            land_use: names(&["LAND_USE", "land_use", "USE", "ZONING"]),
            owner_name: names(&["OWNER", "owner_name", "OWNER_NAME"]),
            price: names(&["PRICE", "price"]),
            notes: names(&["NOTES", "notes", "DESCRIPTION"]),
        }
    }
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
            max_uncompressed_bytes: DEFAULT_MAX_UNCOMPRESSED_BYTES,
            min_area_m2: DEFAULT_MIN_AREA_M2,
            max_area_m2: DEFAULT_MAX_AREA_M2,
            timeout_secs: None,
        }
    }
}

impl ImportLimits {
    pub fn archive_limits(&self) -> ArchiveLimits {
        ArchiveLimits {
            max_archive_bytes: self.max_archive_bytes,
            max_uncompressed_bytes: self.max_uncompressed_bytes,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            aliases: FieldAliases::default(),
            limits: ImportLimits::default(),
            keep_holes: false,
            code_prefix: default_code_prefix(),
            deduplicate: true,
        }
    }
}

impl ImportConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "default" => Self::load_embedded(include_str!("presets/default.json")),
            "strict" => Self::load_embedded(include_str!("presets/strict.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: default, strict", preset),
        }
    }

    /// Nom de preset ou chemin vers un fichier JSON
    pub fn from_spec(spec: &str) -> Result<Self> {
        let path = Path::new(spec);
        if spec.ends_with(".json") || path.exists() {
            Self::load(path)
        } else {
            Self::from_preset(spec)
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset_matches_defaults() {
        let preset = ImportConfig::from_preset("default").unwrap();
        assert_eq!(preset.aliases, FieldAliases::default());
        assert_eq!(preset.limits, ImportLimits::default());
        assert!(!preset.keep_holes);
        assert!(preset.deduplicate);
        assert_eq!(preset.code_prefix, "PLOT");
    }

    #[test]
    fn test_strict_preset() {
        let preset = ImportConfig::from_preset("strict").unwrap();
        assert!(preset.keep_holes);
        assert!(preset.limits.timeout_secs.is_some());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(ImportConfig::from_preset("bogus").is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ImportConfig =
            serde_json::from_str(r#"{"limits": {"min_area_m2": 50.0}}"#).unwrap();
        assert_eq!(config.limits.min_area_m2, 50.0);
        assert_eq!(config.limits.max_area_m2, DEFAULT_MAX_AREA_M2);
        assert_eq!(config.aliases.price, vec!["PRICE", "price"]);
    }

    #[test]
    fn test_partial_aliases_keep_other_defaults() {
        let config: ImportConfig =
            serde_json::from_str(r#"{"aliases": {"plot_code": ["PARCEL"]}}"#).unwrap();
        assert_eq!(config.aliases.plot_code, vec!["PARCEL"]);
        assert_eq!(config.aliases.land_use, FieldAliases::default().land_use);
        assert_eq!(config.aliases.notes, FieldAliases::default().notes);
    }

    #[test]
    fn test_archive_limits() {
        let limits = ImportLimits {
            max_archive_bytes: 10,
            ..Default::default()
        };
        assert_eq!(limits.archive_limits().max_archive_bytes, 10);
        assert_eq!(limits.timeout(), None);
    }
}
