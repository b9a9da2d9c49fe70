//! Rapport d'import renvoyé à l'appelant
//!
//! Le rapport regroupe les rejets du pipeline et les erreurs remontées par le
//! stockage; le statut final ne dépend que de ces dernières.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::batch::{ImportBatch, SkipReason};

/// Statut d'un import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Import ouvert, insertion en cours
    Processing,
    /// Aucune erreur du stockage
    Completed,
    /// Au moins une erreur du stockage
    Failed,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Rapport complet d'un import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub import_id: Uuid,
    pub status: ImportStatus,

    /// Parcelles insérées par le stockage
    pub imported_count: usize,

    /// Parcelles écartées avant insertion
    pub skipped_count: usize,
    pub skip_reasons: Vec<SkipReason>,

    /// Erreurs renvoyées par le stockage
    pub store_errors: Vec<String>,

    pub file_name: String,

    /// Empreinte blake3 de l'archive
    pub archive_checksum: String,

    pub duration_secs: f64,
}

impl ImportReport {
    /// Rapport ouvert à partir du lot préparé
    pub fn new(batch: &ImportBatch, file_name: &str, archive_checksum: &str) -> Self {
        Self {
            import_id: batch.id,
            status: ImportStatus::Processing,
            imported_count: 0,
            skipped_count: batch.skipped_count(),
            skip_reasons: batch.rejections.clone(),
            store_errors: Vec::new(),
            file_name: file_name.to_string(),
            archive_checksum: archive_checksum.to_string(),
            duration_secs: 0.0,
        }
    }

    pub fn record_inserted(&mut self, count: usize) {
        self.imported_count += count;
    }

    pub fn record_store_error(&mut self, message: impl Into<String>) {
        self.store_errors.push(message.into());
    }

    /// Statut terminal: `Completed` sans erreur du stockage, `Failed` sinon
    pub fn finalize(&mut self) -> ImportStatus {
        self.status = if self.store_errors.is_empty() {
            ImportStatus::Completed
        } else {
            ImportStatus::Failed
        };
        self.status
    }

    /// Message agrégé des erreurs du stockage
    pub fn failure_message(&self) -> Option<String> {
        if self.store_errors.is_empty() {
            None
        } else {
            Some(self.store_errors.join("; "))
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - {}", self.file_name);
        println!("{}", "=".repeat(60));

        println!("\nImport: {}", self.import_id);
        println!("Status: {}", self.status.as_str());
        println!("Checksum: {}", self.archive_checksum);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Plots: {} imported, {} skipped",
            self.imported_count, self.skipped_count
        );

        if !self.skip_reasons.is_empty() {
            println!("\n--- SKIPPED ({}) ---", self.skip_reasons.len());
            for skip in self.skip_reasons.iter().take(20) {
                let reasons: Vec<String> = skip.reasons.iter().map(|r| r.to_string()).collect();
                println!("  [{}] {}", skip.plot_code, reasons.join(", "));
            }
            if self.skip_reasons.len() > 20 {
                println!("  ... and {} more", self.skip_reasons.len() - 20);
            }
        }

        if !self.store_errors.is_empty() {
            println!("\n--- STORE ERRORS ({}) ---", self.store_errors.len());
            for e in self.store_errors.iter().take(20) {
                println!("  {}", e);
            }
            if self.store_errors.len() > 20 {
                println!("  ... and {} more", self.store_errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} imported, {} skipped, {} store errors ({})",
            self.file_name,
            self.imported_count,
            self.skipped_count,
            self.store_errors.len(),
            self.status.as_str()
        )
    }
}
