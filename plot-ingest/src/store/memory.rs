//! Stockage en mémoire (essais à blanc, tests)

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{FeatureStore, ImportRecord, InsertOutcome, PlotRecord, StoredPlot};
use crate::error::StoreError;
use crate::report::ImportStatus;

/// État d'un import conservé par le stockage
#[derive(Debug, Clone, PartialEq)]
pub struct ImportState {
    pub record: ImportRecord,
    pub status: ImportStatus,
    pub imported_count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    imports: HashMap<Uuid, ImportState>,
    plots: HashMap<Uuid, StoredPlot>,

    /// Codes de parcelle déjà stockés, tous imports confondus
    codes: HashSet<String>,
}

/// Stockage en mémoire partageable entre tâches
///
/// Comme la table PostGIS, il refuse un code de parcelle déjà présent.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn import_state(&self, import_id: Uuid) -> Option<ImportState> {
        self.inner.read().await.imports.get(&import_id).cloned()
    }

    pub async fn import_count(&self) -> usize {
        self.inner.read().await.imports.len()
    }

    pub async fn plot_count(&self) -> usize {
        self.inner.read().await.plots.len()
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn begin_import(&self, import: &ImportRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.imports.insert(
            import.id,
            ImportState {
                record: import.clone(),
                status: ImportStatus::Processing,
                imported_count: 0,
                message: None,
            },
        );
        Ok(())
    }

    async fn insert_plots(
        &self,
        import_id: Uuid,
        plots: &[PlotRecord],
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.imports.contains_key(&import_id) {
            return Err(StoreError::UnknownImport(import_id));
        }

        let mut outcome = InsertOutcome::default();
        for record in plots {
            if !inner.codes.insert(record.plot_code.clone()) {
                outcome.errors.push(format!(
                    "plot {}: duplicate plot code",
                    record.plot_code
                ));
                continue;
            }

            let id = Uuid::new_v4();
            inner.plots.insert(
                id,
                StoredPlot {
                    id,
                    import_id,
                    record: record.clone(),
                },
            );
            outcome.ids.push(id);
            outcome.inserted += 1;
        }

        debug!(
            import_id = %import_id,
            inserted = outcome.inserted,
            errors = outcome.errors.len(),
            "Memory insert"
        );
        Ok(outcome)
    }

    async fn finalize_import(
        &self,
        import_id: Uuid,
        status: ImportStatus,
        imported_count: usize,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let state = inner
            .imports
            .get_mut(&import_id)
            .ok_or(StoreError::UnknownImport(import_id))?;
        state.status = status;
        state.imported_count = imported_count;
        state.message = message.map(str::to_string);
        Ok(())
    }

    async fn get_plot(&self, id: Uuid) -> Result<Option<StoredPlot>, StoreError> {
        Ok(self.inner.read().await.plots.get(&id).cloned())
    }
}
