//! Signal d'annulation / échéance partagé entre l'appelant et le décodage

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ShapefileError;

/// Signal vérifié entre deux fichiers de l'archive et entre deux enregistrements
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal qui expire après `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Demande l'arrêt (visible par tous les clones)
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Retourne une erreur fatale si l'arrêt a été demandé ou si l'échéance est passée
    pub fn check(&self) -> Result<(), ShapefileError> {
        if self.is_cancelled() {
            return Err(ShapefileError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ShapefileError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
