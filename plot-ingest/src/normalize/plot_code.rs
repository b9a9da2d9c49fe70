//! Génération des codes de parcelle manquants

use std::collections::HashSet;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Longueur du suffixe aléatoire
const SUFFIX_LEN: usize = 6;

/// Émet des codes `{prefix}-{millisecondes unix}-{suffixe}` uniques sur un import
#[derive(Debug)]
pub struct PlotCodeGenerator {
    prefix: String,
    issued: HashSet<String>,
}

impl PlotCodeGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            issued: HashSet::new(),
        }
    }

    /// Réserve un code lu dans les attributs pour qu'aucun code généré ne le reprenne
    pub fn reserve(&mut self, code: &str) {
        self.issued.insert(code.to_string());
    }

    /// Nouveau code, jamais émis ni réservé sur cet import
    pub fn synthesize(&mut self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(SUFFIX_LEN)
                .map(char::from)
                .collect();
            let code = format!(
                "{}-{}-{}",
                self.prefix,
                chrono::Utc::now().timestamp_millis(),
                suffix.to_ascii_uppercase()
            );
            if self.issued.insert(code.clone()) {
                return code;
            }
        }
    }
}
